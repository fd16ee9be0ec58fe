/// Administrative event log written to a file
use crate::host::EventLog;
use fs2::FileExt;
use log::warn;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

pub struct FileEventLog {
    path: PathBuf,
}

impl FileEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl EventLog for FileEventLog {
    /// Append one timestamped line. Failures are reported through `log` and otherwise ignored.
    fn log_event(&self, description: &str, detail: &str) {
        let file = match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Failed to open event log {}: {}", self.path.display(), e);
                return;
            }
        };

        if let Err(e) = file.lock_exclusive() {
            warn!("Failed to lock event log: {}", e);
            return;
        }

        let mut writer = BufWriter::new(&file);
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let detail = detail.replace('\n', " ");
        if let Err(e) = writeln!(writer, "[{}] {}: {}", timestamp, description, detail).and_then(|_| writer.flush()) {
            warn!("Failed to write event log: {}", e);
        }
    }
}
