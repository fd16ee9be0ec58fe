/// Status lines for the CLI
///
/// Everything goes to stderr so rendered documents on stdout stay clean. Lines from different threads never
/// interleave.
use lazy_static::lazy_static;
use std::io::Write;
use std::sync::Mutex;
use term::color::Color;

const STATUS_PREFIX: &str = "reports";

lazy_static! {
    static ref STDERR: Mutex<()> = Mutex::new(());
}

/// `reports: <message>`
pub fn status(message: &str) {
    let _guard = STDERR.lock();
    eprintln!("{}: {}", STATUS_PREFIX, message);
}

pub fn print_warning(message: &str) {
    labelled("warning", term::color::BRIGHT_YELLOW, message, false);
}

/// Error line set off by blank lines
pub fn print_error(message: &str) {
    labelled("error", term::color::BRIGHT_RED, message, true);
}

fn labelled(label: &str, color: Color, message: &str, padded: bool) {
    let _guard = STDERR.lock();
    if padded {
        eprintln!();
    }
    match term::stderr() {
        Some(mut t) => {
            let _ = t.fg(color);
            let _ = t.attr(term::Attr::Bold);
            let _ = write!(t, "{}", label);
            let _ = t.reset();
            eprintln!(": {}", message);
        }
        None => eprintln!("{}", plain_line(label, message)),
    }
    if padded {
        eprintln!();
    }
}

fn plain_line(label: &str, message: &str) -> String {
    format!("{}: {}", label, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_line() {
        assert_eq!(plain_line("warning", "no rows"), "warning: no rows");
    }
}
