use crate::types::OutputFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Get the default location of the extension settings store
/// Uses platform-specific config directories:
/// - Linux: ~/.config/extended-reports/report-settings.toml
/// - macOS: ~/Library/Application Support/extended-reports/report-settings.toml
/// - Windows: %APPDATA%/extended-reports/report-settings.toml
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|p| p.join("extended-reports"))
        .unwrap_or_else(|| PathBuf::from(".extended-reports"))
        .join("report-settings.toml")
}

#[derive(Parser, Debug, Clone)]
#[command(name = "extended-reports")]
#[command(about = "Render raw-SQL and reshaped reports as HTML, CSV, JSON or XML")]
#[command(version)]
pub struct CliArgs {
    /// Project fixture: metadata, user, report definitions, data and canned SQL results
    #[arg(long, short = 'p', value_name = "FILE", default_value = "project.json")]
    pub project: PathBuf,

    /// Extension settings store (TOML)
    /// Default: ~/.config/extended-reports/report-settings.toml (Linux)
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Append administrative events to this file
    #[arg(long, value_name = "FILE")]
    pub event_log: Option<PathBuf>,

    /// Override console width for the preview table (default: auto-detect)
    #[arg(long, value_name = "COLUMNS")]
    pub console_width: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the HTML view of a report
    View { report_id: u32 },

    /// Print the public HTML view, refusing reports that expose identifiers
    ViewPublic { report_id: u32 },

    /// Render a report export
    Export {
        report_id: u32,
        /// csv, csvraw, csvlabels, json, xml or html
        #[arg(long, default_value = "csvraw")]
        format: String,
        /// Field delimiter: , ; tab | ^
        #[arg(long)]
        delimiter: Option<String>,
        /// Decimal character: . or ,
        #[arg(long)]
        decimal: Option<String>,
        /// Write to a file instead of stdout
        #[arg(long, short = 'o', value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print a report as a console table
    Preview { report_id: u32 },

    /// Run a SQL report and print it as CSV
    Sql {
        report_id: u32,
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        decimal: Option<String>,
    },

    /// Export through the API path (csv, json or xml)
    ApiExport {
        report_id: u32,
        #[arg(long, default_value = "csv")]
        format: String,
        /// Format used for error messages (defaults to --format)
        #[arg(long)]
        return_format: Option<String>,
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        decimal: Option<String>,
    },

    /// Run the host's export, then replace its file with the extended rendering
    BaselineExport {
        report_id: u32,
        /// The host's versioned web root, e.g. https://host/redcap_v14.0.0
        #[arg(long)]
        url: String,
        /// csvraw or csvlabels
        #[arg(long, default_value = "csvraw")]
        format: String,
        /// Session cookies as name=value (repeatable)
        #[arg(long = "cookie", value_name = "NAME=VALUE")]
        cookies: Vec<String>,
        #[arg(long)]
        csrf_token: Option<String>,
        /// Directory receiving regenerated documents
        #[arg(long, value_name = "DIR")]
        documents_dir: Option<PathBuf>,
        #[arg(long, default_value = "60")]
        timeout_secs: u64,
        #[arg(long)]
        delimiter: Option<String>,
        #[arg(long)]
        decimal: Option<String>,
    },

    /// Save a report's extension settings
    SaveConfig {
        report_id: u32,
        #[arg(long)]
        sql: Option<String>,
        #[arg(long)]
        disable_dag_filter: bool,
        /// ef (event then field) or fe (field then event)
        #[arg(long)]
        reshape_event: Option<String>,
        /// cols, conc_space, conc_comma, conc_pipe, min, max, first, last
        #[arg(long)]
        reshape_instance: Option<String>,
    },

    /// Copy a report's extension settings to another report
    CopyConfig { from: u32, to: u32 },

    /// Delete a report's extension settings
    DeleteConfig { report_id: u32 },
}

impl CliArgs {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        CliArgs::parse()
    }

    /// Validate argument combinations
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::Export { format, .. } => {
                OutputFormat::from_code(format).ok_or_else(|| format!("Unknown export format '{}'", format))?;
            }
            Command::ApiExport { format, return_format, .. } => {
                for f in std::iter::once(format).chain(return_format.iter()) {
                    if !matches!(f.as_str(), "csv" | "json" | "xml") {
                        return Err(format!("API export supports csv, json or xml, not '{}'", f));
                    }
                }
            }
            Command::BaselineExport { url, format, cookies, .. } => {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(format!("--url must be an http(s) URL, got '{}'", url));
                }
                if !matches!(format.as_str(), "csvraw" | "csvlabels") {
                    return Err(format!("Baseline export only rewrites csvraw or csvlabels files, not '{}'", format));
                }
                if let Some(bad) = cookies.iter().find(|c| !c.contains('=')) {
                    return Err(format!("Cookie '{}' is not in NAME=VALUE form", bad));
                }
            }
            Command::SaveConfig { sql, reshape_event, reshape_instance, .. } => {
                if sql.as_deref().is_some_and(|s| !s.trim().is_empty())
                    && (reshape_event.is_some() || reshape_instance.is_some())
                {
                    return Err("A report is either a SQL report or a reshaped report, not both".to_string());
                }
            }
            Command::CopyConfig { from, to } if from == to => {
                return Err("Cannot copy a report's settings onto itself".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    /// Get the settings store path, using the default config location if not specified
    pub fn get_settings_path(&self) -> PathBuf {
        self.settings.clone().unwrap_or_else(default_settings_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(command: Command) -> CliArgs {
        CliArgs {
            project: PathBuf::from("project.json"),
            settings: None,
            event_log: None,
            console_width: None,
            command,
        }
    }

    #[test]
    fn test_validate_unknown_export_format_fails() {
        let a = args(Command::Export {
            report_id: 1,
            format: "pdf".into(),
            delimiter: None,
            decimal: None,
            output: None,
        });
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_validate_api_export_rejects_odm() {
        let a = args(Command::ApiExport {
            report_id: 1,
            format: "odm".into(),
            return_format: None,
            delimiter: None,
            decimal: None,
        });
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_validate_sql_and_reshape_conflict() {
        let a = args(Command::SaveConfig {
            report_id: 3,
            sql: Some("select 1".into()),
            disable_dag_filter: false,
            reshape_event: Some("ef".into()),
            reshape_instance: None,
        });
        assert!(a.validate().is_err());
    }

    #[test]
    fn test_validate_valid_config_succeeds() {
        let a = args(Command::BaselineExport {
            report_id: 1,
            url: "https://redcap.example.org/export".into(),
            format: "csvlabels".into(),
            cookies: vec!["PHPSESSID=abc".into()],
            csrf_token: Some("t".into()),
            documents_dir: None,
            timeout_secs: 60,
            delimiter: None,
            decimal: None,
        });
        assert!(a.validate().is_ok());
        assert!(a.get_settings_path().ends_with("report-settings.toml"));
    }
}
