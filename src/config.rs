/// Configuration resolution module
///
/// This module handles:
/// - Resolving output format, delimiter and decimal character into RenderSettings
/// - Normalizing stored extension settings against the project's structure
/// - Deciding when checkbox values are combined into one cell
use crate::csv_encoder::{CsvEncoder, DEFAULT_DECIMAL, DEFAULT_DELIMITER};
use crate::metadata::ProjectMetadata;
use crate::types::{OutputFormat, ReportConfig, ReportDefinition, ReshapeEvent, ReshapeInstance};
use log::debug;

const VALID_DELIMITERS: [&str; 5] = [",", ";", "\t", "|", "^"];

/// Fully resolved rendering options for one request
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub format: OutputFormat,
    pub delimiter: String,
    pub decimal: String,
}

impl RenderSettings {
    pub fn new(format: OutputFormat) -> Self {
        Self { format, delimiter: DEFAULT_DELIMITER.to_string(), decimal: DEFAULT_DECIMAL.to_string() }
    }

    pub fn encoder(&self) -> CsvEncoder {
        CsvEncoder::new(&self.delimiter, &self.decimal)
    }
}

/// Build RenderSettings from user-supplied strings
///
/// Unknown formats are an error; unknown delimiters and decimal characters fall back to the defaults.
pub fn resolve_render_settings(
    format: &str,
    delimiter: Option<&str>,
    decimal: Option<&str>,
) -> Result<RenderSettings, String> {
    let format = OutputFormat::from_code(format).ok_or_else(|| format!("Unknown output format '{}'", format))?;
    Ok(RenderSettings { format, delimiter: resolve_delimiter(delimiter), decimal: resolve_decimal(decimal) })
}

/// `tab` maps to a tab character; anything outside the accepted set falls back to a comma
pub fn resolve_delimiter(delimiter: Option<&str>) -> String {
    let delimiter = match delimiter {
        Some(d) if d.eq_ignore_ascii_case("tab") => "\t",
        Some(d) if !d.is_empty() => d,
        _ => DEFAULT_DELIMITER,
    };
    if VALID_DELIMITERS.contains(&delimiter) {
        delimiter.to_string()
    } else {
        debug!("Invalid delimiter {:?}, using default", delimiter);
        DEFAULT_DELIMITER.to_string()
    }
}

pub fn resolve_decimal(decimal: Option<&str>) -> String {
    match decimal {
        Some(d @ ("." | ",")) => d.to_string(),
        _ => DEFAULT_DECIMAL.to_string(),
    }
}

/// Normalize stored settings against the project
///
/// The event layout only applies to longitudinal projects and the instance layout only to projects with
/// repeating forms or events. Returns `None` when nothing extended remains.
pub fn resolve_report_config(raw: Option<ReportConfig>, project: &ProjectMetadata) -> Option<ReportConfig> {
    let mut config = raw?;
    if !project.longitudinal && config.reshape_event != ReshapeEvent::None {
        debug!("Ignoring event layout {:?} for a classic project", config.reshape_event);
        config.reshape_event = ReshapeEvent::None;
    }
    if !project.has_repeating_forms_events() && config.reshape_instance != ReshapeInstance::None {
        debug!("Ignoring instance layout {:?}: no repeating forms or events", config.reshape_instance);
        config.reshape_instance = ReshapeInstance::None;
    }
    if config.is_sql {
        config.sql_query = clean_sql(&config.sql_query);
    }
    if config.is_extended() { Some(config) } else { None }
}

/// Whether checkbox values render combined in one cell
///
/// SQL reports always combine, and so does every instance layout other than columns.
pub fn combine_checkboxes(definition: &ReportDefinition, config: &ReportConfig) -> bool {
    config.is_sql || definition.combine_checkbox_values || config.reshape_instance != ReshapeInstance::Columns
}

/// Tabs become two spaces, surrounding whitespace and trailing semicolons go
pub fn clean_sql(sql: &str) -> String {
    sql.replace('\t', "  ").trim().trim_end_matches(';').trim_end().to_string()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
