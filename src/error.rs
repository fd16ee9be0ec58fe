//! Error taxonomy for report rendering and the surrounding operations.
//!
//! Collaborators hand back plain `String` errors; the core maps them onto these variants so that callers can
//! decide whether a failure degrades the output document or is only logged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    /// SQL that does not start with a SELECT keyword. Never executed.
    #[error("Not a select query: {0}")]
    InvalidQuery(String),

    /// Driver-level failure while running a report query.
    #[error("Query failed: {0}")]
    QueryExecution(String),

    /// The host's own export endpoint failed or its dialog held no document link.
    #[error("Baseline export unavailable: {reason}")]
    BaselineExportUnavailable { reason: String, partial_content: Option<String> },

    #[error("Sort failed: {0}")]
    SortFailure(String),

    #[error("Report {0} not found")]
    ReportNotFound(u32),

    #[error("Report {0} has no extended configuration")]
    NotExtended(u32),

    #[error("{0}")]
    PublicAccessDenied(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Data source error: {0}")]
    DataSource(String),

    #[error("Settings store error: {0}")]
    SettingsStore(String),

    #[error("XML serialization failed: {0}")]
    Xml(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<quick_xml::Error> for ReportError {
    fn from(e: quick_xml::Error) -> Self {
        ReportError::Xml(e.to_string())
    }
}

pub type ReportResult<T> = Result<T, ReportError>;
