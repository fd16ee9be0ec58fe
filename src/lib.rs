//! Raw-SQL reports and row-per-record reshaping of longitudinal and repeating report data.
//!
//! The entry points are [`report::render`] for a single document, [`operation::dispatch`] for the host-facing
//! operations, and the collaborator traits in [`host`] that a host implements.

pub mod api;
pub mod baseline;
pub mod cli;
pub mod config;
pub mod console_format;
pub mod csv_encoder;
pub mod error;
pub mod event_log;
pub mod fixture;
pub mod formatter;
pub mod host;
pub mod html_filter;
pub mod metadata;
pub mod operation;
pub mod report;
pub mod reshape;
pub mod settings_store;
pub mod sort;
pub mod sql_report;
pub mod types;
pub mod ui;

pub use config::RenderSettings;
pub use error::{ReportError, ReportResult};
pub use host::RequestContext;
pub use operation::{Operation, OperationOutput, Services, dispatch};
pub use types::{OutputDocument, OutputFormat, ReportConfig, ReshapeEvent, ReshapeInstance};
