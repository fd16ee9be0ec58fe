//! API report export.
//!
//! The host's API answers report requests on its own unless the report is extended and the format is one this
//! crate renders. Errors raised while rendering go back in the caller's `returnFormat`.

use crate::config::{resolve_decimal, resolve_delimiter, RenderSettings};
use crate::error::ReportError;
use crate::host::RequestContext;
use crate::html_filter::escape;
use crate::report;
use crate::types::OutputFormat;
use log::{debug, warn};

const DEFAULT_FORMAT: &str = "xml";

/// Parameters of an API `content=report` request
#[derive(Debug, Clone, Default)]
pub struct ApiRequest {
    pub report_id: u32,
    pub format: Option<String>,
    pub return_format: Option<String>,
    pub csv_delimiter: Option<String>,
    pub decimal_character: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    /// The host should answer the request itself
    NotHandled,
    Body { content: String, format: OutputFormat },
}

pub fn export_via_api(ctx: &RequestContext, request: &ApiRequest) -> ApiResponse {
    let requested = request.format.as_deref().unwrap_or(DEFAULT_FORMAT);
    let format = match requested {
        "csv" => OutputFormat::Csv,
        "json" => OutputFormat::Json,
        "xml" => OutputFormat::Xml,
        other => {
            debug!("API format {} is left to the host", other);
            return ApiResponse::NotHandled;
        }
    };
    let return_format = request.return_format.as_deref().unwrap_or(requested);

    let settings = RenderSettings {
        format,
        delimiter: resolve_delimiter(request.csv_delimiter.as_deref()),
        decimal: resolve_decimal(request.decimal_character.as_deref()),
    };
    match report::render(ctx, request.report_id, &settings) {
        Ok(document) => ApiResponse::Body { content: document.content, format },
        Err(ReportError::NotExtended(_)) | Err(ReportError::ReportNotFound(_)) => ApiResponse::NotHandled,
        Err(e) => {
            warn!("API export of report {} failed: {}", request.report_id, e);
            ApiResponse::Body { content: error_body(&e.to_string(), return_format), format }
        }
    }
}

/// Error message in the API's return format
pub fn error_body(message: &str, return_format: &str) -> String {
    match return_format {
        "csv" => message.to_string(),
        "json" => serde_json::json!({ "error": message }).to_string(),
        _ => format!("<?xml version=\"1.0\" encoding=\"UTF-8\" ?><error>{}</error>", escape(message)),
    }
}
