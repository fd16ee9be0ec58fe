/// Baseline export substitution
///
/// This module handles:
/// - Requesting the host's unmodified export dialog over HTTP
/// - Locating the generated document's id in the dialog content
/// - Regenerating the file with extended processing and storing it
/// - Rewriting the dialog's download links to the new document
use crate::config::RenderSettings;
use crate::error::{ReportError, ReportResult};
use crate::host::{BaselineDialog, BaselineExporter, EventLog, RequestContext};
use crate::report;
use crate::types::OutputFormat;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;
use std::time::Duration;

const USER_AGENT: &str = "extended-reports/0.1.0";
const ERROR_TITLE: &str = "ERROR";
const EXPORT_ENDPOINT: &str = "DataExport/data_export_ajax.php";

pub const FAILURE_NOTICE: &str = "<p style='color:red'>An error occurred in processing the extended properties of this \
     report. The file for download is unmodified.</p>";

lazy_static! {
    static ref DOC_ID: Regex =
        Regex::new(r#"\?pid=(\d+)&amp;route=FileRepositoryController:download&amp;id=(\d+)">"#).unwrap();
    static ref LEGACY_DOC_ID: Regex = Regex::new(r#"FileRepository/file_download\.php\?pid=(\d+)&amp;id=(\d+)">"#).unwrap();
}

/// Find the file repository document linked from an export dialog
///
/// Both the route-based link and the legacy `file_download.php` link are recognized; the link must belong to
/// `project_id`.
pub fn extract_document_id(content: &str, project_id: u32) -> Option<u64> {
    let pid = project_id.to_string();
    DOC_ID
        .captures_iter(content)
        .find(|c| c[1] == pid)
        .or_else(|| LEGACY_DOC_ID.captures_iter(content).find(|c| c[1] == pid))
        .and_then(|c| c[2].parse().ok())
}

/// Form parameters for the host's export endpoint
pub fn export_params(
    report_id: u32,
    settings: &RenderSettings,
    csrf_token: Option<&str>,
) -> Vec<(String, String)> {
    let delimiter = if settings.delimiter == "\t" { "tab".to_string() } else { settings.delimiter.clone() };
    let mut params = vec![
        ("report_id".to_string(), report_id.to_string()),
        ("export_format".to_string(), settings.format.to_string()),
        ("csvDelimiter".to_string(), delimiter),
        ("decimalCharacter".to_string(), settings.decimal.clone()),
    ];
    if let Some(token) = csrf_token {
        params.push(("redcap_csrf_token".to_string(), token.to_string()));
    }
    params
}

/// Run the host's export and substitute the extended file
///
/// Only `csvraw` and `csvlabels` exports are intercepted; other formats return the host's dialog untouched. Once
/// intercepted, every failure is reported inside the dialog with `FAILURE_NOTICE` ahead of whatever content was
/// obtained.
pub fn export_report(
    ctx: &RequestContext,
    exporter: &dyn BaselineExporter,
    log: &dyn EventLog,
    report_id: u32,
    settings: &RenderSettings,
    params: &[(String, String)],
) -> ReportResult<BaselineDialog> {
    if !matches!(settings.format, OutputFormat::CsvRaw | OutputFormat::CsvLabels) {
        debug!("Export format {} passes through unmodified", settings.format);
        return exporter.request(params);
    }

    let dialog = match exporter.request(params) {
        Ok(dialog) => dialog,
        Err(ReportError::BaselineExportUnavailable { reason, partial_content }) => {
            warn!("Baseline export unavailable: {}", reason);
            let content = partial_content.unwrap_or(reason);
            return Ok(BaselineDialog { title: ERROR_TITLE.to_string(), content: with_notice(&content) });
        }
        Err(e) => {
            warn!("Baseline export failed: {}", e);
            return Ok(BaselineDialog { title: ERROR_TITLE.to_string(), content: with_notice(&e.to_string()) });
        }
    };

    match substitute(ctx, log, report_id, settings, &dialog.content) {
        Ok(content) => Ok(BaselineDialog { title: dialog.title, content }),
        Err(e) => {
            warn!("Extended export of report {} failed: {}", report_id, e);
            Ok(BaselineDialog { title: dialog.title, content: with_notice(&dialog.content) })
        }
    }
}

fn with_notice(content: &str) -> String {
    format!("{}{}", FAILURE_NOTICE, content)
}

fn substitute(
    ctx: &RequestContext,
    log: &dyn EventLog,
    report_id: u32,
    settings: &RenderSettings,
    content: &str,
) -> ReportResult<String> {
    let doc_id = extract_document_id(content, ctx.project.project_id).ok_or_else(|| {
        ReportError::BaselineExportUnavailable { reason: "no document link in export dialog".into(), partial_content: None }
    })?;
    let name = ctx
        .documents
        .document_name(doc_id)
        .ok_or_else(|| ReportError::DataSource(format!("Document {} not found", doc_id)))?;

    let document = report::render(ctx, report_id, settings)?;
    let new_id = ctx.documents.store(&name, document.content.trim()).map_err(ReportError::DataSource)?;

    let content = content
        .replace(&format!("&amp;id={}", doc_id), &format!("&amp;id={}", new_id))
        .replace(&format!("displaySendItExportFile({});", doc_id), &format!("displaySendItExportFile({});", new_id));

    let detail = format!("Extended properties applied to report output doc_id={}: new doc_id={}", doc_id, new_id);
    info!("{}", detail);
    log.log_event("Extended Reports", &detail);
    Ok(content)
}

/// Export dialog requests against a live host
pub struct HttpBaselineExporter {
    endpoint: String,
    cookies: Vec<(String, String)>,
    timeout: Duration,
}

impl HttpBaselineExporter {
    /// `base_url` is the host's versioned web root, e.g. `https://host/redcap_v14.0.0`
    pub fn new(base_url: &str, project_id: u32, cookies: Vec<(String, String)>, timeout: Duration) -> Self {
        let endpoint = format!(
            "{}/{}?pid={}&xml_metadata_options=&extended_report_hook_bypass=1",
            base_url.trim_end_matches('/'),
            EXPORT_ENDPOINT,
            project_id
        );
        Self { endpoint, cookies, timeout }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn cookie_header(&self) -> String {
        self.cookies.iter().map(|(k, v)| format!("{}={}; ", k, v)).collect()
    }
}

impl BaselineExporter for HttpBaselineExporter {
    fn request(&self, params: &[(String, String)]) -> ReportResult<BaselineDialog> {
        let form: Vec<(&str, &str)> = params.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        debug!("POST {}", self.endpoint);
        let response = ureq::post(&self.endpoint)
            .set("User-Agent", USER_AGENT)
            .set("Cookie", &self.cookie_header())
            .timeout(self.timeout)
            .send_form(&form);

        let body = match response {
            Ok(resp) => resp.into_string()?,
            Err(ureq::Error::Status(code, resp)) if code == 404 || code == 407 || code >= 500 => {
                let body = resp.into_string().ok();
                return Err(ReportError::BaselineExportUnavailable {
                    reason: format!("HTTP status {}", code),
                    partial_content: body,
                });
            }
            Err(ureq::Error::Status(_, resp)) => resp.into_string()?,
            Err(e) => {
                return Err(ReportError::BaselineExportUnavailable { reason: e.to_string(), partial_content: None });
            }
        };
        Ok(parse_dialog(&body))
    }
}

/// Dialog JSON; a body that is not a dialog becomes the content of an error dialog
pub fn parse_dialog(body: &str) -> BaselineDialog {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) if value.is_object() => BaselineDialog {
            title: value.get("title").and_then(|t| t.as_str()).unwrap_or(ERROR_TITLE).to_string(),
            content: value.get("content").and_then(|c| c.as_str()).unwrap_or(body).to_string(),
        },
        _ => BaselineDialog { title: ERROR_TITLE.to_string(), content: body.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN: &str = "<a href=\"/redcap/redcap_v14.0.0/index.php?pid=14&amp;route=FileRepositoryController:download&amp;id=55\">Weights.csv</a>";
    const LEGACY: &str = "<a href=\"/redcap/redcap_v12.0.0/FileRepository/file_download.php?pid=14&amp;id=56\">Weights.csv</a>";

    #[test]
    fn test_extract_document_id() {
        assert_eq!(extract_document_id(MODERN, 14), Some(55));
        assert_eq!(extract_document_id(LEGACY, 14), Some(56));
        assert_eq!(extract_document_id(MODERN, 15), None, "Link must belong to the project");
        assert_eq!(extract_document_id("<p>No file</p>", 14), None);
    }

    #[test]
    fn test_export_params() {
        let settings = RenderSettings { format: OutputFormat::CsvLabels, delimiter: "\t".into(), decimal: ",".into() };
        let params = export_params(4, &settings, Some("tok"));
        assert_eq!(params[0], ("report_id".to_string(), "4".to_string()));
        assert_eq!(params[1].1, "csvlabels");
        assert_eq!(params[2].1, "tab");
        assert_eq!(params[4], ("redcap_csrf_token".to_string(), "tok".to_string()));
    }

    #[test]
    fn test_parse_dialog() {
        let dialog = parse_dialog(r#"{"title":"Data export","content":"<p>done</p>"}"#);
        assert_eq!(dialog, BaselineDialog { title: "Data export".into(), content: "<p>done</p>".into() });
        let dialog = parse_dialog("Fatal error");
        assert_eq!(dialog.title, "ERROR");
        assert_eq!(dialog.content, "Fatal error");
    }

    #[test]
    fn test_endpoint() {
        let exporter = HttpBaselineExporter::new("https://host/redcap_v14.0.0/", 14, Vec::new(), Duration::from_secs(5));
        assert_eq!(
            exporter.endpoint(),
            "https://host/redcap_v14.0.0/DataExport/data_export_ajax.php?pid=14&xml_metadata_options=&extended_report_hook_bypass=1"
        );
    }
}
