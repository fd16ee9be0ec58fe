/// Scenario tests for host operations
///
/// Baseline export substitution runs against an in-process exporter that returns a canned dialog, so no network
/// access is needed. Settings changes go through a temporary settings store.
use extended_reports::api::{ApiRequest, ApiResponse};
use extended_reports::baseline::{self, FAILURE_NOTICE};
use extended_reports::error::ReportError;
use extended_reports::fixture::{FixtureHost, ProjectFixture};
use extended_reports::host::{BaselineDialog, BaselineExporter};
use extended_reports::settings_store::{SaveRequest, SettingsStore};
use extended_reports::{Operation, OperationOutput, OutputFormat, RenderSettings, ReportResult, Services, dispatch};
use std::cell::RefCell;
use tempfile::TempDir;

const DIALOG: &str = "<div>Data export was successful!<a href=\"/redcap/redcap_v14.0.0/index.php?pid=14&amp;\
    route=FileRepositoryController:download&amp;id=55\">Download</a>\
    <button onclick=\"displaySendItExportFile(55);\">Send-It</button></div>";

/// Returns a fixed dialog and records the parameters it was called with
struct CannedExporter {
    response: Result<BaselineDialog, String>,
    calls: RefCell<Vec<Vec<(String, String)>>>,
}

impl CannedExporter {
    fn ok(content: &str) -> Self {
        let dialog = BaselineDialog { title: "Data export".into(), content: content.into() };
        Self { response: Ok(dialog), calls: RefCell::new(Vec::new()) }
    }

    fn unavailable(reason: &str) -> Self {
        Self { response: Err(reason.into()), calls: RefCell::new(Vec::new()) }
    }
}

impl BaselineExporter for CannedExporter {
    fn request(&self, params: &[(String, String)]) -> ReportResult<BaselineDialog> {
        self.calls.borrow_mut().push(params.to_vec());
        match &self.response {
            Ok(dialog) => Ok(dialog.clone()),
            Err(reason) => {
                Err(ReportError::BaselineExportUnavailable { reason: reason.clone(), partial_content: None })
            }
        }
    }
}

fn host() -> FixtureHost {
    FixtureHost::new(ProjectFixture::parse(include_str!("fixtures/project.json")).expect("fixture parses"))
}

fn baseline_op(report_id: u32, format: OutputFormat) -> Operation {
    let settings = RenderSettings::new(format);
    let params = baseline::export_params(report_id, &settings, Some("token"));
    Operation::BaselineExport { report_id, settings, params }
}

#[test]
fn test_baseline_export_substitutes_document() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.toml"));
    let host = host();
    let ctx = host.context();
    let exporter = CannedExporter::ok(DIALOG);
    let services = Services { settings: &store, events: &host, exporter: Some(&exporter) };

    let output = dispatch(&ctx, &services, baseline_op(1, OutputFormat::CsvRaw)).unwrap();
    let OperationOutput::Dialog(dialog) = output else { panic!("expected a dialog") };

    assert_eq!(dialog.title, "Data export");
    assert!(dialog.content.contains("&amp;id=56\">Download"));
    assert!(dialog.content.contains("displaySendItExportFile(56);"));
    assert!(!dialog.content.contains("55"));

    let stored = host.document_content(56).expect("regenerated document stored");
    assert!(stored.starts_with("record_id,baseline_arm_1.age,baseline_arm_1.weight.1"));

    let events = host.logged_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1, "Extended properties applied to report output doc_id=55: new doc_id=56");

    let calls = exporter.calls.borrow();
    assert!(calls[0].contains(&("redcap_csrf_token".to_string(), "token".to_string())));
}

#[test]
fn test_baseline_export_without_document_link() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.toml"));
    let host = host();
    let ctx = host.context();
    let exporter = CannedExporter::ok("<div>Export finished</div>");
    let services = Services { settings: &store, events: &host, exporter: Some(&exporter) };

    let output = dispatch(&ctx, &services, baseline_op(1, OutputFormat::CsvLabels)).unwrap();
    let OperationOutput::Dialog(dialog) = output else { panic!("expected a dialog") };

    assert_eq!(dialog.content, format!("{}<div>Export finished</div>", FAILURE_NOTICE));
    assert!(host.document_content(56).is_none());
    assert!(host.logged_events().is_empty());
}

#[test]
fn test_baseline_export_host_unavailable() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.toml"));
    let host = host();
    let ctx = host.context();
    let exporter = CannedExporter::unavailable("HTTP status 502");
    let services = Services { settings: &store, events: &host, exporter: Some(&exporter) };

    let output = dispatch(&ctx, &services, baseline_op(1, OutputFormat::CsvRaw)).unwrap();
    let OperationOutput::Dialog(dialog) = output else { panic!("expected a dialog") };

    assert_eq!(dialog.title, "ERROR");
    assert!(dialog.content.starts_with(FAILURE_NOTICE));
    assert!(dialog.content.ends_with("HTTP status 502"));
}

#[test]
fn test_baseline_export_other_formats_pass_through() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.toml"));
    let host = host();
    let ctx = host.context();
    let exporter = CannedExporter::ok(DIALOG);
    let services = Services { settings: &store, events: &host, exporter: Some(&exporter) };

    let output = dispatch(&ctx, &services, baseline_op(1, OutputFormat::Json)).unwrap();
    let OperationOutput::Dialog(dialog) = output else { panic!("expected a dialog") };

    assert_eq!(dialog.content, DIALOG);
    assert!(host.logged_events().is_empty());
}

#[test]
fn test_api_export() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.toml"));
    let host = host();
    let ctx = host.context();
    let services = Services { settings: &store, events: &host, exporter: None };

    let request = ApiRequest { report_id: 2, format: Some("csv".into()), ..Default::default() };
    let output = dispatch(&ctx, &services, Operation::ApiExport(request)).unwrap();
    let OperationOutput::Api(ApiResponse::Body { content, format }) = output else { panic!("expected a body") };
    assert_eq!(format, OutputFormat::Csv);
    assert_eq!(content, "record_id,age\n1,34.5\n2,51\n3,");

    // Reports without extension settings stay with the host
    let request = ApiRequest { report_id: 5, format: Some("json".into()), ..Default::default() };
    let output = dispatch(&ctx, &services, Operation::ApiExport(request)).unwrap();
    assert_eq!(output, OperationOutput::Api(ApiResponse::NotHandled));
}

#[test]
fn test_saved_settings_take_effect() {
    let dir = TempDir::new().unwrap();
    let store = SettingsStore::new(dir.path().join("settings.toml"));
    let host = host().with_settings(store.clone());
    let ctx = host.context();
    let services = Services { settings: &store, events: &host, exporter: None };

    let request = SaveRequest {
        reshape_event: Some("ef".into()),
        reshape_instance: Some("last".into()),
        ..Default::default()
    };
    let output = dispatch(&ctx, &services, Operation::SaveConfig { report_id: 5, request }).unwrap();
    assert_eq!(output, OperationOutput::Admin { changed: true });

    let settings = RenderSettings::new(OutputFormat::CsvRaw);
    let doc = extended_reports::report::render(&ctx, 5, &settings).unwrap();
    assert_eq!(doc.content, "record_id,baseline_arm_1.age\n1,34.5");

    let output = dispatch(&ctx, &services, Operation::CopyConfig { from: 5, to: 3 }).unwrap();
    assert_eq!(output, OperationOutput::Admin { changed: true });
    assert!(store.find(3).is_some());

    let output = dispatch(&ctx, &services, Operation::DeleteConfig { report_id: 5 }).unwrap();
    assert_eq!(output, OperationOutput::Admin { changed: true });
    assert!(matches!(
        extended_reports::report::render(&ctx, 5, &settings),
        Err(ReportError::NotExtended(5))
    ));
}
