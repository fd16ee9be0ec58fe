//! Operations a host can route to this crate, and their dispatch.

use crate::api::{self, ApiRequest, ApiResponse};
use crate::baseline;
use crate::config::RenderSettings;
use crate::error::{ReportError, ReportResult};
use crate::host::{BaselineDialog, BaselineExporter, EventLog, RequestContext};
use crate::report;
use crate::settings_store::{SaveRequest, SettingsStore};
use crate::types::OutputDocument;
use log::{debug, warn};

const LOG_DESCRIPTION: &str = "Extended Reports";

#[derive(Debug, Clone)]
pub enum Operation {
    ViewReport { report_id: u32 },
    ViewPublicReport { report_id: u32 },
    ExportReport { report_id: u32, settings: RenderSettings },
    BaselineExport { report_id: u32, settings: RenderSettings, params: Vec<(String, String)> },
    ApiExport(ApiRequest),
    SaveConfig { report_id: u32, request: SaveRequest },
    CopyConfig { from: u32, to: u32 },
    DeleteConfig { report_id: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutput {
    Page(String),
    Document(OutputDocument),
    Dialog(BaselineDialog),
    Api(ApiResponse),
    /// Settings changed or not. Failures are logged rather than returned.
    Admin { changed: bool },
}

/// Collaborators used by some operations only
pub struct Services<'a> {
    pub settings: &'a SettingsStore,
    pub events: &'a dyn EventLog,
    pub exporter: Option<&'a dyn BaselineExporter>,
}

pub fn dispatch(ctx: &RequestContext, services: &Services, operation: Operation) -> ReportResult<OperationOutput> {
    debug!("Dispatching {:?}", operation);
    match operation {
        Operation::ViewReport { report_id } => report::view_report(ctx, report_id).map(OperationOutput::Page),
        Operation::ViewPublicReport { report_id } => match report::view_public_report(ctx, report_id) {
            Ok(page) => Ok(OperationOutput::Page(page)),
            Err(ReportError::PublicAccessDenied(message)) => {
                Ok(OperationOutput::Page(report::error_notice(&format!("NOTICE: {}", message))))
            }
            Err(e) => Err(e),
        },
        Operation::ExportReport { report_id, settings } => {
            report::render(ctx, report_id, &settings).map(OperationOutput::Document)
        }
        Operation::BaselineExport { report_id, settings, params } => {
            let exporter = services
                .exporter
                .ok_or_else(|| ReportError::InvalidConfig("No baseline exporter configured".into()))?;
            baseline::export_report(ctx, exporter, services.events, report_id, &settings, &params)
                .map(OperationOutput::Dialog)
        }
        Operation::ApiExport(request) => Ok(OperationOutput::Api(api::export_via_api(ctx, &request))),
        Operation::SaveConfig { report_id, request } => Ok(admin(
            services.events,
            "save",
            report_id,
            services.settings.save(report_id, &request, ctx.user, services.events),
        )),
        Operation::CopyConfig { from, to } => {
            Ok(admin(services.events, "copy", from, services.settings.copy(from, to, services.events)))
        }
        Operation::DeleteConfig { report_id } => {
            Ok(admin(services.events, "delete", report_id, services.settings.delete(report_id, services.events)))
        }
    }
}

fn admin(events: &dyn EventLog, action: &str, report_id: u32, result: ReportResult<bool>) -> OperationOutput {
    match result {
        Ok(changed) => OperationOutput::Admin { changed },
        Err(e) => {
            warn!("Report {} {} failed: {}", report_id, action, e);
            events.log_event(LOG_DESCRIPTION, &format!("Report {} failed: {}", action, e));
            OperationOutput::Admin { changed: false }
        }
    }
}
