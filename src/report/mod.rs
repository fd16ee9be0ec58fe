//! Report rendering pipeline.
//!
//! This module handles:
//! - Loading a report's definition and extension settings
//! - Running SQL reports or reshaping normalized data into a table
//! - Formatting every cell once and assembling HTML, CSV, JSON or XML
//! - The report page wrapper and the public report guard
//!
//! # Module Organization
//!
//! - `headers` - HTML header rows, export titles and label truncation
//! - `html` - table assembly and the report page
//! - `export` - delimited, JSON and XML serialization

mod export;
mod headers;
mod html;

pub use export::{csv_content, json_content, xml_content, xml_name};
pub use headers::{DEFAULT_LABEL_MAX, TitleOptions, export_titles, html_header, truncate_label};
pub use html::{empty_table, error_notice, html_table, report_page};

use crate::config::{RenderSettings, combine_checkboxes, resolve_report_config};
use crate::error::{ReportError, ReportResult};
use crate::formatter::ValueFormatter;
use crate::host::RequestContext;
use crate::metadata::ProjectMetadata;
use crate::reshape::Reshaper;
use crate::sql_report::{self, SqlOutcome};
use crate::types::{Cell, OutputDocument, OutputFormat, ReportConfig, ReportDefinition, ReportTable};
use log::{debug, info, warn};

/// A report ready for assembly, or the message of a SQL report that produced no table
enum Prepared<'a> {
    Failed(String),
    Ready { table: ReportTable, formatter: ValueFormatter<'a>, definition: ReportDefinition, config: ReportConfig },
}

fn prepare<'a>(ctx: &'a RequestContext<'a>, report_id: u32, settings: &RenderSettings) -> ReportResult<Prepared<'a>> {
    let (definition, config) = load(ctx, report_id)?;
    let combine = combine_checkboxes(&definition, &config);
    let format = settings.format;

    if config.is_sql {
        let table = match sql_report::run(ctx, &config) {
            Ok(SqlOutcome::Completed(table)) => table,
            Ok(SqlOutcome::Failed(message)) => return Ok(Prepared::Failed(message)),
            Err(e @ ReportError::InvalidQuery(_)) => {
                warn!("Report {}: {}", report_id, e);
                return Ok(Prepared::Failed(e.to_string()));
            }
            Err(e) => return Err(e),
        };
        let records: Vec<String> = table.rows.iter().filter_map(|r| r.record.clone()).collect();
        let labels = if format == OutputFormat::Html { ctx.data.record_labels(&records) } else { Default::default() };
        let formatter = ValueFormatter::new(ctx, definition.display_data, combine, settings.encoder(), labels);
        return Ok(Prepared::Ready { table, formatter, definition, config });
    }

    let data = ctx.data.normalized_data(&definition).map_err(ReportError::DataSource)?;
    let records: Vec<String> = data.records.keys().filter(|k| !k.is_empty()).cloned().collect();
    let labels = if format == OutputFormat::Html { ctx.data.record_labels(&records) } else { Default::default() };
    let formatter = ValueFormatter::new(ctx, definition.display_data, combine, settings.encoder(), labels);
    let table = Reshaper::new(ctx, &definition, &config, &formatter, format).reshape(&data);
    debug!("Report {} reshaped into {} columns, {} rows", report_id, table.headers.len(), table.rows.len());
    Ok(Prepared::Ready { table, formatter, definition, config })
}

/// Render an extended report in the requested format
///
/// Fails with `ReportNotFound` for an unknown id and `NotExtended` when the report has no active extension
/// settings. A SQL report whose query is rejected or fails still produces a document: the message, and no rows.
pub fn render(ctx: &RequestContext, report_id: u32, settings: &RenderSettings) -> ReportResult<OutputDocument> {
    match prepare(ctx, report_id, settings)? {
        Prepared::Failed(message) => Ok(degraded(&message, settings.format)),
        Prepared::Ready { table, formatter, definition, config } => {
            assemble(ctx.project, &table, &formatter, &definition, &config, settings)
        }
    }
}

/// Export titles and formatted rows in label form, for console display
pub fn label_rows(ctx: &RequestContext, report_id: u32) -> ReportResult<(Vec<String>, Vec<Vec<String>>)> {
    let settings = RenderSettings::new(OutputFormat::CsvLabels);
    match prepare(ctx, report_id, &settings)? {
        Prepared::Failed(message) => Err(ReportError::QueryExecution(message)),
        Prepared::Ready { table, formatter, definition, config } => {
            let opts = TitleOptions {
                project: ctx.project,
                display_header: definition.display_header,
                reshape_event: config.reshape_event,
            };
            let titles = export_titles(&table, settings.format, &opts);
            Ok((titles, physical_rows(&table, &formatter, settings.format)))
        }
    }
}

/// Run a report that must be a SQL report
pub fn run_sql_report(ctx: &RequestContext, report_id: u32, settings: &RenderSettings) -> ReportResult<OutputDocument> {
    let (_, config) = load(ctx, report_id)?;
    if !config.is_sql {
        return Err(ReportError::InvalidConfig(format!("Report {} is not a SQL report", report_id)));
    }
    render(ctx, report_id, settings)
}

/// The HTML report page: count, title, description and table
pub fn view_report(ctx: &RequestContext, report_id: u32) -> ReportResult<String> {
    let definition = ctx.reports.report_definition(report_id).ok_or(ReportError::ReportNotFound(report_id))?;
    let document = render(ctx, report_id, &RenderSettings::new(OutputFormat::Html))?;
    info!("Viewed report {} ({} rows)", report_id, document.row_count);
    Ok(report_page(&definition, &document, false))
}

/// The public report page, refused when the guard fails
pub fn view_public_report(ctx: &RequestContext, report_id: u32) -> ReportResult<String> {
    let definition = ctx.reports.report_definition(report_id).ok_or(ReportError::ReportNotFound(report_id))?;
    check_public_access(ctx.project, &definition)?;
    let document = render(ctx, report_id, &RenderSettings::new(OutputFormat::Html))?;
    Ok(report_page(&definition, &document, true))
}

/// Refuse public rendering of reports that are not public or that would disclose identifiers
pub fn check_public_access(project: &ProjectMetadata, definition: &ReportDefinition) -> ReportResult<()> {
    if !definition.is_public {
        return Err(ReportError::PublicAccessDenied("This report is not public.".into()));
    }
    let is_phi = |name: &str| project.field(name).is_some_and(|f| f.is_phi);
    if let Some(field) = definition.fields.iter().find(|f| is_phi(f)) {
        debug!("Public report {} includes identifier {}", definition.report_id, field);
        return Err(ReportError::PublicAccessDenied(
            "This report contains identifier fields and cannot be viewed publicly.".into(),
        ));
    }
    if !definition.fields.iter().any(|f| *f == project.table_pk) {
        return Ok(());
    }
    if project.secondary_pk.as_deref().is_some_and(is_phi) {
        return Err(ReportError::PublicAccessDenied(
            "The secondary unique field is an identifier and the report includes the record id.".into(),
        ));
    }
    if project.custom_record_label_fields().iter().any(|f| is_phi(f)) {
        return Err(ReportError::PublicAccessDenied(
            "The custom record label contains identifier fields and the report includes the record id.".into(),
        ));
    }
    Ok(())
}

fn load(ctx: &RequestContext, report_id: u32) -> ReportResult<(ReportDefinition, ReportConfig)> {
    let definition = ctx.reports.report_definition(report_id).ok_or(ReportError::ReportNotFound(report_id))?;
    let config = resolve_report_config(ctx.reports.report_config(report_id), ctx.project)
        .ok_or(ReportError::NotExtended(report_id))?;
    Ok((definition, config))
}

fn degraded(message: &str, format: OutputFormat) -> OutputDocument {
    let content = match format {
        OutputFormat::Html => format!("{}{}", error_notice(message), empty_table()),
        _ => message.to_string(),
    };
    OutputDocument { content, row_count: 0 }
}

/// Formatted values of every row, one entry per physical column
pub fn physical_rows(table: &ReportTable, formatter: &ValueFormatter, format: OutputFormat) -> Vec<Vec<String>> {
    table
        .rows
        .iter()
        .map(|row| {
            table
                .headers
                .iter()
                .zip(&row.cells)
                .flat_map(|(header, cell)| match cell {
                    Cell::Single(value) => formatter.format(value, &header.field_name, format),
                    Cell::Instances(values) => {
                        values.iter().flat_map(|v| formatter.format(v, &header.field_name, format)).collect()
                    }
                })
                .collect()
        })
        .collect()
}

fn assemble(
    project: &ProjectMetadata,
    table: &ReportTable,
    formatter: &ValueFormatter,
    definition: &ReportDefinition,
    config: &ReportConfig,
    settings: &RenderSettings,
) -> ReportResult<OutputDocument> {
    let format = settings.format;
    let opts =
        TitleOptions { project, display_header: definition.display_header, reshape_event: config.reshape_event };
    let rows = physical_rows(table, formatter, format);
    let content = match format {
        OutputFormat::Html => html_table(table, &rows, &opts),
        OutputFormat::Csv | OutputFormat::CsvRaw | OutputFormat::CsvLabels => {
            csv_content(&export_titles(table, format, &opts), &rows, &settings.encoder())
        }
        OutputFormat::Json => json_content(&export_titles(table, format, &opts), &rows)?,
        OutputFormat::Xml => xml_content(&export_titles(table, format, &opts), &rows)?,
    };
    Ok(OutputDocument { content, row_count: table.rows.len() })
}
