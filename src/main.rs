// Copyright 2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

use extended_reports::api::{ApiRequest, ApiResponse};
use extended_reports::baseline::{self, HttpBaselineExporter};
use extended_reports::cli::{CliArgs, Command};
use extended_reports::config::resolve_render_settings;
use extended_reports::console_format::{self, TableWriter};
use extended_reports::event_log::FileEventLog;
use extended_reports::fixture::{FixtureHost, ProjectFixture};
use extended_reports::host::{BaselineExporter, EventLog};
use extended_reports::settings_store::{SaveRequest, SettingsStore};
use extended_reports::{Operation, OperationOutput, Services, dispatch, report, ui};
use std::fs;
use std::io;
use std::time::Duration;

fn main() {
    env_logger::init();

    let args = CliArgs::parse_args();

    if let Err(e) = args.validate() {
        ui::print_error(&e);
        std::process::exit(1);
    }

    let fixture = match ProjectFixture::load(&args.project) {
        Ok(f) => f,
        Err(e) => {
            ui::print_error(&format!("Configuration error: {}", e));
            std::process::exit(1);
        }
    };
    let project_id = fixture.project.project_id;

    let settings_store = SettingsStore::new(args.get_settings_path());
    let mut host = FixtureHost::new(fixture).with_settings(settings_store.clone());
    if let Command::BaselineExport { documents_dir: Some(dir), .. } = &args.command {
        host = host.with_documents_dir(dir.clone());
    }

    let file_log = args.event_log.as_ref().map(FileEventLog::new);
    let events: &dyn EventLog = match &file_log {
        Some(log) => log,
        None => &host,
    };

    if let Err(e) = run(&args, &host, &settings_store, events, project_id) {
        ui::print_error(&e);
        std::process::exit(1);
    }
}

fn run(
    args: &CliArgs,
    host: &FixtureHost,
    settings_store: &SettingsStore,
    events: &dyn EventLog,
    project_id: u32,
) -> Result<(), String> {
    let ctx = host.context();

    // Commands that are not host operations
    match &args.command {
        Command::Preview { report_id } => {
            let (titles, rows) = report::label_rows(&ctx, *report_id).map_err(|e| e.to_string())?;
            let width = console_format::get_terminal_width(args.console_width);
            let mut writer = TableWriter::new(io::stdout().lock(), true);
            return writer.write_table(&titles, &rows, width).map_err(|e| e.to_string());
        }
        Command::Sql { report_id, delimiter, decimal } => {
            let settings = resolve_render_settings("csv", delimiter.as_deref(), decimal.as_deref())?;
            let doc = report::run_sql_report(&ctx, *report_id, &settings).map_err(|e| e.to_string())?;
            println!("{}", doc.content);
            ui::status(&format!("{} row(s)", doc.row_count));
            return Ok(());
        }
        _ => {}
    }

    let exporter = match &args.command {
        Command::BaselineExport { url, cookies, timeout_secs, .. } => {
            let cookies = cookies
                .iter()
                .filter_map(|c| c.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
                .collect();
            Some(HttpBaselineExporter::new(url, project_id, cookies, Duration::from_secs(*timeout_secs)))
        }
        _ => None,
    };
    let services = Services {
        settings: settings_store,
        events,
        exporter: exporter.as_ref().map(|e| e as &dyn BaselineExporter),
    };

    let operation = build_operation(&args.command)?;
    let output = dispatch(&ctx, &services, operation).map_err(|e| e.to_string())?;

    match output {
        OperationOutput::Page(page) => println!("{}", page),
        OperationOutput::Document(doc) => match &args.command {
            Command::Export { output: Some(path), .. } => {
                fs::write(path, &doc.content).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
                ui::status(&format!("Wrote {} row(s) to {}", doc.row_count, path.display()));
            }
            _ => println!("{}", doc.content),
        },
        OperationOutput::Dialog(dialog) => {
            let json = serde_json::to_string_pretty(&dialog).map_err(|e| e.to_string())?;
            println!("{}", json);
            if dialog.content.starts_with(baseline::FAILURE_NOTICE) {
                ui::print_warning("The extended file could not be produced; the dialog links the unmodified file");
            }
        }
        OperationOutput::Api(ApiResponse::Body { content, .. }) => println!("{}", content),
        OperationOutput::Api(ApiResponse::NotHandled) => {
            ui::status("Not an extended report export; the host handles this request");
        }
        OperationOutput::Admin { changed } => {
            ui::status(if changed { "Settings updated" } else { "No settings changed" });
        }
    }
    Ok(())
}

fn build_operation(command: &Command) -> Result<Operation, String> {
    let operation = match command {
        Command::View { report_id } => Operation::ViewReport { report_id: *report_id },
        Command::ViewPublic { report_id } => Operation::ViewPublicReport { report_id: *report_id },
        Command::Export { report_id, format, delimiter, decimal, .. } => Operation::ExportReport {
            report_id: *report_id,
            settings: resolve_render_settings(format, delimiter.as_deref(), decimal.as_deref())?,
        },
        Command::ApiExport { report_id, format, return_format, delimiter, decimal } => {
            Operation::ApiExport(ApiRequest {
                report_id: *report_id,
                format: Some(format.clone()),
                return_format: return_format.clone(),
                csv_delimiter: delimiter.clone(),
                decimal_character: decimal.clone(),
            })
        }
        Command::BaselineExport { report_id, format, csrf_token, delimiter, decimal, .. } => {
            let settings = resolve_render_settings(format, delimiter.as_deref(), decimal.as_deref())?;
            let params = baseline::export_params(*report_id, &settings, csrf_token.as_deref());
            Operation::BaselineExport { report_id: *report_id, settings, params }
        }
        Command::SaveConfig { report_id, sql, disable_dag_filter, reshape_event, reshape_instance } => {
            Operation::SaveConfig {
                report_id: *report_id,
                request: SaveRequest {
                    sql: sql.clone(),
                    disable_dag_filter: *disable_dag_filter,
                    reshape_event: reshape_event.clone(),
                    reshape_instance: reshape_instance.clone(),
                },
            }
        }
        Command::CopyConfig { from, to } => Operation::CopyConfig { from: *from, to: *to },
        Command::DeleteConfig { report_id } => Operation::DeleteConfig { report_id: *report_id },
        Command::Preview { .. } | Command::Sql { .. } => {
            return Err("Command is not a host operation".to_string());
        }
    };
    Ok(operation)
}
