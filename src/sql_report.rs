/// SQL report runner
///
/// This module handles:
/// - Rejecting anything that is not a SELECT before it reaches the database
/// - Building column headers from result column names (`name$label` convention)
/// - Data access group filtering of record-bearing results
use crate::error::{ReportError, ReportResult};
use crate::host::RequestContext;
use crate::metadata::ProjectMetadata;
use crate::types::{Cell, CellValue, ColumnHeader, ReportConfig, ReportTable, ReshapeInstance, ReshapedRow};
use lazy_static::lazy_static;
use log::{debug, warn};
use regex::Regex;

lazy_static! {
    static ref SELECT_STATEMENT: Regex = Regex::new(r"(?i)^select\s").unwrap();
}

/// Result of running a SQL report: a table, or the driver's error message
#[derive(Debug, Clone, PartialEq)]
pub enum SqlOutcome {
    Completed(ReportTable),
    Failed(String),
}

/// Trim and drop trailing semicolons
pub fn prepare_sql(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim_end().to_string()
}

pub fn validate_select(sql: &str) -> ReportResult<()> {
    if SELECT_STATEMENT.is_match(sql) {
        Ok(())
    } else {
        Err(ReportError::InvalidQuery(sql.chars().take(80).collect()))
    }
}

/// Run the report's query. Driver errors come back as `SqlOutcome::Failed`; only a non-SELECT is an `Err`.
pub fn run(ctx: &RequestContext, config: &ReportConfig) -> ReportResult<SqlOutcome> {
    let sql = ctx.sql.pipe_special_tags(&prepare_sql(&config.sql_query));
    let sql = prepare_sql(&sql);
    validate_select(&sql)?;

    let result = match ctx.sql.query(&sql) {
        Ok(result) => result,
        Err(e) => {
            warn!("SQL report query failed: {}", e);
            return Ok(SqlOutcome::Failed(e));
        }
    };

    let headers: Vec<ColumnHeader> = result.columns.iter().map(|c| column_header(ctx.project, c)).collect();
    let pk_index = headers.iter().position(|h| h.field_name == ctx.project.table_pk);

    let allowed = match (pk_index, &ctx.user.group_id, config.sql_disable_dag_filter) {
        (Some(_), Some(group_id), false) => match ctx.sql.dag_records(group_id) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("DAG membership lookup failed: {}", e);
                return Ok(SqlOutcome::Failed(e));
            }
        },
        _ => None,
    };

    let total = result.rows.len();
    let rows: Vec<ReshapedRow> = result
        .rows
        .into_iter()
        .filter_map(|row| {
            let record = pk_index.and_then(|i| row.get(i).cloned().flatten());
            if let Some(allowed) = &allowed {
                if !record.as_ref().is_some_and(|r| allowed.contains(r)) {
                    return None;
                }
            }
            let cells = (0..headers.len())
                .map(|i| Cell::Single(CellValue::text(row.get(i).cloned().flatten().unwrap_or_default())))
                .collect();
            Some(ReshapedRow { record, cells })
        })
        .collect();

    if allowed.is_some() {
        debug!("DAG filter kept {} of {} rows", rows.len(), total);
    }

    Ok(SqlOutcome::Completed(ReportTable {
        headers,
        rows,
        instance_layout: ReshapeInstance::None,
        has_split_columns: false,
        is_sql: true,
    }))
}

/// Header for one result column. `name$label` carries an explicit label; otherwise a project field's label is
/// used, and any other column has no label.
pub fn column_header(project: &ProjectMetadata, column: &str) -> ColumnHeader {
    let (name, explicit) = match column.split_once('$') {
        Some((name, label)) => (name, Some(label.to_string())),
        None => (column, None),
    };
    let field = project.field(name);
    ColumnHeader {
        field_name: name.to_string(),
        label: explicit.or_else(|| field.map(|f| f.element_label.clone())),
        kind: field.map(|f| f.element_type),
        form_name: field.map(|f| f.form_name.clone()).unwrap_or_default(),
        view_rights: 1,
        export_rights: 1,
        ..Default::default()
    }
}
