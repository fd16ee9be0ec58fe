/// Reshape engine
///
/// Pivots normalized (record, event, instance) report data into one row per record.
///
/// This module handles:
/// - Deriving logical column headers from the report's fields, filter events and the event layout
/// - Counting instances of repeating forms and events
/// - Resolving each cell, reducing repeating values per the instance layout
/// - Field-level access redaction
use crate::formatter::ValueFormatter;
use crate::host::RequestContext;
use crate::metadata::{EventMeta, FieldKind, FieldMeta, compare_events};
use crate::sort::compare_values;
use crate::types::{
    Cell, CellValue, ColumnHeader, DAG_FIELD, EventId, InstanceValues, NormalizedReportData, OutputFormat,
    RawValue, RecordData, ReportConfig, ReportDefinition, ReportTable, ReshapeEvent, ReshapeInstance, ReshapedRow,
};
use indexmap::IndexMap;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;

const DAG_TITLE: &str = "Data Access Group";

/// One (event, field) pairing before it becomes a header
struct ColumnSlot<'p> {
    event: &'p EventMeta,
    field_order: usize,
    field_name: &'p str,
    field: &'p FieldMeta,
}

pub struct Reshaper<'a> {
    ctx: &'a RequestContext<'a>,
    definition: &'a ReportDefinition,
    config: &'a ReportConfig,
    formatter: &'a ValueFormatter<'a>,
    format: OutputFormat,
}

impl<'a> Reshaper<'a> {
    pub fn new(
        ctx: &'a RequestContext<'a>,
        definition: &'a ReportDefinition,
        config: &'a ReportConfig,
        formatter: &'a ValueFormatter<'a>,
        format: OutputFormat,
    ) -> Self {
        Self { ctx, definition, config, formatter, format }
    }

    pub fn reshape(&self, data: &NormalizedReportData) -> ReportTable {
        let headers = self.headers(data);
        let rows = self.rows(data, &headers);
        let layout = self.config.reshape_instance;
        let has_split_columns = headers.iter().any(|h| {
            !h.subvalues.is_empty() || (layout == ReshapeInstance::Columns && h.is_repeating() && h.instance_count > 0)
        });
        debug!("Reshaped {} records into {} logical columns", rows.len(), headers.len());
        ReportTable { headers, rows, instance_layout: layout, has_split_columns, is_sql: false }
    }

    /// Logical column headers in output order
    pub fn headers(&self, data: &NormalizedReportData) -> Vec<ColumnHeader> {
        let project = self.ctx.project;
        let filter: HashSet<EventId> = self.definition.filter_events.iter().copied().collect();

        let mut slots: Vec<ColumnSlot> = Vec::new();
        for event in project.events_ordered() {
            if !filter.is_empty() && !filter.contains(&event.event_id) {
                continue;
            }
            for name in &self.definition.fields {
                let Some(field) = project.field(name) else {
                    debug!("Report field {} is not in the project", name);
                    continue;
                };
                let designated = !project.longitudinal || event.forms.iter().any(|f| *f == field.form_name);
                if designated {
                    let field_order = project.field_order(name).unwrap_or(usize::MAX);
                    slots.push(ColumnSlot { event, field_order, field_name: name, field });
                }
            }
        }

        match self.config.reshape_event {
            ReshapeEvent::EventThenField => slots.sort_by(|a, b| {
                compare_events(a.event, b.event).then(a.field_order.cmp(&b.field_order))
            }),
            ReshapeEvent::FieldThenEvent => slots.sort_by(|a, b| {
                a.field_order.cmp(&b.field_order).then(compare_events(a.event, b.event))
            }),
            ReshapeEvent::None => slots.sort_by_key(|s| s.field_order),
        }

        // the record id appears once even when its form is designated to several events
        let mut seen_pk = false;
        slots.retain(|s| {
            if s.field_name != project.table_pk {
                return true;
            }
            let keep = !seen_pk;
            seen_pk = true;
            keep
        });

        let mut headers: Vec<ColumnHeader> = slots.iter().map(|s| self.header_for(s, data)).collect();

        if self.definition.output_dags {
            let position = data
                .records
                .values()
                .next()
                .and_then(|r| r.events.values().next())
                .and_then(|fields| fields.get_index_of(DAG_FIELD));
            if let Some(position) = position {
                let dag = self.dag_header();
                headers.insert(position.min(headers.len()), dag);
            }
        }
        headers
    }

    fn header_for(&self, slot: &ColumnSlot, data: &NormalizedReportData) -> ColumnHeader {
        let project = self.ctx.project;
        let event_id = slot.event.event_id;
        let is_pk = slot.field_name == project.table_pk;
        let is_repeating_event = !is_pk && project.is_repeating_event(event_id);
        let is_repeating_form =
            !is_pk && !is_repeating_event && project.is_repeating_form(event_id, &slot.field.form_name);

        let instance_count = if is_repeating_event || is_repeating_form {
            let key = if is_repeating_form { slot.field.form_name.as_str() } else { "" };
            max_instance(data, event_id, key)
        } else {
            0
        };

        let mut label = slot.field.element_label.clone();
        if slot.field_name == format!("{}_complete", slot.field.form_name) {
            if let Some(menu) = project.form_menu(&slot.field.form_name) {
                label = format!("{} {}", menu, label);
            }
        }

        let subvalues = if slot.field.element_type == FieldKind::Checkbox && !self.formatter.combines_checkboxes() {
            slot.field.choices().into_iter().map(|(code, _)| code).collect()
        } else {
            Vec::new()
        };

        let rights = self.ctx.user.rights_for(&slot.field.form_name);
        ColumnHeader {
            field_name: slot.field_name.to_string(),
            label: Some(label),
            kind: Some(slot.field.element_type),
            form_name: slot.field.form_name.clone(),
            event_id: Some(event_id),
            event_unique_name: slot.event.unique_name.clone(),
            event_label: slot.event.descrip.clone(),
            arm_name: slot.event.arm_name.clone(),
            is_repeating_event,
            is_repeating_form,
            instance_count,
            subvalues,
            view_rights: rights.view,
            export_rights: rights.export,
        }
    }

    fn dag_header(&self) -> ColumnHeader {
        let project = self.ctx.project;
        let first = project.first_event_id().and_then(|id| project.event(id));
        ColumnHeader {
            field_name: DAG_FIELD.to_string(),
            label: Some(DAG_TITLE.to_string()),
            event_id: first.map(|e| e.event_id),
            event_unique_name: first.map(|e| e.unique_name.clone()).unwrap_or_default(),
            event_label: first.map(|e| e.descrip.clone()).unwrap_or_default(),
            arm_name: first.map(|e| e.arm_name.clone()).unwrap_or_default(),
            view_rights: 1,
            export_rights: 1,
            ..Default::default()
        }
    }

    /// One row per non-empty record id, in input order
    pub fn rows(&self, data: &NormalizedReportData, headers: &[ColumnHeader]) -> Vec<ReshapedRow> {
        data.records
            .iter()
            .filter(|(record_id, _)| !record_id.is_empty())
            .map(|(record_id, record)| ReshapedRow {
                record: Some(record_id.clone()),
                cells: headers.iter().map(|h| self.cell(record_id, record, h)).collect(),
            })
            .collect()
    }

    fn cell(&self, record_id: &str, record: &RecordData, header: &ColumnHeader) -> Cell {
        if header.field_name == self.ctx.project.table_pk {
            return Cell::Single(CellValue::text(record_id));
        }
        if header.field_name == DAG_FIELD {
            return Cell::Single(dag_value(record, header.event_id));
        }

        let layout = self.config.reshape_instance;
        let columns = layout == ReshapeInstance::Columns && header.is_repeating();
        if self.is_redacted(header) {
            return if columns {
                Cell::Instances(vec![CellValue::Redacted; header.instance_count as usize])
            } else {
                Cell::Single(CellValue::Redacted)
            };
        }

        let Some(event_id) = header.event_id else {
            return Cell::Single(CellValue::Raw(self.placeholder(header)));
        };

        if !header.is_repeating() {
            let value = record.events.get(&event_id).and_then(|fields| fields.get(&header.field_name)).cloned();
            return Cell::Single(CellValue::Raw(value.unwrap_or_else(|| self.placeholder(header))));
        }

        let key = if header.is_repeating_form { header.form_name.as_str() } else { "" };
        let empty = InstanceValues::new();
        let instances = record.repeat_instances.get(&event_id).and_then(|forms| forms.get(key)).unwrap_or(&empty);
        self.reduce_instances(instances, header)
    }

    /// `first` and `last` pick the lowest and highest instance that carries the field, not the lowest and highest
    /// instance key; instances saved without the field are skipped.
    fn reduce_instances(&self, instances: &InstanceValues, header: &ColumnHeader) -> Cell {
        let field = header.field_name.as_str();
        let present = move || instances.values().filter_map(move |fields| fields.get(field));

        match self.config.reshape_instance {
            ReshapeInstance::None => Cell::Single(CellValue::text("")),
            ReshapeInstance::Columns => Cell::Instances(
                (1..=header.instance_count)
                    .map(|i| {
                        let value = instances.get(&i).and_then(|fields| fields.get(field)).cloned();
                        CellValue::Raw(value.unwrap_or_else(|| self.placeholder(header)))
                    })
                    .collect(),
            ),
            ReshapeInstance::First => {
                Cell::Single(CellValue::Raw(present().next().cloned().unwrap_or_else(RawValue::empty)))
            }
            ReshapeInstance::Last => {
                Cell::Single(CellValue::Raw(present().last().cloned().unwrap_or_else(RawValue::empty)))
            }
            ReshapeInstance::Min | ReshapeInstance::Max => {
                if header.kind == Some(FieldKind::Checkbox) {
                    return Cell::Single(CellValue::text(""));
                }
                let want = if self.config.reshape_instance == ReshapeInstance::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let best = present()
                    .filter_map(|v| v.as_text())
                    .filter(|v| !v.trim().is_empty())
                    .fold(None::<&str>, |best, v| match best {
                        Some(b) if compare_instance_values(v, b) != want => Some(b),
                        _ => Some(v),
                    });
                Cell::Single(CellValue::text(best.unwrap_or("")))
            }
            ReshapeInstance::ConcatSpace | ReshapeInstance::ConcatComma | ReshapeInstance::ConcatPipe => {
                let separator = self.config.reshape_instance.separator().unwrap_or(",");
                let joined = present()
                    .map(|v| self.formatter.format_joined(&CellValue::Raw(v.clone()), field, self.format))
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(separator);
                Cell::Single(CellValue::Formatted(joined))
            }
        }
    }

    fn is_redacted(&self, header: &ColumnHeader) -> bool {
        let right = if self.format == OutputFormat::Html { header.view_rights } else { header.export_rights };
        right == 0
    }

    fn placeholder(&self, header: &ColumnHeader) -> RawValue {
        if header.subvalues.is_empty() {
            RawValue::empty()
        } else {
            RawValue::Checkbox(header.subvalues.iter().map(|code| (code.clone(), String::new())).collect::<IndexMap<_, _>>())
        }
    }
}

/// Highest instance number stored for an event's repeating form (or "" for a repeating event)
pub fn max_instance(data: &NormalizedReportData, event_id: EventId, key: &str) -> u32 {
    data.records
        .values()
        .filter_map(|r| r.repeat_instances.get(&event_id))
        .filter_map(|forms| forms.get(key))
        .filter_map(|instances| instances.keys().next_back().copied())
        .max()
        .unwrap_or(0)
}

// Float comparison when both values are numeric, string comparison otherwise
fn compare_instance_values(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(fa), Ok(fb)) => fa.total_cmp(&fb),
        _ => compare_values(a, b),
    }
}

fn dag_value(record: &RecordData, event_id: Option<EventId>) -> CellValue {
    let on_event = event_id.and_then(|id| record.events.get(&id)).and_then(|fields| fields.get(DAG_FIELD));
    let value = on_event.or_else(|| record.events.values().find_map(|fields| fields.get(DAG_FIELD)));
    CellValue::Raw(value.cloned().unwrap_or_else(RawValue::empty))
}

#[cfg(test)]
#[path = "reshape_test.rs"]
mod reshape_test;
