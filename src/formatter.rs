/// Value formatter
///
/// Turns one stored value into its display form for an output format. Every assembly path (HTML, the three CSV
/// flavours, JSON, XML) goes through `ValueFormatter::format`, so cell data never diverges between formats.
///
/// Dispatch:
/// - Reserved pseudo-fields (record id, event name, repeat instrument/instance, DAG)
/// - Field kind: choice fields, checkboxes (combined or split), text, files
use crate::csv_encoder::CsvEncoder;
use crate::host::RequestContext;
use crate::html_filter::escape;
use crate::metadata::{FieldKind, FieldMeta};
use crate::types::{CellValue, DAG_FIELD, DisplayData, OutputFormat, REDACTED, RawValue};
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;

const CHECKED_HTML: &str = "Checked (1)";
const UNCHECKED_HTML: &str = "Unchecked (0)";
const CHECKED_LABEL: &str = "Checked";
const UNCHECKED_LABEL: &str = "Unchecked";

pub struct ValueFormatter<'a> {
    ctx: &'a RequestContext<'a>,
    display_data: DisplayData,
    combine_checkboxes: bool,
    encoder: CsvEncoder,
    record_labels: HashMap<String, String>,
    // choice lists of sql fields, resolved once per request
    sql_choices: RefCell<HashMap<String, Vec<(String, String)>>>,
}

impl<'a> ValueFormatter<'a> {
    pub fn new(
        ctx: &'a RequestContext<'a>,
        display_data: DisplayData,
        combine_checkboxes: bool,
        encoder: CsvEncoder,
        record_labels: HashMap<String, String>,
    ) -> Self {
        Self { ctx, display_data, combine_checkboxes, encoder, record_labels, sql_choices: RefCell::new(HashMap::new()) }
    }

    pub fn combines_checkboxes(&self) -> bool {
        self.combine_checkboxes
    }

    /// True when the field renders as one value per choice
    pub fn is_split_checkbox(&self, field_name: &str) -> bool {
        !self.combine_checkboxes
            && self.ctx.project.field(field_name).is_some_and(|f| f.element_type == FieldKind::Checkbox)
    }

    /// Render a value. The result has one entry, or one per choice for a split checkbox.
    pub fn format(&self, value: &CellValue, field_name: &str, format: OutputFormat) -> Vec<String> {
        match value {
            CellValue::Redacted => {
                let width = if self.is_split_checkbox(field_name) { self.choices(field_name).len().max(1) } else { 1 };
                vec![REDACTED.to_string(); width]
            }
            CellValue::Formatted(s) => vec![s.clone()],
            CellValue::Raw(raw) => self.format_raw(raw, field_name, format),
        }
    }

    /// Single-string rendering, joining split checkbox entries
    pub fn format_joined(&self, value: &CellValue, field_name: &str, format: OutputFormat) -> String {
        self.format(value, field_name, format).join(self.join_separator(format))
    }

    fn format_raw(&self, raw: &RawValue, field_name: &str, format: OutputFormat) -> Vec<String> {
        let project = self.ctx.project;
        if field_name == project.table_pk {
            return vec![self.record_display(&flatten(raw), format)];
        }
        match field_name {
            "redcap_event_name" | "redcap_repeat_instrument" | "redcap_repeat_instance" => return vec![flatten(raw)],
            DAG_FIELD => return vec![self.dag_display(&flatten(raw), format)],
            _ => {}
        }

        let Some(field) = project.field(field_name) else {
            // SQL aliases and other columns that are not project fields
            return vec![flatten(raw)];
        };

        match field.element_type {
            FieldKind::Checkbox if self.combine_checkboxes => vec![self.combined_checkbox(raw, field_name, format)],
            FieldKind::Checkbox => self.split_checkbox(raw, field_name, format),
            FieldKind::Radio
            | FieldKind::Select
            | FieldKind::YesNo
            | FieldKind::TrueFalse
            | FieldKind::AdvCheckbox
            | FieldKind::Sql => vec![self.single_choice(&flatten(raw), field_name, format)],
            FieldKind::Text | FieldKind::Notes | FieldKind::Calc | FieldKind::Slider => {
                vec![self.text_display(&flatten(raw), field, format)]
            }
            FieldKind::File => vec![self.file_display(&flatten(raw), format)],
            FieldKind::Descriptive => vec![String::new()],
        }
    }

    fn join_separator(&self, format: OutputFormat) -> &str {
        match format {
            OutputFormat::Html => "<br>",
            OutputFormat::Csv | OutputFormat::CsvRaw | OutputFormat::CsvLabels => &self.encoder.delimiter,
            OutputFormat::Json | OutputFormat::Xml => ",",
        }
    }

    fn choices(&self, field_name: &str) -> Vec<(String, String)> {
        let Some(field) = self.ctx.project.field(field_name) else {
            return Vec::new();
        };
        if field.element_type != FieldKind::Sql {
            return field.choices();
        }
        if let Some(cached) = self.sql_choices.borrow().get(field_name) {
            return cached.clone();
        }
        let resolved = self.resolve_sql_choices(field_name, field);
        self.sql_choices.borrow_mut().insert(field_name.to_string(), resolved.clone());
        resolved
    }

    fn resolve_sql_choices(&self, field_name: &str, field: &FieldMeta) -> Vec<(String, String)> {
        match self.ctx.sql.query(&field.element_enum) {
            Ok(result) => result
                .rows
                .into_iter()
                .filter_map(|row| {
                    let code = row.first().cloned().flatten()?;
                    let label = row.get(1).cloned().flatten().unwrap_or_else(|| code.clone());
                    Some((code, label))
                })
                .collect(),
            Err(e) => {
                debug!("Choice query for sql field {} failed: {}", field_name, e);
                Vec::new()
            }
        }
    }

    fn choice_html(&self, code: &str, choices: &[(String, String)]) -> String {
        match choices.iter().find(|(c, _)| c == code) {
            Some((_, label)) => match self.display_data {
                DisplayData::Label => escape(label),
                DisplayData::Raw => code.to_string(),
                DisplayData::Both => format!("{} <span class=\"text-muted\">({})</span>", escape(label), code),
            },
            None => code.to_string(),
        }
    }

    fn single_choice(&self, value: &str, field_name: &str, format: OutputFormat) -> String {
        if value.trim().is_empty() {
            return String::new();
        }
        match format {
            OutputFormat::Html => self.choice_html(value, &self.choices(field_name)),
            OutputFormat::CsvLabels => self
                .choices(field_name)
                .into_iter()
                .find(|(c, _)| c == value)
                .map(|(_, label)| label)
                .unwrap_or_else(|| value.to_string()),
            _ => value.to_string(),
        }
    }

    fn combined_checkbox(&self, raw: &RawValue, field_name: &str, format: OutputFormat) -> String {
        let selected: Vec<String> = match raw {
            RawValue::Checkbox(map) => map.iter().filter(|(_, v)| v.as_str() == "1").map(|(k, _)| k.clone()).collect(),
            RawValue::Text(s) if s.trim().is_empty() => return String::new(),
            RawValue::Text(s) => s.split(',').map(|c| c.trim().to_string()).filter(|c| !c.is_empty()).collect(),
        };
        let choices = self.choices(field_name);
        let rendered: Vec<String> = selected
            .iter()
            .map(|code| match format {
                OutputFormat::Html => self.choice_html(code, &choices),
                OutputFormat::CsvLabels => choices
                    .iter()
                    .find(|(c, _)| c == code)
                    .map(|(_, label)| label.clone())
                    .unwrap_or_else(|| code.clone()),
                _ => code.clone(),
            })
            .collect();
        rendered.join(self.join_separator(format))
    }

    fn split_checkbox(&self, raw: &RawValue, field_name: &str, format: OutputFormat) -> Vec<String> {
        let (checked, unchecked) = match format {
            OutputFormat::Html => (CHECKED_HTML, UNCHECKED_HTML),
            OutputFormat::CsvLabels => (CHECKED_LABEL, UNCHECKED_LABEL),
            _ => ("1", "0"),
        };
        let choices = self.choices(field_name);
        choices
            .iter()
            .map(|(code, _)| {
                let state = match raw {
                    RawValue::Checkbox(map) => map.get(code).map(|v| v.as_str()).unwrap_or(""),
                    RawValue::Text(s) if s.trim().is_empty() => "",
                    RawValue::Text(s) => {
                        if s.split(',').any(|c| c.trim() == code) {
                            "1"
                        } else {
                            "0"
                        }
                    }
                };
                match state {
                    "1" => checked.to_string(),
                    "0" => unchecked.to_string(),
                    _ => String::new(),
                }
            })
            .collect()
    }

    fn text_display(&self, value: &str, field: &FieldMeta, format: OutputFormat) -> String {
        if value.trim().is_empty() {
            return String::new();
        }
        if let Some((service, category)) = field.ontology() {
            return self.ontology_display(value, service, category, format);
        }
        let validation = field.validation_type.as_deref().unwrap_or("");
        match validation {
            "date_mdy" | "date_dmy" | "datetime_mdy" | "datetime_dmy" | "datetime_seconds_mdy"
            | "datetime_seconds_dmy" => convert_ymd(value, &validation[validation.len() - 3..]),
            "email" if format == OutputFormat::Html => {
                let v = escape(value);
                format!("<a href='mailto:{}'>{}</a>", v, v)
            }
            v if v.starts_with("number") => value.replace('.', &self.encoder.decimal),
            _ => value.to_string(),
        }
    }

    fn ontology_display(&self, code: &str, service: &str, category: &str, format: OutputFormat) -> String {
        let label = self.ctx.ontology.label(service, category, code).filter(|l| !l.is_empty());
        match (label, format) {
            (Some(label), OutputFormat::Html) => {
                format!("{} <span class=\"text-muted\">({})</span>", escape(&label), escape(code))
            }
            (Some(label), OutputFormat::CsvLabels) => label,
            _ => code.to_string(),
        }
    }

    fn file_display(&self, value: &str, format: OutputFormat) -> String {
        if format != OutputFormat::Html || value.trim().is_empty() {
            return value.to_string();
        }
        let name = value.trim().parse::<u64>().ok().and_then(|id| self.ctx.documents.document_name(id));
        match name {
            Some(name) => format!(
                "<a target='_blank' href='{}DataEntry/file_download.php?pid={}&id={}'>{}</a>",
                self.ctx.project.webroot,
                self.ctx.project.project_id,
                escape(value.trim()),
                escape(&name)
            ),
            None => escape(value),
        }
    }

    fn dag_display(&self, value: &str, format: OutputFormat) -> String {
        if value.trim().is_empty() {
            return String::new();
        }
        let label = self.ctx.project.dag_label(value).unwrap_or(value);
        match format {
            OutputFormat::Html if self.display_data == DisplayData::Raw => value.to_string(),
            OutputFormat::Html => escape(label),
            OutputFormat::CsvLabels => label.to_string(),
            _ => value.to_string(),
        }
    }

    fn record_display(&self, record: &str, format: OutputFormat) -> String {
        if format != OutputFormat::Html {
            return record.to_string();
        }
        let record_label = self.record_labels.get(record).map(|s| s.as_str()).unwrap_or("");
        let escaped = escape(record);
        let link = format!(
            "<a class='mr-1' target='_blank' href='{}DataEntry/record_home.php?pid={}&id={}'>{}</a> {}",
            self.ctx.project.webroot, self.ctx.project.project_id, escaped, escaped, record_label
        );
        link.trim().to_string()
    }
}

/// Text of a raw value; a checkbox map collapses to its selected codes
fn flatten(raw: &RawValue) -> String {
    match raw {
        RawValue::Text(s) => s.clone(),
        RawValue::Checkbox(map) => {
            map.iter().filter(|(_, v)| v.as_str() == "1").map(|(k, _)| k.as_str()).collect::<Vec<_>>().join(",")
        }
    }
}

/// Reorder a stored Y-M-D date or datetime into M-D-Y or D-M-Y
pub fn convert_ymd(value: &str, order: &str) -> String {
    let value = value.trim();
    let (date_part, time_part) = match value.split_once(' ') {
        Some((d, t)) => (d, Some(t)),
        None => (value, None),
    };
    let pattern = match order {
        "mdy" => "%m-%d-%Y",
        "dmy" => "%d-%m-%Y",
        _ => return value.to_string(),
    };
    match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        Ok(date) => {
            let date = date.format(pattern).to_string();
            match time_part {
                Some(time) if valid_time(time) => format!("{} {}", date, time),
                Some(_) => value.to_string(),
                None => date,
            }
        }
        Err(_) => value.to_string(),
    }
}

fn valid_time(time: &str) -> bool {
    let stamp = format!("2000-01-01 {}", time);
    NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M").is_ok()
        || NaiveDateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S").is_ok()
}

#[cfg(test)]
#[path = "formatter_test.rs"]
mod formatter_test;
