/// Project metadata
///
/// This module handles:
/// - Field, form, event and DAG descriptions of a project
/// - Closed field-kind classification
/// - Choice list parsing
/// - The @REPORT-LABEL action tag
use crate::types::EventId;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

lazy_static! {
    static ref ONTOLOGY_ENUM: Regex = Regex::new(r"^\w+:\w+$").unwrap();
    static ref REPORT_LABEL_TAG: Regex =
        Regex::new(r#"@REPORT-LABEL\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
    static ref PIPED_FIELD: Regex = Regex::new(r"\[([A-Za-z0-9_]+)\]").unwrap();
}

/// Every element type a field can have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "textarea")]
    Notes,
    #[serde(rename = "calc")]
    Calc,
    #[serde(rename = "radio")]
    Radio,
    #[serde(rename = "select", alias = "dropdown")]
    Select,
    #[serde(rename = "yesno")]
    YesNo,
    #[serde(rename = "truefalse")]
    TrueFalse,
    #[serde(rename = "checkbox")]
    Checkbox,
    #[serde(rename = "advcheckbox")]
    AdvCheckbox,
    #[serde(rename = "sql")]
    Sql,
    #[serde(rename = "file")]
    File,
    #[serde(rename = "slider")]
    Slider,
    #[serde(rename = "descriptive")]
    Descriptive,
}

impl FieldKind {
    /// Fields whose stored value is a code from an enumerated choice list
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            FieldKind::Radio
                | FieldKind::Select
                | FieldKind::YesNo
                | FieldKind::TrueFalse
                | FieldKind::Checkbox
                | FieldKind::AdvCheckbox
                | FieldKind::Sql
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub form_name: String,
    pub element_type: FieldKind,
    #[serde(default)]
    pub element_label: String,
    #[serde(default)]
    pub element_enum: String,
    #[serde(default)]
    pub validation_type: Option<String>,
    #[serde(default)]
    pub misc: String,
    #[serde(default)]
    pub is_phi: bool,
}

impl FieldMeta {
    /// Parsed choice list for fields with a static enum
    pub fn choices(&self) -> Vec<(String, String)> {
        match self.element_type {
            FieldKind::YesNo => vec![("1".into(), "Yes".into()), ("0".into(), "No".into())],
            FieldKind::TrueFalse => vec![("1".into(), "True".into()), ("0".into(), "False".into())],
            FieldKind::Sql => Vec::new(),
            _ => parse_enum(&self.element_enum),
        }
    }

    /// `(service, category)` when a text field is linked to an ontology
    pub fn ontology(&self) -> Option<(&str, &str)> {
        if self.element_type != FieldKind::Text {
            return None;
        }
        let spec = self.element_enum.trim();
        if !ONTOLOGY_ENUM.is_match(spec) {
            return None;
        }
        spec.split_once(':')
    }
}

/// Parse a "code, label" choice list. Entries are separated by newlines
/// (escaped or literal), or by `|` when the list is on one line.
pub fn parse_enum(element_enum: &str) -> Vec<(String, String)> {
    let normalized = element_enum.replace("\\n", "\n");
    let entries: Vec<&str> = if normalized.contains('\n') {
        normalized.split('\n').collect()
    } else {
        normalized.split('|').collect()
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            match entry.split_once(',') {
                Some((code, label)) => Some((code.trim().to_string(), label.trim().to_string())),
                None => Some((entry.to_string(), entry.to_string())),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMeta {
    pub event_id: EventId,
    #[serde(default = "default_arm")]
    pub arm_num: u32,
    #[serde(default)]
    pub arm_name: String,
    #[serde(default)]
    pub day_offset: f64,
    #[serde(default)]
    pub descrip: String,
    #[serde(default)]
    pub unique_name: String,
    #[serde(default)]
    pub forms: Vec<String>,
    #[serde(default)]
    pub is_repeating: bool,
    #[serde(default)]
    pub repeating_forms: Vec<String>,
}

fn default_arm() -> u32 {
    1
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormMeta {
    #[serde(default)]
    pub menu: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DagMeta {
    pub group_id: String,
    pub unique_name: String,
    pub label: String,
}

/// Everything the renderer needs to know about a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_id: u32,
    pub table_pk: String,
    #[serde(default)]
    pub longitudinal: bool,
    #[serde(default)]
    pub multiple_arms: bool,
    #[serde(default = "default_webroot")]
    pub webroot: String,
    pub events: Vec<EventMeta>,
    #[serde(default)]
    pub forms: IndexMap<String, FormMeta>,
    pub fields: IndexMap<String, FieldMeta>,
    #[serde(default)]
    pub dags: Vec<DagMeta>,
    #[serde(default)]
    pub secondary_pk: Option<String>,
    #[serde(default)]
    pub custom_record_label: Option<String>,
}

fn default_webroot() -> String {
    "/".to_string()
}

impl ProjectMetadata {
    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.get(name)
    }

    pub fn field_order(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    pub fn event(&self, event_id: EventId) -> Option<&EventMeta> {
        self.events.iter().find(|e| e.event_id == event_id)
    }

    /// Events sorted by arm, day offset and id
    pub fn events_ordered(&self) -> Vec<&EventMeta> {
        let mut events: Vec<&EventMeta> = self.events.iter().collect();
        events.sort_by(|a, b| compare_events(a, b));
        events
    }

    pub fn first_event_id(&self) -> Option<EventId> {
        self.events_ordered().first().map(|e| e.event_id)
    }

    pub fn is_repeating_event(&self, event_id: EventId) -> bool {
        self.event(event_id).is_some_and(|e| e.is_repeating)
    }

    pub fn is_repeating_form(&self, event_id: EventId, form: &str) -> bool {
        self.event(event_id).is_some_and(|e| e.repeating_forms.iter().any(|f| f == form))
    }

    pub fn has_repeating_forms_events(&self) -> bool {
        self.events.iter().any(|e| e.is_repeating || !e.repeating_forms.is_empty())
    }

    pub fn form_menu(&self, form: &str) -> Option<&str> {
        self.forms.get(form).map(|f| f.menu.as_str())
    }

    /// DAG label for a stored unique group name (or group id)
    pub fn dag_label(&self, value: &str) -> Option<&str> {
        self.dags
            .iter()
            .find(|d| d.unique_name == value || d.group_id == value)
            .map(|d| d.label.as_str())
    }

    /// Fields piped into the custom record label template
    pub fn custom_record_label_fields(&self) -> Vec<String> {
        match &self.custom_record_label {
            Some(template) => PIPED_FIELD.captures_iter(template).map(|c| c[1].to_string()).collect(),
            None => Vec::new(),
        }
    }

    /// Replace field labels with the text of their @REPORT-LABEL action tag
    pub fn apply_report_labels(&mut self) {
        for (name, field) in self.fields.iter_mut() {
            if let Some(label) = report_label_tag(&field.misc) {
                debug!("Field {} relabelled by action tag", name);
                field.element_label = label;
            }
        }
    }
}

fn report_label_tag(misc: &str) -> Option<String> {
    let caps = REPORT_LABEL_TAG.captures(misc)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str().to_string())
}

pub fn compare_events(a: &EventMeta, b: &EventMeta) -> Ordering {
    a.arm_num
        .cmp(&b.arm_num)
        .then(a.day_offset.total_cmp(&b.day_offset))
        .then(a.event_id.cmp(&b.event_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_enum_newlines_and_pipes() {
        let parsed = parse_enum("1, Yes\\n2, No, really");
        assert_eq!(parsed, vec![("1".into(), "Yes".into()), ("2".into(), "No, really".into())]);

        let piped = parse_enum("a, Apple | b, Banana");
        assert_eq!(piped[1], ("b".to_string(), "Banana".to_string()));
    }

    #[test]
    fn test_report_label_tag_both_quote_styles() {
        assert_eq!(report_label_tag(r#"@HIDDEN @REPORT-LABEL="Short""#), Some("Short".to_string()));
        assert_eq!(report_label_tag("@REPORT-LABEL='Other'"), Some("Other".to_string()));
        assert_eq!(report_label_tag("@HIDDEN"), None);
    }

    #[test]
    fn test_ontology_detection() {
        let field = FieldMeta {
            form_name: "f".into(),
            element_type: FieldKind::Text,
            element_label: "Drug".into(),
            element_enum: "RXNORM:DRUG".into(),
            validation_type: None,
            misc: String::new(),
            is_phi: false,
        };
        assert_eq!(field.ontology(), Some(("RXNORM", "DRUG")));
    }
}
