/// Core data structures for report rendering
///
/// This module contains:
/// - Extension settings (ReportConfig) and the host's report definition
/// - Normalized input data and the reshaped row/cell model
/// - Column headers shared by every output format
/// - The acting user's access context
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub type EventId = u32;

/// Redaction marker shown instead of data the user may not see
pub const REDACTED: &str = "-";

/// Reserved field carrying a record's data access group
pub const DAG_FIELD: &str = "redcap_data_access_group";

//
// Extension settings
//

/// Column ordering across events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReshapeEvent {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "ef")]
    EventThenField,
    #[serde(rename = "fe")]
    FieldThenEvent,
}

impl ReshapeEvent {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "" => Some(ReshapeEvent::None),
            "ef" => Some(ReshapeEvent::EventThenField),
            "fe" => Some(ReshapeEvent::FieldThenEvent),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ReshapeEvent::None => "",
            ReshapeEvent::EventThenField => "ef",
            ReshapeEvent::FieldThenEvent => "fe",
        }
    }
}

/// How the instances of a repeating form or event collapse into a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReshapeInstance {
    #[default]
    #[serde(rename = "")]
    None,
    #[serde(rename = "cols")]
    Columns,
    #[serde(rename = "conc_space")]
    ConcatSpace,
    #[serde(rename = "conc_comma")]
    ConcatComma,
    #[serde(rename = "conc_pipe")]
    ConcatPipe,
    #[serde(rename = "min")]
    Min,
    #[serde(rename = "max")]
    Max,
    #[serde(rename = "first")]
    First,
    #[serde(rename = "last")]
    Last,
}

impl ReshapeInstance {
    pub fn from_code(code: &str) -> Option<Self> {
        let mode = match code.trim() {
            "" => ReshapeInstance::None,
            "cols" => ReshapeInstance::Columns,
            "conc_space" => ReshapeInstance::ConcatSpace,
            "conc_comma" => ReshapeInstance::ConcatComma,
            "conc_pipe" => ReshapeInstance::ConcatPipe,
            "min" => ReshapeInstance::Min,
            "max" => ReshapeInstance::Max,
            "first" => ReshapeInstance::First,
            "last" => ReshapeInstance::Last,
            _ => return None,
        };
        Some(mode)
    }

    pub fn code(&self) -> &'static str {
        match self {
            ReshapeInstance::None => "",
            ReshapeInstance::Columns => "cols",
            ReshapeInstance::ConcatSpace => "conc_space",
            ReshapeInstance::ConcatComma => "conc_comma",
            ReshapeInstance::ConcatPipe => "conc_pipe",
            ReshapeInstance::Min => "min",
            ReshapeInstance::Max => "max",
            ReshapeInstance::First => "first",
            ReshapeInstance::Last => "last",
        }
    }

    /// Separator for the concatenating layouts
    pub fn separator(&self) -> Option<&'static str> {
        match self {
            ReshapeInstance::ConcatSpace => Some(" "),
            ReshapeInstance::ConcatComma => Some(","),
            ReshapeInstance::ConcatPipe => Some("|"),
            _ => None,
        }
    }
}

/// Per-report extension settings as persisted by the settings store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub is_sql: bool,
    pub sql_query: String,
    pub sql_disable_dag_filter: bool,
    pub reshape_event: ReshapeEvent,
    pub reshape_instance: ReshapeInstance,
}

impl ReportConfig {
    /// True when any extension setting is active
    pub fn is_extended(&self) -> bool {
        self.is_sql
            || !self.sql_query.trim().is_empty()
            || self.sql_disable_dag_filter
            || self.reshape_event != ReshapeEvent::None
            || self.reshape_instance != ReshapeInstance::None
    }
}

//
// Host report definition
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayHeader {
    Label,
    Variable,
    #[default]
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisplayData {
    Label,
    Raw,
    #[default]
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default = "default_true")]
    pub ascending: bool,
}

fn default_true() -> bool {
    true
}

/// The host's own report record (title, field list, filters, display options)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportDefinition {
    pub report_id: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub filter_events: Vec<EventId>,
    #[serde(default)]
    pub combine_checkbox_values: bool,
    #[serde(default)]
    pub output_dags: bool,
    #[serde(default)]
    pub display_header: DisplayHeader,
    #[serde(default)]
    pub display_data: DisplayData,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub sort: Vec<SortKey>,
}

//
// Output formats
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Csv,
    CsvRaw,
    CsvLabels,
    Json,
    Xml,
}

impl OutputFormat {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "html" => Some(OutputFormat::Html),
            "csv" => Some(OutputFormat::Csv),
            "csvraw" => Some(OutputFormat::CsvRaw),
            "csvlabels" => Some(OutputFormat::CsvLabels),
            "json" => Some(OutputFormat::Json),
            "xml" => Some(OutputFormat::Xml),
            _ => None,
        }
    }

    pub fn is_csv(&self) -> bool {
        matches!(self, OutputFormat::Csv | OutputFormat::CsvRaw | OutputFormat::CsvLabels)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Html => "html",
            OutputFormat::Csv => "csv",
            OutputFormat::CsvRaw => "csvraw",
            OutputFormat::CsvLabels => "csvlabels",
            OutputFormat::Json => "json",
            OutputFormat::Xml => "xml",
        };
        write!(f, "{}", s)
    }
}

/// Final rendered artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputDocument {
    pub content: String,
    pub row_count: usize,
}

//
// Normalized input data
//

/// A stored value: plain text, or a checkbox's choice-code -> "0"/"1" map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Text(String),
    Checkbox(IndexMap<String, String>),
}

impl RawValue {
    pub fn empty() -> Self {
        RawValue::Text(String::new())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Text(s) => Some(s),
            RawValue::Checkbox(_) => None,
        }
    }
}

pub type FieldValues = IndexMap<String, RawValue>;

/// instance number -> field values
pub type InstanceValues = BTreeMap<u32, FieldValues>;

/// One record's data: event -> fields, plus the repeating sub-structure
/// (event -> repeating form name, or "" for a repeating event -> instances).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordData {
    #[serde(default)]
    pub events: IndexMap<EventId, FieldValues>,
    #[serde(default)]
    pub repeat_instances: IndexMap<EventId, IndexMap<String, InstanceValues>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedReportData {
    pub records: IndexMap<String, RecordData>,
}

//
// Reshaped output model
//

/// Value held by one logical cell slot
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Raw(RawValue),
    /// Already rendered for the target format (concatenated instances)
    Formatted(String),
    Redacted,
}

impl CellValue {
    pub fn text(s: impl Into<String>) -> Self {
        CellValue::Raw(RawValue::Text(s.into()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Single(CellValue),
    /// One slot per instance 1..=instance_count
    Instances(Vec<CellValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReshapedRow {
    pub record: Option<String>,
    pub cells: Vec<Cell>,
}

/// One logical output column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnHeader {
    pub field_name: String,
    /// Absent for SQL columns with no explicit or known label
    pub label: Option<String>,
    pub kind: Option<crate::metadata::FieldKind>,
    pub form_name: String,
    pub event_id: Option<EventId>,
    pub event_unique_name: String,
    pub event_label: String,
    pub arm_name: String,
    pub is_repeating_event: bool,
    pub is_repeating_form: bool,
    pub instance_count: u32,
    pub subvalues: Vec<String>,
    pub view_rights: u8,
    pub export_rights: u8,
}

impl ColumnHeader {
    pub fn is_repeating(&self) -> bool {
        self.is_repeating_event || self.is_repeating_form
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.field_name)
    }
}

/// Headers and rows ready for assembly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    pub headers: Vec<ColumnHeader>,
    pub rows: Vec<ReshapedRow>,
    pub instance_layout: ReshapeInstance,
    pub has_split_columns: bool,
    pub is_sql: bool,
}

impl ReportTable {
    /// True when the header expands into one physical column per instance
    pub fn has_instance_columns(&self, header: &ColumnHeader) -> bool {
        self.instance_layout == ReshapeInstance::Columns && header.is_repeating()
    }

    /// Number of physical columns a logical header expands to
    pub fn physical_width(&self, header: &ColumnHeader) -> usize {
        let per_slot = header.subvalues.len().max(1);
        if self.has_instance_columns(header) {
            header.instance_count as usize * per_slot
        } else {
            per_slot
        }
    }
}

//
// Access context
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormRights {
    #[serde(default)]
    pub view: u8,
    #[serde(default)]
    pub export: u8,
}

/// The acting user. `form_rights` of `None` means unrestricted access.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    pub username: String,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub is_super_user: bool,
    #[serde(default)]
    pub form_rights: Option<HashMap<String, FormRights>>,
}

impl UserContext {
    pub fn rights_for(&self, form: &str) -> FormRights {
        match &self.form_rights {
            None => FormRights { view: 1, export: 1 },
            Some(rights) => rights.get(form).copied().unwrap_or_default(),
        }
    }
}
