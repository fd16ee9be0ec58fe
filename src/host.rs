//! Collaborator interfaces consumed by the renderer.
//!
//! Report storage, data retrieval, SQL execution, documents, the host's unmodified export endpoint and the
//! administrative event log all live outside this crate. Each is a narrow trait; `RequestContext` bundles them
//! with the project and user for one request.

use crate::metadata::ProjectMetadata;
use crate::types::{NormalizedReportData, ReportConfig, ReportDefinition, UserContext};
use std::collections::{HashMap, HashSet};

/// Column names plus positional rows from a SQL query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

pub trait ReportStore {
    fn report_definition(&self, report_id: u32) -> Option<ReportDefinition>;

    /// Stored extension settings, unnormalized
    fn report_config(&self, report_id: u32) -> Option<ReportConfig>;
}

pub trait ReportDataSource {
    /// Access-filtered normalized data for the report's fields and filters
    fn normalized_data(&self, definition: &ReportDefinition) -> Result<NormalizedReportData, String>;

    /// Custom record labels keyed by record id
    fn record_labels(&self, records: &[String]) -> HashMap<String, String>;
}

pub trait SqlExecutor {
    fn query(&self, sql: &str) -> Result<QueryResult, String>;

    /// Record ids belonging to a data access group
    fn dag_records(&self, group_id: &str) -> Result<HashSet<String>, String>;

    /// Smart-variable substitution performed by the host
    fn pipe_special_tags(&self, sql: &str) -> String {
        sql.to_string()
    }
}

pub trait OntologyCache {
    fn label(&self, service: &str, category: &str, code: &str) -> Option<String>;
}

pub trait DocumentStore {
    fn document_name(&self, doc_id: u64) -> Option<String>;

    /// Store content as a named document and return its id
    fn store(&self, name: &str, content: &str) -> Result<u64, String>;
}

/// Title and HTML content of an export dialog
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BaselineDialog {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

pub trait BaselineExporter {
    fn request(&self, params: &[(String, String)]) -> crate::error::ReportResult<BaselineDialog>;
}

pub trait EventLog {
    fn log_event(&self, description: &str, detail: &str);
}

/// Everything one request needs, passed explicitly into every component
pub struct RequestContext<'a> {
    pub project: &'a ProjectMetadata,
    pub user: &'a UserContext,
    pub reports: &'a dyn ReportStore,
    pub data: &'a dyn ReportDataSource,
    pub sql: &'a dyn SqlExecutor,
    pub ontology: &'a dyn OntologyCache,
    pub documents: &'a dyn DocumentStore,
}
