/// File-backed host
///
/// This module handles:
/// - Loading a project fixture (metadata, user, report definitions, data, canned SQL results)
/// - Serving it through every collaborator trait the renderer consumes
/// - Writing generated documents to a directory
use crate::host::{
    DocumentStore, EventLog, OntologyCache, QueryResult, ReportDataSource, ReportStore, RequestContext, SqlExecutor,
};
use crate::metadata::ProjectMetadata;
use crate::settings_store::SettingsStore;
use crate::sort;
use crate::types::{NormalizedReportData, ReportConfig, ReportDefinition, UserContext};
use log::{debug, info};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// A canned SQL result, or the error the driver would report
#[derive(Debug, Clone, Deserialize)]
pub struct CannedQuery {
    pub query: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OntologyEntry {
    pub service: String,
    pub category: String,
    pub value: String,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectFixture {
    pub project: ProjectMetadata,
    #[serde(default)]
    pub user: UserContext,
    #[serde(default)]
    pub reports: Vec<ReportDefinition>,
    #[serde(default)]
    pub configs: BTreeMap<u32, ReportConfig>,
    #[serde(default)]
    pub data: BTreeMap<u32, NormalizedReportData>,
    #[serde(default)]
    pub record_labels: HashMap<String, String>,
    #[serde(default)]
    pub sql_results: Vec<CannedQuery>,
    #[serde(default)]
    pub dag_records: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub ontology: Vec<OntologyEntry>,
    #[serde(default)]
    pub documents: BTreeMap<u64, String>,
}

impl ProjectFixture {
    pub fn load(path: &Path) -> Result<Self, String> {
        let text =
            fs::read_to_string(path).map_err(|e| format!("Failed to read fixture {}: {}", path.display(), e))?;
        Self::parse(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }

    /// Parse fixture JSON and apply report label action tags
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut fixture: ProjectFixture =
            serde_json::from_str(text).map_err(|e| format!("Failed to parse fixture JSON: {}", e))?;
        fixture.project.apply_report_labels();
        Ok(fixture)
    }
}

/// Serves a fixture through the collaborator traits
pub struct FixtureHost {
    pub fixture: ProjectFixture,
    settings: Option<SettingsStore>,
    documents: RefCell<BTreeMap<u64, (String, String)>>,
    documents_dir: Option<PathBuf>,
    events: RefCell<Vec<(String, String)>>,
}

impl FixtureHost {
    pub fn new(fixture: ProjectFixture) -> Self {
        let documents =
            fixture.documents.iter().map(|(id, name)| (*id, (name.clone(), String::new()))).collect::<BTreeMap<_, _>>();
        Self {
            fixture,
            settings: None,
            documents: RefCell::new(documents),
            documents_dir: None,
            events: RefCell::new(Vec::new()),
        }
    }

    /// Read extension settings from a settings store instead of the fixture
    pub fn with_settings(mut self, settings: SettingsStore) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Also write stored documents into a directory
    pub fn with_documents_dir(mut self, dir: PathBuf) -> Self {
        self.documents_dir = Some(dir);
        self
    }

    pub fn context(&self) -> RequestContext<'_> {
        RequestContext {
            project: &self.fixture.project,
            user: &self.fixture.user,
            reports: self,
            data: self,
            sql: self,
            ontology: self,
            documents: self,
        }
    }

    pub fn document_content(&self, doc_id: u64) -> Option<String> {
        self.documents.borrow().get(&doc_id).map(|(_, content)| content.clone())
    }

    pub fn logged_events(&self) -> Vec<(String, String)> {
        self.events.borrow().clone()
    }
}

impl ReportStore for FixtureHost {
    fn report_definition(&self, report_id: u32) -> Option<ReportDefinition> {
        self.fixture.reports.iter().find(|r| r.report_id == report_id).cloned()
    }

    fn report_config(&self, report_id: u32) -> Option<ReportConfig> {
        if let Some(store) = &self.settings {
            if let Some(config) = store.find(report_id) {
                return Some(config);
            }
        }
        self.fixture.configs.get(&report_id).cloned()
    }
}

impl ReportDataSource for FixtureHost {
    fn normalized_data(&self, definition: &ReportDefinition) -> Result<NormalizedReportData, String> {
        let data = self
            .fixture
            .data
            .get(&definition.report_id)
            .cloned()
            .ok_or_else(|| format!("No data for report {}", definition.report_id))?;
        Ok(sort::sort_or_original(data, &definition.sort, &self.fixture.project))
    }

    fn record_labels(&self, records: &[String]) -> HashMap<String, String> {
        records
            .iter()
            .filter_map(|r| self.fixture.record_labels.get(r).map(|label| (r.clone(), label.clone())))
            .collect()
    }
}

fn normalize_sql(sql: &str) -> String {
    sql.trim().trim_end_matches(';').split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl SqlExecutor for FixtureHost {
    fn query(&self, sql: &str) -> Result<QueryResult, String> {
        let wanted = normalize_sql(sql);
        let canned = self
            .fixture
            .sql_results
            .iter()
            .find(|q| normalize_sql(&q.query) == wanted)
            .ok_or_else(|| format!("No result registered for query: {}", sql.trim()))?;
        debug!("Serving canned result for: {}", wanted);
        match &canned.error {
            Some(e) => Err(e.clone()),
            None => Ok(QueryResult { columns: canned.columns.clone(), rows: canned.rows.clone() }),
        }
    }

    fn dag_records(&self, group_id: &str) -> Result<HashSet<String>, String> {
        Ok(self.fixture.dag_records.get(group_id).map(|r| r.iter().cloned().collect()).unwrap_or_default())
    }
}

impl OntologyCache for FixtureHost {
    fn label(&self, service: &str, category: &str, code: &str) -> Option<String> {
        self.fixture
            .ontology
            .iter()
            .find(|o| o.service == service && o.category == category && o.value == code)
            .map(|o| o.label.clone())
    }
}

impl DocumentStore for FixtureHost {
    fn document_name(&self, doc_id: u64) -> Option<String> {
        self.documents.borrow().get(&doc_id).map(|(name, _)| name.clone())
    }

    fn store(&self, name: &str, content: &str) -> Result<u64, String> {
        let id = self.documents.borrow().keys().next_back().map(|id| id + 1).unwrap_or(1);
        if let Some(dir) = &self.documents_dir {
            fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
            let path = dir.join(format!("{}_{}", id, name));
            fs::write(&path, content).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            info!("Stored document {} at {}", id, path.display());
        }
        self.documents.borrow_mut().insert(id, (name.to_string(), content.to_string()));
        Ok(id)
    }
}

impl EventLog for FixtureHost {
    fn log_event(&self, description: &str, detail: &str) {
        info!("{}: {}", description, detail);
        self.events.borrow_mut().push((description.to_string(), detail.to_string()));
    }
}
