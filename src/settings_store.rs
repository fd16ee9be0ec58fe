/// Extension settings store
///
/// This module handles:
/// - Persisting per-report extension settings as parallel TOML arrays keyed by report id
/// - Save, copy and delete with the super-user rule for SQL
/// - Exclusive file locking around every read-modify-write
use crate::config::clean_sql;
use crate::error::{ReportError, ReportResult};
use crate::host::EventLog;
use crate::sql_report::validate_select;
use crate::types::{ReportConfig, ReshapeEvent, ReshapeInstance, UserContext};
use fs2::FileExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

const LOG_DESCRIPTION: &str = "Extended Reports";

/// On-disk layout: one array per setting, index-aligned with `report-id`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(rename = "report-id", default)]
    pub report_id: Vec<u32>,
    #[serde(rename = "rpt-is-sql", default)]
    pub is_sql: Vec<bool>,
    #[serde(rename = "rpt-sql", default)]
    pub sql: Vec<String>,
    #[serde(rename = "rpt-sql-disable-dag-filter", default)]
    pub disable_dag_filter: Vec<bool>,
    #[serde(rename = "rpt-reshape-event", default)]
    pub reshape_event: Vec<String>,
    #[serde(rename = "rpt-reshape-instance", default)]
    pub reshape_instance: Vec<String>,
}

impl SettingsFile {
    fn index_of(&self, report_id: u32) -> Option<usize> {
        self.report_id.iter().position(|id| *id == report_id)
    }

    /// Settings at an index; arrays shorter than `report-id` read as defaults
    fn config_at(&self, index: usize) -> ReportConfig {
        ReportConfig {
            is_sql: self.is_sql.get(index).copied().unwrap_or(false),
            sql_query: self.sql.get(index).cloned().unwrap_or_default(),
            sql_disable_dag_filter: self.disable_dag_filter.get(index).copied().unwrap_or(false),
            reshape_event: self
                .reshape_event
                .get(index)
                .and_then(|c| ReshapeEvent::from_code(c))
                .unwrap_or_default(),
            reshape_instance: self
                .reshape_instance
                .get(index)
                .and_then(|c| ReshapeInstance::from_code(c))
                .unwrap_or_default(),
        }
    }

    fn pad(&mut self) {
        let len = self.report_id.len();
        self.is_sql.resize(len, false);
        self.sql.resize(len, String::new());
        self.disable_dag_filter.resize(len, false);
        self.reshape_event.resize(len, String::new());
        self.reshape_instance.resize(len, String::new());
    }

    fn set(&mut self, index: usize, report_id: u32, config: &ReportConfig) {
        self.pad();
        if index == self.report_id.len() {
            self.report_id.push(report_id);
            self.pad();
        }
        self.report_id[index] = report_id;
        self.is_sql[index] = config.is_sql;
        self.sql[index] = config.sql_query.clone();
        self.disable_dag_filter[index] = config.sql_disable_dag_filter;
        self.reshape_event[index] = config.reshape_event.code().to_string();
        self.reshape_instance[index] = config.reshape_instance.code().to_string();
    }

    fn remove(&mut self, index: usize) {
        self.pad();
        self.report_id.remove(index);
        self.is_sql.remove(index);
        self.sql.remove(index);
        self.disable_dag_filter.remove(index);
        self.reshape_event.remove(index);
        self.reshape_instance.remove(index);
    }
}

/// Settings submitted from the report editor
#[derive(Debug, Clone, Default)]
pub struct SaveRequest {
    pub sql: Option<String>,
    pub disable_dag_filter: bool,
    pub reshape_event: Option<String>,
    pub reshape_instance: Option<String>,
}

/// SQL part of a save: absent, submitted empty, or a new statement
enum SqlChange {
    Keep,
    Clear,
    Set(String),
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored settings for a report. Read failures are logged and treated as absent.
    pub fn find(&self, report_id: u32) -> Option<ReportConfig> {
        match self.load() {
            Ok(settings) => settings.index_of(report_id).map(|i| settings.config_at(i)),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Read the whole file under a shared lock; a missing file is empty
    pub fn load(&self) -> ReportResult<SettingsFile> {
        if !self.path.exists() {
            return Ok(SettingsFile::default());
        }
        let mut file = File::open(&self.path)?;
        file.lock_shared()?;
        let mut text = String::new();
        file.read_to_string(&mut text)?;
        parse(&text, &self.path)
    }

    /// Save a report's settings. Returns false when nothing was written.
    ///
    /// SQL is only accepted from super users; for anyone else the SQL and DAG filter flag are dropped and the
    /// stored values kept. Empty SQL from a super user turns the report back into a normal report. A request with
    /// no settings for a report that has none stored is a no-op.
    pub fn save(
        &self,
        report_id: u32,
        request: &SaveRequest,
        user: &UserContext,
        log: &dyn EventLog,
    ) -> ReportResult<bool> {
        let reshape_event = parse_code(request.reshape_event.as_deref(), ReshapeEvent::from_code, "reshape event")?;
        let reshape_instance =
            parse_code(request.reshape_instance.as_deref(), ReshapeInstance::from_code, "reshape instance")?;

        let sql = match request.sql.as_deref().map(clean_sql) {
            None => SqlChange::Keep,
            Some(_) if !user.is_super_user => {
                debug!("Dropping SQL from non-super-user {}", user.username);
                SqlChange::Keep
            }
            Some(sql) if sql.is_empty() => SqlChange::Clear,
            Some(sql) => {
                validate_select(&sql)?;
                SqlChange::Set(sql)
            }
        };
        let has_values = matches!(sql, SqlChange::Set(_))
            || reshape_event != ReshapeEvent::None
            || reshape_instance != ReshapeInstance::None;

        let written = self.update(|settings| {
            let index = settings.index_of(report_id);
            if index.is_none() && !has_values {
                return Ok(None);
            }
            let is_new = index.is_none();
            let index = index.unwrap_or(settings.report_id.len());
            let mut config = if is_new { ReportConfig::default() } else { settings.config_at(index) };
            match &sql {
                SqlChange::Keep => {}
                SqlChange::Clear => {
                    config.is_sql = false;
                    config.sql_query.clear();
                    config.sql_disable_dag_filter = false;
                }
                SqlChange::Set(sql) => {
                    config.is_sql = true;
                    config.sql_query = sql.clone();
                    config.sql_disable_dag_filter = request.disable_dag_filter;
                }
            }
            config.reshape_event = reshape_event;
            config.reshape_instance = reshape_instance;
            settings.set(index, report_id, &config);
            Ok(Some(format!("save report id {} (is-new: {}): {:?}", report_id, is_new, config)))
        })?;

        Ok(self.record(written, log))
    }

    /// Copy a report's settings to another report id. Returns false when the source has none.
    pub fn copy(&self, from: u32, to: u32, log: &dyn EventLog) -> ReportResult<bool> {
        let written = self.update(|settings| {
            let Some(source) = settings.index_of(from) else {
                return Ok(None);
            };
            let config = settings.config_at(source);
            let index = settings.index_of(to).unwrap_or(settings.report_id.len());
            settings.set(index, to, &config);
            Ok(Some(format!("copy report in {} (copy-of: {})", to, from)))
        })?;
        Ok(self.record(written, log))
    }

    /// Remove a report's settings, compacting the arrays. Returns false when there were none.
    pub fn delete(&self, report_id: u32, log: &dyn EventLog) -> ReportResult<bool> {
        let written = self.update(|settings| {
            let Some(index) = settings.index_of(report_id) else {
                return Ok(None);
            };
            settings.remove(index);
            Ok(Some(format!("delete report id {} (index: {})", report_id, index)))
        })?;
        Ok(self.record(written, log))
    }

    fn record(&self, written: Option<String>, log: &dyn EventLog) -> bool {
        match written {
            Some(detail) => {
                info!("{}", detail);
                log.log_event(LOG_DESCRIPTION, &detail);
                true
            }
            None => false,
        }
    }

    /// Read-modify-write under an exclusive lock. The closure returns a log line when it changed anything.
    fn update<F>(&self, change: F) -> ReportResult<Option<String>>
    where
        F: FnOnce(&mut SettingsFile) -> ReportResult<Option<String>>,
    {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(&self.path)?;
        file.lock_exclusive()?;

        let mut text = String::new();
        file.read_to_string(&mut text)?;
        let mut settings = parse(&text, &self.path)?;

        let Some(detail) = change(&mut settings)? else {
            return Ok(None);
        };
        settings.pad();
        let text = toml::to_string(&settings).map_err(|e| ReportError::SettingsStore(e.to_string()))?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(text.as_bytes())?;
        file.flush()?;
        Ok(Some(detail))
    }
}

fn parse(text: &str, path: &Path) -> ReportResult<SettingsFile> {
    toml::from_str(text).map_err(|e| ReportError::SettingsStore(format!("Failed to parse {}: {}", path.display(), e)))
}

fn parse_code<T: Default>(code: Option<&str>, from_code: fn(&str) -> Option<T>, what: &str) -> ReportResult<T> {
    match code {
        None => Ok(T::default()),
        Some(code) => from_code(code).ok_or_else(|| ReportError::InvalidConfig(format!("Unknown {} '{}'", what, code))),
    }
}

#[cfg(test)]
#[path = "settings_store_test.rs"]
mod settings_store_test;
