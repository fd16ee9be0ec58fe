/// Tests for settings_store module
#[cfg(test)]
mod tests {
    use crate::error::ReportError;
    use crate::host::EventLog;
    use crate::settings_store::*;
    use crate::types::{ReportConfig, ReshapeEvent, ReshapeInstance, UserContext};
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingLog(RefCell<Vec<String>>);

    impl EventLog for RecordingLog {
        fn log_event(&self, _description: &str, detail: &str) {
            self.0.borrow_mut().push(detail.to_string());
        }
    }

    fn store() -> (TempDir, SettingsStore) {
        let dir = TempDir::new().unwrap();
        let store = SettingsStore::new(dir.path().join("settings").join("report-settings.toml"));
        (dir, store)
    }

    fn super_user() -> UserContext {
        UserContext { username: "admin".into(), is_super_user: true, ..Default::default() }
    }

    fn reshape(event: &str, instance: &str) -> SaveRequest {
        SaveRequest {
            reshape_event: Some(event.into()),
            reshape_instance: Some(instance.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_save_and_find() {
        let (_dir, store) = store();
        let log = RecordingLog::default();
        assert!(store.find(3).is_none());

        assert!(store.save(3, &reshape("ef", "cols"), &super_user(), &log).unwrap());
        let config = store.find(3).unwrap();
        assert_eq!(config.reshape_event, ReshapeEvent::EventThenField);
        assert_eq!(config.reshape_instance, ReshapeInstance::Columns);
        assert!(!config.is_sql);
        assert_eq!(log.0.borrow().len(), 1);

        let text = std::fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("report-id = [3]"));
        assert!(text.contains("rpt-reshape-instance = [\"cols\"]"));
    }

    #[test]
    fn test_empty_request_is_noop_for_new_report() {
        let (_dir, store) = store();
        let log = RecordingLog::default();
        assert!(!store.save(9, &SaveRequest::default(), &super_user(), &log).unwrap());
        assert!(log.0.borrow().is_empty());
        assert!(store.load().unwrap().report_id.is_empty());

        // an existing entry is still updated by an empty request
        store.save(9, &reshape("fe", "last"), &super_user(), &log).unwrap();
        assert!(store.save(9, &SaveRequest::default(), &super_user(), &log).unwrap());
        assert_eq!(store.find(9), Some(ReportConfig::default()));
    }

    #[test]
    fn test_sql_requires_super_user() {
        let (_dir, store) = store();
        let log = RecordingLog::default();
        let request = SaveRequest {
            sql: Some("select record_id from data;".into()),
            disable_dag_filter: true,
            ..Default::default()
        };
        let user = UserContext { username: "bob".into(), ..Default::default() };
        assert!(!store.save(4, &request, &user, &log).unwrap(), "Nothing left to save");

        assert!(store.save(4, &request, &super_user(), &log).unwrap());
        let config = store.find(4).unwrap();
        assert!(config.is_sql);
        assert_eq!(config.sql_query, "select record_id from data");
        assert!(config.sql_disable_dag_filter);

        // a non-super-user edit keeps the stored SQL
        let edit = SaveRequest { sql: Some("select 1".into()), ..reshape("", "") };
        store.save(4, &edit, &user, &log).unwrap();
        assert_eq!(store.find(4).unwrap().sql_query, "select record_id from data");
    }

    #[test]
    fn test_empty_sql_clears_stored_query() {
        let (_dir, store) = store();
        let log = RecordingLog::default();
        let request = SaveRequest {
            sql: Some("select 1".into()),
            disable_dag_filter: true,
            reshape_event: Some("ef".into()),
            ..Default::default()
        };
        store.save(4, &request, &super_user(), &log).unwrap();
        assert!(store.find(4).unwrap().is_sql);

        let clear = SaveRequest { sql: Some("  ;".into()), reshape_event: Some("ef".into()), ..Default::default() };
        assert!(store.save(4, &clear, &super_user(), &log).unwrap());
        let config = store.find(4).unwrap();
        assert!(!config.is_sql);
        assert_eq!(config.sql_query, "");
        assert!(!config.sql_disable_dag_filter);
        assert_eq!(config.reshape_event, ReshapeEvent::EventThenField);

        // nothing to clear for a report with no entry
        assert!(!store.save(5, &SaveRequest { sql: Some(String::new()), ..Default::default() }, &super_user(), &log)
            .unwrap());
        assert!(store.find(5).is_none());
    }

    #[test]
    fn test_rejects_non_select_and_unknown_codes() {
        let (_dir, store) = store();
        let log = RecordingLog::default();
        let request = SaveRequest { sql: Some("\tdelete from data".into()), ..Default::default() };
        assert!(matches!(store.save(1, &request, &super_user(), &log), Err(ReportError::InvalidQuery(_))));
        assert!(matches!(
            store.save(1, &reshape("xy", "cols"), &super_user(), &log),
            Err(ReportError::InvalidConfig(_))
        ));
        assert!(store.find(1).is_none());
    }

    #[test]
    fn test_copy_and_delete_compact() {
        let (_dir, store) = store();
        let log = RecordingLog::default();
        store.save(1, &reshape("ef", "cols"), &super_user(), &log).unwrap();
        store.save(2, &reshape("fe", "min"), &super_user(), &log).unwrap();
        store.save(3, &reshape("", "max"), &super_user(), &log).unwrap();

        assert!(store.copy(2, 7, &log).unwrap());
        assert!(!store.copy(42, 8, &log).unwrap());
        assert_eq!(store.find(7), store.find(2));

        assert!(store.delete(2, &log).unwrap());
        assert!(!store.delete(2, &log).unwrap());
        let settings = store.load().unwrap();
        assert_eq!(settings.report_id, vec![1, 3, 7]);
        assert_eq!(settings.reshape_instance, vec!["cols", "max", "min"]);
        assert_eq!(store.find(3).unwrap().reshape_instance, ReshapeInstance::Max);
        assert_eq!(log.0.borrow().len(), 5);
    }

    #[test]
    fn test_short_arrays_read_as_defaults() {
        let (_dir, store) = store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "report-id = [5, 6]\nrpt-reshape-instance = [\"first\"]\n").unwrap();
        assert_eq!(store.find(5).unwrap().reshape_instance, ReshapeInstance::First);
        assert_eq!(store.find(6), Some(ReportConfig::default()));
    }
}
