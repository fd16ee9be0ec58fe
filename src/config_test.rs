/// Tests for config module
#[cfg(test)]
mod tests {
    use crate::config::*;
    use crate::fixture::ProjectFixture;
    use crate::types::{OutputFormat, ReportConfig, ReportDefinition, ReshapeEvent, ReshapeInstance};

    fn project() -> crate::metadata::ProjectMetadata {
        ProjectFixture::parse(include_str!("../tests/fixtures/project.json")).unwrap().project
    }

    #[test]
    fn test_render_settings_defaults_and_aliases() {
        let s = resolve_render_settings("csvlabels", Some("tab"), Some(",")).unwrap();
        assert_eq!(s.format, OutputFormat::CsvLabels);
        assert_eq!(s.delimiter, "\t");
        assert_eq!(s.decimal, ",");

        let s = resolve_render_settings("CSV", Some("::"), Some("x")).unwrap();
        assert_eq!(s.delimiter, ",", "Invalid delimiter should fall back to comma");
        assert_eq!(s.decimal, ".");

        assert!(resolve_render_settings("odm", None, None).is_err());
    }

    #[test]
    fn test_event_layout_cleared_for_classic_project() {
        let mut p = project();
        p.longitudinal = false;
        let raw = ReportConfig {
            reshape_event: ReshapeEvent::EventThenField,
            reshape_instance: ReshapeInstance::Columns,
            ..Default::default()
        };
        let config = resolve_report_config(Some(raw), &p).expect("instance layout keeps it extended");
        assert_eq!(config.reshape_event, ReshapeEvent::None);
        assert_eq!(config.reshape_instance, ReshapeInstance::Columns);
    }

    #[test]
    fn test_not_extended_when_everything_cleared() {
        let mut p = project();
        p.longitudinal = false;
        for e in p.events.iter_mut() {
            e.is_repeating = false;
            e.repeating_forms.clear();
        }
        let raw = ReportConfig {
            reshape_event: ReshapeEvent::FieldThenEvent,
            reshape_instance: ReshapeInstance::Last,
            ..Default::default()
        };
        assert!(resolve_report_config(Some(raw), &p).is_none());
        assert!(resolve_report_config(None, &p).is_none());
    }

    #[test]
    fn test_sql_is_cleaned() {
        let raw = ReportConfig { is_sql: true, sql_query: "\tselect *\tfrom t ;; ".into(), ..Default::default() };
        let config = resolve_report_config(Some(raw), &project()).unwrap();
        assert_eq!(config.sql_query, "select *  from t");
    }

    #[test]
    fn test_combine_rule() {
        let def = ReportDefinition::default();
        let cols = ReportConfig { reshape_instance: ReshapeInstance::Columns, ..Default::default() };
        assert!(!combine_checkboxes(&def, &cols));

        let concat = ReportConfig { reshape_instance: ReshapeInstance::ConcatComma, ..Default::default() };
        assert!(combine_checkboxes(&def, &concat));

        let sql = ReportConfig { is_sql: true, reshape_instance: ReshapeInstance::Columns, ..Default::default() };
        assert!(combine_checkboxes(&def, &sql));

        let def = ReportDefinition { combine_checkbox_values: true, ..Default::default() };
        assert!(combine_checkboxes(&def, &cols));
    }
}
