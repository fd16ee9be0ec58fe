/// Tests for formatter module
#[cfg(test)]
mod tests {
    use crate::csv_encoder::CsvEncoder;
    use crate::fixture::{FixtureHost, ProjectFixture};
    use crate::formatter::{ValueFormatter, convert_ymd};
    use crate::types::{CellValue, DisplayData, OutputFormat, RawValue};
    use indexmap::IndexMap;
    use std::collections::HashMap;

    fn host() -> FixtureHost {
        FixtureHost::new(ProjectFixture::parse(include_str!("../tests/fixtures/project.json")).unwrap())
    }

    fn checkbox(pairs: &[(&str, &str)]) -> CellValue {
        let map: IndexMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        CellValue::Raw(RawValue::Checkbox(map))
    }

    #[test]
    fn test_single_choice_display_modes() {
        let host = host();
        let ctx = host.context();
        let value = CellValue::text("2");

        let both = ValueFormatter::new(&ctx, DisplayData::Both, false, CsvEncoder::default(), HashMap::new());
        assert_eq!(both.format(&value, "sex", OutputFormat::Html), vec!["Male <span class=\"text-muted\">(2)</span>"]);
        assert_eq!(both.format(&value, "sex", OutputFormat::CsvLabels), vec!["Male"]);
        assert_eq!(both.format(&value, "sex", OutputFormat::CsvRaw), vec!["2"]);

        let label = ValueFormatter::new(&ctx, DisplayData::Label, false, CsvEncoder::default(), HashMap::new());
        assert_eq!(label.format(&value, "sex", OutputFormat::Html), vec!["Male"]);

        let raw = ValueFormatter::new(&ctx, DisplayData::Raw, false, CsvEncoder::default(), HashMap::new());
        assert_eq!(raw.format(&value, "sex", OutputFormat::Html), vec!["2"]);

        // unknown code passes through
        assert_eq!(both.format(&CellValue::text("9"), "sex", OutputFormat::CsvLabels), vec!["9"]);
        assert_eq!(both.format(&CellValue::text(" "), "sex", OutputFormat::Html), vec![""]);
    }

    #[test]
    fn test_combined_checkbox_joins_selected_only() {
        let host = host();
        let ctx = host.context();
        let f = ValueFormatter::new(&ctx, DisplayData::Label, true, CsvEncoder::new(";", "."), HashMap::new());
        let value = checkbox(&[("1", "1"), ("2", "0"), ("3", "1")]);

        assert_eq!(f.format(&value, "race", OutputFormat::Html), vec!["White<br>Asian"]);
        assert_eq!(f.format(&value, "race", OutputFormat::CsvLabels), vec!["White;Asian"]);
        assert_eq!(f.format(&value, "race", OutputFormat::CsvRaw), vec!["1;3"]);
        assert_eq!(f.format(&value, "race", OutputFormat::Json), vec!["1,3"]);
        // comma-separated text is read as the selected codes
        assert_eq!(f.format(&CellValue::text("2,3"), "race", OutputFormat::CsvLabels), vec!["Black;Asian"]);
    }

    #[test]
    fn test_split_checkbox_one_value_per_choice() {
        let host = host();
        let ctx = host.context();
        let f = ValueFormatter::new(&ctx, DisplayData::Both, false, CsvEncoder::default(), HashMap::new());
        let value = checkbox(&[("1", "1"), ("2", "0")]);

        assert_eq!(f.format(&value, "race", OutputFormat::Html), vec!["Checked (1)", "Unchecked (0)", ""]);
        assert_eq!(f.format(&value, "race", OutputFormat::CsvLabels), vec!["Checked", "Unchecked", ""]);
        assert_eq!(f.format(&value, "race", OutputFormat::Csv), vec!["1", "0", ""]);
        assert_eq!(f.format(&CellValue::Redacted, "race", OutputFormat::Csv), vec!["-", "-", "-"]);
    }

    #[test]
    fn test_text_validation_types() {
        let host = host();
        let ctx = host.context();
        let f = ValueFormatter::new(&ctx, DisplayData::Both, false, CsvEncoder::new(";", ","), HashMap::new());

        assert_eq!(f.format(&CellValue::text("1990-02-28"), "dob", OutputFormat::CsvRaw), vec!["02-28-1990"]);
        assert_eq!(f.format(&CellValue::text("34.5"), "age", OutputFormat::CsvRaw), vec!["34,5"]);
        assert_eq!(
            f.format(&CellValue::text("a@example.org"), "email", OutputFormat::Html),
            vec!["<a href='mailto:a@example.org'>a@example.org</a>"]
        );
        assert_eq!(f.format(&CellValue::text("a@example.org"), "email", OutputFormat::Csv), vec!["a@example.org"]);
    }

    #[test]
    fn test_ontology_falls_back_to_code() {
        let host = host();
        let ctx = host.context();
        let f = ValueFormatter::new(&ctx, DisplayData::Both, false, CsvEncoder::default(), HashMap::new());

        assert_eq!(
            f.format(&CellValue::text("12345"), "drug", OutputFormat::Html),
            vec!["Aspirin <span class=\"text-muted\">(12345)</span>"]
        );
        assert_eq!(f.format(&CellValue::text("12345"), "drug", OutputFormat::CsvLabels), vec!["Aspirin"]);
        assert_eq!(f.format(&CellValue::text("12345"), "drug", OutputFormat::CsvRaw), vec!["12345"]);
        assert_eq!(f.format(&CellValue::text("999"), "drug", OutputFormat::Html), vec!["999"]);
    }

    #[test]
    fn test_pseudo_fields() {
        let host = host();
        let ctx = host.context();
        let labels: HashMap<String, String> = [("1".to_string(), "a@example.org".to_string())].into_iter().collect();
        let f = ValueFormatter::new(&ctx, DisplayData::Both, false, CsvEncoder::default(), labels);

        assert_eq!(
            f.format(&CellValue::text("1"), "record_id", OutputFormat::Html),
            vec!["<a class='mr-1' target='_blank' href='/redcap/DataEntry/record_home.php?pid=14&id=1'>1</a> a@example.org"]
        );
        assert_eq!(f.format(&CellValue::text("1"), "record_id", OutputFormat::CsvLabels), vec!["1"]);

        let dag = CellValue::text("site_a");
        assert_eq!(f.format(&dag, "redcap_data_access_group", OutputFormat::Html), vec!["Site A"]);
        assert_eq!(f.format(&dag, "redcap_data_access_group", OutputFormat::CsvLabels), vec!["Site A"]);
        assert_eq!(f.format(&dag, "redcap_data_access_group", OutputFormat::CsvRaw), vec!["site_a"]);
        assert_eq!(f.format(&CellValue::text(""), "redcap_data_access_group", OutputFormat::Html), vec![""]);
    }

    #[test]
    fn test_file_link_in_html_only() {
        let host = host();
        let ctx = host.context();
        let f = ValueFormatter::new(&ctx, DisplayData::Both, false, CsvEncoder::default(), HashMap::new());

        let html = f.format(&CellValue::text("7"), "consent_file", OutputFormat::Html);
        assert!(html[0].contains("file_download.php?pid=14&id=7"));
        assert!(html[0].contains(">consent.pdf</a>"));
        assert_eq!(f.format(&CellValue::text("7"), "consent_file", OutputFormat::Csv), vec!["7"]);
    }

    #[test]
    fn test_unknown_column_passes_through() {
        let host = host();
        let ctx = host.context();
        let f = ValueFormatter::new(&ctx, DisplayData::Both, true, CsvEncoder::default(), HashMap::new());
        assert_eq!(f.format(&CellValue::text("x"), "note", OutputFormat::Html), vec!["x"]);
        assert_eq!(f.format(&CellValue::Formatted("a,b".into()), "symptoms", OutputFormat::Csv), vec!["a,b"]);
    }

    #[test]
    fn test_convert_ymd() {
        assert_eq!(convert_ymd("2024-03-09", "dmy"), "09-03-2024");
        assert_eq!(convert_ymd("2024-03-09 14:05", "mdy"), "03-09-2024 14:05");
        assert_eq!(convert_ymd("not a date", "mdy"), "not a date");
    }
}
