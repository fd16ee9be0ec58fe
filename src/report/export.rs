//! Delimited, JSON and XML serialization of formatted physical rows.
//!
//! Every function here takes titles and rows that already went through the value formatter, so the three
//! encodings only differ in framing.

use crate::csv_encoder::{CsvEncoder, LINE_END};
use crate::error::{ReportError, ReportResult};
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use serde_json::{Map, Value};
use std::io::Cursor;

const CDATA_END: &str = "]]>";

/// Header line plus one line per row. No rows gives empty content.
pub fn csv_content(titles: &[String], rows: &[Vec<String>], encoder: &CsvEncoder) -> String {
    if rows.is_empty() {
        return String::new();
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(encoder.encode_line(titles));
    lines.extend(rows.iter().map(|row| encoder.encode_line(row)));
    lines.join(LINE_END)
}

/// Array of objects keyed by physical column title
pub fn json_content(titles: &[String], rows: &[Vec<String>]) -> ReportResult<String> {
    let records: Vec<Value> = rows
        .iter()
        .map(|row| {
            let object: Map<String, Value> =
                titles.iter().cloned().zip(row.iter().map(|v| Value::String(v.clone()))).collect();
            Value::Object(object)
        })
        .collect();
    Ok(serde_json::to_string(&records)?)
}

/// `<records>` with one `<item>` per row; values are wrapped in CDATA
pub fn xml_content(titles: &[String], rows: &[Vec<String>]) -> ReportResult<String> {
    let names: Vec<String> = titles.iter().map(|t| xml_name(t)).collect();
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    write(&mut writer, Event::Text(BytesText::new("\n")))?;
    write(&mut writer, Event::Start(BytesStart::new("records")))?;
    for row in rows {
        write(&mut writer, Event::Start(BytesStart::new("item")))?;
        for (name, value) in names.iter().zip(row) {
            write(&mut writer, Event::Start(BytesStart::new(name.as_str())))?;
            if value.contains(CDATA_END) {
                write(&mut writer, Event::Text(BytesText::new(value)))?;
            } else {
                write(&mut writer, Event::CData(BytesCData::new(value.as_str())))?;
            }
            write(&mut writer, Event::End(BytesEnd::new(name.as_str())))?;
        }
        write(&mut writer, Event::End(BytesEnd::new("item")))?;
    }
    write(&mut writer, Event::End(BytesEnd::new("records")))?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(|e| ReportError::Xml(e.to_string()))
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> ReportResult<()> {
    writer.write_event(event).map_err(|e| ReportError::Xml(e.to_string()))
}

/// Turn a column title into a valid element name
pub fn xml_name(title: &str) -> String {
    let mut name: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_csv_content() {
        let titles = strings(&["record_id", "note"]);
        let rows = vec![strings(&["1", "a,b"]), strings(&["2", "=SUM(A1)"])];
        let csv = csv_content(&titles, &rows, &CsvEncoder::default());
        assert_eq!(csv, "record_id,note\n1,\"a,b\"\n2, =SUM(A1)");
        assert_eq!(csv_content(&titles, &[], &CsvEncoder::default()), "");
    }

    #[test]
    fn test_json_keeps_column_order() {
        let titles = strings(&["record_id", "age", "baseline_arm_1.weight.1"]);
        let rows = vec![strings(&["1", "34.5", "70.1"])];
        let json = json_content(&titles, &rows).unwrap();
        assert_eq!(json, r#"[{"record_id":"1","age":"34.5","baseline_arm_1.weight.1":"70.1"}]"#);
        assert_eq!(json_content(&titles, &[]).unwrap(), "[]");
    }

    #[test]
    fn test_xml_wraps_values() {
        let titles = strings(&["record_id", "1st visit"]);
        let rows = vec![strings(&["1", "<b>x</b>"]), strings(&["2", "a]]>b"])];
        let xml = xml_content(&titles, &rows).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<records><item><record_id><![CDATA[1]]></record_id><_1st_visit><![CDATA[<b>x</b>]]></_1st_visit></item>"));
        assert!(xml.contains("<_1st_visit>a]]&gt;b</_1st_visit>"));
        assert!(xml.ends_with("</records>"));
    }

    #[test]
    fn test_xml_name() {
        assert_eq!(xml_name("baseline_arm_1.weight.2"), "baseline_arm_1.weight.2");
        assert_eq!(xml_name("age$Age"), "age_Age");
        assert_eq!(xml_name(".x"), "_.x");
    }
}
