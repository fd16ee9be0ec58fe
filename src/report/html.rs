//! HTML table assembly and the report page wrapper.

use super::headers::{TitleOptions, html_header};
use crate::html_filter::{escape, filter_html};
use crate::types::{OutputDocument, ReportDefinition, ReportTable};

const TABLE_OPEN: &str = "<table id='report_table' class='dataTable cell-border' \
    style='table-layout:fixed;margin:0;font-family:Verdana;font-size:11px;'>";
const NO_RESULTS: &str = "No results were returned";

/// Table with no rows: an empty header row and a single notice row
pub fn empty_table() -> String {
    format!(
        "{}<thead><tr></tr></thead><tbody><tr class=\"odd\"><td style=\"color:#777;border:1px solid #ccc;\
         padding:10px 15px !important;\" colspan=\"0\">{}</td></tr></tbody></table>",
        TABLE_OPEN, NO_RESULTS
    )
}

/// Assemble the table from formatted physical rows
pub fn html_table(table: &ReportTable, rows: &[Vec<String>], opts: &TitleOptions) -> String {
    if rows.is_empty() {
        return empty_table();
    }
    let mut out = String::from(TABLE_OPEN);
    out.push_str(&html_header(table, opts));
    out.push_str("<tbody>");
    for (i, row) in rows.iter().enumerate() {
        let class = if i % 2 == 0 { "odd" } else { "even" };
        out.push_str(&format!("<tr class=\"{}\">", class));
        for value in row {
            out.push_str("<td>");
            out.push_str(&filter_html(value));
            out.push_str("</td>");
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
    out
}

/// Red notice shown in place of a report that could not be produced
pub fn error_notice(message: &str) -> String {
    format!("<div class=\"red my-5\">{}</div>", escape(message))
}

/// The report page: result count, title, optional description, then the table
pub fn report_page(definition: &ReportDefinition, document: &OutputDocument, public: bool) -> String {
    let count = if public {
        format!(
            "<div class=\"text-secondary fs12\">Number of results returned:<b style=\"margin-left:5px;\">{}</b></div>",
            document.row_count
        )
    } else {
        format!(
            "<div class=\"font-weight-bold\">Number of results returned:\
             <span style=\"margin-left:5px;color:#800000;font-size:15px;\">{}</span></div>",
            document.row_count
        )
    };
    let description_margin = if definition.description.is_empty() { 8 } else { 0 };
    let description = if definition.description.is_empty() {
        String::new()
    } else {
        format!(
            "<div id=\"this_report_description\" style=\"max-width:1100px;padding:5px 3px;line-height:15px;\">{}</div>",
            filter_html(&definition.description)
        )
    };
    format!(
        "<div id='report_div' style='margin:0 0 20px;'>{}<div id=\"this_report_title\" style=\"margin:10px 0 {}px;\
         padding:5px 3px;color:#800000;font-size:18px;font-weight:bold;\">{}</div>{}{}</div>",
        count,
        description_margin,
        filter_html(&definition.title),
        description,
        document.content
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table_notice() {
        let html = empty_table();
        assert!(html.starts_with("<table id='report_table'"));
        assert!(html.contains("<thead><tr></tr></thead>"));
        assert!(html.contains("colspan=\"0\">No results were returned</td>"));
    }

    #[test]
    fn test_report_page_description_optional() {
        let definition = ReportDefinition { title: "Weights".into(), ..Default::default() };
        let doc = OutputDocument { content: "<table></table>".into(), row_count: 3 };
        let page = report_page(&definition, &doc, false);
        assert!(page.contains("margin:10px 0 8px;"));
        assert!(!page.contains("this_report_description"));
        assert!(page.contains(">3</span>"));
        assert!(page.ends_with("<table></table></div>"));

        let definition = ReportDefinition { description: "<b>All</b> visits".into(), ..definition };
        let page = report_page(&definition, &doc, true);
        assert!(page.contains("<b>All</b> visits"));
        assert!(page.contains("<b style=\"margin-left:5px;\">3</b>"));
    }
}
