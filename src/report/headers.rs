//! Column titles: two-row HTML table headers and flat export titles.

use crate::html_filter::filter_html;
use crate::metadata::ProjectMetadata;
use crate::types::{ColumnHeader, DAG_FIELD, DisplayHeader, OutputFormat, ReportTable, ReshapeEvent};

pub const DEFAULT_LABEL_MAX: usize = 100;
const MIN_LABEL_MAX: usize = 21;

/// Shorten long labels, keeping the first `max - 20` and last 17 characters
pub fn truncate_label(label: &str, max: usize) -> String {
    let max = max.max(MIN_LABEL_MAX);
    let chars: Vec<char> = label.chars().collect();
    if chars.len() <= max {
        return label.to_string();
    }
    let head: String = chars[..max - 20].iter().collect();
    let tail: String = chars[chars.len() - 17..].iter().collect();
    format!("{} ... {}", head, tail)
}

/// Settings the title builders need besides the table itself
pub struct TitleOptions<'a> {
    pub project: &'a ProjectMetadata,
    pub display_header: DisplayHeader,
    pub reshape_event: ReshapeEvent,
}

impl TitleOptions<'_> {
    fn variable_div(&self, name: &str) -> String {
        if self.display_header == DisplayHeader::Label {
            String::new()
        } else {
            format!("<div class=\"rpthdr\">{}</div>", name)
        }
    }

    fn choice_label(&self, header: &ColumnHeader, code: &str) -> String {
        self.project
            .field(&header.field_name)
            .and_then(|f| f.choices().into_iter().find(|(c, _)| c == code).map(|(_, label)| label))
            .unwrap_or_else(|| code.to_string())
    }
}

/// `<thead>` with one row, or two when any column has sub-columns
pub fn html_header(table: &ReportTable, opts: &TitleOptions) -> String {
    let two_rows = table.has_split_columns && !table.is_sql;
    let mut out = String::from("<thead><tr>");
    for header in table.headers.iter().filter(|h| table.physical_width(h) > 0) {
        let attrs = if !two_rows || table.is_sql {
            String::new()
        } else if table.has_instance_columns(header) || !header.subvalues.is_empty() {
            format!(" colspan={}", table.physical_width(header))
        } else {
            " rowspan=2".to_string()
        };
        out.push_str(&format!("<th{}><div class=\"mr-3\">{}</div></th>", attrs, column_title(table, header, opts)));
    }
    out.push_str("</tr>");

    if two_rows {
        out.push_str("<tr>");
        for header in table.headers.iter().filter(|h| table.physical_width(h) > 0) {
            if table.has_instance_columns(header) {
                for i in 1..=header.instance_count {
                    if header.subvalues.is_empty() {
                        out.push_str(&format!("<th><div class=\"mr-3\">#{}</div></th>", i));
                    } else {
                        out.push_str(&checkbox_headers(header, Some(i), opts));
                    }
                }
            } else if !header.subvalues.is_empty() {
                out.push_str(&checkbox_headers(header, None, opts));
            }
        }
        out.push_str("</tr>");
    }
    out.push_str("</thead>");
    out
}

fn column_title(table: &ReportTable, header: &ColumnHeader, opts: &TitleOptions) -> String {
    let name = filter_html(&header.field_name);
    if table.is_sql {
        return match &header.label {
            Some(label) => format!(
                "{}<div class=\"rpthdr\">{}</div>",
                truncate_label(&filter_html(label), DEFAULT_LABEL_MAX),
                name
            ),
            None => name,
        };
    }

    let title = if opts.display_header == DisplayHeader::Variable {
        name.clone()
    } else if header.field_name == DAG_FIELD {
        header.display_label().to_string()
    } else {
        let mut event = String::new();
        if opts.project.longitudinal {
            event.push_str(&filter_html(&header.event_label));
        }
        if opts.project.multiple_arms {
            event.push(' ');
            event.push_str(&filter_html(&header.arm_name));
        }
        let event = format!("<span style=\"color:#800000;\">{}</span>", event);
        let field = truncate_label(&filter_html(header.display_label()), DEFAULT_LABEL_MAX);
        match opts.reshape_event {
            ReshapeEvent::EventThenField => format!("{}<br>{}", event, field),
            ReshapeEvent::FieldThenEvent => format!("{}<br>{}", field, event),
            ReshapeEvent::None => field,
        }
    };
    format!("{}{}", title, opts.variable_div(&name))
}

fn checkbox_headers(header: &ColumnHeader, instance: Option<u32>, opts: &TitleOptions) -> String {
    header
        .subvalues
        .iter()
        .map(|code| {
            let mut title = truncate_label(&opts.choice_label(header, code), DEFAULT_LABEL_MAX);
            if let Some(i) = instance {
                title = format!("#{} {}", i, title);
            }
            title.push_str(&opts.variable_div(&format!("{}___{}", header.field_name, code)));
            format!("<th><div class=\"mr-3\">{}</div></th>", filter_html(&title))
        })
        .collect()
}

/// One title per physical column for the delimited, JSON and XML exports
pub fn export_titles(table: &ReportTable, format: OutputFormat, opts: &TitleOptions) -> Vec<String> {
    table.headers.iter().flat_map(|h| header_export_titles(table, h, format, opts)).collect()
}

fn header_export_titles(
    table: &ReportTable,
    header: &ColumnHeader,
    format: OutputFormat,
    opts: &TitleOptions,
) -> Vec<String> {
    let labels = format == OutputFormat::CsvLabels;
    let project = opts.project;
    let (event, sep) = if table.is_sql {
        (String::new(), "")
    } else if labels {
        let event = if project.multiple_arms {
            format!("{} {}", header.event_label, header.arm_name)
        } else {
            header.event_label.clone()
        };
        (event, " ")
    } else {
        (header.event_unique_name.clone(), ".")
    };

    let label = truncate_label(header.display_label(), DEFAULT_LABEL_MAX);
    let var_names: Vec<String> = if header.subvalues.is_empty() {
        vec![if labels { label } else { header.field_name.clone() }]
    } else {
        header
            .subvalues
            .iter()
            .map(|code| {
                if labels {
                    format!("{} (choice={})", label, opts.choice_label(header, code))
                } else {
                    format!("{}___{}", header.field_name, code)
                }
            })
            .collect()
    };

    let instance_columns = table.has_instance_columns(header);
    let slots = if instance_columns { header.instance_count } else { 1 };
    let mut titles = Vec::with_capacity(slots as usize * var_names.len());
    for i in 1..=slots {
        let instance = if labels { format!("#{}", i) } else { i.to_string() };
        for var in &var_names {
            let title = if instance_columns && header.is_repeating_event {
                format!("{e}{s}{i}{s}{v}", e = event, s = sep, i = instance, v = var)
            } else if instance_columns && project.longitudinal {
                format!("{e}{s}{v}{s}{i}", e = event, s = sep, i = instance, v = var)
            } else if instance_columns {
                format!("{v}{s}{i}", s = sep, i = instance, v = var)
            } else if table.is_sql
                || !project.longitudinal
                || header.field_name == project.table_pk
                || header.field_name == DAG_FIELD
            {
                var.clone()
            } else {
                format!("{e}{s}{v}", e = event, s = sep, v = var)
            };
            titles.push(title);
        }
    }
    titles
}
