/// HTML escaping and allow-list filtering for cell content
use lazy_static::lazy_static;
use regex::{Captures, Regex};

const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "div", "em", "font", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img",
    "label", "li", "ol", "p", "pre", "s", "small", "span", "strike", "strong", "sub", "sup", "table", "tbody", "td",
    "th", "thead", "tr", "u", "ul",
];

lazy_static! {
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<(script|style)\b.*?</(script|style)\s*>").unwrap();
    static ref TAG: Regex = Regex::new(r"(?i)</?([a-z][a-z0-9]*)\b[^>]*>").unwrap();
    static ref EVENT_ATTR: Regex = Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap();
    static ref JS_URL: Regex = Regex::new(r"(?i)javascript\s*:").unwrap();
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Strip tags outside the allow-list and neutralize event-handler attributes and script URLs
pub fn filter_html(s: &str) -> String {
    if !s.contains('<') {
        return s.to_string();
    }
    let without_scripts = SCRIPT_BLOCK.replace_all(s, "");
    let tags_filtered = TAG.replace_all(&without_scripts, |caps: &Captures| {
        let name = caps[1].to_ascii_lowercase();
        if ALLOWED_TAGS.contains(&name.as_str()) {
            let tag = EVENT_ATTR.replace_all(&caps[0], "removed=");
            JS_URL.replace_all(&tag, "removed:").into_owned()
        } else {
            String::new()
        }
    });
    tags_filtered.into_owned()
}
