/// CSV cell encoding
///
/// This module handles:
/// - Spreadsheet formula-injection neutralization
/// - Quoting of values holding quotes, delimiters or line breaks
/// - Decimal character substitution for float-like numbers
use lazy_static::lazy_static;
use regex::Regex;

pub const DEFAULT_DELIMITER: &str = ",";
pub const DEFAULT_DECIMAL: &str = ".";
pub const LINE_END: &str = "\n";

const QUOTE: char = '"';
const INJECTION_CHARS: [char; 4] = ['-', '@', '+', '='];

lazy_static! {
    // Leading whitespace is allowed so that a guarded negative number still counts as numeric
    static ref NUMERIC: Regex = Regex::new(r"^\s*[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?\s*$").unwrap();
}

/// Encoder for one delimiter/decimal-character pair
#[derive(Debug, Clone, PartialEq)]
pub struct CsvEncoder {
    pub delimiter: String,
    pub decimal: String,
}

impl Default for CsvEncoder {
    fn default() -> Self {
        Self { delimiter: DEFAULT_DELIMITER.to_string(), decimal: DEFAULT_DECIMAL.to_string() }
    }
}

impl CsvEncoder {
    pub fn new(delimiter: &str, decimal: &str) -> Self {
        Self { delimiter: delimiter.to_string(), decimal: decimal.to_string() }
    }

    /// Escape a single scalar value. Check order matters: injection guard, quoting, then numeric substitution.
    pub fn encode(&self, value: &str) -> String {
        let mut value = value.trim().to_string();

        if value.starts_with(INJECTION_CHARS) {
            value.insert(0, ' ');
        }

        if value.contains(QUOTE) {
            format!("{q}{}{q}", value.replace(QUOTE, "\"\""), q = QUOTE)
        } else if value.contains(self.delimiter.as_str()) || value.contains('\n') || value.contains('\r') {
            format!("{q}{}{q}", value, q = QUOTE)
        } else if is_float_like(&value) {
            value.replacen('.', &self.decimal, 1)
        } else {
            value
        }
    }

    /// Element-wise encoding for split checkbox cells
    pub fn encode_all(&self, values: &[String]) -> Vec<String> {
        values.iter().map(|v| self.encode(v)).collect()
    }

    /// Encode and join one line of cells
    pub fn encode_line(&self, values: &[String]) -> String {
        self.encode_all(values).join(&self.delimiter)
    }
}

pub fn is_numeric(value: &str) -> bool {
    NUMERIC.is_match(value)
}

/// Numeric strings that are not plain integers
pub fn is_float_like(value: &str) -> bool {
    is_numeric(value) && value.contains(['.', 'e', 'E'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injection_guard_adds_one_space() {
        let enc = CsvEncoder::default();
        for v in ["-1 dose", "@sum", "+x", "=A1+B1"] {
            let out = enc.encode(v);
            assert_eq!(out, format!(" {}", v));
        }
        assert_eq!(CsvEncoder::new(";", ",").encode("=HYPERLINK()"), " =HYPERLINK()");
    }

    #[test]
    fn test_quotes_are_doubled() {
        let enc = CsvEncoder::default();
        assert_eq!(enc.encode(r#"say "hi""#), r#""say ""hi""""#);
    }

    #[test]
    fn test_delimiter_and_newline_wrap() {
        let enc = CsvEncoder::default();
        assert_eq!(enc.encode("a,b"), "\"a,b\"");
        assert_eq!(enc.encode("line1\nline2"), "\"line1\nline2\"");
        assert_eq!(CsvEncoder::new("\t", ".").encode("a,b"), "a,b");
    }

    #[test]
    fn test_decimal_substitution() {
        let enc = CsvEncoder::new(";", ",");
        assert_eq!(enc.encode("3.14"), "3,14");
        assert_eq!(enc.encode("42"), "42");
        assert_eq!(enc.encode("1.2.3"), "1.2.3");
        // guarded negative number keeps its space and still gets the decimal character
        assert_eq!(enc.encode("-1.5"), " -1,5");
    }

    #[test]
    fn test_idempotent_on_safe_values() {
        let enc = CsvEncoder::default();
        for v in ["plain", "  padded  ", "-dash", "with space", "x.y"] {
            let once = enc.encode(v);
            assert_eq!(enc.encode(&once), once);
        }
    }

    #[test]
    fn test_float_like() {
        assert!(is_float_like("1.0"));
        assert!(is_float_like("1e5"));
        assert!(is_float_like(" -0.5"));
        assert!(!is_float_like("10"));
        assert!(!is_float_like("abc.def"));
    }
}
