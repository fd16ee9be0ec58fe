/// Console formatting module - Pure rendering concerns
///
/// This module handles console output of a rendered report:
/// - Column width allocation against the terminal width
/// - Table borders
/// - Text truncation and padding
///
/// It accepts titles and formatted rows from the report module and renders them to any `std::io::Write`.

use std::io::{self, Write};
use term::Terminal;
use term::color::Color;
use term::terminfo::TerminfoTerminal;
use terminal_size::{Width, terminal_size};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const DEFAULT_TERMINAL_WIDTH: usize = 120;
const MIN_COLUMN_WIDTH: usize = 6;
const MAX_COLUMN_WIDTH: usize = 40;

/// Writer for table output - configurable for color/plain text
pub struct TableWriter<W: Write> {
    writer: W,
    use_colors: bool,
}

impl<W: Write> TableWriter<W> {
    /// Create a new table writer
    pub fn new(writer: W, use_colors: bool) -> Self {
        Self { writer, use_colors }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Write formatted text, optionally with color
    fn write_colored(&mut self, text: &str, color: Color) -> io::Result<()> {
        if self.use_colors {
            if let Some(mut t) = TerminfoTerminal::new(&mut self.writer) {
                let _ = t.fg(color);
                t.write_all(text.as_bytes())?;
                let _ = t.reset();
                return Ok(());
            }
        }
        write!(self.writer, "{}", text)
    }

    fn write_border(&mut self, widths: &[usize], left: char, mid: char, right: char) -> io::Result<()> {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        writeln!(self.writer, "{}{}{}", left, segments.join(&mid.to_string()), right)
    }

    fn write_row(&mut self, cells: &[String], widths: &[usize], color: Option<Color>) -> io::Result<()> {
        let displays: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| truncate_with_padding(cells.get(i).map(|s| s.as_str()).unwrap_or(""), w.saturating_sub(2)))
            .collect();
        let row = format!("│ {} │", displays.join(" │ "));
        match color {
            Some(color) => self.write_colored(&row, color)?,
            None => write!(self.writer, "{}", row)?,
        }
        writeln!(self.writer)
    }

    /// Write the whole table: bordered title row, then one line per record
    pub fn write_table(&mut self, titles: &[String], rows: &[Vec<String>], terminal_width: usize) -> io::Result<()> {
        if titles.is_empty() {
            return writeln!(self.writer, "(no columns)");
        }
        let widths = column_widths(titles, rows, terminal_width);
        self.write_border(&widths, '┌', '┬', '┐')?;
        self.write_row(titles, &widths, Some(term::color::BRIGHT_CYAN))?;
        self.write_border(&widths, '├', '┼', '┤')?;
        for row in rows {
            self.write_row(&flatten_cells(row), &widths, None)?;
        }
        self.write_border(&widths, '└', '┴', '┘')?;
        writeln!(self.writer, "{} row(s)", rows.len())
    }
}

/// Line breaks and `<br>` separators would break the grid
fn flatten_cells(row: &[String]) -> Vec<String> {
    row.iter().map(|c| c.replace(['\n', '\r'], " ")).collect()
}

/// Width of each column including one space of padding on each side
///
/// Columns take their natural width up to a cap; when the total still exceeds the terminal, every column
/// shrinks proportionally but never below `MIN_COLUMN_WIDTH`.
pub fn column_widths(titles: &[String], rows: &[Vec<String>], terminal_width: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let content = rows
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| display_width(c))
                .chain(std::iter::once(display_width(title)))
                .max()
                .unwrap_or(0);
            (content + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect();

    // borders: one per column plus the closing one
    let available = terminal_width.saturating_sub(widths.len() + 1);
    let total: usize = widths.iter().sum();
    if total > available && total > 0 {
        for w in widths.iter_mut() {
            *w = (*w * available / total).max(MIN_COLUMN_WIDTH);
        }
    }
    widths
}

/// Terminal width, an explicit override, or 120
pub fn get_terminal_width(override_width: Option<usize>) -> usize {
    if let Some(w) = override_width {
        return w;
    }
    if let Some((Width(w), _)) = terminal_size() {
        w as usize
    } else {
        DEFAULT_TERMINAL_WIDTH
    }
}

//
// Text Formatting Utilities
//

/// Count the display width of a string, accounting for wide Unicode characters
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncate and pad string to exact width
pub fn truncate_with_padding(s: &str, width: usize) -> String {
    let display_w = display_width(s);

    if display_w > width {
        let mut result = String::new();
        let mut current_width = 0;

        // Reserve space for "..."
        let target_width = if width >= 3 { width - 3 } else { width };

        for c in s.chars() {
            let c_width = UnicodeWidthChar::width(c).unwrap_or(1);
            if current_width + c_width > target_width {
                break;
            }
            result.push(c);
            current_width += c_width;
        }

        if width >= 3 {
            result.push_str("...");
            current_width += 3;
        }

        if current_width < width {
            result.push_str(&" ".repeat(width - current_width));
        }

        result
    } else {
        format!("{}{}", s, " ".repeat(width - display_w))
    }
}

#[cfg(test)]
#[path = "console_format_test.rs"]
mod console_format_test;
