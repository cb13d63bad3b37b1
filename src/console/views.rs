use crossterm::style::Stylize;

use crate::debugger::variables::{DisplayUpdate, ResolvedRow};

const NAME_HEADER: &str = "Variable";
const VALUE_HEADER: &str = "Value";

/// Plain-text two-column table of resolved variables
pub fn render_table(rows: &[ResolvedRow]) -> Vec<String> {
    let name_width = rows
        .iter()
        .map(|row| row.display_name.chars().count())
        .chain(std::iter::once(NAME_HEADER.len()))
        .max()
        .unwrap_or(NAME_HEADER.len());
    let value_width = rows
        .iter()
        .map(|row| row.value.as_str().chars().count())
        .chain(std::iter::once(VALUE_HEADER.len()))
        .max()
        .unwrap_or(VALUE_HEADER.len());

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format!("{:<name_width$}  {}", NAME_HEADER, VALUE_HEADER));
    lines.push(format!("{}  {}", "-".repeat(name_width), "-".repeat(value_width)));
    for row in rows {
        lines.push(format!("{:<name_width$}  {}", row.display_name, row.value));
    }
    lines
}

/// Location line followed by the variable table
pub fn render_update(update: &DisplayUpdate, color: bool) -> String {
    let mut out = String::new();

    let header = format!("Stopped at {}", update.location);
    if color {
        out.push_str(&header.bold().cyan().to_string());
    } else {
        out.push_str(&header);
    }
    out.push('\n');

    if update.rows.is_empty() {
        out.push_str("(no variables)\n");
        return out;
    }

    let table = render_table(&update.rows);
    for (i, line) in table.iter().enumerate() {
        // rows start after the header and the rule
        let is_error = i >= 2 && update.rows[i - 2].value.is_error();
        if color && is_error {
            out.push_str(&line.as_str().red().to_string());
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Message line with a timestamp
pub fn render_message(text: &str, color: bool) -> String {
    let timestamp = chrono::Local::now().format("%H:%M:%S").to_string();
    if color {
        format!("[{}] {}", timestamp.dark_grey(), text.yellow())
    } else {
        format!("[{}] {}", timestamp, text)
    }
}
