pub mod expand;

pub const DELIMITER: char = ',';
pub const QUOTE: char = '"';

/// Split one line into fields.
///
/// A quote toggles the "inside quotes" flag and is dropped from the output.
/// There is no escape mechanism: `""` inside a quoted field toggles twice and
/// yields nothing. An unterminated quote swallows the rest of the line,
/// delimiters included.
pub fn parse_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            QUOTE => in_quotes = !in_quotes,
            DELIMITER if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);

    fields
}

/// Quote a field for output if it contains the delimiter, a quote or a newline.
pub fn escape_field(field: &str) -> String {
    if field.contains(DELIMITER) || field.contains(QUOTE) || field.contains('\n') {
        format!("{QUOTE}{}{QUOTE}", field.replace(QUOTE, "\"\""))
    } else {
        field.to_string()
    }
}

pub fn serialize_row<S: AsRef<str>>(fields: &[S]) -> String {
    fields
        .iter()
        .map(|f| escape_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(&DELIMITER.to_string())
}

/// Iterate the non-blank lines of a table, tolerating `\r\n` endings.
pub fn data_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
}
