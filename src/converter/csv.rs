use super::text::decode_utf8;
use super::{ConversionError, ConvertContext, DocumentConverter};

/// Delimited tables rendered as a Markdown pipe table. The first row is the header.
pub(crate) struct CsvConverter;

impl DocumentConverter for CsvConverter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["csv", "tsv"]
    }

    // Too easy to confuse with prose; only used on an explicit hint.
    fn sniff(&self, _bytes: &[u8]) -> bool {
        false
    }

    fn convert(&self, bytes: &[u8], ctx: &ConvertContext<'_>) -> Result<String, ConversionError> {
        let text = decode_utf8(bytes, "csv")?;
        let delimiter = if ctx.extension == Some("tsv") { '\t' } else { ',' };
        let rows = parse_rows(text, delimiter)?;
        Ok(render_table(&rows))
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────────

fn parse_rows(text: &str, delimiter: char) -> Result<Vec<Vec<String>>, ConversionError> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            c if c == delimiter => row.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(ConversionError::malformed("csv", "unterminated quoted field"));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }

    rows.retain(|r| !(r.len() == 1 && r[0].is_empty()));
    Ok(rows)
}

// ── Rendering ────────────────────────────────────────────────────────────────

fn render_table(rows: &[Vec<String>]) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return String::new();
    }

    let mut out = String::new();
    for (idx, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|i| row.get(i).map(|c| escape_cell(c)).unwrap_or_default())
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
        if idx == 0 {
            out.push_str(&format!("|{}\n", " --- |".repeat(width)));
        }
    }
    out.trim_end().to_string()
}

pub(crate) fn escape_cell(cell: &str) -> String {
    cell.trim()
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace('\n', " ")
}
