//! CSV parser: delimiter auto-detection, RFC4180-style quoting (quotes may
//! embed the delimiter, newlines, and escaped quotes `""`), [`Cell`]
//! coercion per field, and a flattened pipe-delimited text rendering for
//! chunking/embedding.

use crate::{new_document, ParseOptions};
use rag_model::{Cell, Document, ErrorKind, FileType, RagError};
use serde_json::json;
use std::collections::BTreeMap;

const CANDIDATE_DELIMITERS: [char; 4] = [',', ';', '\t', '|'];

/// Pick the delimiter whose column count is the most frequent across the
/// first few non-empty lines, preferring `,` on ties.
fn detect_delimiter(sample: &str) -> char {
    let lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).take(5).collect();
    if lines.is_empty() {
        return ',';
    }

    let mut best = ',';
    let mut best_score = 0usize;
    for &delim in &CANDIDATE_DELIMITERS {
        let counts: Vec<usize> = lines.iter().map(|l| l.matches(delim).count()).collect();
        if counts.iter().all(|&c| c == 0) {
            continue;
        }
        let first = counts[0];
        let consistent = counts.iter().all(|&c| c == first);
        let score = if consistent { first * 10 } else { first };
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }
    best
}

/// Closes a field: unquoted fields have trailing whitespace trimmed,
/// quoted fields are taken verbatim.
fn finish_field(field: String, was_quoted: bool) -> (String, bool) {
    if was_quoted {
        (field, was_quoted)
    } else {
        (field.trim_end().to_string(), was_quoted)
    }
}

/// Split a raw CSV body into rows of raw field strings, honoring quoted
/// fields that may embed the delimiter, newlines, and `""` escapes.
fn tokenize_rows(input: &str, delimiter: char) -> Vec<Vec<(String, bool)>> {
    let mut rows = Vec::new();
    let mut row: Vec<(String, bool)> = Vec::new();
    let mut field = String::new();
    let mut was_quoted = false;
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();
    let mut saw_any_field = false;

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                was_quoted = true;
                saw_any_field = true;
            }
            c if c == delimiter => {
                row.push(finish_field(std::mem::take(&mut field), was_quoted));
                was_quoted = false;
                saw_any_field = true;
            }
            '\n' => {
                row.push(finish_field(std::mem::take(&mut field), was_quoted));
                was_quoted = false;
                rows.push(std::mem::take(&mut row));
                saw_any_field = false;
            }
            '\r' => {}
            c => {
                field.push(c);
                saw_any_field = true;
            }
        }
    }

    if saw_any_field || !field.is_empty() || !row.is_empty() {
        row.push(finish_field(field, was_quoted));
        rows.push(row);
    }

    rows
}

pub fn parse(bytes: &[u8], file_name: &str, options: &ParseOptions) -> Result<Document, RagError> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    let opts = &options.csv_options;

    let delimiter = opts.delimiter.unwrap_or_else(|| detect_delimiter(&text));
    let skip_empty = opts.skip_empty_lines.unwrap_or(true);

    let mut rows = tokenize_rows(&text, delimiter);
    if skip_empty {
        rows.retain(|r| !(r.len() == 1 && r[0].0.trim().is_empty()));
    }

    if rows.is_empty() {
        return Err(RagError::new(
            ErrorKind::ParsingError,
            format!("{file_name} contains no rows"),
        ));
    }

    let has_header = opts.has_header.unwrap_or(true);
    let header: Vec<String> = if has_header {
        rows[0].iter().map(|(v, _)| v.clone()).collect()
    } else {
        (0..rows[0].len()).map(|i| format!("column_{i}")).collect()
    };
    let data_rows = if has_header { &rows[1..] } else { &rows[..] };

    let mut structured_rows = Vec::with_capacity(data_rows.len());
    let mut text_lines = Vec::with_capacity(data_rows.len() + 1);
    text_lines.push(header.join(" | "));

    for row in data_rows {
        let mut obj = serde_json::Map::new();
        let mut rendered = Vec::with_capacity(row.len());
        for (i, (raw, was_quoted)) in row.iter().enumerate() {
            let column = header.get(i).cloned().unwrap_or_else(|| format!("column_{i}"));
            let cell = Cell::coerce(raw, *was_quoted);
            rendered.push(raw.clone());
            obj.insert(column, cell.to_json());
        }
        text_lines.push(rendered.join(" | "));
        structured_rows.push(serde_json::Value::Object(obj));
    }

    let content = text_lines.join("\n");

    let mut extra = BTreeMap::new();
    extra.insert("delimiter".to_string(), json!(delimiter.to_string()));
    extra.insert("hasHeader".to_string(), json!(has_header));
    extra.insert("columns".to_string(), json!(header));
    extra.insert("rowCount".to_string(), json!(structured_rows.len()));
    extra.insert("rows".to_string(), serde_json::Value::Array(structured_rows));

    let mut doc = new_document(
        file_name,
        FileType::Csv,
        FileType::Csv.default_mime_type().to_string(),
        content,
        extra,
    );
    doc.metadata.file_size = bytes.len() as u64;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_comma_delimiter() {
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
    }

    #[test]
    fn detects_semicolon_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
    }

    #[test]
    fn trailing_whitespace_outside_quotes_is_trimmed() {
        let input = "a,name \n1,John  ";
        let doc = parse(input.as_bytes(), "f.csv", &ParseOptions::default()).unwrap();
        let columns = doc.metadata.extra.get("columns").unwrap().as_array().unwrap();
        assert_eq!(columns[1], "name");
        let rows = doc.metadata.extra.get("rows").unwrap().as_array().unwrap();
        assert_eq!(rows[0]["name"], "John");
    }

    #[test]
    fn quoted_field_embeds_delimiter_and_newline() {
        let input = "name,note\n\"Smith, John\",\"line1\nline2\"";
        let doc = parse(input.as_bytes(), "f.csv", &ParseOptions::default()).unwrap();
        let rows = doc.metadata.extra.get("rows").unwrap().as_array().unwrap();
        assert_eq!(rows[0]["name"], "Smith, John");
        assert_eq!(rows[0]["note"], "line1\nline2");
    }

    #[test]
    fn escaped_double_quote_inside_quoted_field() {
        let input = "label\n\"she said \"\"hi\"\"\"";
        let doc = parse(input.as_bytes(), "f.csv", &ParseOptions::default()).unwrap();
        let rows = doc.metadata.extra.get("rows").unwrap().as_array().unwrap();
        assert_eq!(rows[0]["label"], "she said \"hi\"");
    }

    #[test]
    fn unquoted_numeric_and_boolean_coercion() {
        let input = "n,flag\n42,true";
        let doc = parse(input.as_bytes(), "f.csv", &ParseOptions::default()).unwrap();
        let rows = doc.metadata.extra.get("rows").unwrap().as_array().unwrap();
        assert_eq!(rows[0]["n"], 42.0);
        assert_eq!(rows[0]["flag"], true);
    }

    #[test]
    fn quoted_numeric_looking_value_stays_string() {
        let input = "id\n\"007\"";
        let doc = parse(input.as_bytes(), "f.csv", &ParseOptions::default()).unwrap();
        let rows = doc.metadata.extra.get("rows").unwrap().as_array().unwrap();
        assert_eq!(rows[0]["id"], "007");
    }

    #[test]
    fn no_header_generates_column_names() {
        let input = "1,2,3";
        let doc = parse(
            input.as_bytes(),
            "f.csv",
            &ParseOptions {
                csv_options: crate::CsvOptions {
                    has_header: Some(false),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();
        let cols = doc.metadata.extra.get("columns").unwrap().as_array().unwrap();
        assert_eq!(cols[0], "column_0");
    }
}
