//! TXT parser: BOM-aware decoding and whitespace normalization.

use crate::{new_document, ParseOptions};
use rag_model::{Document, ErrorKind, FileType, RagError};
use std::collections::BTreeMap;

/// Decode bytes using the BOM if present, else UTF-8, else lossy UTF-8.
/// Mirrors §4.A's TXT contract: UTF-8 BOM, UTF-16 BE/LE BOM, else UTF-8 if
/// it decodes cleanly, else ASCII if pure 7-bit, else fall back to UTF-8
/// (lossily, to guarantee this function never fails).
pub fn decode_text(bytes: &[u8], encoding_hint: Option<&str>) -> String {
    if let Some(hint) = encoding_hint {
        if let Some(enc) = encoding_rs::Encoding::for_label(hint.as_bytes()) {
            let (text, _, _) = enc.decode(bytes);
            return text.into_owned();
        }
    }

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let (text, _, _) = encoding_rs::UTF_16BE.decode(rest);
        return text.into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let (text, _, _) = encoding_rs::UTF_16LE.decode(rest);
        return text.into_owned();
    }

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Normalize line endings, collapse runs of horizontal whitespace, collapse
/// excess blank lines, and trim. Idempotent: `clean(clean(x)) == clean(x)`.
pub fn clean_text(input: &str) -> String {
    let normalized = input.replace("\r\n", "\n").replace('\r', "\n");

    let mut collapsed_spaces = String::with_capacity(normalized.len());
    let mut last_was_space = false;
    for ch in normalized.chars() {
        if ch == ' ' || ch == '\t' {
            if !last_was_space {
                collapsed_spaces.push(' ');
            }
            last_was_space = true;
        } else {
            collapsed_spaces.push(ch);
            last_was_space = false;
        }
    }

    let mut out = String::with_capacity(collapsed_spaces.len());
    let mut newline_run = 0usize;
    for ch in collapsed_spaces.chars() {
        if ch == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(ch);
            }
        } else {
            newline_run = 0;
            out.push(ch);
        }
    }

    out.trim().to_string()
}

pub fn parse(bytes: &[u8], file_name: &str, options: &ParseOptions) -> Result<Document, RagError> {
    let decoded = decode_text(bytes, options.encoding.as_deref());
    let cleaned = clean_text(&decoded);
    if cleaned.is_empty() {
        return Err(RagError::new(
            ErrorKind::ParsingError,
            format!("{file_name} contains no extractable text"),
        ));
    }
    let mut doc = new_document(
        file_name,
        FileType::Txt,
        FileType::Txt.default_mime_type().to_string(),
        cleaned,
        BTreeMap::new(),
    );
    doc.metadata.file_size = bytes.len() as u64;
    Ok(doc)
}
