//! PDF parser: text extraction via `lopdf`, page count, and info-dict date
//! parsing. Error triage classifies the failure by message content since
//! `lopdf::Error` doesn't expose a structured password/corruption variant.

use crate::{new_document, ParseOptions};
use chrono::{DateTime, TimeZone, Utc};
use lopdf::Document as LopdfDocument;
use rag_model::{Document, ErrorKind, FileType, RagError};
use serde_json::json;
use std::collections::BTreeMap;

fn classify_load_error(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ErrorKind::PasswordProtected
    } else if lower.contains("invalid") || lower.contains("corrupt") || lower.contains("damaged")
        || lower.contains("not a pdf") || lower.contains("xref")
    {
        ErrorKind::FileCorrupted
    } else {
        ErrorKind::ExtractionError
    }
}

/// Parse a PDF info-dict date string of the form `D:YYYYMMDDhhmmss...`.
/// Malformed dates are silently omitted rather than failing the parse.
fn parse_pdf_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.strip_prefix("D:").unwrap_or(raw);
    if s.len() < 14 {
        return None;
    }
    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(4..6)?.parse().ok()?;
    let day: u32 = s.get(6..8)?.parse().ok()?;
    let hour: u32 = s.get(8..10)?.parse().ok()?;
    let minute: u32 = s.get(10..12)?.parse().ok()?;
    let second: u32 = s.get(12..14)?.parse().ok()?;
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

fn extract_text(doc: &LopdfDocument) -> String {
    let mut pages: Vec<String> = Vec::new();
    for page_id in doc.page_iter() {
        let text = doc.extract_text(&[page_id.0]).unwrap_or_default();
        pages.push(text);
    }
    pages.join("\n\n")
}

fn info_dict_string(doc: &LopdfDocument, key: &[u8]) -> Option<String> {
    let trailer = &doc.trailer;
    let info_ref = trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = doc.get_object(info_ref).ok()?.as_dict().ok()?;
    let value = info.get(key).ok()?;
    value
        .as_str()
        .ok()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

pub fn parse(bytes: &[u8], file_name: &str, options: &ParseOptions) -> Result<Document, RagError> {
    let lopdf_doc = LopdfDocument::load_mem(bytes).map_err(|e| {
        let message = e.to_string();
        RagError::new(classify_load_error(&message), format!("{file_name}: {message}"))
    })?;

    if lopdf_doc.is_encrypted() {
        return Err(RagError::new(
            ErrorKind::PasswordProtected,
            format!("{file_name} is password-protected"),
        ));
    }

    let page_count = lopdf_doc.get_pages().len();
    let text = extract_text(&lopdf_doc);
    let cleaned = crate::txt::clean_text(&text);

    if cleaned.trim().is_empty() {
        return Err(RagError::new(
            ErrorKind::ExtractionError,
            format!("{file_name} contains no extractable text"),
        ));
    }

    let mut extra = BTreeMap::new();
    extra.insert("pageCount".to_string(), json!(page_count));
    if let Some(title) = info_dict_string(&lopdf_doc, b"Title") {
        extra.insert("title".to_string(), json!(title));
    }
    if let Some(author) = info_dict_string(&lopdf_doc, b"Author") {
        extra.insert("author".to_string(), json!(author));
    }
    if let Some(created) = info_dict_string(&lopdf_doc, b"CreationDate").and_then(|s| parse_pdf_date(&s)) {
        extra.insert("createdAt".to_string(), json!(created.to_rfc3339()));
    }
    if let Some(modified) = info_dict_string(&lopdf_doc, b"ModDate").and_then(|s| parse_pdf_date(&s)) {
        extra.insert("modifiedAt".to_string(), json!(modified.to_rfc3339()));
    }

    let mut doc = new_document(
        file_name,
        FileType::Pdf,
        FileType::Pdf.default_mime_type().to_string(),
        cleaned,
        extra,
    );
    doc.metadata.file_size = bytes.len() as u64;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_date() {
        let d = parse_pdf_date("D:20230615143000").unwrap();
        assert_eq!(d.to_rfc3339(), "2023-06-15T14:30:00+00:00");
    }

    #[test]
    fn malformed_date_is_omitted_not_fatal() {
        assert!(parse_pdf_date("not-a-date").is_none());
        assert!(parse_pdf_date("D:2023").is_none());
    }

    #[test]
    fn classifies_password_errors() {
        assert_eq!(classify_load_error("document is password protected"), ErrorKind::PasswordProtected);
        assert_eq!(classify_load_error("stream is encrypted"), ErrorKind::PasswordProtected);
    }

    #[test]
    fn classifies_corruption_errors() {
        assert_eq!(classify_load_error("invalid xref table"), ErrorKind::FileCorrupted);
        assert_eq!(classify_load_error("file is corrupt"), ErrorKind::FileCorrupted);
    }

    #[test]
    fn unrecognized_errors_fall_back_to_extraction_error() {
        assert_eq!(classify_load_error("unexpected end of stream"), ErrorKind::ExtractionError);
    }

    #[test]
    fn malformed_bytes_surface_as_a_rag_error() {
        let err = parse(b"not a pdf at all", "broken.pdf", &ParseOptions::default()).unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::FileCorrupted | ErrorKind::ExtractionError
        ));
    }
}
