//! DOCX parser: extract body text from `word/document.xml` and core
//! properties (title, author, dates, keywords) from `docProps/core.xml`,
//! both packaged in the OOXML zip container.

use crate::{new_document, ParseOptions};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use rag_model::{Document, ErrorKind, FileType, RagError};
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};

fn classify_zip_error(message: &str) -> ErrorKind {
    let lower = message.to_ascii_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ErrorKind::PasswordProtected
    } else if lower.contains("invalid") || lower.contains("corrupt") || lower.contains("damaged") {
        ErrorKind::FileCorrupted
    } else {
        ErrorKind::ExtractionError
    }
}

fn read_zip_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
    let mut file = archive.by_name(name).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    Some(contents)
}

/// Extract plain text from `word/document.xml`, inserting a paragraph break
/// at each `</w:p>` and a space at each `<w:tab/>`.
fn extract_body_text(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut out = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(t)) => {
                if let Ok(text) = t.unescape() {
                    out.push_str(&text);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"w:p" => {
                out.push('\n');
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"w:tab" => {
                out.push('\t');
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

/// Extract a set of Dublin Core / extended properties from
/// `docProps/core.xml`. Unknown tags are ignored.
fn extract_core_properties(xml: &str) -> BTreeMap<String, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut out = BTreeMap::new();
    let mut buf = Vec::new();
    let mut current: Option<String> = None;

    let tag_map: &[(&[u8], &str)] = &[
        (b"dc:title", "title"),
        (b"dc:subject", "subject"),
        (b"dc:creator", "creator"),
        (b"dcterms:created", "created"),
        (b"dcterms:modified", "modified"),
        (b"cp:keywords", "keywords"),
        (b"cp:category", "category"),
        (b"cp:lastModifiedBy", "lastModifiedBy"),
        (b"cp:revision", "revision"),
    ];

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name();
                current = tag_map
                    .iter()
                    .find(|(tag, _)| *tag == name.as_ref())
                    .map(|(_, key)| key.to_string());
            }
            Ok(Event::Text(t)) => {
                if let Some(key) = &current {
                    if let Ok(text) = t.unescape() {
                        out.insert(key.clone(), text.into_owned());
                    }
                }
            }
            Ok(Event::End(_)) => {
                current = None;
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    out
}

pub fn parse(bytes: &[u8], file_name: &str, options: &ParseOptions) -> Result<Document, RagError> {
    let cursor = Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|e| {
        RagError::new(classify_zip_error(&e.to_string()), format!("{file_name}: {e}"))
    })?;

    let body_xml = read_zip_entry(&mut archive, "word/document.xml").ok_or_else(|| {
        RagError::new(
            ErrorKind::FileCorrupted,
            format!("{file_name} is missing word/document.xml"),
        )
    })?;

    let raw_text = extract_body_text(&body_xml);
    let cleaned = crate::txt::clean_text(&raw_text);
    if cleaned.trim().is_empty() {
        return Err(RagError::new(
            ErrorKind::ExtractionError,
            format!("{file_name} contains no extractable text"),
        ));
    }

    let mut extra = BTreeMap::new();
    if let Some(core_xml) = read_zip_entry(&mut archive, "docProps/core.xml") {
        for (key, value) in extract_core_properties(&core_xml) {
            extra.insert(key, json!(value));
        }
    }

    let mut doc = new_document(
        file_name,
        FileType::Docx,
        FileType::Docx.default_mime_type().to_string(),
        cleaned,
        extra,
    );
    doc.metadata.file_size = bytes.len() as u64;
    Ok(doc)
}
