//! Parser Registry (4.A) and Text Chunker (4.B): turn raw file bytes into a
//! normalized [`rag_model::Document`] with chunks, dispatching to a
//! format-specific extractor by extension, then MIME type, then giving up.

pub mod chunker;
pub mod csv;
pub mod detect;
pub mod docx;
pub mod markdown;
pub mod pdf;
pub mod txt;

use rag_model::{Document, ErrorKind, FileType, RagError};
use std::collections::BTreeMap;

/// CSV-specific dispatch options (§4.A).
#[derive(Debug, Clone, Default)]
pub struct CsvOptions {
    pub delimiter: Option<char>,
    pub has_header: Option<bool>,
    pub skip_empty_lines: Option<bool>,
}

/// All-optional knobs accepted by the parser registry.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub max_file_size_bytes: u64,
    pub enable_chunking: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extract_metadata: bool,
    pub encoding: Option<String>,
    pub preserve_formatting: bool,
    pub csv_options: CsvOptions,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_file_size_bytes: 10 * 1024 * 1024,
            enable_chunking: false,
            chunk_size: 4000,
            chunk_overlap: 200,
            extract_metadata: true,
            encoding: None,
            preserve_formatting: false,
            csv_options: CsvOptions::default(),
        }
    }
}

/// Parse a file's bytes into a [`Document`], dispatching by extension, then
/// MIME type, then failing with [`ErrorKind::UnsupportedFileType`].
pub fn parse_file(
    bytes: &[u8],
    file_name: &str,
    mime_type: Option<&str>,
    options: &ParseOptions,
) -> Result<Document, RagError> {
    if bytes.len() as u64 > options.max_file_size_bytes {
        return Err(RagError::new(
            ErrorKind::ValidationError,
            format!(
                "file {file_name} is {} bytes, exceeds the {} byte limit",
                bytes.len(),
                options.max_file_size_bytes
            ),
        ));
    }

    let detection = detect::detect_file_type(bytes, file_name, mime_type);
    let file_type = detection.file_type.ok_or_else(|| {
        RagError::new(
            ErrorKind::UnsupportedFileType,
            format!("cannot determine file type for {file_name}"),
        )
    })?;

    let mut doc = match file_type {
        FileType::Txt => txt::parse(bytes, file_name, options)?,
        FileType::Md => markdown::parse(bytes, file_name, options)?,
        FileType::Csv => csv::parse(bytes, file_name, options)?,
        FileType::Pdf => pdf::parse(bytes, file_name, options)?,
        FileType::Docx => docx::parse(bytes, file_name, options)?,
    };

    if options.extract_metadata {
        doc.metadata.extra.insert(
            "detection".to_string(),
            serde_json::json!({
                "confidence": detection.confidence,
                "ext_match": detection.ext_match,
                "mime_match": detection.mime_match,
                "magic_match": detection.magic_match,
            }),
        );
    }

    if options.enable_chunking {
        let chunks = chunker::chunk_document_text(
            &doc.content,
            &doc.id,
            &doc.file_name,
            doc.file_type,
            &chunker::ChunkParams {
                chunk_size: options.chunk_size,
                overlap: options.chunk_overlap,
                ..Default::default()
            },
        );
        doc.chunks = chunks;
        doc.metadata.extra.insert(
            "chunk_count".to_string(),
            serde_json::Value::from(doc.chunks.len()),
        );
    }

    Ok(doc)
}

/// Pre-flight validator used by the document processor (4.E) before any
/// parsing work happens.
pub fn validate_batch(
    files: &[(String, usize)],
    max_documents: usize,
) -> Result<(), RagError> {
    if files.len() > max_documents {
        return Err(RagError::new(
            ErrorKind::ValidationError,
            format!(
                "{} files exceeds the maximum of {max_documents} per request",
                files.len()
            ),
        ));
    }
    for (name, size) in files {
        if name.trim().is_empty() {
            return Err(RagError::new(ErrorKind::ValidationError, "file name must not be empty"));
        }
        if *size == 0 {
            return Err(RagError::new(
                ErrorKind::ValidationError,
                format!("file {name} has empty content"),
            ));
        }
    }
    Ok(())
}

/// Entry describing a supported format, for the `/parser/supported` route.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SupportedFormat {
    pub extension: String,
    pub mime_type: String,
    pub description: String,
    pub features: Vec<String>,
}

pub fn supported_formats() -> Vec<SupportedFormat> {
    vec![
        SupportedFormat {
            extension: "pdf".into(),
            mime_type: FileType::Pdf.default_mime_type().into(),
            description: "Portable Document Format".into(),
            features: vec!["text".into(), "metadata".into(), "chunking".into()],
        },
        SupportedFormat {
            extension: "docx".into(),
            mime_type: FileType::Docx.default_mime_type().into(),
            description: "Microsoft Word document".into(),
            features: vec!["text".into(), "metadata".into(), "chunking".into()],
        },
        SupportedFormat {
            extension: "txt".into(),
            mime_type: FileType::Txt.default_mime_type().into(),
            description: "Plain text".into(),
            features: vec!["text".into(), "chunking".into()],
        },
        SupportedFormat {
            extension: "md".into(),
            mime_type: FileType::Md.default_mime_type().into(),
            description: "Markdown".into(),
            features: vec!["text".into(), "outline".into(), "chunking".into()],
        },
        SupportedFormat {
            extension: "csv".into(),
            mime_type: FileType::Csv.default_mime_type().into(),
            description: "Comma-separated values".into(),
            features: vec!["structured-rows".into(), "chunking".into()],
        },
    ]
}

/// Shared helper: build the boilerplate portion of a [`Document`] once the
/// per-format module has produced content + extra metadata.
pub(crate) fn new_document(
    file_name: &str,
    file_type: FileType,
    mime_type: String,
    content: String,
    extra: BTreeMap<String, serde_json::Value>,
) -> Document {
    use chrono::Utc;
    use rag_model::DocumentMeta;

    let character_count = content.chars().count();
    Document {
        id: uuid_like_id(file_name),
        file_name: file_name.to_string(),
        file_type,
        mime_type,
        content,
        metadata: DocumentMeta {
            uploaded_at: Utc::now(),
            file_size: 0,
            character_count,
            extra,
        },
        chunks: Vec::new(),
    }
}

/// Mint a fresh, process-unique document id without pulling in a UUID crate
/// dependency: a monotonic counter plus a content-independent nonce is
/// enough, since uniqueness (not unguessability) is the only requirement.
fn uuid_like_id(seed: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    use std::hash::{Hash, Hasher};
    seed.hash(&mut hasher);
    let h = hasher.finish();
    format!("doc-{ts:x}-{n:x}-{h:08x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_fails_cleanly() {
        let options = ParseOptions::default();
        let err = parse_file(b"hello", "file.xyz", None, &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnsupportedFileType);
    }

    #[test]
    fn oversized_file_is_rejected_before_parsing() {
        let options = ParseOptions {
            max_file_size_bytes: 4,
            ..Default::default()
        };
        let err = parse_file(b"way too long", "f.txt", None, &options).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
    }

    #[test]
    fn validate_batch_rejects_too_many_files() {
        let files = vec![("a.txt".to_string(), 10), ("b.txt".to_string(), 10)];
        assert!(validate_batch(&files, 1).is_err());
        assert!(validate_batch(&files, 2).is_ok());
    }

    #[test]
    fn validate_batch_rejects_empty_content() {
        let files = vec![("a.txt".to_string(), 0)];
        assert!(validate_batch(&files, 10).is_err());
    }
}
