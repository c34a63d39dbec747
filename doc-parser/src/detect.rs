//! File-type detection: extension first, MIME type second, magic bytes for
//! confidence only (never a dispatch gate, per §4.A).

use rag_model::FileType;

#[derive(Debug, Clone)]
pub struct Detection {
    pub file_type: Option<FileType>,
    pub confidence: f32,
    pub ext_match: bool,
    pub mime_match: bool,
    pub magic_match: bool,
}

fn type_by_extension(file_name: &str) -> Option<FileType> {
    let ext = file_name.rsplit('.').next()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(FileType::Pdf),
        "docx" => Some(FileType::Docx),
        "txt" | "log" => Some(FileType::Txt),
        "md" | "markdown" => Some(FileType::Md),
        "csv" => Some(FileType::Csv),
        _ => None,
    }
}

fn type_by_mime(mime_type: &str) -> Option<FileType> {
    match mime_type {
        "application/pdf" => Some(FileType::Pdf),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Some(FileType::Docx)
        }
        "text/plain" => Some(FileType::Txt),
        "text/markdown" => Some(FileType::Md),
        "text/csv" => Some(FileType::Csv),
        _ => None,
    }
}

/// Magic-byte sniffing used only to raise or lower confidence, never to
/// override the extension/MIME decision.
fn magic_matches(bytes: &[u8], file_type: FileType) -> bool {
    match file_type {
        FileType::Pdf => bytes.starts_with(b"%PDF"),
        FileType::Docx => bytes.starts_with(b"PK\x03\x04"),
        _ => true,
    }
}

pub fn detect_file_type(bytes: &[u8], file_name: &str, mime_type: Option<&str>) -> Detection {
    let by_ext = type_by_extension(file_name);
    let by_mime = mime_type.and_then(type_by_mime);

    let file_type = by_ext.or(by_mime);
    let ext_match = by_ext.is_some();
    let mime_match = by_mime.is_some();
    let magic_match = file_type.map(|ft| magic_matches(bytes, ft)).unwrap_or(false);

    let confidence = match (ext_match, mime_match, magic_match) {
        (true, _, true) => 1.0,
        (true, _, false) => 0.7,
        (false, true, true) => 0.6,
        (false, true, false) => 0.4,
        _ => 0.0,
    };

    Detection {
        file_type,
        confidence,
        ext_match,
        mime_match,
        magic_match,
    }
}
