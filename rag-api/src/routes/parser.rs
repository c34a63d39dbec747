//! `/parser/*` routes (§6): multipart ingestion into a [`rag_model::Document`]
//! with no embedding or indexing performed.

use axum::extract::Multipart;
use axum::Json;
use doc_parser::{detect, CsvOptions, ParseOptions};
use rag_model::{ErrorKind, RagError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use super::multipart_error;
use crate::error::ApiError;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsvOptionsWire {
    delimiter: Option<String>,
    has_header: Option<bool>,
    skip_empty_lines: Option<bool>,
}

impl From<CsvOptionsWire> for CsvOptions {
    fn from(wire: CsvOptionsWire) -> Self {
        CsvOptions {
            delimiter: wire.delimiter.and_then(|s| s.chars().next()),
            has_header: wire.has_header,
            skip_empty_lines: wire.skip_empty_lines,
        }
    }
}

struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
    mime_type: Option<String>,
}

async fn collect_one(multipart: &mut Multipart, field_name: &str) -> Result<(Option<UploadedFile>, BTreeMap<String, String>), ApiError> {
    let mut file = None;
    let mut fields = BTreeMap::new();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        if name == field_name {
            let upload_name = field.file_name().unwrap_or("upload").to_string();
            let mime_type = field.content_type().map(|s| s.to_string());
            let bytes = field.bytes().await.map_err(multipart_error)?.to_vec();
            file = Some(UploadedFile { name: upload_name, bytes, mime_type });
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            fields.insert(name, value);
        }
    }
    Ok((file, fields))
}

fn truthy(v: &str) -> bool {
    matches!(v, "true" | "1" | "yes")
}

pub async fn parse_handler(mut multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let (file, fields) = collect_one(&mut multipart, "file").await?;
    let file = file.ok_or_else(|| ApiError(RagError::new(ErrorKind::ValidationError, "missing multipart field 'file'")))?;

    let mut options = ParseOptions::default();
    if let Some(v) = fields.get("enableChunking") {
        options.enable_chunking = truthy(v);
    }
    if let Some(v) = fields.get("chunkSize") {
        if let Ok(n) = v.parse() {
            options.chunk_size = n;
        }
    }
    if let Some(v) = fields.get("chunkOverlap") {
        if let Ok(n) = v.parse() {
            options.chunk_overlap = n;
        }
    }
    if let Some(v) = fields.get("extractMetadata") {
        options.extract_metadata = truthy(v);
    }
    if let Some(v) = fields.get("encoding") {
        options.encoding = Some(v.clone());
    }
    if let Some(v) = fields.get("csvOptions") {
        if let Ok(wire) = serde_json::from_str::<CsvOptionsWire>(v) {
            options.csv_options = wire.into();
        }
    }

    let document = doc_parser::parse_file(&file.bytes, &file.name, file.mime_type.as_deref(), &options)?;

    let mut result = json!({
        "text": document.content,
        "metadata": document.metadata,
    });
    if options.enable_chunking {
        result["chunks"] = serde_json::to_value(&document.chunks).unwrap_or(Value::Null);
    }
    if let Some(rows) = document.metadata.extra.get("rows") {
        result["structuredData"] = rows.clone();
    }

    Ok(Json(json!({
        "success": true,
        "fileType": document.file_type.extension(),
        "fileName": document.file_name,
        "fileSize": file.bytes.len(),
        "result": result,
    })))
}

pub async fn supported_handler() -> Json<Value> {
    Json(json!({
        "formats": doc_parser::supported_formats(),
        "maxFileSizeBytes": ParseOptions::default().max_file_size_bytes,
    }))
}

pub async fn validate_handler(mut multipart: Multipart) -> Result<Json<Value>, ApiError> {
    let (file, _fields) = collect_one(&mut multipart, "file").await?;
    let file = match file {
        Some(f) => f,
        None => {
            return Ok(Json(json!({
                "valid": false,
                "fileName": "",
                "fileSize": 0,
                "error": "missing multipart field 'file'",
            })))
        }
    };

    if let Err(err) = doc_parser::validate_batch(&[(file.name.clone(), file.bytes.len())], 10) {
        return Ok(Json(json!({
            "valid": false,
            "fileName": file.name,
            "fileSize": file.bytes.len(),
            "error": err.message,
        })));
    }

    let detection = detect::detect_file_type(&file.bytes, &file.name, file.mime_type.as_deref());
    match detection.file_type {
        Some(file_type) => Ok(Json(json!({
            "valid": true,
            "fileName": file.name,
            "fileSize": file.bytes.len(),
            "fileType": file_type.extension(),
        }))),
        None => Ok(Json(json!({
            "valid": false,
            "fileName": file.name,
            "fileSize": file.bytes.len(),
            "error": "cannot determine file type",
        }))),
    }
}
