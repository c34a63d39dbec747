pub mod ai;
pub mod parser;
pub mod query;

use axum::extract::multipart::MultipartError;
use axum::http::HeaderMap;
use rag_model::{ErrorKind, RagError};

use crate::error::ApiError;

pub(crate) fn multipart_error(err: MultipartError) -> ApiError {
    ApiError(RagError::new(ErrorKind::BadRequest, format!("invalid multipart body: {err}")))
}

/// Best-effort client address for rate-limiting: the request carries no
/// authenticated subject, so every policy keyed `UserOrIp` falls back to IP.
pub(crate) fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "0.0.0.0".to_string())
}
