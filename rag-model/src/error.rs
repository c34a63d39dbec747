//! The error taxonomy shared by every crate in the workspace.
//!
//! Each component either recovers locally or raises a [`RagError`] carrying
//! a stable [`ErrorKind`]; no untyped errors are meant to reach the response
//! envelope. Components with their own local error enum (`ParseError`,
//! `EmbedError`, ...) implement `From<LocalError> for RagError` at their
//! crate boundary.

use serde::Serialize;
use std::fmt;

/// Stable error codes surfaced to clients and used for retry/HTTP-status
/// classification. Names match the wire codes in the HTTP error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // Input
    ValidationError,
    UnsupportedFileType,
    PayloadTooLarge,
    BadRequest,
    // Content
    FileCorrupted,
    PasswordProtected,
    ExtractionError,
    ParsingError,
    // Upstream provider
    Authentication,
    InsufficientQuota,
    RateLimit,
    Timeout,
    ContextTooLarge,
    InvalidRequest,
    InvalidModel,
    ApiError,
    Unknown,
    // Internal
    VectorStoreError,
    EmbeddingError,
    RetrievalError,
    NoDocuments,
    ConfigError,
    InternalServerError,
    NotFound,
    RequestTimeout,
    RateLimitExceeded,
    AiQuotaExceeded,
    AiServiceError,
}

impl ErrorKind {
    /// HTTP status mapping table from the external interfaces spec.
    pub fn status_code(self) -> u16 {
        use ErrorKind::*;
        match self {
            ValidationError | BadRequest | UnsupportedFileType | InvalidRequest
            | InvalidModel | FileCorrupted | ExtractionError | ParsingError
            | PasswordProtected => 400,
            Authentication => 401,
            InsufficientQuota | AiQuotaExceeded => 403,
            NotFound => 404,
            Timeout | RequestTimeout => 408,
            PayloadTooLarge | ContextTooLarge => 413,
            RateLimit | RateLimitExceeded => 429,
            ApiError | AiServiceError | Unknown => 502,
            VectorStoreError | EmbeddingError | RetrievalError | NoDocuments | ConfigError
            | InternalServerError => 500,
        }
    }

    /// The non-retryable set from §4.I / §7: these are never retried by the
    /// retry engine, they're surfaced to the caller immediately.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimit | ErrorKind::Timeout | ErrorKind::ApiError | ErrorKind::Unknown
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "UNKNOWN".to_string());
        write!(f, "{s}")
    }
}

/// The error type every fallible operation in the gateway returns.
#[derive(Debug, Clone, thiserror::Error, Serialize)]
#[error("{kind}: {message}")]
pub struct RagError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl RagError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Anything that can answer whether it should be retried. Implemented by
/// [`RagError`] so the retry engine in `gateway-fabric` can stay generic
/// over whichever error type a provider call produces.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for RagError {
    fn is_retryable(&self) -> bool {
        RagError::is_retryable(self)
    }
}
