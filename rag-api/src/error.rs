//! HTTP error envelope (§6): every route handler returns `Result<_, RagError>`
//! and this module renders the failure as `{"error": {...}}` with the status
//! code from [`ErrorKind::status_code`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rag_model::RagError;
use serde::Serialize;

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a serde_json::Value>,
}

/// Thin wrapper so we can implement a foreign trait (`IntoResponse`) for a
/// foreign type (`RagError`) without leaking axum into `rag-model`.
pub struct ApiError(pub RagError);

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = ErrorEnvelope {
            error: ErrorBody {
                message: &self.0.message,
                code: self.0.kind.to_string(),
                details: self.0.details.as_ref(),
            },
        };
        (status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_model::ErrorKind;

    #[tokio::test]
    async fn renders_the_documented_envelope_shape() {
        let err = RagError::new(ErrorKind::ValidationError, "missing field 'text'");
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn status_follows_error_kind_mapping() {
        let err = RagError::new(ErrorKind::PasswordProtected, "pdf is encrypted");
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let err = RagError::new(ErrorKind::RateLimitExceeded, "too many requests");
        let response = ApiError(err).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
