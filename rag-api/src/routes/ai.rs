//! `POST /ai/query` (§6): multipart file upload folded directly into the RAG
//! pipeline, then a single completion call over the retrieved context.

use axum::extract::{Multipart, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_fabric::{retry, RequestContext};
use rag_model::{ErrorKind, RagError};
use rag_pipeline::processor::UploadedFile;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use super::{client_ip, multipart_error};
use crate::error::ApiError;
use crate::llm::CompletionRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsWire {
    model: String,
    temperature: f32,
    max_tokens: u32,
}

pub async fn ai_query_handler(State(state): State<AppState>, headers: HeaderMap, mut multipart: Multipart) -> Result<Response, Response> {
    let ctx = RequestContext { subject_id: None, ip: client_ip(&headers) };
    if let Err(rejection) = state.ai_query_limiter.check(&ctx) {
        return Err(super::query::rate_limited_response(rejection));
    }
    state.throttler.throttle(&ctx.ip).await;

    run(&state, &mut multipart).await.map(|v| Json(v).into_response()).map_err(|e| ApiError(e).into_response())
}

async fn run(state: &AppState, multipart: &mut Multipart) -> Result<Value, RagError> {
    let start = Instant::now();

    let mut files = Vec::new();
    let mut selected_text = String::new();
    let mut inline_context: Option<String> = None;
    let mut settings: Option<SettingsWire> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(e).0)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "files" | "files[]" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let mime_type = field.content_type().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| multipart_error(e).0)?.to_vec();
                files.push(UploadedFile { name: file_name, bytes, mime_type });
            }
            "selectedText" => {
                selected_text = field.text().await.map_err(|e| multipart_error(e).0)?;
            }
            "inlineContext" => {
                inline_context = Some(field.text().await.map_err(|e| multipart_error(e).0)?);
            }
            "settings" => {
                let raw = field.text().await.map_err(|e| multipart_error(e).0)?;
                settings = Some(
                    serde_json::from_str(&raw)
                        .map_err(|e| RagError::new(ErrorKind::ValidationError, format!("invalid settings JSON: {e}")))?,
                );
            }
            _ => {}
        }
    }

    if selected_text.trim().is_empty() {
        return Err(RagError::new(ErrorKind::ValidationError, "selectedText must not be empty"));
    }
    let settings = settings.ok_or_else(|| RagError::new(ErrorKind::ValidationError, "missing multipart field 'settings'"))?;

    let pipeline_result = state
        .pipeline
        .query(rag_pipeline::QueryRequest {
            text: selected_text.clone(),
            documents: files,
            inline_context: inline_context.clone(),
            ..Default::default()
        })
        .await;

    let (context, rag_json) = match pipeline_result {
        Ok(response) => {
            let sources: Vec<Value> = response
                .retrieved_chunks
                .iter()
                .map(|r| {
                    json!({
                        "file": r.chunk.source.file_name,
                        "chunk": r.chunk.source.chunk_index,
                        "confidence": r.score,
                    })
                })
                .collect();
            let rag = json!({
                "enabled": true,
                "metrics": {
                    "chunksUsed": response.metrics.chunks_used,
                    "averageRetrievalScore": response.metrics.average_retrieval_score,
                    "contextRelevance": response.metrics.context_relevance,
                },
                "sources": sources,
            });
            (response.context, rag)
        }
        Err(e) if e.kind == ErrorKind::NoDocuments => (inline_context.unwrap_or_default(), json!({"enabled": false})),
        Err(e) => return Err(e),
    };

    let system = "You are a helpful assistant. Use the provided context to answer the question when it is relevant.";
    let user = if context.trim().is_empty() {
        selected_text.clone()
    } else {
        format!("{context}\n\nQuestion: {selected_text}")
    };

    let completion = retry(
        || {
            state.llm.complete(CompletionRequest {
                system: system.to_string(),
                user: user.clone(),
                temperature: settings.temperature,
                max_tokens: settings.max_tokens,
                top_p: None,
                frequency_penalty: None,
                presence_penalty: None,
                model: settings.model.clone(),
            })
        },
        state.config.ai_max_retries.max(1),
        Duration::from_millis(500),
    )
    .await?;

    Ok(json!({
        "response": completion.text,
        "model": settings.model,
        "usage": completion.usage,
        "processingTime": start.elapsed().as_millis() as u64,
        "rag": rag_json,
    }))
}
