//! `/query/*` routes (§6): cached, rate-limited question answering over the
//! RAG pipeline with a non-RAG fallback when no documents are available.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_fabric::cache::{cache_key, ContextIdentifier};
use gateway_fabric::{retry, RequestContext};
use rag_model::{ErrorKind, RagError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use super::client_ip;
use crate::config::AiProvider;
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

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequestBody {
    question: String,
    #[serde(default)]
    context_files: Vec<String>,
    #[serde(default)]
    inline_context: Option<String>,
    settings: SettingsWire,
}

fn validate(body: &QueryRequestBody) -> Result<(), ApiError> {
    let err = |m: &str| ApiError(RagError::new(ErrorKind::ValidationError, m.to_string()));
    if body.question.is_empty() || body.question.chars().count() > 1000 {
        return Err(err("question must be between 1 and 1000 characters"));
    }
    if body.context_files.len() > 10 {
        return Err(err("contextFiles accepts at most 10 entries"));
    }
    if let Some(ctx) = &body.inline_context {
        if ctx.chars().count() > 5000 {
            return Err(err("inlineContext must be at most 5000 characters"));
        }
    }
    if !(0.0..=1.0).contains(&body.settings.temperature) {
        return Err(err("settings.temperature must be within [0, 1]"));
    }
    if !(100..=4000).contains(&body.settings.max_tokens) {
        return Err(err("settings.maxTokens must be within [100, 4000]"));
    }
    Ok(())
}

pub(crate) fn rate_limited_response(rejection: gateway_fabric::RateLimitRejection) -> Response {
    let mut response = ApiError(RagError::new(ErrorKind::RateLimitExceeded, "rate limit exceeded")).into_response();
    for (name, value) in rejection.headers() {
        if let Ok(value) = value.parse() {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

pub async fn query_handler(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<QueryRequestBody>) -> Result<Response, Response> {
    validate(&body).map_err(|e| e.into_response())?;

    let ctx = RequestContext { subject_id: None, ip: client_ip(&headers) };
    if let Err(rejection) = state.limiter.check(&ctx) {
        return Err(rate_limited_response(rejection));
    }

    let start = Instant::now();
    let settings_json = json!({
        "model": body.settings.model,
        "temperature": body.settings.temperature,
        "maxTokens": body.settings.max_tokens,
    });
    let context_id = if !body.context_files.is_empty() {
        ContextIdentifier::Files(body.context_files.clone())
    } else if let Some(ctx) = &body.inline_context {
        ContextIdentifier::Raw(ctx.clone())
    } else {
        ContextIdentifier::None
    };
    let key = cache_key(&body.question, &context_id, &settings_json);

    let (core, cached) = match state.cache.get(&key) {
        Some(core) => (core, true),
        None => {
            let core = compute_answer(&state, &body).await.map_err(|e| ApiError(e).into_response())?;
            state.cache.set(key, core.clone(), None);
            (core, false)
        }
    };

    let mut body_out = core;
    body_out["cached"] = json!(cached);
    body_out["responseTime"] = json!(start.elapsed().as_millis() as u64);
    Ok(Json(body_out).into_response())
}

async fn compute_answer(state: &AppState, body: &QueryRequestBody) -> Result<Value, RagError> {
    let pipeline_result = state
        .pipeline
        .query(rag_pipeline::QueryRequest {
            text: body.question.clone(),
            documents: Vec::new(),
            inline_context: body.inline_context.clone(),
            ..Default::default()
        })
        .await;

    let (context, rag_enabled, sources_json, metrics_json) = match pipeline_result {
        Ok(response) => {
            // `contextFiles` only ever names files, not document ids, so
            // narrowing happens here by post-filtering the retrieved chunks
            // rather than inside the vector index's own id-based filter.
            let retrieved: Vec<_> = if body.context_files.is_empty() {
                response.retrieved_chunks
            } else {
                response
                    .retrieved_chunks
                    .into_iter()
                    .filter(|r| body.context_files.contains(&r.chunk.source.file_name))
                    .collect()
            };

            let sources: Vec<Value> = retrieved
                .iter()
                .map(|r| {
                    json!({
                        "file": r.chunk.source.file_name,
                        "chunk": r.chunk.source.chunk_index,
                        "confidence": r.score,
                    })
                })
                .collect();
            let average_score = if retrieved.is_empty() {
                0.0
            } else {
                retrieved.iter().map(|r| r.score).sum::<f32>() / retrieved.len() as f32
            };
            let metrics = json!({
                "chunksUsed": retrieved.len(),
                "averageRetrievalScore": average_score,
                "contextRelevance": average_score,
            });
            let context = rag_pipeline::RagPipeline::<crate::state::ConfiguredEmbedder>::build_context(
                &retrieved,
                body.inline_context.as_deref(),
            );
            (context, true, sources, metrics)
        }
        Err(e) if e.kind == ErrorKind::NoDocuments => {
            (body.inline_context.clone().unwrap_or_default(), false, Vec::new(), Value::Null)
        }
        Err(e) => return Err(e),
    };

    let system = "You are a helpful assistant. Use the provided context to answer the question when it is relevant.";
    let user = if context.trim().is_empty() {
        body.question.clone()
    } else {
        format!("{context}\n\nQuestion: {}", body.question)
    };

    let completion = retry(
        || {
            state.llm.complete(CompletionRequest {
                system: system.to_string(),
                user: user.clone(),
                temperature: body.settings.temperature,
                max_tokens: body.settings.max_tokens,
                top_p: None,
                frequency_penalty: None,
                presence_penalty: None,
                model: body.settings.model.clone(),
            })
        },
        state.config.ai_max_retries.max(1),
        Duration::from_millis(500),
    )
    .await?;

    Ok(json!({
        "answer": completion.text,
        "sources": sources_json,
        "model": body.settings.model,
        "tokensUsed": completion.usage.total_tokens,
        "finishReason": completion.finish_reason,
        "rag": {
            "enabled": rag_enabled,
            "metrics": metrics_json,
            "sources": sources_json,
        },
    }))
}

pub async fn models_handler(State(state): State<AppState>) -> Json<Value> {
    let models = match state.config.ai_provider {
        AiProvider::OpenAi => vec!["gpt-4o", "gpt-4o-mini", "gpt-4-turbo", "gpt-3.5-turbo"],
        AiProvider::Gemini => vec!["gemini-1.5-pro", "gemini-1.5-flash"],
    };
    Json(json!({
        "models": models,
        "default": state.config.default_ai_model,
    }))
}

pub async fn settings_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "defaults": {
            "model": state.config.default_ai_model,
            "temperature": state.config.default_ai_temperature,
            "maxTokens": state.config.default_ai_max_tokens,
        },
        "limits": {
            "questionMaxLength": 1000,
            "contextFilesMax": 10,
            "inlineContextMaxLength": 5000,
            "temperatureRange": [0.0, 1.0],
            "maxTokensRange": [100, 4000],
        },
    }))
}

pub async fn cache_stats_handler(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::to_value(state.cache.stats()).unwrap_or(Value::Null))
}

pub async fn cache_clear_handler(State(state): State<AppState>) -> Json<Value> {
    state.cache.clear();
    Json(json!({"acknowledged": true}))
}

pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let llm_configured = match state.config.ai_provider {
        AiProvider::OpenAi => state.config.openai_api_key.is_some(),
        AiProvider::Gemini => state.config.gemini_api_key.is_some(),
    };
    let llm_status = if llm_configured { "ok" } else { "unconfigured" };

    let probe_key = "__health_probe__";
    state.cache.set(probe_key.to_string(), json!(true), Some(Duration::from_secs(1)));
    let cache_status = if state.cache.get(probe_key).is_some() { "ok" } else { "degraded" };

    let status = if llm_status == "ok" && cache_status == "ok" { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "services": {
            "llm": llm_status,
            "cache": cache_status,
        },
    }))
}
