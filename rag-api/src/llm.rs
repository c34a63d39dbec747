//! LLM client collaborator (§6): a thin typed wrapper over the completion
//! providers, surfacing failures through the shared error taxonomy.

use async_trait::async_trait;
use rag_model::{ErrorKind, RagError};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub text: String,
    pub usage: Usage,
    pub finish_reason: Option<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RagError>;
}

/// Maps an upstream HTTP status to the shared error taxonomy, shared by
/// every provider wrapper in this module.
fn map_status(status: reqwest::StatusCode, body: &str) -> RagError {
    let kind = match status.as_u16() {
        401 => ErrorKind::Authentication,
        402 | 403 => ErrorKind::InsufficientQuota,
        408 => ErrorKind::Timeout,
        413 => ErrorKind::ContextTooLarge,
        429 => ErrorKind::RateLimit,
        400 | 422 => ErrorKind::InvalidRequest,
        404 => ErrorKind::InvalidModel,
        500..=599 => ErrorKind::ApiError,
        _ => ErrorKind::Unknown,
    };
    RagError::new(kind, format!("provider returned {status}: {body}"))
}

pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    org_id: Option<String>,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, org_id: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            org_id,
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Usage,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RagError> {
        let body = json!({
            "model": request.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "top_p": request.top_p,
            "frequency_penalty": request.frequency_penalty,
            "presence_penalty": request.presence_penalty,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
        });

        let mut req = self.client.post(&self.base_url).bearer_auth(&self.api_key).json(&body);
        if let Some(org) = &self.org_id {
            req = req.header("OpenAI-Organization", org);
        }

        let response = req
            .send()
            .await
            .map_err(|e| RagError::new(ErrorKind::ApiError, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| RagError::new(ErrorKind::ApiError, e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::new(ErrorKind::ApiError, "provider returned no choices"))?;

        Ok(CompletionResponse {
            text: choice.message.content,
            usage: parsed.usage,
            finish_reason: choice.finish_reason,
        })
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: u32,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: u32,
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

#[async_trait]
impl LlmClient for GeminiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, RagError> {
        let url = format!("{}/{}:generateContent?key={}", self.base_url, request.model, self.api_key);
        let body = json!({
            "contents": [{"parts": [{"text": format!("{}\n\n{}", request.system, request.user)}]}],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
                "topP": request.top_p,
            },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::new(ErrorKind::ApiError, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status(status, &text));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| RagError::new(ErrorKind::ApiError, e.to_string()))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| RagError::new(ErrorKind::ApiError, "provider returned no candidates"))?;

        let text = candidate
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect::<Vec<_>>()
            .join("");

        let usage = parsed
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or(Usage { prompt_tokens: 0, completion_tokens: 0, total_tokens: 0 });

        Ok(CompletionResponse {
            text,
            usage,
            finish_reason: candidate.finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_codes_to_the_shared_taxonomy() {
        assert_eq!(map_status(reqwest::StatusCode::UNAUTHORIZED, "").kind, ErrorKind::Authentication);
        assert_eq!(map_status(reqwest::StatusCode::TOO_MANY_REQUESTS, "").kind, ErrorKind::RateLimit);
        assert_eq!(map_status(reqwest::StatusCode::FORBIDDEN, "").kind, ErrorKind::InsufficientQuota);
        assert_eq!(map_status(reqwest::StatusCode::BAD_GATEWAY, "").kind, ErrorKind::ApiError);
        assert_eq!(map_status(reqwest::StatusCode::NOT_FOUND, "").kind, ErrorKind::InvalidModel);
    }
}
