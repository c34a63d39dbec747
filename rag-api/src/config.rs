//! Environment-variable-driven configuration (§6), parsed by hand rather
//! than through a config framework to match the rest of the workspace's
//! ambient style.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiProvider {
    OpenAi,
    Gemini,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub port: u16,
    pub node_env: String,
    pub cors_origins: Vec<String>,
    pub api_prefix: String,
    pub openai_api_key: Option<String>,
    pub openai_org_id: Option<String>,
    pub gemini_api_key: Option<String>,
    pub ai_provider: AiProvider,
    pub default_ai_model: String,
    pub default_ai_temperature: f32,
    pub default_ai_max_tokens: u32,
    pub ai_request_timeout: Duration,
    pub ai_max_retries: u32,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl GatewayConfig {
    /// Load from the process environment, falling back to the documented
    /// defaults for anything unset.
    pub fn from_env() -> Self {
        let ai_provider = match env_or("AI_PROVIDER", "openai").as_str() {
            "gemini" => AiProvider::Gemini,
            _ => AiProvider::OpenAi,
        };

        let cors_origins = env_opt("CORS_ORIGIN")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Self {
            port: parse_or("PORT", 3001),
            node_env: env_or("NODE_ENV", "development"),
            cors_origins,
            api_prefix: env_or("API_PREFIX", "/api"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_org_id: env_opt("OPENAI_ORG_ID"),
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            ai_provider,
            default_ai_model: env_or("DEFAULT_AI_MODEL", "gpt-4o-mini"),
            default_ai_temperature: parse_or("DEFAULT_AI_TEMPERATURE", 0.7),
            default_ai_max_tokens: parse_or("DEFAULT_AI_MAX_TOKENS", 1000),
            ai_request_timeout: Duration::from_millis(parse_or("AI_REQUEST_TIMEOUT", 30_000)),
            ai_max_retries: parse_or("AI_MAX_RETRIES", 3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_opt_treats_empty_string_as_unset() {
        env::set_var("RAG_API_TEST_EMPTY", "");
        assert_eq!(env_opt("RAG_API_TEST_EMPTY"), None);
        env::remove_var("RAG_API_TEST_EMPTY");
    }

    #[test]
    fn parse_or_falls_back_on_invalid_values() {
        env::set_var("RAG_API_TEST_PORT", "not-a-number");
        assert_eq!(parse_or("RAG_API_TEST_PORT", 3001u16), 3001);
        env::remove_var("RAG_API_TEST_PORT");
    }

    #[test]
    fn cors_origin_splits_on_commas_and_trims() {
        env::set_var("RAG_API_TEST_CORS", "https://a.com, https://b.com");
        let origins: Vec<String> = env_opt("RAG_API_TEST_CORS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap();
        assert_eq!(origins, vec!["https://a.com", "https://b.com"]);
        env::remove_var("RAG_API_TEST_CORS");
    }
}
