//! Shared application state (§6): one instance per process, cloned cheaply
//! via `Arc` into every handler.

use crate::config::{AiProvider, GatewayConfig};
use crate::llm::{GeminiClient, LlmClient, OpenAiClient};
use embedding_client::cache::CachedEmbedder;
use embedding_client::http::{HttpEmbedder, HttpEmbedderConfig};
use gateway_fabric::{
    ai_query_policy, burst_policy, default_policy, global_policy, ip_policy, user_policy,
    MultiPolicyLimiter, ResponseCache, Throttler,
};
use rag_pipeline::{PipelineConfig, RagPipeline};
use std::sync::Arc;
use std::time::Duration;

const EMBEDDING_MODEL_ID: &str = "text-embedding-3-small";
const EMBEDDING_DIMENSION: usize = 1536;

pub type ConfiguredEmbedder = CachedEmbedder<HttpEmbedder>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub pipeline: Arc<RagPipeline<ConfiguredEmbedder>>,
    pub cache: Arc<ResponseCache>,
    pub limiter: Arc<MultiPolicyLimiter>,
    pub ai_query_limiter: Arc<MultiPolicyLimiter>,
    pub throttler: Arc<Throttler>,
    pub llm: Arc<dyn LlmClient>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let embedder = CachedEmbedder::new(HttpEmbedder::new(HttpEmbedderConfig {
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            api_key: config.openai_api_key.clone().unwrap_or_default(),
            embedding_model_id: EMBEDDING_MODEL_ID.to_string(),
            dimension: EMBEDDING_DIMENSION,
        }));

        let pipeline = RagPipeline::new(
            Arc::new(embedder),
            PipelineConfig::new(EMBEDDING_MODEL_ID, EMBEDDING_DIMENSION),
        );

        let llm: Arc<dyn LlmClient> = match config.ai_provider {
            AiProvider::OpenAi => Arc::new(OpenAiClient::new(
                config.openai_api_key.clone().unwrap_or_default(),
                config.openai_org_id.clone(),
            )),
            AiProvider::Gemini => Arc::new(GeminiClient::new(config.gemini_api_key.clone().unwrap_or_default())),
        };

        // Every inbound request chains through user -> ip -> global, matching
        // the table's intended layering; /ai/query additionally chains the
        // burst and ai_query policies ahead of it.
        let limiter = MultiPolicyLimiter::new(vec![user_policy(), ip_policy(), global_policy()]);
        let ai_query_limiter =
            MultiPolicyLimiter::new(vec![burst_policy(), ai_query_policy(), default_policy()]);

        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            cache: Arc::new(ResponseCache::default()),
            limiter: Arc::new(limiter),
            ai_query_limiter: Arc::new(ai_query_limiter),
            throttler: Arc::new(Throttler::new(5, Duration::from_secs(1))),
            llm,
        }
    }
}
