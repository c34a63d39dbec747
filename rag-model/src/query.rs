//! Query and retrieval result types.

use crate::chunk::Chunk;
use crate::document::FileType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    pub top_k: usize,
    pub min_similarity: f32,
    #[serde(default)]
    pub document_id_filter: Option<Vec<String>>,
    #[serde(default)]
    pub file_type_filter: Option<Vec<FileType>>,
    #[serde(default)]
    pub metadata_filter: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
    pub rank: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RetrievalResult {
    pub results: Vec<RetrievedChunk>,
    pub total_chunks: usize,
}
