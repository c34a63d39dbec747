//! The retrieval atom.

use crate::document::FileType;
use crate::MetadataMap;
use serde::{Deserialize, Serialize};

/// Where a chunk came from within its parent document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInfo {
    pub file_name: String,
    pub file_type: FileType,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// A bounded substring of a document carrying its own embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable, derived from `(document_id, chunk_index)`.
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub source: SourceInfo,
    pub metadata: MetadataMap,
}

impl Chunk {
    pub fn make_id(document_id: &str, chunk_index: usize) -> String {
        format!("{document_id}#{chunk_index}")
    }
}
