//! Vector Index (§4.D): owns a set of [`Document`]s in memory and serves
//! top-K similarity search. Writes are serialized behind a single
//! reader-writer lock; reads run concurrently, per §5's concurrency model.

pub mod similarity;

pub use similarity::SimilarityMetric;

use rag_model::{Chunk, Document, ErrorKind, FileType, Query, RagError, RetrievalResult, RetrievedChunk};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct AddDocumentsReport {
    pub inserted: Vec<String>,
    pub failed: Vec<(String, RagError)>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub chunk_count: usize,
    pub dimension: usize,
    pub metric: SimilarityMetric,
}

pub struct VectorIndex {
    dimension: usize,
    metric: SimilarityMetric,
    documents: RwLock<HashMap<String, Document>>,
}

impl VectorIndex {
    pub fn new(dimension: usize, metric: SimilarityMetric) -> Self {
        Self {
            dimension,
            metric,
            documents: RwLock::new(HashMap::new()),
        }
    }

    fn validate_document(&self, doc: &Document) -> Result<(), RagError> {
        for chunk in &doc.chunks {
            if chunk.embedding.is_empty() {
                return Err(RagError::new(
                    ErrorKind::VectorStoreError,
                    format!("chunk {} has no embedding", chunk.id),
                ));
            }
            if chunk.embedding.len() != self.dimension {
                return Err(RagError::new(
                    ErrorKind::VectorStoreError,
                    format!(
                        "chunk {} has embedding dimension {}, expected {}",
                        chunk.id,
                        chunk.embedding.len(),
                        self.dimension
                    ),
                ));
            }
        }
        Ok(())
    }

    /// All-or-nothing per document, best-effort across documents: a
    /// document whose chunks fail validation is skipped and logged rather
    /// than aborting documents already validated in this call.
    pub fn add_documents(&self, docs: Vec<Document>) -> AddDocumentsReport {
        let mut report = AddDocumentsReport::default();
        let mut store = self.documents.write().unwrap();
        for doc in docs {
            if let Err(err) = self.validate_document(&doc) {
                warn!(document_id = %doc.id, error = %err, "rejecting document from vector index");
                report.failed.push((doc.id, err));
                continue;
            }
            report.inserted.push(doc.id.clone());
            store.insert(doc.id.clone(), doc);
        }
        report
    }

    /// Idempotent: removing an unknown id is a no-op, not an error.
    pub fn remove_documents(&self, ids: &[String]) -> usize {
        let mut store = self.documents.write().unwrap();
        ids.iter().filter(|id| store.remove(*id).is_some()).count()
    }

    pub fn get_document(&self, id: &str) -> Option<Document> {
        self.documents.read().unwrap().get(id).cloned()
    }

    pub fn get_all_documents(&self) -> Vec<Document> {
        self.documents.read().unwrap().values().cloned().collect()
    }

    pub fn clear(&self) {
        self.documents.write().unwrap().clear();
    }

    pub fn stats(&self) -> IndexStats {
        let store = self.documents.read().unwrap();
        IndexStats {
            document_count: store.len(),
            chunk_count: store.values().map(|d| d.chunks.len()).sum(),
            dimension: self.dimension,
            metric: self.metric,
        }
    }

    fn passes_filters(
        doc: &Document,
        chunk: &Chunk,
        document_ids: &Option<HashSet<&str>>,
        file_types: &Option<HashSet<FileType>>,
        metadata_filter: &Option<std::collections::BTreeMap<String, serde_json::Value>>,
    ) -> bool {
        if let Some(ids) = document_ids {
            if !ids.contains(doc.id.as_str()) {
                return false;
            }
        }
        if let Some(types) = file_types {
            if !types.contains(&doc.file_type) {
                return false;
            }
        }
        if let Some(filter) = metadata_filter {
            for (k, v) in filter {
                if chunk.metadata.get(k) != Some(v) {
                    return false;
                }
            }
        }
        true
    }

    /// Search candidate chunks by filter, score under the configured
    /// metric, apply `min_similarity`, then sort by `(score desc, id asc)`.
    pub fn search(&self, query: &Query) -> Result<RetrievalResult, RagError> {
        if query.embedding.len() != self.dimension {
            return Err(RagError::new(
                ErrorKind::RetrievalError,
                format!(
                    "query embedding dimension {} does not match index dimension {}",
                    query.embedding.len(),
                    self.dimension
                ),
            ));
        }

        let document_ids: Option<HashSet<&str>> = query
            .document_id_filter
            .as_ref()
            .map(|ids| ids.iter().map(String::as_str).collect());
        let file_types: Option<HashSet<FileType>> =
            query.file_type_filter.as_ref().map(|types| types.iter().copied().collect());

        let store = self.documents.read().unwrap();

        let candidates: Vec<&Chunk> = store
            .values()
            .flat_map(|doc| {
                doc.chunks.iter().filter(|chunk| {
                    Self::passes_filters(doc, chunk, &document_ids, &file_types, &query.metadata_filter)
                })
            })
            .collect();

        let total_chunks = candidates.len();

        let mut scored: Vec<(f32, &Chunk)> = candidates
            .into_iter()
            .map(|chunk| (self.metric.score(&query.embedding, &chunk.embedding), chunk))
            .filter(|(score, _)| *score >= query.min_similarity)
            .collect();

        scored.sort_by(|(score_a, chunk_a), (score_b, chunk_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| chunk_a.id.cmp(&chunk_b.id))
        });

        let results = scored
            .into_iter()
            .take(query.top_k)
            .enumerate()
            .map(|(rank, (score, chunk))| RetrievedChunk {
                chunk: chunk.clone(),
                score,
                rank,
            })
            .collect();

        Ok(RetrievalResult { results, total_chunks })
    }
}
