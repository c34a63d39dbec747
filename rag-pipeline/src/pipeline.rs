//! RAG Pipeline (§4.F): the conductor binding the vector index, embedding
//! client, and document processor into `index_files`/`query`.

use crate::processor::{DocumentProcessor, ProcessedBatch, ProcessorConfig, UploadedFile};
use embedding_client::Embedder;
use rag_model::{ErrorKind, Query, RagError, RetrievedChunk};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::warn;
use vector_index::{IndexStats, SimilarityMetric, VectorIndex};

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub min_similarity: f32,
    pub embedding_model: String,
    pub embedding_dimension: usize,
    pub max_documents: usize,
    pub cache_embeddings: bool,
    pub similarity_metric: SimilarityMetric,
}

impl PipelineConfig {
    pub fn new(embedding_model: impl Into<String>, embedding_dimension: usize) -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
            top_k: 5,
            min_similarity: 0.3,
            embedding_model: embedding_model.into(),
            embedding_dimension,
            max_documents: 10,
            cache_embeddings: true,
            similarity_metric: SimilarityMetric::Cosine,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryConfigOverride {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Default)]
pub struct QueryRequest {
    pub text: String,
    pub documents: Vec<UploadedFile>,
    pub config_override: QueryConfigOverride,
    pub inline_context: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalMetrics {
    pub chunks_used: usize,
    pub average_retrieval_score: f32,
    pub context_relevance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryTiming {
    pub total_ms: u64,
    pub embedding_ms: u64,
    pub retrieval_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    /// Left empty: generation is delegated to the LLM client by the caller.
    pub answer: String,
    pub retrieved_chunks: Vec<RetrievedChunk>,
    pub sources: Vec<String>,
    pub context: String,
    pub metrics: RetrievalMetrics,
    pub timing: QueryTiming,
}

pub struct RagPipeline<E: Embedder> {
    index: Arc<VectorIndex>,
    embedder: Arc<E>,
    processor: DocumentProcessor<E>,
    config: RwLock<PipelineConfig>,
    populated: AtomicBool,
}

impl<E: Embedder> RagPipeline<E> {
    pub fn new(embedder: Arc<E>, config: PipelineConfig) -> Self {
        let index = Arc::new(VectorIndex::new(config.embedding_dimension, config.similarity_metric));
        let processor = DocumentProcessor::new(
            embedder.clone(),
            ProcessorConfig {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
                min_chunk_size: 100,
                max_documents: config.max_documents,
            },
        );
        Self {
            index,
            embedder,
            processor,
            config: RwLock::new(config),
            populated: AtomicBool::new(false),
        }
    }

    pub async fn index_files(&self, files: Vec<UploadedFile>) -> Result<ProcessedBatch, RagError> {
        let batch = self.processor.process_files(files).await?;
        let report = self.index.add_documents(batch.documents.clone());
        if !report.failed.is_empty() {
            warn!(failed = report.failed.len(), "some documents rejected by the vector index");
        }
        self.populated.store(true, Ordering::SeqCst);
        Ok(batch)
    }

    pub async fn query(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
        let start = Instant::now();

        if !self.populated.load(Ordering::SeqCst) && request.documents.is_empty() {
            return Err(RagError::new(
                ErrorKind::NoDocuments,
                "no documents indexed and none supplied with the request",
            ));
        }

        if !self.populated.load(Ordering::SeqCst) {
            self.index_files(request.documents).await?;
        }

        let embed_start = Instant::now();
        let query_embedding = self.embedder.embed(&request.text).await.map_err(RagError::from)?;
        let embedding_ms = embed_start.elapsed().as_millis() as u64;

        let config = self.config.read().unwrap().clone();
        let top_k = request.config_override.top_k.unwrap_or(config.top_k);
        let min_similarity = request.config_override.min_similarity.unwrap_or(config.min_similarity);

        let retrieval_start = Instant::now();
        let query = Query {
            text: request.text.clone(),
            embedding: query_embedding,
            top_k,
            min_similarity,
            ..Default::default()
        };
        let retrieval = self.index.search(&query)?;
        let retrieval_ms = retrieval_start.elapsed().as_millis() as u64;

        let context = Self::build_context(&retrieval.results, request.inline_context.as_deref());

        let average_retrieval_score = if retrieval.results.is_empty() {
            0.0
        } else {
            retrieval.results.iter().map(|r| r.score).sum::<f32>() / retrieval.results.len() as f32
        };

        let mut sources: Vec<String> = Vec::new();
        for r in &retrieval.results {
            if !sources.contains(&r.chunk.source.file_name) {
                sources.push(r.chunk.source.file_name.clone());
            }
        }

        Ok(QueryResponse {
            answer: String::new(),
            metrics: RetrievalMetrics {
                chunks_used: retrieval.results.len(),
                average_retrieval_score,
                context_relevance: average_retrieval_score,
            },
            retrieved_chunks: retrieval.results,
            sources,
            context,
            timing: QueryTiming {
                total_ms: start.elapsed().as_millis() as u64,
                embedding_ms,
                retrieval_ms,
            },
        })
    }

    /// Deterministic, pure string formatter: same input always yields the
    /// same output, independent of wall-clock time or prior calls.
    pub fn build_context(retrieved: &[RetrievedChunk], inline_context: Option<&str>) -> String {
        let mut out = String::from("=== RETRIEVED CONTEXT FROM DOCUMENTS ===\n");
        for (i, r) in retrieved.iter().enumerate() {
            out.push_str(&format!(
                "--- Source {}: {} (Chunk {}/{}, Relevance: {:.1}%) ---\n",
                i + 1,
                r.chunk.source.file_name,
                r.chunk.source.chunk_index + 1,
                r.chunk.source.total_chunks,
                r.score * 100.0,
            ));
            out.push_str(&r.chunk.text);
            out.push_str("\n\n");
        }

        if let Some(inline) = inline_context {
            if !inline.trim().is_empty() {
                out.push_str("=== ADDITIONAL CONTEXT ===\n");
                out.push_str(inline);
            }
        }

        out
    }

    pub fn clear_index(&self) {
        self.index.clear();
        self.populated.store(false, Ordering::SeqCst);
    }

    pub fn get_stats(&self) -> IndexStats {
        self.index.stats()
    }

    pub fn get_config(&self) -> PipelineConfig {
        self.config.read().unwrap().clone()
    }

    pub fn update_config(&self, new_config: PipelineConfig) {
        *self.config.write().unwrap() = new_config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use embedding_client::{EmbedderError, EmbedderInfo};
    use rag_model::{Chunk, SourceInfo};
    use std::collections::BTreeMap;

    struct StubEmbedder(EmbedderInfo);

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn info(&self) -> &EmbedderInfo {
            &self.0
        }
    }

    fn pipeline() -> RagPipeline<StubEmbedder> {
        RagPipeline::new(
            Arc::new(StubEmbedder(EmbedderInfo {
                provider: "stub".into(),
                embedding_model_id: "stub".into(),
                dimension: 2,
            })),
            PipelineConfig::new("stub", 2),
        )
    }

    #[tokio::test]
    async fn querying_before_any_documents_fails_with_no_documents() {
        let err = pipeline()
            .query(QueryRequest {
                text: "what is this about?".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoDocuments);
    }

    #[tokio::test]
    async fn index_then_query_returns_retrieved_chunks() {
        let p = pipeline();
        p.index_files(vec![UploadedFile {
            name: "doc.txt".into(),
            bytes: b"The quick brown fox jumps over the lazy dog.".to_vec(),
            mime_type: None,
        }])
        .await
        .unwrap();

        let response = p
            .query(QueryRequest {
                text: "fox".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(!response.retrieved_chunks.is_empty());
        assert_eq!(response.answer, "");
        assert!(response.context.starts_with("=== RETRIEVED CONTEXT FROM DOCUMENTS ==="));
    }

    #[tokio::test]
    async fn query_ingests_inline_documents_when_not_yet_populated() {
        let p = pipeline();
        let response = p
            .query(QueryRequest {
                text: "fox".into(),
                documents: vec![UploadedFile {
                    name: "doc.txt".into(),
                    bytes: b"The quick brown fox jumps over the lazy dog.".to_vec(),
                    mime_type: None,
                }],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!response.retrieved_chunks.is_empty());
    }

    fn chunk(file_name: &str, idx: usize, total: usize, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: format!("d#{idx}"),
                document_id: "d".into(),
                text: text.into(),
                embedding: vec![],
                source: SourceInfo {
                    file_name: file_name.into(),
                    file_type: rag_model::FileType::Txt,
                    chunk_index: idx,
                    total_chunks: total,
                    start_offset: 0,
                    end_offset: text.len(),
                },
                metadata: BTreeMap::new(),
            },
            score: 0.876,
            rank: idx,
        }
    }

    #[test]
    fn build_context_formats_header_lines_exactly() {
        let retrieved = vec![chunk("report.pdf", 0, 3, "Some retrieved text.")];
        let context = RagPipeline::<StubEmbedder>::build_context(&retrieved, None);
        assert!(context.starts_with("=== RETRIEVED CONTEXT FROM DOCUMENTS ===\n"));
        assert!(context.contains("--- Source 1: report.pdf (Chunk 1/3, Relevance: 87.6%) ---\n"));
        assert!(context.contains("Some retrieved text."));
        assert!(!context.contains("ADDITIONAL CONTEXT"));
    }

    #[test]
    fn build_context_appends_inline_context_section() {
        let retrieved = vec![chunk("a.txt", 0, 1, "text")];
        let context = RagPipeline::<StubEmbedder>::build_context(&retrieved, Some("extra notes"));
        assert!(context.contains("=== ADDITIONAL CONTEXT ===\nextra notes"));
    }

    #[test]
    fn build_context_is_pure_and_idempotent() {
        let retrieved = vec![chunk("a.txt", 0, 1, "text")];
        let once = RagPipeline::<StubEmbedder>::build_context(&retrieved, None);
        let twice = RagPipeline::<StubEmbedder>::build_context(&retrieved, None);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn clear_index_resets_populated_state() {
        let p = pipeline();
        p.index_files(vec![UploadedFile {
            name: "doc.txt".into(),
            bytes: b"Some content to index.".to_vec(),
            mime_type: None,
        }])
        .await
        .unwrap();
        p.clear_index();
        let err = p
            .query(QueryRequest { text: "anything".into(), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoDocuments);
    }
}
