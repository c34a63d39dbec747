//! Document Processor (§4.E): binds the parser registry, text chunker, and
//! embedding client into a single per-file ingest step, isolating failures
//! so one bad file never sinks a whole upload batch.

use doc_parser::chunker::{chunk_document_text, ChunkParams};
use doc_parser::ParseOptions;
use embedding_client::Embedder;
use rag_model::{Document, ErrorKind, RagError};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub min_chunk_size: usize,
    pub max_documents: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            chunk_size: 600,
            chunk_overlap: 100,
            min_chunk_size: 100,
            max_documents: 10,
        }
    }
}

#[derive(Debug, Default)]
pub struct ProcessedBatch {
    pub documents: Vec<Document>,
    pub failed: Vec<(String, RagError)>,
}

pub struct DocumentProcessor<E: Embedder> {
    embedder: Arc<E>,
    config: ProcessorConfig,
}

impl<E: Embedder> DocumentProcessor<E> {
    pub fn new(embedder: Arc<E>, config: ProcessorConfig) -> Self {
        Self { embedder, config }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn validate_batch(&self, files: &[UploadedFile]) -> Result<(), RagError> {
        let descriptors: Vec<(String, usize)> =
            files.iter().map(|f| (f.name.clone(), f.bytes.len())).collect();
        doc_parser::validate_batch(&descriptors, self.config.max_documents)
    }

    /// Process every file independently: a parsing, chunking, or embedding
    /// failure on one file is logged and skipped, not propagated. Fails
    /// only when every file in the batch fails.
    pub async fn process_files(&self, files: Vec<UploadedFile>) -> Result<ProcessedBatch, RagError> {
        self.validate_batch(&files)?;

        let mut batch = ProcessedBatch::default();
        for file in files {
            let name = file.name.clone();
            match self.process_one(file).await {
                Ok(doc) => batch.documents.push(doc),
                Err(err) => {
                    warn!(file = %name, error = %err, "skipping file during ingest");
                    batch.failed.push((name, err));
                }
            }
        }

        if batch.documents.is_empty() {
            return Err(RagError::new(
                ErrorKind::ParsingError,
                "no files in the batch could be processed",
            ));
        }

        Ok(batch)
    }

    async fn process_one(&self, file: UploadedFile) -> Result<Document, RagError> {
        let parse_options = ParseOptions {
            enable_chunking: false,
            ..Default::default()
        };
        let mut doc = doc_parser::parse_file(
            &file.bytes,
            &file.name,
            file.mime_type.as_deref(),
            &parse_options,
        )?;

        let params = ChunkParams {
            chunk_size: self.config.chunk_size,
            overlap: self.config.chunk_overlap,
            min_chunk_size: self.config.min_chunk_size,
            break_at_sentences: true,
            break_at_words: true,
        };
        let mut chunks = chunk_document_text(&doc.content, &doc.id, &doc.file_name, doc.file_type, &params);

        if chunks.is_empty() {
            return Err(RagError::new(
                ErrorKind::ParsingError,
                format!("{} produced no chunks", file.name),
            ));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self
            .embedder
            .embed_batch(&texts)
            .await
            .map_err(RagError::from)?;

        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) {
            chunk.embedding = embedding;
        }
        doc.chunks = chunks;

        Ok(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use embedding_client::{EmbedderError, EmbedderInfo};

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

    fn processor() -> DocumentProcessor<StubEmbedder> {
        DocumentProcessor::new(
            Arc::new(StubEmbedder(EmbedderInfo {
                provider: "stub".into(),
                embedding_model_id: "stub".into(),
                dimension: 2,
            })),
            ProcessorConfig::default(),
        )
    }

    #[tokio::test]
    async fn processes_a_single_text_file_with_embeddings() {
        let files = vec![UploadedFile {
            name: "a.txt".into(),
            bytes: b"Hello there. This is a test document.".to_vec(),
            mime_type: None,
        }];
        let batch = processor().process_files(files).await.unwrap();
        assert_eq!(batch.documents.len(), 1);
        assert!(!batch.documents[0].chunks.is_empty());
        assert_eq!(batch.documents[0].chunks[0].embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn isolates_a_bad_file_and_keeps_the_good_ones() {
        let files = vec![
            UploadedFile {
                name: "good.txt".into(),
                bytes: b"Good content here.".to_vec(),
                mime_type: None,
            },
            UploadedFile {
                name: "bad.xyz".into(),
                bytes: b"unsupported".to_vec(),
                mime_type: None,
            },
        ];
        let batch = processor().process_files(files).await.unwrap();
        assert_eq!(batch.documents.len(), 1);
        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.failed[0].0, "bad.xyz");
    }

    #[tokio::test]
    async fn zero_successful_files_is_a_parsing_error() {
        let files = vec![UploadedFile {
            name: "bad.xyz".into(),
            bytes: b"unsupported".to_vec(),
            mime_type: None,
        }];
        let err = processor().process_files(files).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ParsingError);
    }

    #[tokio::test]
    async fn rejects_batches_over_max_documents() {
        let files = vec![
            UploadedFile { name: "a.txt".into(), bytes: b"x".to_vec(), mime_type: None },
            UploadedFile { name: "b.txt".into(), bytes: b"x".to_vec(), mime_type: None },
        ];
        let mut config = ProcessorConfig::default();
        config.max_documents = 1;
        let processor = DocumentProcessor::new(
            Arc::new(StubEmbedder(EmbedderInfo {
                provider: "stub".into(),
                embedding_model_id: "stub".into(),
                dimension: 2,
            })),
            config,
        );
        let err = processor.process_files(files).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ValidationError);
    }
}
