//! Document Processor (§4.E) and RAG Pipeline conductor (§4.F): the layer
//! that binds the parser registry, text chunker, embedding client, and
//! vector index into a single ingest-then-retrieve surface.

pub mod pipeline;
pub mod processor;

pub use pipeline::{
    PipelineConfig, QueryConfigOverride, QueryRequest, QueryResponse, QueryTiming, RagPipeline,
    RetrievalMetrics,
};
pub use processor::{DocumentProcessor, ProcessedBatch, ProcessorConfig, UploadedFile};
