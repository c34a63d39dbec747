//! Shared data model and error taxonomy used across the gateway's crates.

pub mod cell;
pub mod chunk;
pub mod document;
pub mod error;
pub mod query;

pub use cell::Cell;
pub use chunk::{Chunk, SourceInfo};
pub use document::{Document, DocumentMeta, FileType};
pub use error::{ErrorKind, RagError, Retryable};
pub use query::{Query, RetrievalResult, RetrievedChunk};

use std::collections::BTreeMap;

/// Free-form metadata bag attached to documents and chunks.
///
/// `BTreeMap` rather than `HashMap` so serialized output (and therefore
/// cache keys and test fixtures) is deterministic.
pub type MetadataMap = BTreeMap<String, serde_json::Value>;
