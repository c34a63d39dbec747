//! An ingested file, plus the chunks derived from it.

use crate::chunk::Chunk;
use crate::MetadataMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
    Md,
    Csv,
}

impl FileType {
    pub fn extension(self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
            FileType::Md => "md",
            FileType::Csv => "csv",
        }
    }

    pub fn default_mime_type(self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Txt => "text/plain",
            FileType::Md => "text/markdown",
            FileType::Csv => "text/csv",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub uploaded_at: DateTime<Utc>,
    pub file_size: u64,
    pub character_count: usize,
    /// Parser-specific fields: PDF page count, DOCX core properties, CSV
    /// headers/delimiter, MD structure outline, detection confidence, etc.
    pub extra: MetadataMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub file_name: String,
    pub file_type: FileType,
    pub mime_type: String,
    pub content: String,
    pub metadata: DocumentMeta,
    pub chunks: Vec<Chunk>,
}

impl Document {
    /// Invariant checked at construction time and in tests: chunk indices
    /// are contiguous and every chunk agrees on the total chunk count.
    pub fn chunk_indices_are_contiguous(&self) -> bool {
        let total = self.chunks.len();
        self.chunks.iter().enumerate().all(|(i, c)| {
            c.source.chunk_index == i && c.source.total_chunks == total
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::SourceInfo;
    use std::collections::BTreeMap;

    fn doc_with_chunks(n: usize) -> Document {
        let chunks = (0..n)
            .map(|i| Chunk {
                id: Chunk::make_id("d", i),
                document_id: "d".into(),
                text: format!("chunk {i}"),
                embedding: vec![],
                source: SourceInfo {
                    file_name: "f.txt".into(),
                    file_type: FileType::Txt,
                    chunk_index: i,
                    total_chunks: n,
                    start_offset: i * 10,
                    end_offset: i * 10 + 10,
                },
                metadata: BTreeMap::new(),
            })
            .collect();
        Document {
            id: "d".into(),
            file_name: "f.txt".into(),
            file_type: FileType::Txt,
            mime_type: "text/plain".into(),
            content: String::new(),
            metadata: DocumentMeta {
                uploaded_at: Utc::now(),
                file_size: 0,
                character_count: 0,
                extra: BTreeMap::new(),
            },
            chunks,
        }
    }

    #[test]
    fn contiguous_chunk_indices_pass() {
        assert!(doc_with_chunks(4).chunk_indices_are_contiguous());
    }

    #[test]
    fn gap_in_indices_fails() {
        let mut doc = doc_with_chunks(4);
        doc.chunks[2].source.chunk_index = 9;
        assert!(!doc.chunk_indices_are_contiguous());
    }
}
