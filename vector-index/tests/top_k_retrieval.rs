//! End-to-end retrieval over a synthetic basis-vector corpus.

use rag_model::{Chunk, Document, DocumentMeta, FileType, Query, SourceInfo};
use std::collections::BTreeMap;
use vector_index::{SimilarityMetric, VectorIndex};

fn basis_vector(dim: usize, i: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[i] = 1.0;
    v
}

fn basis_document(dim: usize, i: usize) -> Document {
    let embedding = basis_vector(dim, i);
    let chunk = Chunk {
        id: format!("basis-{i}"),
        document_id: format!("doc-{i}"),
        text: format!("basis chunk {i}"),
        embedding,
        source: SourceInfo {
            file_name: format!("basis-{i}.txt"),
            file_type: FileType::Txt,
            chunk_index: 0,
            total_chunks: 1,
            start_offset: 0,
            end_offset: 1,
        },
        metadata: BTreeMap::new(),
    };
    Document {
        id: format!("doc-{i}"),
        file_name: format!("basis-{i}.txt"),
        file_type: FileType::Txt,
        mime_type: "text/plain".into(),
        content: format!("basis chunk {i}"),
        metadata: DocumentMeta {
            uploaded_at: chrono::Utc::now(),
            file_size: 1,
            character_count: 1,
            extra: BTreeMap::new(),
        },
        chunks: vec![chunk],
    }
}

#[test]
fn top_2_over_ten_basis_vectors_favors_the_nearer_axis() {
    const DIM: usize = 10;
    let index = VectorIndex::new(DIM, SimilarityMetric::Cosine);
    let documents = (0..DIM).map(|i| basis_document(DIM, i)).collect();
    let report = index.add_documents(documents);
    assert_eq!(report.inserted.len(), DIM);
    assert!(report.failed.is_empty());

    let mut query_embedding = basis_vector(DIM, 3);
    query_embedding[0] += 0.1;

    let query = Query {
        embedding: query_embedding,
        top_k: 2,
        min_similarity: 0.0,
        ..Default::default()
    };
    let result = index.search(&query).unwrap();

    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results[0].chunk.document_id, "doc-3");
    assert_eq!(result.results[1].chunk.document_id, "doc-0");
    assert!(result.results[0].score > result.results[1].score);
    assert_eq!(result.results[0].rank, 0);
    assert_eq!(result.results[1].rank, 1);
}
