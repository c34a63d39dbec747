//! Text Chunker (§4.B): deterministic sentence/word-boundary chunking with
//! overlap, shared by every document format.

use rag_model::{Chunk, FileType, SourceInfo};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ChunkParams {
    pub chunk_size: usize,
    pub overlap: usize,
    pub break_at_sentences: bool,
    pub break_at_words: bool,
    pub min_chunk_size: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 4000,
            overlap: 200,
            break_at_sentences: true,
            break_at_words: true,
            min_chunk_size: 100,
        }
    }
}

struct RawSpan {
    start: usize,
    end: usize,
}

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];
const WORD_SCAN_LIMIT: usize = 100;

/// Scan backwards within `[start, tentative_end]` for the last sentence
/// terminator followed by whitespace, returning the offset just past that
/// whitespace.
fn find_sentence_boundary(chars: &[char], start: usize, tentative_end: usize) -> Option<usize> {
    let mut i = tentative_end;
    while i > start {
        i -= 1;
        if SENTENCE_TERMINATORS.contains(&chars[i]) {
            let mut ws_end = i + 1;
            while ws_end < chars.len() && chars[ws_end].is_whitespace() {
                ws_end += 1;
            }
            if ws_end > i + 1 {
                return Some(ws_end);
            }
        }
    }
    None
}

/// Scan backwards up to `WORD_SCAN_LIMIT` characters from `tentative_end`
/// for the nearest whitespace, returning the offset just past it.
fn find_word_boundary(chars: &[char], start: usize, tentative_end: usize) -> Option<usize> {
    let floor = tentative_end.saturating_sub(WORD_SCAN_LIMIT).max(start);
    let mut i = tentative_end;
    while i > floor {
        i -= 1;
        if chars[i].is_whitespace() {
            return Some(i + 1);
        }
    }
    None
}

fn compute_spans(text: &str, params: &ChunkParams) -> Vec<RawSpan> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut start = 0usize;

    while start < len {
        let tentative_end = (start + params.chunk_size).min(len);
        let mut end = tentative_end;

        if end < len {
            if params.break_at_sentences {
                if let Some(boundary) = find_sentence_boundary(&chars, start, tentative_end) {
                    end = boundary;
                }
            }
            if end == tentative_end && params.break_at_words {
                if let Some(boundary) = find_word_boundary(&chars, start, tentative_end) {
                    end = boundary;
                }
            }
        }

        let is_last = end >= len;
        if end - start >= params.min_chunk_size || is_last {
            spans.push(RawSpan { start, end });
        }

        if is_last {
            break;
        }

        let next_start = end.saturating_sub(params.overlap);
        start = if next_start > start { next_start } else { end };
    }

    spans
}

/// Run §4.B's chunking algorithm over already-normalized text, producing
/// fully populated [`Chunk`]s with contiguous indices and char-offset
/// ranges. Embeddings are left empty for the embedding client to fill in.
pub fn chunk_document_text(
    text: &str,
    document_id: &str,
    file_name: &str,
    file_type: FileType,
    params: &ChunkParams,
) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let spans = compute_spans(text, params);
    let total_chunks = spans.len();

    spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| {
            let chunk_text: String = chars[span.start..span.end].iter().collect();
            Chunk {
                id: Chunk::make_id(document_id, index),
                document_id: document_id.to_string(),
                text: chunk_text,
                embedding: Vec::new(),
                source: SourceInfo {
                    file_name: file_name.to_string(),
                    file_type,
                    chunk_index: index,
                    total_chunks,
                    start_offset: span.start,
                    end_offset: span.end,
                },
                metadata: BTreeMap::new(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(chunk_size: usize, overlap: usize) -> ChunkParams {
        ChunkParams {
            chunk_size,
            overlap,
            ..Default::default()
        }
    }

    #[test]
    fn single_short_text_yields_one_chunk() {
        let chunks = chunk_document_text("Hello world.", "doc1", "f.txt", FileType::Txt, &params(600, 100));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source.chunk_index, 0);
        assert_eq!(chunks[0].source.total_chunks, 1);
    }

    #[test]
    fn chunk_indices_are_contiguous_and_ids_match() {
        let text = "Sentence one. Sentence two. Sentence three. Sentence four. ".repeat(20);
        let chunks = chunk_document_text(&text, "doc2", "f.txt", FileType::Txt, &params(100, 20));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.source.chunk_index, i);
            assert_eq!(chunk.id, format!("doc2#{i}"));
        }
    }

    #[test]
    fn union_of_ranges_covers_full_text() {
        let text = "word ".repeat(500);
        let chunks = chunk_document_text(&text, "doc3", "f.txt", FileType::Txt, &params(200, 50));
        let max_end = chunks.iter().map(|c| c.source.end_offset).max().unwrap();
        assert_eq!(max_end, text.chars().count());
        assert_eq!(chunks[0].source.start_offset, 0);
    }

    #[test]
    fn breaks_at_sentence_boundary_when_available() {
        let text = format!("{}. {}", "a".repeat(90), "b".repeat(90));
        let chunks = chunk_document_text(&text, "doc4", "f.txt", FileType::Txt, &params(95, 10));
        assert!(chunks[0].text.ends_with(' ') || chunks[0].text.ends_with('.'));
    }

    #[test]
    fn last_chunk_is_emitted_even_if_below_min_size() {
        let text = "x".repeat(650);
        let chunks = chunk_document_text(&text, "doc5", "f.txt", FileType::Txt, &params(600, 100));
        assert!(chunks.len() >= 2);
        let last = chunks.last().unwrap();
        assert_eq!(last.source.end_offset, text.chars().count());
    }

    #[test]
    fn progress_always_advances() {
        let text = "a".repeat(1000);
        let chunks = chunk_document_text(&text, "doc6", "f.txt", FileType::Txt, &params(50, 49));
        for pair in chunks.windows(2) {
            assert!(pair[1].source.start_offset > pair[0].source.start_offset);
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks = chunk_document_text("", "doc7", "f.txt", FileType::Txt, &params(600, 100));
        assert!(chunks.is_empty());
    }
}
