//! Markdown parser: normalization (shared with TXT unless
//! `preserve_formatting`) plus structural outline extraction.

use crate::txt::{clean_text, decode_text};
use crate::{new_document, ParseOptions};
use rag_model::{Document, ErrorKind, FileType, RagError};
use serde_json::json;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Outline {
    headings: Vec<(usize, String, usize)>,
    code_blocks: Vec<(Option<String>, usize)>,
    links: Vec<(String, String)>,
    images: Vec<(String, String)>,
    lists: Vec<(&'static str, usize)>,
}

fn extract_outline(text: &str) -> Outline {
    let mut outline = Outline::default();
    let mut in_code_block = false;

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();

        if let Some(rest) = trimmed.strip_prefix("```") {
            if !in_code_block {
                let lang = rest.trim();
                outline.code_blocks.push((
                    if lang.is_empty() { None } else { Some(lang.to_string()) },
                    line_no,
                ));
            }
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }

        if let Some(level) = heading_level(trimmed) {
            let text = trimmed.trim_start_matches('#').trim().to_string();
            outline.headings.push((level, text, line_no));
        }

        if trimmed.starts_with("- ") || trimmed.starts_with("* ") || trimmed.starts_with("+ ") {
            outline.lists.push(("unordered", line_no));
        } else if is_ordered_list_item(trimmed) {
            outline.lists.push(("ordered", line_no));
        }

        scan_links_and_images(line, &mut outline);
    }

    outline
}

fn heading_level(trimmed: &str) -> Option<usize> {
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let after = trimmed.as_bytes().get(hashes);
    match after {
        Some(b' ') | None => Some(hashes),
        _ => None,
    }
}

fn is_ordered_list_item(trimmed: &str) -> bool {
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    trimmed[digits.len()..].starts_with(". ")
}

fn scan_links_and_images(line: &str, outline: &mut Outline) {
    let bytes = line.as_bytes();
    let mut i = 0usize;
    while i < bytes.len() {
        let is_image = bytes[i] == b'!' && i + 1 < bytes.len() && bytes[i + 1] == b'[';
        let start = if is_image { i + 1 } else { i };
        if bytes.get(start) == Some(&b'[') {
            if let Some(close_bracket) = line[start + 1..].find(']') {
                let text_end = start + 1 + close_bracket;
                if line.as_bytes().get(text_end + 1) == Some(&b'(') {
                    if let Some(close_paren) = line[text_end + 2..].find(')') {
                        let url_end = text_end + 2 + close_paren;
                        let text = line[start + 1..text_end].to_string();
                        let url = line[text_end + 2..url_end].to_string();
                        if is_image {
                            outline.images.push((text, url));
                        } else {
                            outline.links.push((text, url));
                        }
                        i = url_end + 1;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
}

pub fn parse(bytes: &[u8], file_name: &str, options: &ParseOptions) -> Result<Document, RagError> {
    let decoded = decode_text(bytes, options.encoding.as_deref());
    let normalized = if options.preserve_formatting {
        decoded.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        clean_text(&decoded)
    };

    if normalized.trim().is_empty() {
        return Err(RagError::new(
            ErrorKind::ParsingError,
            format!("{file_name} contains no extractable text"),
        ));
    }

    let outline = extract_outline(&normalized);
    let title = outline
        .headings
        .iter()
        .find(|(level, _, _)| *level == 1)
        .map(|(_, text, _)| text.clone());

    let mut extra = BTreeMap::new();
    extra.insert(
        "title".to_string(),
        title.clone().map(serde_json::Value::String).unwrap_or(serde_json::Value::Null),
    );
    extra.insert(
        "headingCount".to_string(),
        serde_json::Value::from(outline.headings.len()),
    );
    extra.insert(
        "outline".to_string(),
        json!({
            "headings": outline.headings.iter().map(|(level, text, line)| json!({
                "level": level, "text": text, "line": line,
            })).collect::<Vec<_>>(),
            "codeBlocks": outline.code_blocks.iter().map(|(lang, line)| json!({
                "language": lang, "line": line,
            })).collect::<Vec<_>>(),
            "links": outline.links.iter().map(|(text, url)| json!({
                "text": text, "url": url,
            })).collect::<Vec<_>>(),
            "images": outline.images.iter().map(|(alt, url)| json!({
                "alt": alt, "url": url,
            })).collect::<Vec<_>>(),
            "lists": outline.lists.iter().map(|(kind, line)| json!({
                "type": kind, "line": line,
            })).collect::<Vec<_>>(),
        }),
    );

    let mut doc = new_document(
        file_name,
        FileType::Md,
        FileType::Md.default_mime_type().to_string(),
        normalized,
        extra,
    );
    doc.metadata.file_size = bytes.len() as u64;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_markdown_ingest_scenario() {
        let input = "# Main Title\n\nContent here.";
        let doc = parse(input.as_bytes(), "test.md", &ParseOptions::default()).unwrap();
        assert_eq!(
            doc.metadata.extra.get("title").and_then(|v| v.as_str()),
            Some("Main Title")
        );
        assert_eq!(
            doc.metadata.extra.get("headingCount").and_then(|v| v.as_u64()),
            Some(1)
        );
        assert!(doc.content.contains("Main Title"));
        assert!(doc.content.contains("Content here."));
    }

    #[test]
    fn extracts_links_and_images() {
        let input = "See [docs](https://example.com) and ![alt](img.png)";
        let doc = parse(input.as_bytes(), "f.md", &ParseOptions::default()).unwrap();
        let outline = doc.metadata.extra.get("outline").unwrap();
        assert_eq!(outline["links"][0]["url"], "https://example.com");
        assert_eq!(outline["images"][0]["alt"], "alt");
    }

    #[test]
    fn preserve_formatting_keeps_raw_whitespace() {
        let input = "#  Title\n\n\n\n   indented  text";
        let doc = parse(
            input.as_bytes(),
            "f.md",
            &ParseOptions {
                preserve_formatting: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(doc.content.contains("\n\n\n\n"));
    }

    #[test]
    fn code_blocks_are_not_scanned_for_headings() {
        let input = "```\n# not a heading\n```\n# real heading";
        let doc = parse(input.as_bytes(), "f.md", &ParseOptions::default()).unwrap();
        assert_eq!(
            doc.metadata.extra.get("headingCount").and_then(|v| v.as_u64()),
            Some(1)
        );
    }
}
