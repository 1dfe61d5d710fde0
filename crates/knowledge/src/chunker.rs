//! Character-window chunking with overlap.

use crate::types::ChunkCandidate;

/// Split `text` into overlapping windows of at most `chunk_size` bytes,
/// always cutting on UTF-8 boundaries.
///
/// A trailing window shorter than a tenth of `chunk_size` is dropped since
/// the previous window's overlap already covers most of it. A document that
/// fits in one window always yields exactly one chunk.
pub fn chunk_text(
    source_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<ChunkCandidate> {
    let chunk_size = chunk_size.max(1);
    let step = if chunk_size > overlap {
        chunk_size - overlap
    } else {
        chunk_size
    };

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let end = floor_boundary(text, (start + chunk_size).min(text.len()));
        let end = if end <= start {
            // A single character wider than chunk_size
            ceil_boundary(text, start + 1)
        } else {
            end
        };

        let window = &text[start..end];
        if !chunks.is_empty() && window.len() < chunk_size / 10 {
            break;
        }

        let trimmed = window.trim();
        if !trimmed.is_empty() {
            chunks.push(ChunkCandidate {
                source_id: source_id.to_string(),
                position: chunks.len() as u32,
                text: trimmed.to_string(),
            });
        }

        if end == text.len() {
            break;
        }
        start = ceil_boundary(text, start + step);
    }

    tracing::debug!(
        "Chunked text into {} chunks (size: {}, overlap: {})",
        chunks.len(),
        chunk_size,
        overlap
    );

    chunks
}

fn floor_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(text: &str, mut index: usize) -> usize {
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index.min(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_basic() {
        let text = "a".repeat(1000);
        let chunks = chunk_text("src", &text, 200, 50);

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].position, 0);
        assert_eq!(chunks[1].position, 1);
        assert!(chunks.iter().all(|c| c.text.len() <= 200));
    }

    #[test]
    fn test_chunk_text_no_overlap() {
        let text = "a".repeat(300);
        let chunks = chunk_text("src", &text, 100, 0);
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_short_document_kept() {
        let chunks = chunk_text("src", "Alex Anderson, CFO.", 512, 64);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Alex Anderson, CFO.");
    }

    #[test]
    fn test_empty_and_blank() {
        assert!(chunk_text("src", "", 100, 10).is_empty());
        assert!(chunk_text("src", "   \n  ", 100, 10).is_empty());
    }

    #[test]
    fn test_multibyte_boundaries() {
        let text = "héllo wörld ñandú ".repeat(40);
        let chunks = chunk_text("src", &text, 25, 5);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.len() <= 25));
    }

    #[test]
    fn test_overlap_larger_than_size_still_progresses() {
        let text = "abcdefghij".repeat(5);
        let chunks = chunk_text("src", &text, 10, 20);
        assert_eq!(chunks.len(), 5);
    }
}
