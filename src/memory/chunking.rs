use serde::{Deserialize, Serialize};
use tracing::warn;

/// A contiguous window of a document, ready for embedding.
///
/// Offsets are measured in characters (Unicode scalar values) against the
/// original, untrimmed document content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Trimmed window text.
    pub text: String,
    /// Inclusive start offset.
    pub start: usize,
    /// Exclusive end offset.
    pub end: usize,
    /// Ordinal among the chunks emitted for the document.
    pub index: usize,
}

/// Split `content` into overlapping fixed-size windows.
///
/// Each window covers `[start, min(start + size, len))` and the next window
/// starts `overlap` characters before the previous end. An `overlap` that is
/// not smaller than `size` is clamped to `size / 2`. Windows that are entirely
/// whitespace are dropped, so `index` counts only emitted chunks.
pub fn chunk_text(content: &str, size: usize, overlap: usize) -> Vec<TextChunk> {
    if content.is_empty() {
        return Vec::new();
    }

    let size = size.max(1);
    let overlap = if overlap >= size {
        warn!(size, overlap, "chunk overlap >= chunk size, clamping to half the size");
        size / 2
    } else {
        overlap
    };

    let chars: Vec<char> = content.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let end = (start + size).min(len);
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();

        if !trimmed.is_empty() {
            chunks.push(TextChunk {
                text: trimmed.to_string(),
                start,
                end,
                index: chunks.len(),
            });
        }

        if end >= len {
            break;
        }

        let next = end - overlap;
        start = if next > start { next } else { end };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content() {
        assert!(chunk_text("", 800, 150).is_empty());
    }

    #[test]
    fn test_short_content_single_chunk() {
        let chunks = chunk_text("  hello world  ", 800, 150);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks[0].end, 15);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_windows_cover_content_with_overlap() {
        let text: String = "abcdefghij".repeat(25);
        let chunks = chunk_text(&text, 100, 20);

        assert_eq!(chunks[0].start, 0);
        assert_eq!(chunks.last().unwrap().end, text.len());
        for pair in chunks.windows(2) {
            assert!(pair[1].start > pair[0].start);
            assert!(pair[1].start <= pair[0].end);
            assert_eq!(pair[0].end - pair[1].start, 20);
        }
        for chunk in &chunks {
            assert!(chunk.start < chunk.end);
            assert!(chunk.end - chunk.start <= 100);
        }
    }

    #[test]
    fn test_overlap_clamped_to_half_size() {
        let text = "x".repeat(250);
        let chunks = chunk_text(&text, 100, 150);

        let starts: Vec<usize> = chunks.iter().map(|c| c.start).collect();
        assert_eq!(starts, vec![0, 50, 100, 150]);
        assert_eq!(chunks.last().unwrap().end, 250);
    }

    #[test]
    fn test_terminates_for_degenerate_sizes() {
        let text = "some text that is long enough to need several windows";
        for size in 0..8 {
            for overlap in 0..10 {
                let chunks = chunk_text(text, size, overlap);
                assert!(!chunks.is_empty());
                assert!(chunks.len() <= text.len());
            }
        }
    }

    #[test]
    fn test_whitespace_windows_are_dropped() {
        let text = format!("{}{}{}", "a".repeat(10), " ".repeat(30), "b".repeat(10));
        let chunks = chunk_text(&text, 10, 0);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "a".repeat(10));
        assert_eq!(chunks[1].text, "b".repeat(10));
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].start, 40);
    }

    #[test]
    fn test_multibyte_content_does_not_split_code_points() {
        let text = "é".repeat(30);
        let chunks = chunk_text(&text, 7, 2);
        assert!(chunks.iter().all(|c| c.text.chars().all(|ch| ch == 'é')));
        assert_eq!(chunks.last().unwrap().end, 30);
    }
}
