//! Overlapping window chunker.
//!
//! Splits a document into fixed-size character windows with a configured
//! overlap. Offsets are character offsets into the source text, so multibyte
//! input windows the same way regardless of encoding width.

use serde::{Deserialize, Serialize};

use crate::core::errors::RagError;

/// A contiguous window of the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Ordinal position within the document
    pub index: usize,
    /// The window text
    pub text: String,
    /// Character offset of the first character
    pub start_offset: usize,
    /// Character offset one past the last character
    pub end_offset: usize,
}

/// Window configuration, validated once at construction so the split pass
/// itself cannot fail and the window always advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// `size` must be positive and `overlap` strictly smaller than `size`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, RagError> {
        if size == 0 || overlap >= size {
            return Err(RagError::ChunkConfig { size, overlap });
        }
        Ok(Self { size, overlap })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into windows starting at offsets `0, size - overlap,
    /// 2 * (size - overlap), …`, stopping once a start reaches the end of the
    /// text. The final window may be shorter than `size`; empty input produces
    /// no chunks. Consecutive windows share exactly `overlap` characters
    /// (except possibly the last pair) and their union covers the whole text.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let step = self.size - self.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + self.size).min(total);
            chunks.push(Chunk {
                index: chunks.len(),
                text: chars[start..end].iter().collect(),
                start_offset: start,
                end_offset: end,
            });
            start += step;
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(chunks: &[Chunk], text_len: usize, overlap: usize) {
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks.last().unwrap().end_offset, text_len);
        for pair in chunks.windows(2) {
            // No gap between consecutive windows.
            assert!(pair[1].start_offset <= pair[0].end_offset);
            // Exact overlap, except when the earlier window was truncated at
            // the end of the text (only possible near the last pair).
            let shared = pair[0].end_offset - pair[1].start_offset;
            if pair[0].end_offset < text_len {
                assert_eq!(shared, overlap);
            } else {
                assert!(shared <= overlap);
            }
        }
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunker = Chunker::new(500, 50).unwrap();
        assert!(chunker.chunk("").is_empty());
    }

    #[test]
    fn thousand_chars_split_into_three_windows() {
        let text = "a".repeat(1000);
        let chunks = Chunker::new(500, 50).unwrap().chunk(&text);

        assert_eq!(chunks.len(), 3);
        let starts: Vec<usize> = chunks.iter().map(|c| c.start_offset).collect();
        let lens: Vec<usize> = chunks.iter().map(|c| c.text.chars().count()).collect();
        assert_eq!(starts, vec![0, 450, 900]);
        assert_eq!(lens, vec![500, 500, 100]);
        assert_covers(&chunks, 1000, 50);
    }

    #[test]
    fn windows_cover_text_for_various_configs() {
        let text: String = ('a'..='z').cycle().take(337).collect();
        for (size, overlap) in [(20, 5), (50, 0), (337, 100), (400, 399), (7, 3)] {
            let chunks = Chunker::new(size, overlap).unwrap().chunk(&text);
            assert!(!chunks.is_empty(), "size={} overlap={}", size, overlap);
            assert_covers(&chunks, 337, overlap);
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
                assert!(chunk.end_offset - chunk.start_offset <= size);
            }
        }
    }

    #[test]
    fn text_shorter_than_size_yields_one_chunk() {
        let chunks = Chunker::new(500, 50).unwrap().chunk("short text");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, 10);
    }

    #[test]
    fn offsets_count_characters_not_bytes() {
        let chunks = Chunker::new(4, 1).unwrap().chunk("こんにちは世界");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "こんにち");
        assert_eq!(chunks[1].text, "ちは世界");
        assert_eq!(chunks[2].text, "界");
        assert_eq!(chunks[1].start_offset, 3);
        assert_eq!(chunks[2].end_offset, 7);
    }

    #[test]
    fn rejects_invalid_window_configuration() {
        assert!(matches!(
            Chunker::new(0, 0),
            Err(RagError::ChunkConfig { .. })
        ));
        assert!(matches!(
            Chunker::new(100, 100),
            Err(RagError::ChunkConfig { .. })
        ));
        assert!(matches!(
            Chunker::new(100, 150),
            Err(RagError::ChunkConfig { .. })
        ));
        assert!(Chunker::new(100, 99).is_ok());
        assert!(Chunker::new(1, 0).is_ok());
    }
}
