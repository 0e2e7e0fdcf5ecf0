use crate::error::{RagError, Result};
use serde::{Deserialize, Serialize};

/// A contiguous span of document text, the unit of retrieval.
///
/// Offsets and lengths are counted in characters, not bytes, so spans stay
/// on valid UTF-8 boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Character offset of the chunk in the source document
    pub source_offset: usize,
    /// Number of characters in `text`
    pub length: usize,
}

impl Chunk {
    /// Character offset one past the last character of this chunk
    pub fn end_offset(&self) -> usize {
        self.source_offset + self.length
    }
}

/// Splitter with validated size and overlap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a chunker, failing unless `0 < overlap < max_chunk_size`
    pub fn new(max_chunk_size: usize, overlap: usize) -> Result<Self> {
        if overlap == 0 || overlap >= max_chunk_size {
            return Err(RagError::Configuration(format!(
                "chunk overlap ({}) must be greater than zero and less than chunk size ({})",
                overlap, max_chunk_size
            )));
        }

        Ok(Chunker {
            max_chunk_size,
            overlap,
        })
    }

    /// Split text into overlapping fixed-size chunks
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte position of every character start, plus the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total_chars = boundaries.len() - 1;
        let step = self.max_chunk_size - self.overlap;

        let mut chunks = Vec::with_capacity(total_chars / step + 1);
        let mut start = 0;

        loop {
            let end = (start + self.max_chunk_size).min(total_chars);
            chunks.push(Chunk {
                text: text[boundaries[start]..boundaries[end]].to_string(),
                source_offset: start,
                length: end - start,
            });

            if end == total_chars {
                break;
            }
            start += step;
        }

        chunks
    }
}

/// Split `text` into chunks of at most `max_chunk_size` characters, each
/// starting `max_chunk_size - overlap` characters after the previous one
pub fn split(text: &str, max_chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(max_chunk_size, overlap)?.split(text))
}

/// Calculate approximate token count for a text
/// This is a very simple estimation - words plus punctuation
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_rejects_invalid_overlap() {
        assert!(matches!(
            split("abc", 10, 0),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            split("abc", 10, 10),
            Err(RagError::Configuration(_))
        ));
        assert!(matches!(
            split("abc", 10, 15),
            Err(RagError::Configuration(_))
        ));
    }

    #[test]
    fn test_invalid_parameters_fail_even_for_empty_text() {
        assert!(split("", 5, 5).is_err());
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(split("", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn test_three_thousand_chars_yield_four_chunks() {
        let text = "Alpha Beta Gamma ".repeat(200);
        let text = &text[..3000];

        let chunks = split(text, 1000, 200).unwrap();

        let offsets: Vec<usize> = chunks.iter().map(|c| c.source_offset).collect();
        assert_eq!(offsets, vec![0, 800, 1600, 2400]);
        assert_eq!(chunks[3].length, 600);
        assert_eq!(chunks[3].end_offset(), 3000);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = split("hello", 1000, 200).unwrap();
        assert_eq!(
            chunks,
            vec![Chunk {
                text: "hello".to_string(),
                source_offset: 0,
                length: 5,
            }]
        );
    }

    #[test]
    fn test_stops_when_a_chunk_reaches_the_end() {
        // 0..10, 7..17, 14..20 -- no trailing chunk contained in the previous one
        let text = "abcdefghijklmnopqrst";
        let chunks = split(text, 10, 3).unwrap();
        let spans: Vec<(usize, usize)> = chunks
            .iter()
            .map(|c| (c.source_offset, c.end_offset()))
            .collect();
        assert_eq!(spans, vec![(0, 10), (7, 17), (14, 20)]);
    }

    #[test]
    fn test_multibyte_characters_are_counted_as_characters() {
        let text = "ação é fácil";
        let chunks = split(text, 5, 2).unwrap();
        assert_eq!(chunks[0].text, "ação ");
        assert_eq!(chunks[1].text, "o é f");
        assert!(chunks.iter().all(|c| c.text.chars().count() == c.length));
    }

    #[test]
    fn test_estimate_token_count() {
        assert_eq!(estimate_token_count("Hello, world!"), 4);
        assert_eq!(estimate_token_count(""), 0);
    }

    proptest! {
        #[test]
        fn chunks_cover_text_with_exact_overlap(
            text in "[a-zA-Zéü .,\n]{0,400}",
            max in 2usize..60,
            overlap_seed in 1usize..60,
        ) {
            let overlap = 1 + overlap_seed % (max - 1);
            let chunks = split(&text, max, overlap).unwrap();
            let chars: Vec<char> = text.chars().collect();

            if chars.is_empty() {
                prop_assert!(chunks.is_empty());
            } else {
                prop_assert_eq!(chunks[0].source_offset, 0);
                prop_assert_eq!(chunks.last().unwrap().end_offset(), chars.len());
            }

            for chunk in &chunks {
                prop_assert!(chunk.length <= max);
                let expected: String =
                    chars[chunk.source_offset..chunk.end_offset()].iter().collect();
                prop_assert_eq!(&chunk.text, &expected);
            }

            for pair in chunks.windows(2) {
                // no gaps, and the shared span is exactly `overlap`
                prop_assert_eq!(pair[0].end_offset() - pair[1].source_offset, overlap);
            }
        }

        #[test]
        fn chunking_is_deterministic(
            text in ".{0,300}",
            max in 2usize..40,
        ) {
            let overlap = max / 2;
            prop_assume!(overlap > 0);
            prop_assert_eq!(split(&text, max, overlap).unwrap(), split(&text, max, overlap).unwrap());
        }
    }
}
