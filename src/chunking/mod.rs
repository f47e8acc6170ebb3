//! Text chunking for breaking documents into searchable segments.
//!
//! Text is split recursively on paragraph, line and word boundaries and only
//! cut between characters when nothing coarser fits. The pieces are then merged
//! back up to the chunk size, carrying up to `overlap` characters from the end
//! of one chunk into the start of the next.

use crate::config::ChunkingSettings;
use crate::error::{DocentError, Result};
use crate::transcript::TimestampedSegment;
use std::collections::VecDeque;

/// Separators tried in order, coarsest first. The empty separator splits
/// between characters and always applies.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Character-bounded recursive text splitter.
#[derive(Debug, Clone, Copy)]
pub struct TextChunker {
    size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker producing chunks of at most `size` characters.
    pub fn new(size: usize, overlap: usize) -> Result<Self> {
        if size == 0 {
            return Err(DocentError::Validation("chunk size must be positive".to_string()));
        }
        if overlap >= size {
            return Err(DocentError::Validation(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    /// Create a chunker from the configured chunking settings.
    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into ordered chunks of at most `size` characters.
    ///
    /// Empty or blank text yields no chunks. Text that already fits is returned
    /// as a single chunk.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        if char_len(trimmed) <= self.size {
            return vec![trimmed.to_string()];
        }

        self.split(text, &SEPARATORS)
    }

    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|p| !p.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) <= self.size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if finer.is_empty() {
                chunks.push(piece.trim().to_string());
            } else {
                chunks.extend(self.split(piece, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    /// Greedily join pieces into chunks, keeping a tail of at most `overlap`
    /// characters as the start of the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + joiner + len > self.size && !window.is_empty() {
                push_chunk(&mut chunks, &window, separator);

                while let Some(&(_, front_len)) = window.front() {
                    let joiner = if window.is_empty() { 0 } else { separator_len };
                    let over_overlap = total > self.overlap;
                    let still_too_long = total + joiner + len > self.size;
                    if !(over_overlap || still_too_long) {
                        break;
                    }
                    window.pop_front();
                    total -= front_len + if window.is_empty() { 0 } else { separator_len };
                }
            }

            total += len + if window.is_empty() { 0 } else { separator_len };
            window.push_back((piece, len));
        }

        push_chunk(&mut chunks, &window, separator);
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>, separator: &str) {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Chunk time-coded segments for indexing.
///
/// Each non-blank segment becomes one chunk; segments longer than the chunk
/// size are split further so the size bound always holds.
pub fn segment_chunks(segments: &[TimestampedSegment], chunker: &TextChunker) -> Vec<String> {
    segments
        .iter()
        .flat_map(|segment| chunker.chunk(&segment.text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(TextChunker::new(100, 100), Err(DocentError::Validation(_))));
        assert!(matches!(TextChunker::new(0, 0), Err(DocentError::Validation(_))));
        assert!(TextChunker::new(100, 99).is_ok());
    }

    #[test]
    fn test_empty_text() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("  \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk("A short paragraph.\n\nAnd another one.");
        assert_eq!(chunks, vec!["A short paragraph.\n\nAnd another one."]);
    }

    #[test]
    fn test_hard_cuts_with_overlap() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let text = "x".repeat(2600);
        let chunks = chunker.chunk(&text);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1000));
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[2].len(), 1000);

        for pair in chunks.windows(2) {
            let tail = &pair[0][pair[0].len() - 200..];
            let head = &pair[1][..200];
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let chunker = TextChunker::new(60, 10).unwrap();
        let first = "First paragraph talks about vector indexes.";
        let second = "Second paragraph is about chunking text.";
        let text = format!("{}\n\n{}", first, second);

        let chunks = chunker.chunk(&text);
        assert_eq!(chunks, vec![first.to_string(), second.to_string()]);
    }

    #[test]
    fn test_word_boundaries_and_overlap() {
        let chunker = TextChunker::new(20, 8).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = chunker.chunk(text);

        assert!(chunks.len() > 2);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20, "{:?} too long", chunk);
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        // Each chunk opens with a word carried over from the previous one.
        for pair in chunks.windows(2) {
            let first_word = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].split(' ').any(|w| w == first_word),
                "{:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
        // Nothing is lost.
        for word in text.split(' ') {
            assert!(chunks.iter().any(|c| c.contains(word)));
        }
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let chunker = TextChunker::new(10, 2).unwrap();
        let text = "ééééééééééééééééééééééé";
        let chunks = chunker.chunk(text);
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }

    #[test]
    fn test_segment_chunks() {
        let chunker = TextChunker::new(10, 2).unwrap();
        let segments = vec![
            TimestampedSegment::new(0.0, 2.0, "hello"),
            TimestampedSegment::new(2.0, 3.0, "   "),
            TimestampedSegment::new(3.0, 9.0, "a rather long segment"),
        ];

        let chunks = segment_chunks(&segments, &chunker);
        assert_eq!(chunks[0], "hello");
        assert!(chunks.len() > 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
    }
}
