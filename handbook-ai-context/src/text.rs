//! Splitting document text into overlapping retrieval chunks.
//!
//! Retrieval works over bounded spans of text: the embedding model has an
//! input budget, and smaller spans give the reranker sharper relevance
//! signals. This module turns one document string into an ordered sequence
//! of [`TextChunk`]s by splitting at the most significant separator
//! available (paragraph breaks, then line breaks, then spaces, then raw
//! characters as a last resort) and packing the resulting segments up to a
//! configurable size. Consecutive chunks repeat a configurable overlap so
//! that a sentence cut at a chunk boundary is still fully present in the
//! next chunk.
//!
//! # Usage
//!
//! ```
//! use handbook_ai_context::text::{TextSplitter, DEFAULT_SEPARATORS};
//!
//! let splitter = TextSplitter::new(DEFAULT_SEPARATORS, 600, 100);
//! let chunks = splitter.split("handbook.pdf", "Employees accrue vacation monthly.").unwrap();
//!
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].source, "handbook.pdf");
//! assert_eq!(chunks[0].sequence, 0);
//! ```
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Separator patterns ordered from most to least significant.
///
/// The splitter prefers cutting at the earliest pattern in this list that
/// produces segments within the size budget:
///
/// - `\n\n`: paragraph breaks
/// - `\n`: line breaks
/// - ` `: spaces
///
/// When all separators are exhausted and a segment is still too large, it
/// is cut at raw character boundaries.
pub const DEFAULT_SEPARATORS: &[&str] = &[r"\n\n", r"\n", r" "];

/// Default chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 600;

/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Errors produced while splitting a document.
#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    /// The input document contained no text (or only whitespace).
    #[error("document is empty")]
    EmptyDocument,

    /// Splitting completed but produced no chunks.
    #[error("splitting produced no chunks")]
    NoChunks,
}

/// A contiguous span of source text, the atomic unit of retrieval.
///
/// Chunks are immutable once created. `start_char`/`end_char` locate the
/// chunk within the source document; because consecutive chunks overlap,
/// `start_char` of a chunk is typically earlier than `end_char` of its
/// predecessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Identifier of the document this chunk came from.
    pub source: String,
    /// Position of this chunk within the document (0-indexed).
    pub sequence: usize,
    /// Character offset of the first character of this chunk.
    pub start_char: usize,
    /// Character offset one past the last character of this chunk.
    pub end_char: usize,
    /// The chunk text, including the overlap repeated from the previous chunk.
    pub text: String,
}

/// Splits document text into overlapping chunks at separator boundaries.
///
/// The splitter recursively cuts text at the most significant separator
/// whose segments fit the size budget, then packs adjacent segments
/// greedily. Each emitted chunk (except the first) begins with the trailing
/// `chunk_overlap` characters of its predecessor, so no chunk exceeds
/// `chunk_size` characters in total.
pub struct TextSplitter {
    separators: Vec<Regex>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Creates a splitter from separator patterns and a size budget.
    ///
    /// Separator patterns are applied in order, from most significant to
    /// least significant. Sizes are counted in characters.
    ///
    /// # Panics
    ///
    /// Panics if a separator pattern is not a valid regular expression, or
    /// if `chunk_overlap >= chunk_size`.
    pub fn new(separator_patterns: &[&str], chunk_size: usize, chunk_overlap: usize) -> Self {
        assert!(
            chunk_overlap < chunk_size,
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        );
        let separators = separator_patterns
            .iter()
            .map(|&pattern| Regex::new(pattern).unwrap())
            .collect();

        TextSplitter {
            separators,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Creates a splitter with [`DEFAULT_SEPARATORS`] and the default size budget.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SEPARATORS, DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }

    /// Configured chunk size in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits `text` into an ordered sequence of chunks.
    ///
    /// Returns [`ChunkError::EmptyDocument`] when `text` holds no
    /// non-whitespace content. The chunks cover the whole document: removing
    /// each chunk's overlap prefix and concatenating the remainders
    /// reconstructs the input exactly.
    pub fn split(&self, source: &str, text: &str) -> Result<Vec<TextChunk>, ChunkError> {
        if text.trim().is_empty() {
            return Err(ChunkError::EmptyDocument);
        }

        // Segments never exceed chunk_size - chunk_overlap, so a packed
        // chunk stays within chunk_size once the overlap prefix is added.
        let budget = self.chunk_size - self.chunk_overlap;
        let segments = self.split_recursively(text, 0, budget, 0);
        let ranges = pack_segments(text, &segments, budget);

        let mut chunks: Vec<TextChunk> = Vec::with_capacity(ranges.len());
        let mut prev_end: Option<usize> = None;
        for (sequence, range) in ranges.iter().enumerate() {
            let start = match prev_end {
                // Ranges tile the text, so range.start equals the previous
                // range's end; back up over it for the overlap.
                Some(_) => back_up_chars(text, range.start, self.chunk_overlap)
                    .max(ranges[sequence - 1].start),
                None => range.start,
            };
            chunks.push(TextChunk {
                source: source.to_string(),
                sequence,
                start_char: char_index_at(text, start),
                end_char: char_index_at(text, range.end),
                text: text[start..range.end].to_string(),
            });
            prev_end = Some(range.end);
        }

        if chunks.is_empty() {
            return Err(ChunkError::NoChunks);
        }
        Ok(chunks)
    }

    // Recursively splits text into segment byte ranges. Each returned range
    // is either a separator match or a span no larger than max_chars that
    // could not be split further by the remaining separators.
    fn split_recursively(
        &self,
        text: &str,
        separator_idx: usize,
        max_chars: usize,
        offset: usize,
    ) -> Vec<Range<usize>> {
        let mut segments: Vec<Range<usize>> = Vec::new();

        if text.is_empty() {
            return segments;
        }

        // Small enough already: keep the span whole.
        if text.chars().count() <= max_chars {
            segments.push(offset..offset + text.len());
            return segments;
        }

        // All separators exhausted: cut at raw character boundaries.
        if separator_idx >= self.separators.len() {
            let mut segment_start = 0;
            let mut taken = 0;
            for (byte_idx, _) in text.char_indices() {
                if taken == max_chars {
                    segments.push(offset + segment_start..offset + byte_idx);
                    segment_start = byte_idx;
                    taken = 0;
                }
                taken += 1;
            }
            segments.push(offset + segment_start..offset + text.len());
            return segments;
        }

        let separator = &self.separators[separator_idx];
        let mut local_start = 0;

        for mat in separator.find_iter(text) {
            if mat.start() > local_start {
                segments.extend(self.split_recursively(
                    &text[local_start..mat.start()],
                    separator_idx + 1,
                    max_chars,
                    offset + local_start,
                ));
            }
            // The separator itself is a segment, so chunks reassemble to
            // the original text.
            segments.push(offset + mat.start()..offset + mat.end());
            local_start = mat.end();
        }

        if local_start < text.len() {
            segments.extend(self.split_recursively(
                &text[local_start..],
                separator_idx + 1,
                max_chars,
                offset + local_start,
            ));
        }

        segments
    }
}

// Greedily packs adjacent segments into ranges of at most max_chars
// characters. Segments tile the input, so the output ranges do too.
fn pack_segments(text: &str, segments: &[Range<usize>], max_chars: usize) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut current_start = 0;
    let mut current_end = 0;
    let mut current_chars = 0;

    for segment in segments {
        let segment_chars = text[segment.clone()].chars().count();
        if current_chars + segment_chars > max_chars && current_start != current_end {
            ranges.push(current_start..current_end);
            current_start = segment.start;
            current_end = segment.end;
            current_chars = segment_chars;
        } else {
            if current_start == current_end {
                current_start = segment.start;
            }
            current_end = segment.end;
            current_chars += segment_chars;
        }
    }

    if current_start != current_end {
        ranges.push(current_start..current_end);
    }

    ranges
}

// Byte index of the character n characters before byte position pos.
fn back_up_chars(text: &str, pos: usize, n: usize) -> usize {
    let mut idx = pos;
    for (byte_idx, _) in text[..pos].char_indices().rev().take(n) {
        idx = byte_idx;
    }
    idx
}

fn char_index_at(text: &str, byte_idx: usize) -> usize {
    text[..byte_idx].chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(size: usize, overlap: usize) -> TextSplitter {
        TextSplitter::new(DEFAULT_SEPARATORS, size, overlap)
    }

    /// Removes each chunk's overlap prefix and concatenates the remainders.
    fn reconstruct(chunks: &[TextChunk]) -> String {
        let mut out = String::new();
        let mut prev_end = 0;
        for chunk in chunks {
            let skip = prev_end - chunk.start_char;
            out.extend(chunk.text.chars().skip(skip));
            prev_end = chunk.end_char;
        }
        out
    }

    #[test]
    fn test_split_basic() {
        let text = (0..100)
            .map(|_| "This is a test sentence. ")
            .collect::<String>();
        let splitter = splitter(500, 80);

        let chunks = splitter.split("doc.txt", &text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 500);
            assert_eq!(chunk.source, "doc.txt");
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_split_single_chunk() {
        let text = "A very short handbook section.";
        let chunks = splitter(500, 80).split("doc.txt", text).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence, 0);
        assert_eq!(chunks[0].start_char, 0);
        assert_eq!(chunks[0].end_char, text.chars().count());
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_split_empty_document() {
        let splitter = splitter(500, 80);
        assert!(matches!(
            splitter.split("doc.txt", ""),
            Err(ChunkError::EmptyDocument)
        ));
        assert!(matches!(
            splitter.split("doc.txt", "  \n\n  "),
            Err(ChunkError::EmptyDocument)
        ));
    }

    #[test]
    fn test_overlap_invariant() {
        let text = (0..200)
            .map(|i| format!("Sentence number {i} fills out the paragraph. "))
            .collect::<String>();
        let overlap = 100;
        let chunks = splitter(600, overlap).split("doc.txt", &text).unwrap();

        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let tail: String = pair[0]
                .text
                .chars()
                .skip(pair[0].text.chars().count() - overlap)
                .collect();
            let head: String = pair[1].text.chars().take(overlap).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_coverage_reconstruction() {
        let text = (0..50)
            .map(|i| format!("Paragraph {i} talks about one benefit in detail.\n\n"))
            .collect::<String>();
        let chunks = splitter(400, 60).split("doc.txt", &text).unwrap();

        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let first = "First paragraph. ".repeat(23).trim_end().to_string();
        let second = "Second paragraph. ".repeat(22).trim_end().to_string();
        let text = format!("{first}\n\n{second}");
        let chunks = splitter(600, 100).split("doc.txt", &text).unwrap();

        assert_eq!(chunks.len(), 2);
        // The cut lands on the paragraph break, not mid-sentence.
        assert!(chunks[0].text.ends_with("\n\n"));
        let body: String = chunks[1]
            .text
            .chars()
            .skip(chunks[0].end_char - chunks[1].start_char)
            .collect();
        assert_eq!(body, second);
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = (0..120).map(|_| "Stable output matters. ").collect::<String>();
        let splitter = splitter(500, 80);

        let first = splitter.split("doc.txt", &text).unwrap();
        let second = splitter.split("doc.txt", &text).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_character_fallback_for_unbroken_text() {
        // No separators at all: the raw character fallback must still
        // produce bounded chunks that reassemble.
        let text = "x".repeat(1500);
        let chunks = splitter(400, 50).split("doc.txt", &text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 400);
        }
        assert_eq!(reconstruct(&chunks), text);
    }
}
