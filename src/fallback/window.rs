//! Generic sliding-window chunking
//!
//! The last-resort fallback for files with no grammar and no specialist
//! processor. Windows advance by `step = max(1, chunk_size - overlap)`;
//! progression terminates once the cursor reaches the end of the input.

use crate::domain::error::Result;
use crate::domain::types::Chunk;
use serde::{Deserialize, Serialize};

/// Unit in which window sizes are measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowUnit {
    /// Sizes are line counts
    Lines,
    /// Sizes are character counts
    Characters,
}

/// Fixed-stride sliding-window chunker
pub struct SlidingWindowChunker {
    language_tag: String,
}

impl Default for SlidingWindowChunker {
    fn default() -> Self {
        Self::new("text")
    }
}

impl SlidingWindowChunker {
    /// Create a window chunker emitting the given language tag
    pub fn new(language_tag: impl Into<String>) -> Self {
        Self {
            language_tag: language_tag.into(),
        }
    }

    /// Chunk content into windows of `chunk_size` with `overlap` shared
    /// units between neighbours.
    pub fn chunk(
        &self,
        content: &str,
        file_path: &str,
        chunk_size: usize,
        overlap: usize,
        unit: WindowUnit,
    ) -> Result<Vec<Chunk>> {
        if content.is_empty() {
            return Ok(Vec::new());
        }
        match unit {
            WindowUnit::Lines => self.chunk_lines(content, file_path, chunk_size, overlap),
            WindowUnit::Characters => self.chunk_chars(content, file_path, chunk_size, overlap),
        }
    }

    fn chunk_lines(
        &self,
        content: &str,
        file_path: &str,
        lines_per_chunk: usize,
        overlap_lines: usize,
    ) -> Result<Vec<Chunk>> {
        let line_offsets = line_offsets(content);
        let line_count = line_offsets.len() - 1;
        let step = (lines_per_chunk.saturating_sub(overlap_lines)).max(1);

        let mut chunks = Vec::new();
        let mut index = 0usize;
        let mut window = 0usize;

        while index < line_count {
            let end_index = (index + lines_per_chunk).min(line_count);
            let byte_start = line_offsets[index];
            let byte_end = line_offsets[end_index];

            let mut chunk = Chunk::new(
                &self.language_tag,
                file_path,
                "sliding_window_lines",
                &content[byte_start..byte_end],
                byte_start,
                byte_end,
                index + 1,
                end_index,
            );
            chunk.set_metadata("window_index", serde_json::json!(window));
            chunk.set_metadata("overlap", serde_json::json!(overlap_lines));
            chunks.push(chunk);

            index += step;
            window += 1;
        }

        Ok(chunks)
    }

    fn chunk_chars(
        &self,
        content: &str,
        file_path: &str,
        chars_per_chunk: usize,
        overlap_chars: usize,
    ) -> Result<Vec<Chunk>> {
        let boundaries = char_offsets(content);
        let char_count = boundaries.len() - 1;
        let step = (chars_per_chunk.saturating_sub(overlap_chars)).max(1);

        let mut chunks = Vec::new();
        let mut index = 0usize;
        let mut window = 0usize;

        while index < char_count {
            let end_index = (index + chars_per_chunk).min(char_count);
            let byte_start = boundaries[index];
            let byte_end = boundaries[end_index];
            let text = &content[byte_start..byte_end];

            let start_line = content[..byte_start].matches('\n').count() + 1;
            let end_line = start_line + text.matches('\n').count();

            let mut chunk = Chunk::new(
                &self.language_tag,
                file_path,
                "sliding_window_chars",
                text,
                byte_start,
                byte_end,
                start_line,
                end_line,
            );
            chunk.set_metadata("window_index", serde_json::json!(window));
            chunk.set_metadata("overlap", serde_json::json!(overlap_chars));
            chunks.push(chunk);

            index += step;
            window += 1;
        }

        Ok(chunks)
    }
}

/// Byte offsets of every line start, with a trailing end-of-text offset
pub(crate) fn line_offsets(content: &str) -> Vec<usize> {
    let mut offsets = vec![0];
    let mut total = 0usize;
    for line in content.split_inclusive('\n') {
        total += line.len();
        offsets.push(total);
    }
    offsets
}

/// Byte offsets of every character start, with a trailing end-of-text offset
pub(crate) fn char_offsets(content: &str) -> Vec<usize> {
    let mut offsets: Vec<usize> = content.char_indices().map(|(offset, _)| offset).collect();
    offsets.push(content.len());
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_windows_follow_step_arithmetic() {
        let content = "abcdefghijklmnopqrstuvwxyz";
        let chunks = SlidingWindowChunker::new("text")
            .chunk(content, "alpha.txt", 10, 3, WindowUnit::Characters)
            .unwrap();

        let spans: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.byte_start, c.byte_end)).collect();
        assert_eq!(spans, vec![(0, 10), (7, 17), (14, 24), (21, 26)]);
        assert_eq!(chunks[1].content, "hijklmnopq");
    }

    #[test]
    fn line_windows_cover_all_lines() {
        let content = "a\nb\nc\nd\ne\n";
        let chunks = SlidingWindowChunker::new("text")
            .chunk(content, "x.txt", 2, 0, WindowUnit::Lines)
            .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[2].content, "e\n");
    }

    #[test]
    fn byte_start_is_monotonic() {
        let content = "0123456789".repeat(10);
        let chunks = SlidingWindowChunker::new("text")
            .chunk(&content, "x.txt", 30, 10, WindowUnit::Characters)
            .unwrap();
        for pair in chunks.windows(2) {
            assert!(pair[1].byte_start > pair[0].byte_start);
        }
    }

    #[test]
    fn overlap_larger_than_size_still_advances() {
        let content = "abcdef";
        let chunks = SlidingWindowChunker::new("text")
            .chunk(content, "x.txt", 2, 5, WindowUnit::Characters)
            .unwrap();
        assert_eq!(chunks.len(), 6);
    }
}
