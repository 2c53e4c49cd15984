//! Overlapping fallback chunking for non-grammar files only
//!
//! Adds overlap support (fixed, percentage, asymmetric, dynamic) on top of
//! the sliding-window fallback. Overlap is exclusively a fallback
//! affordance: any path whose extension or declared language maps to an
//! installed grammar is refused with a typed error. The authoritative
//! source for "installed" is the grammar registry, not a static map.

use crate::constants::{DYNAMIC_OVERLAP_LOOK_BACK, OVERLAP_BOUNDARY_SEARCH_WINDOW};
use crate::domain::error::{Error, Result};
use crate::domain::types::Chunk;
use crate::fallback::window::{char_offsets, line_offsets};
use crate::grammar::{language_for_extension, GrammarRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// How the overlap size is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlapStrategy {
    /// Constant overlap size
    Fixed,
    /// Overlap is a percentage of the chunk size
    Percentage,
    /// Overlap chosen per boundary from content density
    Dynamic,
    /// Distinct before/after overlap sizes
    Asymmetric,
}

/// Unit for overlap sizes, re-exported from the window chunker
pub use crate::fallback::window::WindowUnit;

/// Overlapping chunker gated on grammar availability
pub struct OverlapChunker {
    registry: Arc<GrammarRegistry>,
    language_tag: String,
}

impl OverlapChunker {
    /// Create an overlap chunker consulting the given registry
    pub fn new(registry: Arc<GrammarRegistry>) -> Self {
        Self {
            registry,
            language_tag: "text".to_owned(),
        }
    }

    /// Tag emitted as the chunk language
    pub fn with_language_tag(mut self, tag: impl Into<String>) -> Self {
        self.language_tag = tag.into();
        self
    }

    /// Refuse operation when the file or declared language has an
    /// installed grammar.
    fn check_no_grammar_support(&self, file_path: &str, language: Option<&str>) -> Result<()> {
        if let Some(language) = language {
            let lowered = language.to_lowercase();
            if self.registry.is_installed(&lowered) {
                return Err(Error::TreeSitterOverlap { language: lowered });
            }
        }

        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if let Some(inferred) = language_for_extension(ext) {
            if self.registry.is_installed(inferred) {
                return Err(Error::TreeSitterOverlap {
                    language: inferred.to_owned(),
                });
            }
        }

        Ok(())
    }

    /// Chunk content with overlapping windows (fixed or percentage
    /// overlap).
    pub fn chunk_with_overlap(
        &self,
        content: &str,
        file_path: &str,
        chunk_size: usize,
        overlap_size: usize,
        strategy: OverlapStrategy,
        unit: WindowUnit,
        language: Option<&str>,
    ) -> Result<Vec<Chunk>> {
        self.check_no_grammar_support(file_path, language)?;
        warn!(
            file = file_path,
            ?strategy,
            overlap = overlap_size,
            "using overlapping fallback chunker"
        );

        let overlap = match strategy {
            OverlapStrategy::Fixed => overlap_size,
            OverlapStrategy::Percentage => chunk_size * overlap_size.min(100) / 100,
            // Dynamic and asymmetric have dedicated entry points
            OverlapStrategy::Dynamic | OverlapStrategy::Asymmetric => overlap_size,
        };

        match unit {
            WindowUnit::Lines => self.overlap_lines(content, file_path, chunk_size, overlap),
            WindowUnit::Characters => self.overlap_chars(content, file_path, chunk_size, overlap),
        }
    }

    /// Chunk with different overlap sizes before and after each window
    pub fn chunk_with_asymmetric_overlap(
        &self,
        content: &str,
        file_path: &str,
        chunk_size: usize,
        overlap_before: usize,
        overlap_after: usize,
        unit: WindowUnit,
    ) -> Result<Vec<Chunk>> {
        self.check_no_grammar_support(file_path, None)?;
        warn!(
            file = file_path,
            overlap_before, overlap_after, "using asymmetric overlapping fallback chunker"
        );

        let offsets = match unit {
            WindowUnit::Lines => line_offsets(content),
            WindowUnit::Characters => char_offsets(content),
        };
        let units = offsets.len() - 1;

        let mut chunks = Vec::new();
        let mut index = 0usize;
        let mut window = 0usize;

        while index < units {
            let end = (index + chunk_size).min(units);
            let widened_start = if index > 0 {
                index.saturating_sub(overlap_before)
            } else {
                index
            };
            let widened_end = if end < units {
                (end + overlap_after).min(units)
            } else {
                end
            };

            let node_type = match unit {
                WindowUnit::Lines => "fallback_asymmetric_lines",
                WindowUnit::Characters => "fallback_asymmetric_chars",
            };
            chunks.push(self.emit(
                content,
                file_path,
                node_type,
                offsets[widened_start],
                offsets[widened_end],
                window,
            ));

            index = end;
            window += 1;
        }

        Ok(chunks)
    }

    /// Chunk with overlap chosen per boundary from structural marker
    /// density, snapped to a natural boundary.
    pub fn chunk_with_dynamic_overlap(
        &self,
        content: &str,
        file_path: &str,
        chunk_size: usize,
        min_overlap: usize,
        max_overlap: usize,
        unit: WindowUnit,
    ) -> Result<Vec<Chunk>> {
        self.check_no_grammar_support(file_path, None)?;
        warn!(
            file = file_path,
            min_overlap, max_overlap, "using dynamic overlapping fallback chunker"
        );

        let offsets = match unit {
            WindowUnit::Lines => line_offsets(content),
            WindowUnit::Characters => char_offsets(content),
        };
        let units = offsets.len() - 1;

        let mut chunks = Vec::new();
        let mut index = 0usize;
        let mut window = 0usize;

        while index < units {
            let end = (index + chunk_size).min(units);

            let widened_start_byte = if index > 0 {
                let cursor_byte = offsets[index];
                let overlap_bytes =
                    self.dynamic_overlap(content, cursor_byte, min_overlap, max_overlap);
                let desired = cursor_byte.saturating_sub(overlap_bytes);
                let snapped = self.find_natural_overlap_boundary(
                    content,
                    desired,
                    OVERLAP_BOUNDARY_SEARCH_WINDOW,
                );
                // Clamp the snapped point back into the allowed overlap range
                snapped.clamp(
                    cursor_byte.saturating_sub(max_overlap),
                    cursor_byte.saturating_sub(min_overlap.min(cursor_byte)),
                )
            } else {
                offsets[index]
            };

            let node_type = match unit {
                WindowUnit::Lines => "fallback_dynamic_lines",
                WindowUnit::Characters => "fallback_dynamic_chars",
            };
            let byte_start = floor_char_boundary(content, widened_start_byte);
            chunks.push(self.emit(
                content,
                file_path,
                node_type,
                byte_start,
                offsets[end],
                window,
            ));

            index = end;
            window += 1;
        }

        Ok(chunks)
    }

    /// Overlap size derived from structural marker density in the
    /// look-back window before `cursor`.
    fn dynamic_overlap(
        &self,
        content: &str,
        cursor: usize,
        min_overlap: usize,
        max_overlap: usize,
    ) -> usize {
        let window_start =
            floor_char_boundary(content, cursor.saturating_sub(DYNAMIC_OVERLAP_LOOK_BACK));
        let window = &content[window_start..cursor];

        let paragraph_breaks = window.matches("\n\n").count();
        let sentence_ends = window
            .chars()
            .filter(|c| matches!(c, '.' | '!' | '?'))
            .count();
        let empty_lines = window.lines().filter(|l| l.trim().is_empty()).count();

        let markers = paragraph_breaks * 3 + empty_lines * 2 + sentence_ends;
        let span = max_overlap.saturating_sub(min_overlap);
        // Denser structure means more context is worth carrying over
        let proportional = span.min(markers * span / 10);
        min_overlap + proportional
    }

    /// Find a natural boundary near a desired position, preferring
    /// paragraph breaks, then line breaks, sentence ends, clause
    /// boundaries, and finally word boundaries.
    pub fn find_natural_overlap_boundary(
        &self,
        content: &str,
        desired_position: usize,
        search_window: usize,
    ) -> usize {
        if desired_position == 0 || desired_position >= content.len() {
            return desired_position.min(content.len());
        }

        let start = floor_char_boundary(content, desired_position.saturating_sub(search_window / 2));
        let end = ceil_char_boundary(content, (desired_position + search_window / 2).min(content.len()));
        let search_text = &content[start..end];

        let patterns: &[(&str, usize)] = &[
            (r"\n\n+", 0),
            (r"\n", 1),
            (r"[.!?]\s+", 2),
            (r"[,;:]\s+", 3),
            (r"\s+", 4),
        ];

        let mut best_position = desired_position;
        let mut best_score = usize::MAX;

        for (pattern, type_weight) in patterns {
            let Ok(regex) = regex::Regex::new(pattern) else {
                continue;
            };
            for found in regex.find_iter(search_text) {
                let absolute = start + found.end();
                let distance = absolute.abs_diff(desired_position);
                let score = distance + type_weight * 10;
                if score < best_score {
                    best_score = score;
                    best_position = absolute;
                }
            }
        }

        best_position
    }

    fn overlap_lines(
        &self,
        content: &str,
        file_path: &str,
        lines_per_chunk: usize,
        overlap_lines: usize,
    ) -> Result<Vec<Chunk>> {
        let offsets = line_offsets(content);
        let line_count = offsets.len() - 1;
        let step = (lines_per_chunk.saturating_sub(overlap_lines)).max(1);

        let mut chunks = Vec::new();
        let mut index = 0usize;
        let mut window = 0usize;

        while index < line_count {
            let end = (index + lines_per_chunk).min(line_count);
            chunks.push(self.emit(
                content,
                file_path,
                "fallback_overlap_lines",
                offsets[index],
                offsets[end],
                window,
            ));
            index += step;
            window += 1;
        }

        Ok(chunks)
    }

    fn overlap_chars(
        &self,
        content: &str,
        file_path: &str,
        chars_per_chunk: usize,
        overlap_chars: usize,
    ) -> Result<Vec<Chunk>> {
        let offsets = char_offsets(content);
        let char_count = offsets.len() - 1;
        let step = (chars_per_chunk.saturating_sub(overlap_chars)).max(1);

        let mut chunks = Vec::new();
        let mut index = 0usize;
        let mut window = 0usize;

        while index < char_count {
            let end = (index + chars_per_chunk).min(char_count);
            chunks.push(self.emit(
                content,
                file_path,
                "fallback_overlap_chars",
                offsets[index],
                offsets[end],
                window,
            ));
            index += step;
            window += 1;
        }

        Ok(chunks)
    }

    fn emit(
        &self,
        content: &str,
        file_path: &str,
        node_type: &str,
        byte_start: usize,
        byte_end: usize,
        window: usize,
    ) -> Chunk {
        let text = &content[byte_start..byte_end];
        let start_line = content[..byte_start].matches('\n').count() + 1;
        let end_line =
            start_line + text.matches('\n').count() - usize::from(text.ends_with('\n'));

        let mut chunk = Chunk::new(
            &self.language_tag,
            file_path,
            node_type,
            text,
            byte_start,
            byte_end,
            start_line,
            end_line.max(start_line),
        );
        chunk.parent_context = format!("overlapping_chunk_{window}");
        chunk.set_metadata("window_index", serde_json::json!(window));
        chunk
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker() -> OverlapChunker {
        let dir = std::env::temp_dir().join("cc-overlap-test");
        let registry = GrammarRegistry::with_cache_dir(dir).expect("registry");
        OverlapChunker::new(Arc::new(registry))
    }

    #[test]
    fn grammar_supported_extension_is_refused() {
        let err = chunker()
            .chunk_with_overlap(
                "package main",
                "main.go",
                100,
                20,
                OverlapStrategy::Fixed,
                WindowUnit::Characters,
                None,
            )
            .unwrap_err();

        match err {
            Error::TreeSitterOverlap { language } => assert_eq!(language, "go"),
            other => panic!("expected TreeSitterOverlap, got {other}"),
        }
    }

    #[test]
    fn declared_language_is_refused() {
        let err = chunker()
            .chunk_with_overlap(
                "fn main() {}",
                "unknown.dat",
                100,
                20,
                OverlapStrategy::Fixed,
                WindowUnit::Characters,
                Some("rust"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::TreeSitterOverlap { .. }));
    }

    #[test]
    fn fixed_overlap_spans_match_step() {
        let content = "abcdefghijklmnopqrstuvwxyz";
        let chunks = chunker()
            .chunk_with_overlap(
                content,
                "alpha.txt",
                10,
                3,
                OverlapStrategy::Fixed,
                WindowUnit::Characters,
                None,
            )
            .unwrap();

        let spans: Vec<(usize, usize)> =
            chunks.iter().map(|c| (c.byte_start, c.byte_end)).collect();
        assert_eq!(spans, vec![(0, 10), (7, 17), (14, 24), (21, 26)]);
    }

    #[test]
    fn percentage_overlap_scales_with_chunk_size() {
        let content = "x".repeat(100);
        let chunks = chunker()
            .chunk_with_overlap(
                &content,
                "data.txt",
                20,
                25,
                OverlapStrategy::Percentage,
                WindowUnit::Characters,
                None,
            )
            .unwrap();

        // 25% of 20 = 5 overlap, step 15
        assert_eq!(chunks[1].byte_start, 15);
    }

    #[test]
    fn asymmetric_overlap_widens_both_sides() {
        let content = "one\ntwo\nthree\nfour\nfive\nsix\n";
        let chunks = chunker()
            .chunk_with_asymmetric_overlap(content, "list.txt", 2, 1, 1, WindowUnit::Lines)
            .unwrap();

        assert_eq!(chunks.len(), 3);
        // First chunk has no before-overlap but one line of after-overlap
        assert_eq!(chunks[0].content, "one\ntwo\nthree\n");
        // Middle chunk is widened on both sides
        assert_eq!(chunks[1].content, "two\nthree\nfour\nfive\n");
    }

    #[test]
    fn dynamic_overlap_stays_within_bounds() {
        let content = "Sentence one. Sentence two.\n\nSentence three. More text here.\n\nFinal paragraph with words.\n";
        let chunks = chunker()
            .chunk_with_dynamic_overlap(content, "prose.txt", 30, 5, 15, WindowUnit::Characters)
            .unwrap();

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            assert!(pair[1].byte_start > pair[0].byte_start);
            let overlap = pair[0].byte_end.saturating_sub(pair[1].byte_start);
            assert!(overlap <= 15 + 1);
        }
    }

    #[test]
    fn natural_boundary_prefers_paragraph_break() {
        let content = "First paragraph.\n\nSecond paragraph starts here and continues.";
        let c = chunker();
        let snapped = c.find_natural_overlap_boundary(content, 20, 40);
        // Snaps to just after the blank line
        assert_eq!(snapped, 18);
    }
}
