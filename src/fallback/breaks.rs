//! Natural break point selection
//!
//! Combines sentence and paragraph boundaries, scores each candidate from
//! its confidence, priority, and surrounding context, then greedily picks
//! the best break inside each window. Falls back to a hard cut only when
//! no candidate fits.

use crate::constants::{NATURAL_BREAK_MAX_CHUNK, NATURAL_BREAK_MIN_CHUNK};
use crate::fallback::boundaries::{BoundaryType, TextBoundary};
use crate::fallback::paragraphs::ParagraphDetector;
use crate::fallback::sentences::SentenceDetector;

/// Words after which a break reads badly
const AVOID_BREAK_AFTER: &[&str] = &["the", "a", "an", "and", "or", "but", "of", "in", "to"];

/// A scored candidate break position
#[derive(Debug, Clone)]
pub struct BreakPoint {
    /// Byte position of the break
    pub position: usize,
    /// Priority of the boundary type behind the break
    pub priority: u32,
    /// Combined confidence/priority/context score
    pub score: f64,
}

/// Finds natural break points by combining boundary detectors
pub struct NaturalBreakFinder {
    sentence_detector: SentenceDetector,
    paragraph_detector: ParagraphDetector,
    prefer_paragraphs: bool,
    min_chunk_size: usize,
    max_chunk_size: usize,
}

impl Default for NaturalBreakFinder {
    fn default() -> Self {
        Self::new("en")
    }
}

impl NaturalBreakFinder {
    /// Create a finder for a language with default sizing
    pub fn new(language: &str) -> Self {
        Self {
            sentence_detector: SentenceDetector::new(language),
            paragraph_detector: ParagraphDetector::new(),
            prefer_paragraphs: true,
            min_chunk_size: NATURAL_BREAK_MIN_CHUNK,
            max_chunk_size: NATURAL_BREAK_MAX_CHUNK,
        }
    }

    /// Override the minimum chunk size
    pub fn with_min_chunk_size(mut self, size: usize) -> Self {
        self.min_chunk_size = size;
        self
    }

    /// Override the maximum chunk size
    pub fn with_max_chunk_size(mut self, size: usize) -> Self {
        self.max_chunk_size = size;
        self
    }

    /// Disable the paragraph-first preference
    pub fn with_prefer_paragraphs(mut self, prefer: bool) -> Self {
        self.prefer_paragraphs = prefer;
        self
    }

    /// All boundaries from both detectors, position-sorted and deduplicated
    pub fn detect_boundaries(&self, text: &str) -> Vec<TextBoundary> {
        let mut boundaries = self.sentence_detector.detect_boundaries(text);
        boundaries.extend(self.paragraph_detector.detect_boundaries(text));
        boundaries.sort_by_key(|b| b.start);
        boundaries.dedup_by_key(|b| b.start);
        boundaries
    }

    /// Scored break candidates, position-sorted
    pub fn break_points(&self, text: &str) -> Vec<BreakPoint> {
        let mut points: Vec<BreakPoint> = self
            .detect_boundaries(text)
            .iter()
            .map(|boundary| BreakPoint {
                position: boundary.end,
                priority: boundary.boundary_type.priority(),
                score: self.score_break(text, boundary),
            })
            .collect();
        points.sort_by_key(|p| p.position);
        points
    }

    /// Greedy selection of break positions targeting `max_length` bytes
    /// per chunk.
    pub fn find_natural_breaks(&self, text: &str, max_length: usize) -> Vec<usize> {
        let break_points = self.break_points(text);
        let mut selected = Vec::new();
        let mut current_start = 0usize;

        while current_start < text.len() {
            let min_pos = current_start + self.min_chunk_size;
            let max_pos = current_start + max_length;

            let mut candidates: Vec<&BreakPoint> = break_points
                .iter()
                .filter(|bp| {
                    bp.position > current_start && bp.position >= min_pos && bp.position <= max_pos
                })
                .collect();

            if self.prefer_paragraphs {
                let paragraphs: Vec<&BreakPoint> = candidates
                    .iter()
                    .copied()
                    .filter(|bp| bp.priority == BoundaryType::Paragraph.priority())
                    .collect();
                if !paragraphs.is_empty() {
                    candidates = paragraphs;
                }
            }

            match candidates
                .iter()
                .max_by(|a, b| {
                    (a.priority, a.score)
                        .partial_cmp(&(b.priority, b.score))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
            {
                Some(best) if best.position < text.len() => {
                    selected.push(best.position);
                    current_start = best.position;
                }
                Some(_) => break,
                None => {
                    // Hard cut at the window edge
                    let cut = (current_start + max_length).min(text.len());
                    if cut < text.len() {
                        selected.push(cut);
                    }
                    current_start = cut;
                    if cut >= text.len() {
                        break;
                    }
                }
            }
        }

        selected
    }

    /// Split text at its natural breaks, returning byte spans
    pub fn segment_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let breaks = self.find_natural_breaks(text, self.max_chunk_size);
        let mut spans = Vec::with_capacity(breaks.len() + 1);
        let mut start = 0usize;

        for end in breaks {
            if end > start {
                spans.push((start, end));
                start = end;
            }
        }
        if start < text.len() {
            spans.push((start, text.len()));
        }
        spans
    }

    fn score_break(&self, text: &str, boundary: &TextBoundary) -> f64 {
        let position = boundary.end;
        let mut score = boundary.confidence + f64::from(boundary.boundary_type.priority()) / 200.0;

        let context = 50usize;
        let before = floor_char_boundary(text, position.saturating_sub(context));
        let before_text = text.get(before..position).unwrap_or("").trim();
        let after_end = ceil_char_boundary(text, (position + context).min(text.len()));
        let after_text = text.get(position..after_end).unwrap_or("").trim();

        if before_text.ends_with(['.', '!', '?']) {
            score += 0.1;
        }
        if after_text.chars().next().is_some_and(char::is_uppercase) {
            score += 0.05;
        }

        // Breaking inside an open quote reads badly
        let quotes = before_text.chars().filter(|c| *c == '"').count();
        if quotes % 2 != 0 {
            score -= 0.2;
        }

        let last_word = before_text
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or("")
            .to_lowercase();
        if AVOID_BREAK_AFTER.contains(&last_word.as_str()) {
            score -= 0.1;
        }

        score.max(0.0)
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
