//! Text boundary primitives shared by the fallback detectors

use serde::{Deserialize, Serialize};

/// Kind of a detected text boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    /// End of a sentence
    Sentence,
    /// End of a paragraph (blank-line separated block)
    Paragraph,
    /// Section marker (heading, horizontal rule)
    Section,
    /// Quote boundary
    Quote,
    /// Fenced code block edge
    CodeBlock,
}

impl BoundaryType {
    /// Priority used when competing boundaries are scored; larger wins
    pub fn priority(&self) -> u32 {
        match self {
            BoundaryType::Paragraph => 100,
            BoundaryType::Section => 90,
            BoundaryType::Sentence => 80,
            BoundaryType::Quote => 70,
            BoundaryType::CodeBlock => 60,
        }
    }
}

/// A detected boundary: a byte span with a type and a confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextBoundary {
    /// Byte offset where the bounded unit starts
    pub start: usize,
    /// Byte offset just past the bounded unit
    pub end: usize,
    /// What kind of boundary this is
    pub boundary_type: BoundaryType,
    /// Detector confidence in [0, 1]
    pub confidence: f64,
}

impl TextBoundary {
    /// Create a boundary with clamped confidence
    pub fn new(start: usize, end: usize, boundary_type: BoundaryType, confidence: f64) -> Self {
        Self {
            start,
            end,
            boundary_type,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
