//! Fallback chunking for files without grammar support
//!
//! Three tiers live here: specialist processors (markdown sections, log
//! records), natural-break segmentation built on sentence/paragraph
//! detection, and the generic sliding window with its overlap variants.
//! The overlap chunker refuses files whose language has an installed
//! grammar; the arbiter in [`crate::engine`] decides which tier runs.

pub mod boundaries;
pub mod breaks;
pub mod detect;
pub mod overlap;
pub mod paragraphs;
pub mod processors;
pub mod sentences;
pub mod window;

pub use boundaries::{BoundaryType, TextBoundary};
pub use breaks::{BreakPoint, NaturalBreakFinder};
pub use detect::{decode_text, detect_file_type, looks_binary, FileType};
pub use overlap::{OverlapChunker, OverlapStrategy};
pub use paragraphs::ParagraphDetector;
pub use processors::{ProcessorChain, ProcessorPlugin, ProcessorRegistry, TextProcessor};
pub use sentences::SentenceDetector;
pub use window::{SlidingWindowChunker, WindowUnit};
