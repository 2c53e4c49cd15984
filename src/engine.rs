//! Chunking engine: decision making and token enforcement
//!
//! [`IntelligentChunker`] is the front door for callers: it picks the
//! right tier per file (parser, parser + split, specialist, sliding
//! window), enforces token ceilings, and stamps the decision onto every
//! emitted chunk.

pub mod arbiter;
pub mod tokens;

pub use arbiter::{ChunkingOutcome, IntelligentChunker};
pub use tokens::{tokenizer_for, HeuristicTokenizer, ModelTokenizer};
