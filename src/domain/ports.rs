//! Port traits implemented by chunking strategies and tokenizers
//!
//! Strategies receive an already-parsed tree plus the raw source and emit
//! chunks; they never perform I/O. The tokenizer port lets the arbiter
//! enforce token-count ceilings with either the built-in heuristic or an
//! exact model tokenizer.

use crate::domain::error::Result;
use crate::domain::types::Chunk;
use std::collections::BTreeMap;

/// Free-form option map passed to [`ChunkingStrategy::configure`]
pub type StrategyOptions = BTreeMap<String, serde_json::Value>;

/// Common contract for AST-based chunking strategies
pub trait ChunkingStrategy: Send + Sync {
    /// Stable strategy name used in chunk metadata and composite fusion
    fn name(&self) -> &'static str;

    /// Whether this strategy can chunk the given file/language pair
    fn can_handle(&self, file_path: &str, language: &str) -> bool;

    /// Produce chunks from a parsed tree and its source text.
    ///
    /// Chunks must be emitted in ascending `byte_start` order and their
    /// byte ranges must correspond exactly to tree-sitter node spans.
    fn chunk(
        &self,
        tree: &tree_sitter::Tree,
        source: &str,
        file_path: &str,
        language: &str,
    ) -> Result<Vec<Chunk>>;

    /// Update strategy configuration from an open option map.
    ///
    /// Unknown keys are ignored so composite configuration can be passed
    /// through to every member strategy.
    fn configure(&mut self, options: &StrategyOptions);
}

/// Token counting abstraction keyed by a model name
pub trait Tokenizer: Send + Sync {
    /// Name of the model this tokenizer approximates or implements
    fn model(&self) -> &str;

    /// Count tokens in a piece of text
    fn count(&self, text: &str) -> Result<usize>;
}
