//! Core domain types for chunking and export
//!
//! The central entity is [`Chunk`]: a self-contained source substring plus
//! structural metadata, the output unit of the whole system. Relationships
//! between chunks are modelled as an edge list of [`ChunkRelationship`]
//! values keyed by chunk id strings, so cyclic reference graphs are
//! representable without shared in-memory pointers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// A semantically meaningful segment of a source file.
///
/// Chunks are immutable after emission from a strategy; components never
/// retain references to emitted chunks. The byte range is half-open and
/// 0-indexed, the line span inclusive and 1-indexed.
///
/// ## Example
///
/// ```rust
/// use code_chunker::domain::Chunk;
///
/// let source = "fn main() {}\n";
/// let chunk = Chunk::new("rust", "src/main.rs", "function_item", source, 0, source.len(), 1, 1);
/// assert_eq!(chunk.content, source);
/// assert_eq!(chunk.chunk_id, Chunk::stable_id("src/main.rs", 0, source.len(), source));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable hash-derived identifier (content + file path + byte range)
    pub chunk_id: String,
    /// Canonical language tag, or a fallback tag such as `text` or `markdown`
    pub language: String,
    /// Absolute or repo-relative path of the source file
    pub file_path: String,
    /// AST node label, or a synthetic label for fallback chunks
    pub node_type: String,
    /// 1-indexed first line of the span (inclusive)
    pub start_line: usize,
    /// 1-indexed last line of the span (inclusive)
    pub end_line: usize,
    /// 0-indexed start of the byte range (inclusive)
    pub byte_start: usize,
    /// 0-indexed end of the byte range (exclusive)
    pub byte_end: usize,
    /// Free-form description of the enclosing scope (e.g. a class name)
    #[serde(default)]
    pub parent_context: String,
    /// Exact source bytes of the span, as UTF-8 text
    pub content: String,
    /// Hierarchical parent chunk, when a strategy produces a tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_chunk_id: Option<String>,
    /// Identifiers referenced by this chunk, in discovery order
    #[serde(default)]
    pub references: Vec<String>,
    /// Identifiers this chunk depends on (calls, imports), in discovery order
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Strategy-specific annotations (complexity score, chunking decision,
    /// processor name, token count, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Create a chunk, deriving its stable identifier from the content,
    /// file path and byte range.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        language: impl Into<String>,
        file_path: impl Into<String>,
        node_type: impl Into<String>,
        content: impl Into<String>,
        byte_start: usize,
        byte_end: usize,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        let file_path = file_path.into();
        let content = content.into();
        let chunk_id = Self::stable_id(&file_path, byte_start, byte_end, &content);

        Self {
            chunk_id,
            language: language.into(),
            file_path,
            node_type: node_type.into(),
            start_line,
            end_line,
            byte_start,
            byte_end,
            parent_context: String::new(),
            content,
            parent_chunk_id: None,
            references: Vec::new(),
            dependencies: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Compute the stable identifier for a chunk.
    ///
    /// A pure function of `(file_path, byte_start, byte_end, content)`:
    /// identical inputs on re-run produce identical ids.
    pub fn stable_id(file_path: &str, byte_start: usize, byte_end: usize, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update(byte_start.to_le_bytes());
        hasher.update(byte_end.to_le_bytes());
        hasher.update(content.as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }

    /// Number of lines covered by the chunk
    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    /// Insert a metadata annotation, replacing any previous value
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }

    /// Whether this chunk overlaps another in line space
    pub fn overlaps_lines(&self, other: &Chunk) -> bool {
        self.start_line.max(other.start_line) <= self.end_line.min(other.end_line)
    }
}

/// Kinds of directed relationships between two chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// Hierarchical containment, derived from `parent_chunk_id`
    ParentChild,
    /// Source chunk calls a function/method defined by the target
    Calls,
    /// Source chunk imports the target's module or symbol
    Imports,
    /// Source type inherits from the target type
    Inherits,
    /// Source type implements the target interface/trait
    Implements,
    /// Source uses a symbol defined by the target
    Uses,
    /// Source defines a symbol the target refers to
    Defines,
    /// Source refers to an identifier recorded for the target
    References,
    /// Source depends on the target in a non-specific way
    DependsOn,
}

impl RelationshipKind {
    /// Canonical wire name of the relationship kind
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::ParentChild => "parent_child",
            RelationshipKind::Calls => "calls",
            RelationshipKind::Imports => "imports",
            RelationshipKind::Inherits => "inherits",
            RelationshipKind::Implements => "implements",
            RelationshipKind::Uses => "uses",
            RelationshipKind::Defines => "defines",
            RelationshipKind::References => "references",
            RelationshipKind::DependsOn => "depends_on",
        }
    }
}

/// A directed edge between two chunks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkRelationship {
    /// Id of the source chunk
    pub source_chunk_id: String,
    /// Id of the target chunk
    pub target_chunk_id: String,
    /// Kind of relationship
    #[serde(rename = "relationship_type")]
    pub kind: RelationshipKind,
    /// Additional relationship metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ChunkRelationship {
    /// Create a relationship without metadata
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            source_chunk_id: source.into(),
            target_chunk_id: target.into(),
            kind,
            metadata: BTreeMap::new(),
        }
    }
}

/// The five routing choices the fallback arbiter makes per file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingDecision {
    /// Grammar available, parse succeeded, all chunks within the token limit
    TreeSitter,
    /// Grammar available, parse succeeded, oversize chunks were split
    TreeSitterWithSplit,
    /// No grammar, a registered specialist processor handled the file
    SpecializedProcessor,
    /// No grammar and no specialist; generic sliding window
    SlidingWindow,
}

impl ChunkingDecision {
    /// Canonical wire name of the decision
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkingDecision::TreeSitter => "tree_sitter",
            ChunkingDecision::TreeSitterWithSplit => "tree_sitter_with_split",
            ChunkingDecision::SpecializedProcessor => "specialized_processor",
            ChunkingDecision::SlidingWindow => "sliding_window",
        }
    }
}

/// Per-file record of the facts the arbiter based its decision on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionMetrics {
    /// Whether an installed grammar covered the detected language
    pub has_grammar: bool,
    /// Whether the parse produced a usable tree
    pub parse_success: bool,
    /// Number of chunks the selected tier produced
    pub chunk_count: usize,
    /// Token count of the largest chunk before splitting
    pub largest_chunk_tokens: usize,
    /// Whether any chunk exceeded the configured token limit
    pub token_limit_exceeded: bool,
    /// Whether the file looked like source code
    pub is_code_file: bool,
    /// Whether a specialist processor claimed the file type
    pub has_specialized_processor: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_id_is_deterministic() {
        let a = Chunk::stable_id("a.py", 0, 10, "0123456789");
        let b = Chunk::stable_id("a.py", 0, 10, "0123456789");
        assert_eq!(a, b);
    }

    #[test]
    fn stable_id_depends_on_every_input() {
        let base = Chunk::stable_id("a.py", 0, 10, "0123456789");
        assert_ne!(base, Chunk::stable_id("b.py", 0, 10, "0123456789"));
        assert_ne!(base, Chunk::stable_id("a.py", 1, 10, "0123456789"));
        assert_ne!(base, Chunk::stable_id("a.py", 0, 11, "0123456789"));
        assert_ne!(base, Chunk::stable_id("a.py", 0, 10, "012345678X"));
    }

    #[test]
    fn relationship_kind_wire_names_match_serde() {
        let json = serde_json::to_string(&RelationshipKind::ParentChild).unwrap();
        assert_eq!(json, "\"parent_child\"");
        assert_eq!(RelationshipKind::ParentChild.as_str(), "parent_child");
    }

    #[test]
    fn decision_wire_names_match_serde() {
        let json = serde_json::to_string(&ChunkingDecision::TreeSitterWithSplit).unwrap();
        assert_eq!(json, "\"tree_sitter_with_split\"");
    }
}
