//! # Code Chunker
//!
//! Structure-aware segmentation of source code into semantically
//! meaningful, self-contained chunks for embedding pipelines, code-search
//! indices, and LLM context windows.
//!
//! ## Features
//!
//! - **AST chunking**: semantic, hierarchical, adaptive and composite
//!   strategies over tree-sitter parse trees, 13 languages built in
//! - **Grammar lifecycle**: discovery, download, compilation, validation
//!   and caching of additional tree-sitter grammars at runtime
//! - **Intelligent fallback**: per-file routing between parser-based
//!   chunking, token-limited splitting, specialist text processors
//!   (markdown, logs) and sliding windows
//! - **Relationships & export**: parent/child, calls, imports and
//!   reference edges, exported as JSON/JSONL, SQLite, PostgreSQL,
//!   Neo4j Cypher, GraphML or DOT with streaming support
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use code_chunker::engine::IntelligentChunker;
//! use code_chunker::grammar::GrammarRegistry;
//! use std::sync::Arc;
//!
//! fn main() -> code_chunker::Result<()> {
//!     let registry = Arc::new(GrammarRegistry::new()?);
//!     let chunker = IntelligentChunker::new(registry);
//!
//!     let outcome = chunker.chunk_file("src/lib.rs")?;
//!     for chunk in &outcome.chunks {
//!         println!("{} {}..{}", chunk.node_type, chunk.start_line, chunk.end_line);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! A file enters the arbiter in [`engine`], which consults the
//! [`grammar`] registry (downloading and compiling grammars on demand
//! when allowed) and routes to the [`strategies`] over an AST, or to the
//! [`fallback`] tiers when no parser applies. Chunks flow through
//! [`relationships`] inference into [`export`] back-ends.

pub mod analysis;
pub mod config;
pub mod constants;
pub mod domain;
pub mod engine;
pub mod export;
pub mod fallback;
pub mod grammar;
pub mod relationships;
pub mod strategies;

// Re-export core types for the public API
pub use domain::error::{Error, Result};
pub use domain::types::{
    Chunk, ChunkRelationship, ChunkingDecision, DecisionMetrics, RelationshipKind,
};

// Re-export main entry points
pub use engine::{ChunkingOutcome, IntelligentChunker};
pub use grammar::GrammarRegistry;
pub use relationships::RelationshipTracker;
