//! AST traversal and analysis utilities
//!
//! Provides the tree walker with its visitor contract, plus the complexity
//! and semantic analyzers expressed as visitors. Chunking strategies build
//! on these to place boundaries and annotate chunks.

pub mod complexity;
pub mod semantics;
pub mod walker;

pub use complexity::{ComplexityAnalyzer, ComplexityReport};
pub use semantics::{SemanticAnalyzer, SemanticReport, SemanticRole, SideEffect, SideEffectSeverity};
pub use walker::{KindCollector, NodeVisitor, TreeWalker, VisitFlow, WalkContext};
