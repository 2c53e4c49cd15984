//! AST-based chunking strategies
//!
//! All strategies implement the [`crate::domain::ports::ChunkingStrategy`]
//! contract. The composite strategy combines the other three and is the
//! default choice of the chunking engine.
//!
//! | Strategy | Boundary placement |
//! |----------|--------------------|
//! | Semantic | One chunk per function/method/class, role-aware merging |
//! | Hierarchical | Multi-granularity tree with `parent_chunk_id` links |
//! | Adaptive | Size-targeted regions aligned to AST node boundaries |
//! | Composite | Fusion of the above (union/intersection/consensus/weighted) |

pub mod adaptive;
pub mod common;
pub mod composite;
pub mod hierarchical;
pub mod semantic;

pub use adaptive::AdaptiveChunker;
pub use composite::{CompositeChunker, FusionMethod};
pub use hierarchical::{Granularity, HierarchicalChunker};
pub use semantic::SemanticChunker;
