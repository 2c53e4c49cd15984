//! Crate-wide constants and default values
//!
//! Centralizes chunking sizes, thresholds, and other magic numbers to keep
//! the strategies, the fallback tiers, and the exporters consistent.

// ============================================================================
// Sliding Window / Overlap Defaults
// ============================================================================

/// Default window size for fallback chunking, in characters
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Default fixed overlap between adjacent fallback windows, in characters
pub const DEFAULT_OVERLAP_SIZE: usize = 200;

/// Default lower bound for dynamically computed overlap
pub const DEFAULT_MIN_OVERLAP: usize = 50;

/// Default upper bound for dynamically computed overlap
pub const DEFAULT_MAX_OVERLAP: usize = 300;

/// Window scanned around a desired position when snapping an overlap
/// boundary to a natural break
pub const OVERLAP_BOUNDARY_SEARCH_WINDOW: usize = 100;

/// Bytes/lines examined backwards when deriving dynamic overlap from
/// structural marker density
pub const DYNAMIC_OVERLAP_LOOK_BACK: usize = 512;

// ============================================================================
// Strategy Defaults
// ============================================================================

/// Target chunk size for the adaptive strategy, in lines
pub const ADAPTIVE_BASE_CHUNK_SIZE: usize = 50;

/// Fraction of the base size the adaptive strategy may move a boundary
pub const ADAPTIVE_AGGRESSIVENESS: f64 = 0.5;

/// Line bucket used when comparing chunk positions across strategies
pub const COMPOSITE_POSITION_BUCKET: usize = 5;

/// Minimum number of agreeing strategies for intersection fusion
pub const COMPOSITE_MIN_CONSENSUS: usize = 2;

/// Combined-score threshold for consensus fusion
pub const COMPOSITE_CONSENSUS_THRESHOLD: f64 = 0.6;

/// Overlap ratio (over the smaller chunk) at which two chunks are merged
pub const COMPOSITE_OVERLAP_THRESHOLD: f64 = 0.7;

/// Quality floor applied in the composite final pass
pub const COMPOSITE_MIN_CHUNK_QUALITY: f64 = 0.5;

/// Cohesion score both siblings must exceed before the semantic strategy
/// merges them
pub const SEMANTIC_MERGE_COHESION_THRESHOLD: f64 = 0.7;

/// Maximum traversal depth for the hierarchical strategy
pub const HIERARCHICAL_MAX_DEPTH: usize = 6;

// ============================================================================
// Token Counting
// ============================================================================

/// Characters-per-token ratio used by the heuristic tokenizer
pub const HEURISTIC_CHARS_PER_TOKEN: usize = 4;

/// Model assumed when none is configured
pub const DEFAULT_TOKENIZER_MODEL: &str = "heuristic";

// ============================================================================
// Text Processing
// ============================================================================

/// Base confidence assigned to a detected sentence boundary
pub const SENTENCE_BASE_CONFIDENCE: f64 = 0.9;

/// Sentences shorter than this many characters are penalized
pub const SENTENCE_MIN_LENGTH: usize = 10;

/// Minimum chunk size the natural-break finder will accept
pub const NATURAL_BREAK_MIN_CHUNK: usize = 100;

/// Default maximum chunk size for natural-break segmentation
pub const NATURAL_BREAK_MAX_CHUNK: usize = 1000;

// ============================================================================
// Binary / Encoding Detection
// ============================================================================

/// Bytes sampled from the head of a file for binary/encoding detection
pub const DETECTION_SAMPLE_SIZE: usize = 8192;

/// Fraction of non-text bytes above which a file is considered binary
pub const BINARY_NON_TEXT_RATIO: f64 = 0.30;

// ============================================================================
// Export
// ============================================================================

/// Records per flushed batch in streaming exports
pub const EXPORT_BATCH_SIZE: usize = 1000;

/// Format version stamped into export metadata
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

// ============================================================================
// Grammar Cache
// ============================================================================

/// Compiled grammar artifacts retained by default when cleaning the cache
pub const GRAMMAR_CACHE_KEEP_RECENT: usize = 10;

/// File name of the persisted grammar source catalog
pub const GRAMMAR_SOURCES_FILE: &str = "grammar_sources.json";

/// File name of the persisted grammar descriptor catalog
pub const GRAMMAR_CATALOG_FILE: &str = "grammars.json";
