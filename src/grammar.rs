//! Grammar lifecycle: discovery, download, compilation, caching, registry
//!
//! The [`registry::GrammarRegistry`] is the single entry point: it resolves
//! languages to parsers, consulting the discovery catalog and triggering
//! fetch + build for grammars that are not yet installed.

pub mod builder;
pub mod cache;
pub mod discovery;
pub mod fetcher;
pub mod registry;

pub use builder::{GrammarBuilder, GrammarSourceSet};
pub use cache::{CacheEntry, CachedGrammar, GrammarCache};
pub use discovery::{GrammarDescriptor, GrammarSources, GrammarStatus};
pub use fetcher::{FetchProgress, GrammarFetcher, ProgressCallback, ProgressSignal};
pub use registry::{
    builtin_language, extensions_for, language_for_extension, GrammarMetadata, GrammarRegistry,
    BUILTIN_LANGUAGES,
};
