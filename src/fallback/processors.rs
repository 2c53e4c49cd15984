//! Specialist text processors and their registry
//!
//! Built-in processors form a closed set (markdown sections, log records);
//! external processors enter through explicit plugin ingestion, never as
//! import-time side effects.

pub mod logs;
pub mod markdown;

use crate::domain::error::Result;
use crate::domain::types::Chunk;
use crate::fallback::detect::FileType;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// A specialist processor for one family of text files
pub trait TextProcessor: Send + Sync {
    /// Registry name of the processor
    fn name(&self) -> &'static str;

    /// Selection priority; higher wins when several processors match
    fn priority(&self) -> i32 {
        0
    }

    /// File types this processor understands
    fn supported_file_types(&self) -> &'static [FileType];

    /// File extensions this processor understands
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Whether this processor can handle the given file
    fn can_process(&self, file_path: &str, content: &str) -> bool;

    /// Produce chunks from the file content
    fn process(&self, content: &str, file_path: &str) -> Result<Vec<Chunk>>;
}

/// Typed capability describing an externally provided processor
pub struct ProcessorPlugin {
    /// Registry name
    pub name: &'static str,
    /// Selection priority
    pub priority: i32,
    /// File types the plugin claims
    pub supported_file_types: Vec<FileType>,
    /// Extensions the plugin claims
    pub supported_extensions: Vec<String>,
    /// Factory producing the processor instance
    pub construct: Box<dyn Fn() -> Arc<dyn TextProcessor> + Send + Sync>,
}

/// Registry of specialist processors keyed by name
pub struct ProcessorRegistry {
    processors: BTreeMap<String, Arc<dyn TextProcessor>>,
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ProcessorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            processors: BTreeMap::new(),
        }
    }

    /// Create a registry holding the built-in processors
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(markdown::MarkdownProcessor::new()));
        registry.register(Arc::new(logs::LogProcessor::new()));
        registry
    }

    /// Register a processor under its own name
    pub fn register(&mut self, processor: Arc<dyn TextProcessor>) {
        debug!(processor = processor.name(), "processor registered");
        self.processors
            .insert(processor.name().to_owned(), processor);
    }

    /// Ingest an externally provided plugin capability
    pub fn ingest_plugin(&mut self, plugin: &ProcessorPlugin) {
        let processor = (plugin.construct)();
        self.register(processor);
    }

    /// Look up a processor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn TextProcessor>> {
        self.processors.get(name).cloned()
    }

    /// Names of processors able to handle a file, highest priority first
    pub fn find_processors(&self, file_path: &str, file_type: FileType) -> Vec<String> {
        let ext = Path::new(file_path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let mut matches: Vec<&Arc<dyn TextProcessor>> = self
            .processors
            .values()
            .filter(|p| {
                p.supported_file_types().contains(&file_type)
                    || p.supported_extensions().contains(&ext.as_str())
            })
            .collect();

        matches.sort_by_key(|p| std::cmp::Reverse(p.priority()));
        matches.iter().map(|p| p.name().to_owned()).collect()
    }

    /// All registered processor names
    pub fn names(&self) -> Vec<String> {
        self.processors.keys().cloned().collect()
    }
}

/// Composition of several specialists tried in order
pub struct ProcessorChain {
    processors: Vec<Arc<dyn TextProcessor>>,
}

impl ProcessorChain {
    /// Build a chain from registry names; unknown names are skipped
    pub fn from_names(registry: &ProcessorRegistry, names: &[&str]) -> Self {
        Self {
            processors: names.iter().filter_map(|n| registry.get(n)).collect(),
        }
    }

    /// Run the chain: the first processor that accepts the file and
    /// produces chunks wins.
    pub fn process(&self, content: &str, file_path: &str) -> Result<Vec<Chunk>> {
        for processor in &self.processors {
            if !processor.can_process(file_path, content) {
                continue;
            }
            let chunks = processor.process(content, file_path)?;
            if !chunks.is_empty() {
                return Ok(chunks);
            }
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let registry = ProcessorRegistry::with_builtins();
        assert!(registry.get("markdown_sections").is_some());
        assert!(registry.get("log_records").is_some());
    }

    #[test]
    fn find_processors_matches_extension_and_type() {
        let registry = ProcessorRegistry::with_builtins();

        let for_markdown = registry.find_processors("README.md", FileType::Markdown);
        assert_eq!(for_markdown, vec!["markdown_sections".to_owned()]);

        let for_logs = registry.find_processors("server.log", FileType::Log);
        assert_eq!(for_logs, vec!["log_records".to_owned()]);

        let for_csv = registry.find_processors("data.csv", FileType::Csv);
        assert!(for_csv.is_empty());
    }

    #[test]
    fn chain_falls_through_to_capable_processor() {
        let registry = ProcessorRegistry::with_builtins();
        let chain = ProcessorChain::from_names(&registry, &["log_records", "markdown_sections"]);

        let md = "# Title\n\nBody text.\n";
        let chunks = chain.process(md, "notes.md").unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].language, "markdown");
    }
}
