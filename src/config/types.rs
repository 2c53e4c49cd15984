//! Configuration data types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Per-language (or default) chunking plugin configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Whether chunking is enabled for the language
    pub enabled: bool,
    /// AST node types worth emitting as chunks; empty means the
    /// strategy's defaults
    pub chunk_types: BTreeSet<String>,
    /// Minimum chunk size in lines
    pub min_chunk_size: usize,
    /// Maximum chunk size in lines
    pub max_chunk_size: usize,
    /// Free-form options forwarded to strategies and processors
    pub custom_options: BTreeMap<String, serde_json::Value>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            chunk_types: BTreeSet::new(),
            min_chunk_size: 2,
            max_chunk_size: 500,
            custom_options: BTreeMap::new(),
        }
    }
}

/// Settings for one specialist processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSettings {
    /// Whether the processor participates in selection
    pub enabled: bool,
    /// Selection priority override
    pub priority: i32,
    /// Processor-specific options
    pub config: BTreeMap<String, serde_json::Value>,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            priority: 0,
            config: BTreeMap::new(),
        }
    }
}

/// The `chunker` section of the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreSection {
    /// Directories scanned for chunking plugins (tilde-expanded;
    /// relative paths resolve against the config file)
    pub plugin_dirs: Vec<PathBuf>,
    /// Languages to chunk; absence means all installed languages
    pub enabled_languages: Option<Vec<String>>,
    /// Defaults applied when no per-language override exists
    pub default_plugin_config: PluginConfig,
}

/// Complete chunker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkerConfig {
    /// Core settings
    pub chunker: CoreSection,
    /// Per-language overrides
    pub languages: BTreeMap<String, PluginConfig>,
    /// Per-processor settings
    pub processors: BTreeMap<String, ProcessorSettings>,
}

impl ChunkerConfig {
    /// Effective plugin configuration for a language: the per-language
    /// override when present, the defaults otherwise.
    pub fn plugin_config(&self, language: &str) -> &PluginConfig {
        self.languages
            .get(language)
            .unwrap_or(&self.chunker.default_plugin_config)
    }

    /// Whether a language is enabled by this configuration
    pub fn language_enabled(&self, language: &str) -> bool {
        if !self.plugin_config(language).enabled {
            return false;
        }
        match &self.chunker.enabled_languages {
            None => true,
            Some(allowed) => allowed.iter().any(|l| l == language),
        }
    }
}
