//! Grammar discovery: catalog of known and managed grammars
//!
//! Merges three sources of truth: the built-in catalog of well-known
//! grammar repositories, the user-managed `grammar_sources.json` mapping
//! (`{language: git_url}`), and the per-grammar descriptor file recording
//! lifecycle status. Catalog files are read and written under a mutex.

use crate::constants::{GRAMMAR_CATALOG_FILE, GRAMMAR_SOURCES_FILE};
use crate::domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;

/// Lifecycle state of a managed grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrammarStatus {
    /// Source repository is not known or not fetched
    NotFound,
    /// Source present but no compiled artifact
    NotBuilt,
    /// A build is in progress
    Building,
    /// Compiled and validated
    Ready,
    /// Fetch or build failed; see `error`
    Error,
    /// Installed artifact predates the requested revision
    Outdated,
}

/// Information about one managed grammar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrammarDescriptor {
    /// Language name (e.g. `python`)
    pub name: String,
    /// Git repository URL
    pub repository_url: String,
    /// Requested revision; `None` follows HEAD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    /// Tree-sitter ABI version recorded after validation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi_version: Option<usize>,
    /// File extensions served by the grammar
    #[serde(default)]
    pub supported_extensions: Vec<String>,
    /// Current lifecycle status
    pub status: GrammarStatus,
    /// Path of the compiled artifact, once built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    /// Error message when `status` is [`GrammarStatus::Error`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GrammarDescriptor {
    /// Whether the grammar is ready to serve parsers
    pub fn is_available(&self) -> bool {
        self.status == GrammarStatus::Ready
    }
}

/// Built-in catalog of well-known grammar repositories
const KNOWN_GRAMMARS: &[(&str, &str)] = &[
    ("bash", "https://github.com/tree-sitter/tree-sitter-bash"),
    ("css", "https://github.com/tree-sitter/tree-sitter-css"),
    ("haskell", "https://github.com/tree-sitter/tree-sitter-haskell"),
    ("html", "https://github.com/tree-sitter/tree-sitter-html"),
    ("json", "https://github.com/tree-sitter/tree-sitter-json"),
    ("lua", "https://github.com/tree-sitter-grammars/tree-sitter-lua"),
    ("scala", "https://github.com/tree-sitter/tree-sitter-scala"),
    ("toml", "https://github.com/tree-sitter-grammars/tree-sitter-toml"),
    ("yaml", "https://github.com/tree-sitter-grammars/tree-sitter-yaml"),
    ("zig", "https://github.com/tree-sitter-grammars/tree-sitter-zig"),
];

#[derive(Debug, Default, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    grammars: BTreeMap<String, GrammarDescriptor>,
}

/// Grammar source catalog persisted beside the artifact cache
pub struct GrammarSources {
    root: PathBuf,
    state: Mutex<SourcesState>,
}

struct SourcesState {
    sources: BTreeMap<String, String>,
    catalog: BTreeMap<String, GrammarDescriptor>,
}

impl GrammarSources {
    /// Load both catalog files from a directory, tolerating absence
    pub fn load(root: &Path) -> Result<Self> {
        let sources_path = root.join(GRAMMAR_SOURCES_FILE);
        let catalog_path = root.join(GRAMMAR_CATALOG_FILE);

        let sources = if sources_path.exists() {
            let text = std::fs::read_to_string(&sources_path)?;
            serde_json::from_str(&text)?
        } else {
            BTreeMap::new()
        };

        let catalog = if catalog_path.exists() {
            let text = std::fs::read_to_string(&catalog_path)?;
            let file: CatalogFile = serde_json::from_str(&text)?;
            file.grammars
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            root: root.to_path_buf(),
            state: Mutex::new(SourcesState { sources, catalog }),
        })
    }

    /// Resolve the repository URL for a language: user sources first,
    /// then the built-in catalog.
    pub fn resolve(&self, name: &str) -> Option<String> {
        let state = self.guard();
        if let Some(url) = state.sources.get(name) {
            return Some(url.clone());
        }
        KNOWN_GRAMMARS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, url)| (*url).to_owned())
    }

    /// Add or replace a grammar source. The URL must be a GitHub HTTPS URL.
    pub fn add_source(&self, name: &str, repository_url: &str) -> Result<()> {
        if !repository_url.starts_with("https://github.com/") {
            return Err(Error::InvalidArgument {
                message: format!(
                    "grammar source for '{name}' must be a GitHub HTTPS URL, got {repository_url}"
                ),
            });
        }

        {
            let mut state = self.guard();
            state
                .sources
                .insert(name.to_owned(), repository_url.to_owned());
            state.catalog.insert(
                name.to_owned(),
                GrammarDescriptor {
                    name: name.to_owned(),
                    repository_url: repository_url.to_owned(),
                    commit_hash: None,
                    abi_version: None,
                    supported_extensions: Vec::new(),
                    status: GrammarStatus::NotBuilt,
                    local_path: None,
                    error: None,
                },
            );
            self.persist(&state)?;
        }

        info!(language = name, url = repository_url, "grammar source added");
        Ok(())
    }

    /// Remove a grammar source. Returns whether an entry existed.
    pub fn remove_source(&self, name: &str) -> Result<bool> {
        let mut state = self.guard();
        let removed = state.sources.remove(name).is_some();
        state.catalog.remove(name);
        if removed {
            self.persist(&state)?;
        }
        Ok(removed)
    }

    /// Descriptor for one grammar, if it is managed
    pub fn describe(&self, name: &str) -> Option<GrammarDescriptor> {
        self.guard().catalog.get(name).cloned()
    }

    /// All managed descriptors, optionally filtered by status
    pub fn list(&self, status: Option<GrammarStatus>) -> Vec<GrammarDescriptor> {
        self.guard()
            .catalog
            .values()
            .filter(|d| status.is_none_or(|s| d.status == s))
            .cloned()
            .collect()
    }

    /// Every language the registry could materialize: user sources plus
    /// the built-in catalog.
    pub fn discoverable(&self) -> Vec<String> {
        let state = self.guard();
        let mut names: Vec<String> = state.sources.keys().cloned().collect();
        for (name, _) in KNOWN_GRAMMARS {
            if !names.iter().any(|n| n == name) {
                names.push((*name).to_owned());
            }
        }
        names.sort();
        names
    }

    /// Update a grammar's lifecycle status
    pub fn mark_status(&self, name: &str, status: GrammarStatus) -> Result<()> {
        let mut state = self.guard();
        let url = state
            .sources
            .get(name)
            .cloned()
            .or_else(|| self.known_url(name));

        let descriptor = state
            .catalog
            .entry(name.to_owned())
            .or_insert_with(|| GrammarDescriptor {
                name: name.to_owned(),
                repository_url: url.unwrap_or_default(),
                commit_hash: None,
                abi_version: None,
                supported_extensions: Vec::new(),
                status,
                local_path: None,
                error: None,
            });
        descriptor.status = status;
        if status != GrammarStatus::Error {
            descriptor.error = None;
        }
        self.persist(&state)
    }

    /// Record a failure on a grammar
    pub fn mark_error(&self, name: &str, message: &str) -> Result<()> {
        self.mark_status(name, GrammarStatus::Error)?;
        let mut state = self.guard();
        if let Some(descriptor) = state.catalog.get_mut(name) {
            descriptor.error = Some(message.to_owned());
        }
        self.persist(&state)
    }

    fn known_url(&self, name: &str) -> Option<String> {
        KNOWN_GRAMMARS
            .iter()
            .find(|(known, _)| *known == name)
            .map(|(_, url)| (*url).to_owned())
    }

    fn persist(&self, state: &SourcesState) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;

        let sources_path = self.root.join(GRAMMAR_SOURCES_FILE);
        std::fs::write(&sources_path, serde_json::to_string_pretty(&state.sources)?)?;

        let catalog_path = self.root.join(GRAMMAR_CATALOG_FILE);
        let file = CatalogFile {
            grammars: state.catalog.clone(),
        };
        std::fs::write(&catalog_path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, SourcesState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn add_source_requires_github_https() {
        let dir = TempDir::new().unwrap();
        let sources = GrammarSources::load(dir.path()).unwrap();

        let err = sources
            .add_source("evil", "http://example.com/repo")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));

        sources
            .add_source("toml", "https://github.com/tree-sitter-grammars/tree-sitter-toml")
            .unwrap();
        assert!(sources.resolve("toml").is_some());
    }

    #[test]
    fn sources_survive_reload() {
        let dir = TempDir::new().unwrap();
        {
            let sources = GrammarSources::load(dir.path()).unwrap();
            sources
                .add_source("lua", "https://github.com/tree-sitter-grammars/tree-sitter-lua")
                .unwrap();
            sources.mark_status("lua", GrammarStatus::Ready).unwrap();
        }

        let reloaded = GrammarSources::load(dir.path()).unwrap();
        let descriptor = reloaded.describe("lua").unwrap();
        assert_eq!(descriptor.status, GrammarStatus::Ready);
        assert!(descriptor.is_available());
    }

    #[test]
    fn builtin_catalog_is_discoverable() {
        let dir = TempDir::new().unwrap();
        let sources = GrammarSources::load(dir.path()).unwrap();

        let names = sources.discoverable();
        assert!(names.iter().any(|n| n == "bash"));
        assert!(sources.resolve("bash").is_some());
    }

    #[test]
    fn mark_error_records_message() {
        let dir = TempDir::new().unwrap();
        let sources = GrammarSources::load(dir.path()).unwrap();

        sources
            .add_source("zig", "https://github.com/tree-sitter-grammars/tree-sitter-zig")
            .unwrap();
        sources.mark_error("zig", "compiler exploded").unwrap();

        let descriptor = sources.describe("zig").unwrap();
        assert_eq!(descriptor.status, GrammarStatus::Error);
        assert_eq!(descriptor.error.as_deref(), Some("compiler exploded"));
    }
}
