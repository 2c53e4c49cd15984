//! Grammar registry: language name to parser resolution
//!
//! Two tiers of grammars are served. Statically linked grammars are
//! compiled into the binary and always installed. Dynamically loaded
//! grammars are shared libraries in the cache directory, probed for the
//! well-known `tree_sitter_<name>` entry symbol; presence of the symbol is
//! necessary and sufficient to declare the language installed.
//!
//! Loaded shared libraries are kept alive for the process lifetime.
//! Unloading is not supported: a dropped library would leave dangling
//! grammar pointers inside live parsers and trees.

use crate::constants::GRAMMAR_CACHE_KEEP_RECENT;
use crate::domain::error::{Error, Result};
use crate::grammar::builder::GrammarBuilder;
use crate::grammar::cache::GrammarCache;
use crate::grammar::discovery::{GrammarSources, GrammarStatus};
use crate::grammar::fetcher::{GrammarFetcher, ProgressCallback};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use tree_sitter::Parser;

/// Metadata describing an installed grammar
#[derive(Debug, Clone)]
pub struct GrammarMetadata {
    /// Installed version (revision) when known; `None` for built-ins
    pub version: Option<String>,
    /// Tree-sitter ABI version exposed by the grammar
    pub abi_version: usize,
    /// File extensions mapped to this language
    pub file_extensions: Vec<String>,
    /// Path of the compiled artifact for dynamically loaded grammars
    pub installed_path: Option<PathBuf>,
}

/// A dynamically loaded grammar with its backing library.
///
/// The `_library` field keeps the shared library mapped; `language`
/// contains pointers into that mapping.
struct LoadedGrammar {
    _library: libloading::Library,
    language: tree_sitter::Language,
}

/// Process-wide grammar registry.
///
/// Create one registry at startup and pass it explicitly; it is never
/// exposed as ambient global state.
pub struct GrammarRegistry {
    cache: GrammarCache,
    sources: GrammarSources,
    fetcher: GrammarFetcher,
    loaded: DashMap<String, Arc<LoadedGrammar>>,
    install_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl GrammarRegistry {
    /// Create a registry over the default user cache directory
    pub fn new() -> Result<Self> {
        let root = default_grammar_dir()?;
        Self::with_cache_dir(root)
    }

    /// Create a registry over an explicit cache directory
    pub fn with_cache_dir(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            cache: GrammarCache::new(root.clone()),
            sources: GrammarSources::load(&root)?,
            fetcher: GrammarFetcher::new(),
            loaded: DashMap::new(),
            install_locks: Mutex::new(HashMap::new()),
        })
    }

    /// The grammar source catalog backing this registry
    pub fn sources(&self) -> &GrammarSources {
        &self.sources
    }

    /// The compiled-artifact cache backing this registry
    pub fn cache(&self) -> &GrammarCache {
        &self.cache
    }

    /// Resolve a language to a `tree_sitter::Language` without network access
    pub fn language(&self, name: &str) -> Result<tree_sitter::Language> {
        if let Some(language) = builtin_language(name) {
            return Ok(language);
        }

        if let Some(loaded) = self.loaded.get(name) {
            return Ok(loaded.language.clone());
        }

        if let Some(artifact) = self.cache.latest_artifact(name) {
            return self.load_artifact(name, &artifact);
        }

        Err(Error::grammar_unavailable(
            name,
            "not statically linked and no compiled artifact in the cache",
        ))
    }

    /// Build a parser for a language, optionally materializing a missing
    /// grammar through download and compilation.
    ///
    /// Concurrent first calls for the same language collapse to a single
    /// download/build.
    pub async fn get_parser(&self, name: &str, auto_download: bool) -> Result<Parser> {
        match self.language(name) {
            Ok(language) => make_parser(name, &language),
            Err(err) if auto_download => {
                debug!(language = name, "grammar missing, attempting install: {err}");
                self.install(name, None).await?;
                let language = self.language(name)?;
                make_parser(name, &language)
            }
            Err(err) => Err(err),
        }
    }

    /// Synchronous parser construction for already-installed grammars
    pub fn parser(&self, name: &str) -> Result<Parser> {
        let language = self.language(name)?;
        make_parser(name, &language)
    }

    /// Whether a language is installed (statically or as a cached artifact)
    pub fn is_installed(&self, name: &str) -> bool {
        builtin_language(name).is_some()
            || self.loaded.contains_key(name)
            || self.cache.latest_artifact(name).is_some()
    }

    /// Names of all installed languages, built-ins first
    pub fn list_installed(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTIN_LANGUAGES
            .iter()
            .map(|(name, _)| (*name).to_owned())
            .collect();

        for name in self.cache.cached_languages() {
            if !names.contains(&name) {
                names.push(name);
            }
        }

        names
    }

    /// Install a grammar by fetching and compiling its source.
    ///
    /// Returns `true` when a new artifact was produced, `false` when the
    /// language was already installed.
    pub async fn install(&self, name: &str, version: Option<&str>) -> Result<bool> {
        self.install_with_progress(name, version, None).await
    }

    /// [`GrammarRegistry::install`] with a streaming progress callback
    pub async fn install_with_progress(
        &self,
        name: &str,
        version: Option<&str>,
        progress: Option<&ProgressCallback>,
    ) -> Result<bool> {
        if builtin_language(name).is_some() {
            return Ok(false);
        }

        let lock = self.install_lock(name);
        let _guard = lock.lock().await;

        let revision = version.unwrap_or("HEAD");
        if self.cache.is_cached(name, revision) {
            let artifact = self
                .cache
                .artifact_path(name, revision)
                .ok_or_else(|| Error::internal("cached artifact path missing"))?;
            if self.load_artifact(name, &artifact).is_ok() {
                debug!(language = name, revision, "grammar cache hit");
                return Ok(false);
            }
            warn!(language = name, revision, "cached grammar failed validation, rebuilding");
        }

        self.sources.mark_status(name, GrammarStatus::Building)?;

        let result = self.fetch_and_build(name, revision, progress).await;
        match &result {
            Ok(_) => self.sources.mark_status(name, GrammarStatus::Ready)?,
            Err(err) => self.sources.mark_error(name, &err.to_string())?,
        }
        result?;

        Ok(true)
    }

    async fn fetch_and_build(
        &self,
        name: &str,
        revision: &str,
        progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let url = self.sources.resolve(name).ok_or_else(|| {
            Error::grammar_unavailable(name, "no repository recorded in the grammar sources")
        })?;

        let staging = tempdir_in(self.cache.root())?;
        let source_root = self
            .fetcher
            .fetch(name, &url, revision, staging.path(), progress)
            .await?;

        let mut builder = GrammarBuilder::new();
        let artifact = self.cache.reserve_artifact(name, revision);
        builder.build(name, &source_root, &artifact)?;

        let abi_version = GrammarBuilder::validate(&artifact, name)?;
        self.cache.commit(name, revision, abi_version)?;

        info!(language = name, revision, abi_version, "grammar installed");
        self.load_artifact(name, &artifact)?;
        Ok(())
    }

    /// Remove a dynamically installed grammar's cached artifacts.
    ///
    /// Built-in grammars cannot be uninstalled; returns `false` for them
    /// and for languages that were never installed. The in-process library
    /// handle (if any) stays mapped until the process exits.
    pub fn uninstall(&self, name: &str) -> Result<bool> {
        if builtin_language(name).is_some() {
            return Ok(false);
        }

        let removed = self.cache.remove_language(name)?;
        if removed > 0 {
            self.sources.mark_status(name, GrammarStatus::NotBuilt)?;
        }
        Ok(removed > 0)
    }

    /// Metadata for an installed language
    pub fn get_metadata(&self, name: &str) -> Result<GrammarMetadata> {
        if let Some(language) = builtin_language(name) {
            return Ok(GrammarMetadata {
                version: None,
                abi_version: language.abi_version(),
                file_extensions: extensions_for(name)
                    .iter()
                    .map(|e| (*e).to_owned())
                    .collect(),
                installed_path: None,
            });
        }

        let entry = self.cache.latest_entry(name).ok_or_else(|| {
            Error::grammar_unavailable(name, "no compiled artifact in the cache")
        })?;

        Ok(GrammarMetadata {
            version: Some(entry.version),
            abi_version: entry.abi_version,
            file_extensions: extensions_for(name)
                .iter()
                .map(|e| (*e).to_owned())
                .collect(),
            installed_path: Some(entry.artifact),
        })
    }

    /// Remove least-recently-accessed compiled artifacts beyond the
    /// retention count. Returns the number of artifacts removed.
    pub fn clean_cache(&self, keep_recent: Option<usize>) -> Result<usize> {
        self.cache
            .clean(keep_recent.unwrap_or(GRAMMAR_CACHE_KEEP_RECENT))
    }

    fn install_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .install_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(name.to_owned())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn load_artifact(&self, name: &str, path: &Path) -> Result<tree_sitter::Language> {
        let symbol_name = entry_symbol(name);

        // SAFETY: loading a shared library and calling its grammar entry
        // point is inherently unsafe; artifacts only enter the cache after
        // symbol validation in the builder.
        let language = unsafe {
            let library = libloading::Library::new(path).map_err(|e| Error::GrammarBuild {
                language: name.to_owned(),
                message: format!("failed to open {}: {e}", path.display()),
            })?;

            let entry: libloading::Symbol<'_, unsafe extern "C" fn() -> *const ()> = library
                .get(symbol_name.as_bytes())
                .map_err(|e| Error::GrammarBuild {
                    language: name.to_owned(),
                    message: format!("missing entry symbol {symbol_name}: {e}"),
                })?;

            let language_fn = tree_sitter_language::LanguageFn::from_raw(*entry);
            let language = tree_sitter::Language::new(language_fn);

            self.loaded.insert(
                name.to_owned(),
                Arc::new(LoadedGrammar {
                    _library: library,
                    language: language.clone(),
                }),
            );
            language
        };

        Ok(language)
    }
}

fn make_parser(name: &str, language: &tree_sitter::Language) -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(language)
        .map_err(|e| Error::GrammarBuild {
            language: name.to_owned(),
            message: format!("ABI mismatch: {e}"),
        })?;
    Ok(parser)
}

/// Well-known entry symbol exported by every compiled grammar
pub fn entry_symbol(name: &str) -> String {
    format!("tree_sitter_{}", name.replace('-', "_"))
}

/// Default per-user directory holding compiled grammar artifacts
pub fn default_grammar_dir() -> Result<PathBuf> {
    let base = dirs::cache_dir()
        .ok_or_else(|| Error::io("no user cache directory available"))?;
    Ok(base.join("code-chunker").join("grammars"))
}

fn tempdir_in(root: &Path) -> Result<tempdir::StagingDir> {
    tempdir::StagingDir::new(root)
}

mod tempdir {
    //! Minimal staging directory that is removed on drop. Downloads are
    //! always transient; only compiled artifacts persist in the cache.

    use crate::domain::error::Result;
    use std::path::{Path, PathBuf};

    pub struct StagingDir {
        path: PathBuf,
    }

    impl StagingDir {
        pub fn new(root: &Path) -> Result<Self> {
            let path = root.join(format!("staging-{}", std::process::id()));
            if path.exists() {
                std::fs::remove_dir_all(&path)?;
            }
            std::fs::create_dir_all(&path)?;
            Ok(Self { path })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for StagingDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

/// Statically linked grammars always available to the registry
pub const BUILTIN_LANGUAGES: &[(&str, &[&str])] = &[
    ("rust", &["rs"]),
    ("python", &["py", "pyi", "pyw"]),
    ("javascript", &["js", "mjs", "cjs", "jsx"]),
    ("typescript", &["ts", "tsx", "mts", "cts"]),
    ("java", &["java"]),
    ("go", &["go"]),
    ("c", &["c", "h"]),
    ("cpp", &["cpp", "cc", "cxx", "hpp", "hh"]),
    ("csharp", &["cs"]),
    ("ruby", &["rb", "rake"]),
    ("php", &["php"]),
    ("swift", &["swift"]),
    ("kotlin", &["kt", "kts"]),
];

/// Resolve a statically linked grammar by canonical name
pub fn builtin_language(name: &str) -> Option<tree_sitter::Language> {
    let language = match name {
        "rust" => tree_sitter_rust::LANGUAGE.into(),
        "python" => tree_sitter_python::LANGUAGE.into(),
        "javascript" => tree_sitter_javascript::LANGUAGE.into(),
        "typescript" => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        "java" => tree_sitter_java::LANGUAGE.into(),
        "go" => tree_sitter_go::LANGUAGE.into(),
        "c" => tree_sitter_c::LANGUAGE.into(),
        "cpp" => tree_sitter_cpp::LANGUAGE.into(),
        "csharp" => tree_sitter_c_sharp::LANGUAGE.into(),
        "ruby" => tree_sitter_ruby::LANGUAGE.into(),
        "php" => tree_sitter_php::LANGUAGE_PHP.into(),
        "swift" => tree_sitter_swift::LANGUAGE.into(),
        "kotlin" => tree_sitter_kotlin_ng::LANGUAGE.into(),
        _ => return None,
    };
    Some(language)
}

/// Canonical language for a file extension, considering built-ins only
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.trim_start_matches('.');
    BUILTIN_LANGUAGES
        .iter()
        .find(|(_, exts)| exts.contains(&ext))
        .map(|(name, _)| *name)
}

/// File extensions associated with a language
pub fn extensions_for(name: &str) -> &'static [&'static str] {
    BUILTIN_LANGUAGES
        .iter()
        .find(|(lang, _)| *lang == name)
        .map_or(&[], |(_, exts)| *exts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_resolve_and_parse() {
        let registry = GrammarRegistry::with_cache_dir(std::env::temp_dir().join("cc-reg-test"))
            .expect("registry");
        assert!(registry.is_installed("python"));

        let mut parser = registry.parser("python").expect("parser");
        let tree = parser.parse("def f(): pass", None).expect("tree");
        assert_eq!(tree.root_node().kind(), "module");
    }

    #[test]
    fn unknown_language_is_unavailable() {
        let registry = GrammarRegistry::with_cache_dir(std::env::temp_dir().join("cc-reg-test2"))
            .expect("registry");
        let err = match registry.parser("klingon") {
            Err(e) => e,
            Ok(_) => panic!("expected klingon to be unavailable"),
        };
        assert!(matches!(
            err,
            crate::domain::Error::GrammarUnavailable { .. }
        ));
    }

    #[test]
    fn extension_lookup_covers_builtins() {
        assert_eq!(language_for_extension("rs"), Some("rust"));
        assert_eq!(language_for_extension(".py"), Some("python"));
        assert_eq!(language_for_extension("txt"), None);
    }

    #[test]
    fn entry_symbol_normalizes_hyphens() {
        assert_eq!(entry_symbol("c-sharp"), "tree_sitter_c_sharp");
        assert_eq!(entry_symbol("python"), "tree_sitter_python");
    }
}
