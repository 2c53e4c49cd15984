//! Grammar compilation
//!
//! Turns a fetched grammar source tree into a validated shared library.
//! Sources are collected from the grammar's `src/` directory (`parser.c`
//! plus any scanner in C or C++); the host toolchain is probed and invoked
//! with platform-appropriate flags; the artifact is validated by opening
//! it and resolving the well-known entry symbol.

use crate::domain::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Shared library extension on the host platform
pub fn lib_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        ".dll"
    } else if cfg!(target_os = "macos") {
        ".dylib"
    } else {
        ".so"
    }
}

/// C and C++ sources collected from a grammar's `src/` directory
#[derive(Debug, Default)]
pub struct GrammarSourceSet {
    /// Plain C sources (`parser.c`, `scanner.c`)
    pub c_files: Vec<PathBuf>,
    /// C++ scanner sources (`scanner.cc`)
    pub cc_files: Vec<PathBuf>,
    /// Include directory (the `src/` directory itself)
    pub include_dir: PathBuf,
}

impl GrammarSourceSet {
    /// Whether the set contains a C++ scanner
    pub fn needs_cxx(&self) -> bool {
        !self.cc_files.is_empty()
    }

    /// Every source file, C first
    pub fn all_files(&self) -> impl Iterator<Item = &PathBuf> {
        self.c_files.iter().chain(self.cc_files.iter())
    }
}

/// Compiles grammar sources into shared libraries
pub struct GrammarBuilder {
    build_logs: HashMap<String, String>,
}

impl Default for GrammarBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarBuilder {
    /// Create a builder
    pub fn new() -> Self {
        Self {
            build_logs: HashMap::new(),
        }
    }

    /// Collect compilable sources from an extracted grammar repository
    pub fn collect_sources(repo_root: &Path) -> Result<GrammarSourceSet> {
        let src_dir = repo_root.join("src");
        if !src_dir.is_dir() {
            return Err(Error::io(format!(
                "no src/ directory under {}",
                repo_root.display()
            )));
        }

        let mut set = GrammarSourceSet {
            include_dir: src_dir.clone(),
            ..GrammarSourceSet::default()
        };

        for entry in std::fs::read_dir(&src_dir)? {
            let path = entry?.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("c") => set.c_files.push(path),
                Some("cc") | Some("cpp") => set.cc_files.push(path),
                _ => {}
            }
        }

        set.c_files.sort();
        set.cc_files.sort();

        if set.c_files.is_empty() && set.cc_files.is_empty() {
            return Err(Error::io(format!(
                "no C/C++ sources under {}",
                src_dir.display()
            )));
        }

        Ok(set)
    }

    /// Probe the host for a usable compiler driver
    pub fn find_compiler(needs_cxx: bool) -> Result<String> {
        let candidates: &[&str] = if needs_cxx {
            &["c++", "g++", "clang++"]
        } else {
            &["cc", "gcc", "clang"]
        };

        for candidate in candidates {
            let probe = Command::new(candidate).arg("--version").output();
            if matches!(&probe, Ok(output) if output.status.success()) {
                debug!(compiler = candidate, "toolchain probe succeeded");
                return Ok((*candidate).to_owned());
            }
        }

        Err(Error::ToolchainMissing {
            message: format!("none of {candidates:?} answered --version"),
        })
    }

    /// Compile one grammar into `out_path`
    pub fn build(&mut self, name: &str, repo_root: &Path, out_path: &Path) -> Result<PathBuf> {
        let sources = Self::collect_sources(repo_root)?;
        let compiler = Self::find_compiler(sources.needs_cxx())?;

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new(&compiler);
        cmd.arg("-shared");
        if !cfg!(target_os = "windows") {
            cmd.arg("-fPIC");
        }
        if sources.needs_cxx() {
            cmd.arg("-lstdc++");
        }
        cmd.arg("-I").arg(&sources.include_dir);
        cmd.arg("-o").arg(out_path);
        for file in sources.all_files() {
            cmd.arg(file);
        }

        debug!(language = name, compiler, "compiling grammar");
        let output = cmd.output().map_err(|e| Error::ToolchainMissing {
            message: format!("failed to spawn {compiler}: {e}"),
        })?;

        let log = String::from_utf8_lossy(&output.stderr).into_owned();
        self.build_logs.insert(name.to_owned(), log.clone());

        if !output.status.success() {
            return Err(Error::GrammarBuild {
                language: name.to_owned(),
                message: format!("compilation failed: {log}"),
            });
        }

        if !out_path.exists() {
            return Err(Error::GrammarBuild {
                language: name.to_owned(),
                message: format!("artifact not created at {}", out_path.display()),
            });
        }

        info!(language = name, artifact = %out_path.display(), "grammar compiled");
        Ok(out_path.to_path_buf())
    }

    /// Build several grammars into one shared library (single-blob build).
    ///
    /// Each grammar repository contributes its sources; the resulting
    /// library exports one entry symbol per grammar.
    pub fn build_blob(
        &mut self,
        grammars: &[(&str, &Path)],
        out_path: &Path,
    ) -> Result<PathBuf> {
        let mut all_sets = Vec::new();
        for (name, repo_root) in grammars {
            let set = Self::collect_sources(repo_root).map_err(|e| Error::GrammarBuild {
                language: (*name).to_owned(),
                message: e.to_string(),
            })?;
            all_sets.push(set);
        }

        let needs_cxx = all_sets.iter().any(GrammarSourceSet::needs_cxx);
        let compiler = Self::find_compiler(needs_cxx)?;

        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut cmd = Command::new(&compiler);
        cmd.arg("-shared");
        if !cfg!(target_os = "windows") {
            cmd.arg("-fPIC");
        }
        if needs_cxx {
            cmd.arg("-lstdc++");
        }
        for set in &all_sets {
            cmd.arg("-I").arg(&set.include_dir);
        }
        cmd.arg("-o").arg(out_path);
        for set in &all_sets {
            for file in set.all_files() {
                cmd.arg(file);
            }
        }

        let output = cmd.output().map_err(|e| Error::ToolchainMissing {
            message: format!("failed to spawn {compiler}: {e}"),
        })?;

        if !output.status.success() {
            return Err(Error::GrammarBuild {
                language: "blob".to_owned(),
                message: format!(
                    "blob compilation failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(out_path.to_path_buf())
    }

    /// Open an artifact, resolve its entry symbol and return the ABI version
    pub fn validate(artifact: &Path, name: &str) -> Result<usize> {
        let symbol_name = crate::grammar::registry::entry_symbol(name);

        // SAFETY: validation is the same operation the registry performs on
        // load; the library came from our own compiler invocation.
        let abi = unsafe {
            let library =
                libloading::Library::new(artifact).map_err(|e| Error::GrammarBuild {
                    language: name.to_owned(),
                    message: format!("cannot open {}: {e}", artifact.display()),
                })?;

            let entry: libloading::Symbol<'_, unsafe extern "C" fn() -> *const ()> = library
                .get(symbol_name.as_bytes())
                .map_err(|e| Error::GrammarBuild {
                    language: name.to_owned(),
                    message: format!("entry symbol {symbol_name} not found: {e}"),
                })?;

            let language =
                tree_sitter::Language::new(tree_sitter_language::LanguageFn::from_raw(*entry));
            language.abi_version()
        };

        debug!(language = name, abi, "grammar artifact validated");
        Ok(abi)
    }

    /// Compiler output captured for a language during the last build
    pub fn build_log(&self, name: &str) -> Option<&str> {
        self.build_logs.get(name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn collect_sources_requires_src_dir() {
        let dir = TempDir::new().unwrap();
        let err = GrammarBuilder::collect_sources(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn collect_sources_splits_c_and_cxx() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("parser.c"), "/* c */").unwrap();
        std::fs::write(src.join("scanner.cc"), "/* cxx */").unwrap();
        std::fs::write(src.join("grammar.json"), "{}").unwrap();

        let set = GrammarBuilder::collect_sources(dir.path()).unwrap();
        assert_eq!(set.c_files.len(), 1);
        assert_eq!(set.cc_files.len(), 1);
        assert!(set.needs_cxx());
    }

    #[test]
    fn validate_rejects_non_library() {
        let dir = TempDir::new().unwrap();
        let bogus = dir.path().join(format!("fake{}", lib_extension()));
        std::fs::write(&bogus, b"definitely not elf").unwrap();

        let err = GrammarBuilder::validate(&bogus, "fake").unwrap_err();
        assert!(matches!(err, Error::GrammarBuild { .. }));
    }
}
