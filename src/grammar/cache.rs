//! Compiled grammar artifact cache
//!
//! Artifacts live under a user-writable directory as
//! `<language>-<revision>.<ext>` with a JSON sidecar recording the cache
//! entry (creation time, last access, ABI version). `is_cached` requires
//! both the sidecar and the artifact file. Disk access is serialized by a
//! per-cache mutex.

use crate::domain::error::{Error, Result};
use crate::grammar::builder::lib_extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// A cache record persisted next to each compiled artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cache key, `<language>-<revision>`
    pub key: String,
    /// Artifact file name the entry describes
    pub value: String,
    /// When the artifact was produced
    pub created_at: DateTime<Utc>,
    /// When the artifact was last resolved
    pub accessed_at: DateTime<Utc>,
    /// Optional time-to-live; entries never expire when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    /// Tree-sitter ABI version recorded at validation time
    #[serde(default)]
    pub abi_version: usize,
}

/// A resolved cached grammar
#[derive(Debug, Clone)]
pub struct CachedGrammar {
    /// Revision the artifact was built from
    pub version: String,
    /// ABI version recorded at validation time
    pub abi_version: usize,
    /// Absolute path of the compiled artifact
    pub artifact: PathBuf,
}

/// On-disk cache of compiled grammar shared libraries
pub struct GrammarCache {
    root: PathBuf,
    lock: Mutex<()>,
}

impl GrammarCache {
    /// Create a cache rooted at a directory (created lazily by writes)
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            lock: Mutex::new(()),
        }
    }

    /// Root directory of the cache
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifact path for a language/revision pair, if the artifact exists
    pub fn artifact_path(&self, language: &str, revision: &str) -> Option<PathBuf> {
        let path = self.slot(language, revision);
        path.exists().then_some(path)
    }

    /// Path an installer should compile into for a language/revision pair
    pub fn reserve_artifact(&self, language: &str, revision: &str) -> PathBuf {
        self.slot(language, revision)
    }

    /// Whether both the metadata sidecar and the artifact are present
    pub fn is_cached(&self, language: &str, revision: &str) -> bool {
        let _guard = self.guard();
        self.slot(language, revision).exists() && self.sidecar(language, revision).exists()
    }

    /// Record a freshly validated artifact and stamp its cache entry
    pub fn commit(&self, language: &str, revision: &str, abi_version: usize) -> Result<()> {
        let _guard = self.guard();
        std::fs::create_dir_all(&self.root)?;

        let artifact = self.slot(language, revision);
        if !artifact.exists() {
            return Err(Error::internal(format!(
                "artifact missing at commit: {}",
                artifact.display()
            )));
        }

        let now = Utc::now();
        let entry = CacheEntry {
            key: format!("{language}-{revision}"),
            value: artifact
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            created_at: now,
            accessed_at: now,
            ttl_seconds: None,
            abi_version,
        };

        let sidecar = self.sidecar(language, revision);
        std::fs::write(&sidecar, serde_json::to_string_pretty(&entry)?)?;
        debug!(language, revision, "cache entry committed");
        Ok(())
    }

    /// Latest cached artifact for a language (most recently accessed)
    pub fn latest_artifact(&self, language: &str) -> Option<PathBuf> {
        self.latest_entry(language).map(|e| e.artifact)
    }

    /// Latest cache entry for a language, refreshing its access time
    pub fn latest_entry(&self, language: &str) -> Option<CachedGrammar> {
        let _guard = self.guard();
        let mut best: Option<(CacheEntry, PathBuf, PathBuf)> = None;

        for (entry, artifact, sidecar) in self.entries() {
            if !entry.key.starts_with(&format!("{language}-")) || !artifact.exists() {
                continue;
            }
            let newer = best
                .as_ref()
                .is_none_or(|(b, _, _)| entry.accessed_at > b.accessed_at);
            if newer {
                best = Some((entry, artifact, sidecar));
            }
        }

        let (mut entry, artifact, sidecar) = best?;
        entry.accessed_at = Utc::now();
        if let Ok(json) = serde_json::to_string_pretty(&entry) {
            let _ = std::fs::write(&sidecar, json);
        }

        let version = entry
            .key
            .strip_prefix(&format!("{language}-"))
            .unwrap_or_default()
            .to_owned();

        Some(CachedGrammar {
            version,
            abi_version: entry.abi_version,
            artifact,
        })
    }

    /// Languages with at least one cached artifact
    pub fn cached_languages(&self) -> Vec<String> {
        let _guard = self.guard();
        let mut names: Vec<String> = self
            .entries()
            .filter(|(_, artifact, _)| artifact.exists())
            .filter_map(|(entry, _, _)| entry.key.split_once('-').map(|(l, _)| l.to_owned()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Remove every artifact and sidecar for one language.
    /// Returns the number of artifacts removed.
    pub fn remove_language(&self, language: &str) -> Result<usize> {
        let _guard = self.guard();
        let mut removed = 0;

        for (entry, artifact, sidecar) in self.entries() {
            if !entry.key.starts_with(&format!("{language}-")) {
                continue;
            }
            if artifact.exists() {
                std::fs::remove_file(&artifact)?;
                removed += 1;
            }
            std::fs::remove_file(&sidecar)?;
        }

        Ok(removed)
    }

    /// Remove least-recently-accessed artifacts beyond the retention count.
    /// Returns the number of artifacts removed.
    pub fn clean(&self, keep_recent: usize) -> Result<usize> {
        let _guard = self.guard();

        let mut entries: Vec<(CacheEntry, PathBuf, PathBuf)> = self.entries().collect();
        entries.sort_by(|a, b| b.0.accessed_at.cmp(&a.0.accessed_at));

        let mut removed = 0;
        for (entry, artifact, sidecar) in entries.into_iter().skip(keep_recent) {
            if artifact.exists() {
                std::fs::remove_file(&artifact)?;
            }
            std::fs::remove_file(&sidecar)?;
            removed += 1;
            debug!(key = %entry.key, "evicted grammar artifact");
        }

        Ok(removed)
    }

    fn entries(&self) -> impl Iterator<Item = (CacheEntry, PathBuf, PathBuf)> + '_ {
        let pattern = self.root.join("*.entry.json");
        glob::glob(&pattern.to_string_lossy())
            .into_iter()
            .flatten()
            .flatten()
            .filter_map(move |sidecar| {
                let text = std::fs::read_to_string(&sidecar).ok()?;
                let entry: CacheEntry = serde_json::from_str(&text).ok()?;
                let artifact = self.root.join(&entry.value);
                Some((entry, artifact, sidecar))
            })
    }

    fn slot(&self, language: &str, revision: &str) -> PathBuf {
        self.root
            .join(format!("{language}-{revision}{}", lib_extension()))
    }

    fn sidecar(&self, language: &str, revision: &str) -> PathBuf {
        self.root.join(format!("{language}-{revision}.entry.json"))
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fake_artifact(cache: &GrammarCache, language: &str, revision: &str) {
        std::fs::create_dir_all(cache.root()).unwrap();
        let path = cache.reserve_artifact(language, revision);
        std::fs::write(&path, b"not really a library").unwrap();
        cache.commit(language, revision, 14).unwrap();
    }

    #[test]
    fn cache_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = GrammarCache::new(dir.path().to_path_buf());

        assert!(!cache.is_cached("toml", "HEAD"));
        fake_artifact(&cache, "toml", "HEAD");
        assert!(cache.is_cached("toml", "HEAD"));

        let entry = cache.latest_entry("toml").unwrap();
        assert_eq!(entry.version, "HEAD");
        assert_eq!(entry.abi_version, 14);
        assert!(entry.artifact.exists());
    }

    #[test]
    fn sidecar_alone_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = GrammarCache::new(dir.path().to_path_buf());
        fake_artifact(&cache, "toml", "HEAD");

        std::fs::remove_file(cache.artifact_path("toml", "HEAD").unwrap()).unwrap();
        assert!(!cache.is_cached("toml", "HEAD"));
    }

    #[test]
    fn clean_keeps_most_recent() {
        let dir = TempDir::new().unwrap();
        let cache = GrammarCache::new(dir.path().to_path_buf());

        fake_artifact(&cache, "toml", "v1");
        fake_artifact(&cache, "ini", "v1");
        fake_artifact(&cache, "csv", "v1");

        let removed = cache.clean(2).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(cache.cached_languages().len(), 2);
    }

    #[test]
    fn remove_language_clears_all_revisions() {
        let dir = TempDir::new().unwrap();
        let cache = GrammarCache::new(dir.path().to_path_buf());

        fake_artifact(&cache, "toml", "v1");
        fake_artifact(&cache, "toml", "v2");

        assert_eq!(cache.remove_language("toml").unwrap(), 2);
        assert!(cache.latest_entry("toml").is_none());
    }
}
