//! Grammar source fetching
//!
//! Downloads a grammar repository tarball at a requested revision (HEAD
//! when unspecified), streaming progress through an optional callback, and
//! extracts it into a staging directory. Download archives are always
//! transient; only compiled artifacts are kept by the cache.

use crate::domain::error::{Error, Result};
use flate2::read::GzDecoder;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Progress events emitted while fetching a grammar source archive
#[derive(Debug, Clone)]
pub enum FetchProgress {
    /// Download started
    Started {
        /// URL being downloaded
        url: String,
    },
    /// A chunk of the archive arrived
    Received {
        /// Bytes received so far
        bytes_so_far: u64,
    },
    /// Download finished
    Completed {
        /// Total bytes received
        total_bytes: u64,
    },
}

/// Callback verdict: continue the download or abort at the next chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    /// Keep downloading
    Continue,
    /// Abort at the next chunk boundary
    Abort,
}

/// Streaming progress callback
pub type ProgressCallback = Box<dyn Fn(&FetchProgress) -> ProgressSignal + Send + Sync>;

/// Downloads and extracts grammar repositories
pub struct GrammarFetcher {
    client: reqwest::Client,
}

impl Default for GrammarFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarFetcher {
    /// Create a fetcher with a default HTTP client
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Fetch the repository at `revision` and extract it under `staging`.
    ///
    /// Returns the extracted repository root (the directory containing
    /// the grammar's `src/`).
    pub async fn fetch(
        &self,
        name: &str,
        repository_url: &str,
        revision: &str,
        staging: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<PathBuf> {
        let url = archive_url(repository_url, revision);
        let archive = staging.join(format!("{name}.tar.gz"));

        self.download(&url, &archive, progress).await?;
        let root = extract_archive(&archive, staging)?;

        // Archives are transient regardless of build outcome
        let _ = std::fs::remove_file(&archive);

        info!(language = name, revision, "grammar source fetched");
        Ok(root)
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        if let Some(callback) = progress {
            let signal = callback(&FetchProgress::Started {
                url: url.to_owned(),
            });
            if signal == ProgressSignal::Abort {
                return Err(Error::network("download aborted by caller"));
            }
        }

        let response = self.client.get(url).send().await.map_err(|e| Error::Network {
            message: format!("request to {url} failed"),
            source: Some(Box::new(e)),
        })?;

        if !response.status().is_success() {
            return Err(Error::network(format!(
                "download of {url} failed with status {}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| Error::Io {
                message: format!("cannot create {}", dest.display()),
                source: Some(Box::new(e)),
            })?;

        let mut received: u64 = 0;
        let mut response = response;
        while let Some(chunk) = response.chunk().await.map_err(|e| Error::Network {
            message: "interrupted while streaming archive".to_owned(),
            source: Some(Box::new(e)),
        })? {
            tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
                .await
                .map_err(|e| Error::Io {
                    message: format!("cannot write {}", dest.display()),
                    source: Some(Box::new(e)),
                })?;
            received += chunk.len() as u64;

            if let Some(callback) = progress {
                let signal = callback(&FetchProgress::Received {
                    bytes_so_far: received,
                });
                if signal == ProgressSignal::Abort {
                    drop(file);
                    let _ = tokio::fs::remove_file(dest).await;
                    return Err(Error::network("download aborted by caller"));
                }
            }
        }

        tokio::io::AsyncWriteExt::flush(&mut file).await.ok();

        if let Some(callback) = progress {
            callback(&FetchProgress::Completed {
                total_bytes: received,
            });
        }

        debug!(url, bytes = received, "archive downloaded");
        Ok(())
    }
}

/// Tarball URL for a repository revision
pub fn archive_url(repository_url: &str, revision: &str) -> String {
    let base = repository_url.trim_end_matches('/').trim_end_matches(".git");
    format!("{base}/archive/{revision}.tar.gz")
}

/// Extract a gzip tarball and return the single top-level directory
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<PathBuf> {
    let file = std::fs::File::open(archive).map_err(|e| Error::Io {
        message: format!("cannot open archive {}", archive.display()),
        source: Some(Box::new(e)),
    })?;

    let decoder = GzDecoder::new(file);
    let mut tar = tar::Archive::new(decoder);
    tar.unpack(dest).map_err(|e| Error::Io {
        message: format!("cannot extract {}", archive.display()),
        source: Some(Box::new(e)),
    })?;

    // GitHub tarballs contain exactly one `<repo>-<rev>/` directory
    let mut top_dirs: Vec<PathBuf> = std::fs::read_dir(dest)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    top_dirs.sort();

    top_dirs
        .into_iter()
        .next()
        .ok_or_else(|| Error::io(format!("archive {} extracted nothing", archive.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_url_shapes() {
        assert_eq!(
            archive_url("https://github.com/tree-sitter/tree-sitter-json", "HEAD"),
            "https://github.com/tree-sitter/tree-sitter-json/archive/HEAD.tar.gz"
        );
        assert_eq!(
            archive_url("https://github.com/x/y.git", "v1.2.3"),
            "https://github.com/x/y/archive/v1.2.3.tar.gz"
        );
    }

    #[test]
    fn extract_rejects_missing_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = extract_archive(&dir.path().join("missing.tar.gz"), dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
