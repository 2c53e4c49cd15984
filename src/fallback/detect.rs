//! File type and encoding detection for fallback chunking

use crate::constants::{BINARY_NON_TEXT_RATIO, DETECTION_SAMPLE_SIZE};
use crate::domain::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Detected file types for non-grammar content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Plain prose text
    Text,
    /// Log output with level markers
    Log,
    /// Markdown documents
    Markdown,
    /// Comma/tab separated data
    Csv,
    /// JSON documents
    Json,
    /// XML documents
    Xml,
    /// YAML documents
    Yaml,
    /// INI-style configuration
    Config,
    /// Binary content, not chunkable as text
    Binary,
    /// Nothing recognizable
    Unknown,
}

impl FileType {
    /// Canonical tag used as the chunk `language` for this file type
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Text => "text",
            FileType::Log => "log",
            FileType::Markdown => "markdown",
            FileType::Csv => "csv",
            FileType::Json => "json",
            FileType::Xml => "xml",
            FileType::Yaml => "yaml",
            FileType::Config => "config",
            FileType::Binary => "binary",
            FileType::Unknown => "unknown",
        }
    }
}

/// Map a file extension to a fallback file type
pub fn file_type_for_extension(ext: &str) -> FileType {
    match ext.trim_start_matches('.').to_lowercase().as_str() {
        "txt" | "text" => FileType::Text,
        "log" | "logs" | "out" | "err" => FileType::Log,
        "md" | "markdown" | "mdown" | "mkd" => FileType::Markdown,
        "csv" | "tsv" => FileType::Csv,
        "json" | "jsonl" => FileType::Json,
        "xml" => FileType::Xml,
        "yaml" | "yml" => FileType::Yaml,
        "ini" | "cfg" | "conf" | "config" | "properties" => FileType::Config,
        _ => FileType::Unknown,
    }
}

/// Detect the file type from a path and (optionally) its content
pub fn detect_file_type(path: &str, content: Option<&[u8]>) -> FileType {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("");

    let by_extension = file_type_for_extension(ext);
    if by_extension != FileType::Unknown {
        return by_extension;
    }

    let Some(bytes) = content else {
        return FileType::Unknown;
    };

    if looks_binary(bytes) {
        return FileType::Binary;
    }

    sniff_content(bytes)
}

/// Whether a byte sample looks binary: a null byte, or more than 30%
/// non-text bytes in the sample.
pub fn looks_binary(bytes: &[u8]) -> bool {
    let sample = &bytes[..bytes.len().min(DETECTION_SAMPLE_SIZE)];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0) {
        return true;
    }

    let non_text = sample
        .iter()
        .filter(|&&b| b < 0x09 || (b > 0x0d && b < 0x20) || b == 0x7f)
        .count();
    (non_text as f64 / sample.len() as f64) > BINARY_NON_TEXT_RATIO
}

fn sniff_content(bytes: &[u8]) -> FileType {
    let text = String::from_utf8_lossy(&bytes[..bytes.len().min(DETECTION_SAMPLE_SIZE)]);
    let trimmed = text.trim_start();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return FileType::Json;
    }
    if trimmed.starts_with("<?xml") || trimmed.starts_with('<') {
        return FileType::Xml;
    }
    if trimmed.starts_with("# ") || trimmed.starts_with("## ") {
        return FileType::Markdown;
    }

    let mut level_lines = 0usize;
    let mut lines = 0usize;
    for line in text.lines().take(50) {
        lines += 1;
        if ["ERROR", "WARN", "INFO", "DEBUG", "TRACE", "FATAL"]
            .iter()
            .any(|level| line.contains(level))
        {
            level_lines += 1;
        }
    }
    if lines > 0 && level_lines * 2 >= lines {
        return FileType::Log;
    }

    FileType::Text
}

/// Decode bytes as UTF-8, recovering with replacement characters.
///
/// Returns the text plus a flag telling whether replacement happened; the
/// caller is expected to surface the recovery as a warning and annotate
/// affected chunks.
pub fn decode_text(path: &str, bytes: &[u8]) -> Result<(String, bool)> {
    if looks_binary(bytes) {
        return Err(Error::BinaryFile {
            file_path: path.to_owned(),
        });
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Ok((text.to_owned(), false)),
        Err(_) => {
            warn!(file = path, "invalid UTF-8, decoding with replacement");
            Ok((String::from_utf8_lossy(bytes).into_owned(), true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_map_to_types() {
        assert_eq!(file_type_for_extension("md"), FileType::Markdown);
        assert_eq!(file_type_for_extension(".log"), FileType::Log);
        assert_eq!(file_type_for_extension("yml"), FileType::Yaml);
        assert_eq!(file_type_for_extension("weird"), FileType::Unknown);
    }

    #[test]
    fn null_bytes_mean_binary() {
        assert!(looks_binary(b"abc\0def"));
        assert!(!looks_binary(b"plain old text\n"));
    }

    #[test]
    fn binary_file_is_an_error() {
        let err = decode_text("blob.bin", b"\x00\x01\x02").unwrap_err();
        assert!(matches!(err, Error::BinaryFile { .. }));
    }

    #[test]
    fn invalid_utf8_is_recovered() {
        let (text, replaced) = decode_text("weird.txt", &[0x68, 0x69, 0xff, 0x21]).unwrap();
        assert!(replaced);
        assert!(text.starts_with("hi"));
    }

    #[test]
    fn content_sniffing_recognizes_logs() {
        let log = "2024-01-01 ERROR boom\n2024-01-01 INFO ok\n";
        assert_eq!(detect_file_type("noext", Some(log.as_bytes())), FileType::Log);
    }
}
