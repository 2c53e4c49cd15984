//! Structure-preserving export of chunks and relationships
//!
//! One coordinating contract ([`StructuredExporter`]) and four back-end
//! families: JSON/JSONL, SQLite and PostgreSQL, Neo4j Cypher, and
//! GraphML/DOT. Every back-end supports a streaming form that accepts
//! chunk and relationship iterators and flushes in batches.

pub mod graph;
pub mod json;
pub mod neo4j;
pub mod sql;
pub mod sqlite;

use crate::constants::EXPORT_FORMAT_VERSION;
use crate::domain::error::Result;
use crate::domain::types::{Chunk, ChunkRelationship};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub use graph::{DotExporter, GraphmlExporter};
pub use json::{JsonExporter, JsonlExporter};
pub use neo4j::Neo4jExporter;
pub use sql::PostgresExporter;
pub use sqlite::SqliteExporter;

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Single JSON document
    Json,
    /// Newline-delimited JSON records
    Jsonl,
    /// SQLite database file
    Sqlite,
    /// PostgreSQL DDL+DML script
    Postgresql,
    /// Neo4j Cypher script
    Neo4j,
    /// GraphML document
    Graphml,
    /// Graphviz DOT document
    Dot,
}

impl ExportFormat {
    /// Canonical format name
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Jsonl => "jsonl",
            ExportFormat::Sqlite => "sqlite",
            ExportFormat::Postgresql => "postgresql",
            ExportFormat::Neo4j => "neo4j",
            ExportFormat::Graphml => "graphml",
            ExportFormat::Dot => "dot",
        }
    }
}

/// Metadata describing one export operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Format the export was produced in
    pub format: ExportFormat,
    /// Format version
    pub version: String,
    /// RFC 3339 creation timestamp
    pub created_at: String,
    /// Source files covered by the export
    pub source_files: Vec<String>,
    /// Number of chunks exported
    pub chunk_count: usize,
    /// Number of relationships exported
    pub relationship_count: usize,
    /// Back-end specific options in effect
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

impl ExportMetadata {
    /// Generate metadata from the data itself when the caller provides none
    pub fn generate(
        format: ExportFormat,
        chunks: &[Chunk],
        relationships: &[ChunkRelationship],
    ) -> Self {
        let mut source_files: Vec<String> =
            chunks.iter().map(|c| c.file_path.clone()).collect();
        source_files.sort();
        source_files.dedup();

        Self {
            format,
            version: EXPORT_FORMAT_VERSION.to_owned(),
            created_at: Utc::now().to_rfc3339(),
            source_files,
            chunk_count: chunks.len(),
            relationship_count: relationships.len(),
            options: BTreeMap::new(),
        }
    }
}

/// Common contract implemented by every export back-end
pub trait StructuredExporter {
    /// The format this back-end produces
    fn format(&self) -> ExportFormat;

    /// Export a complete chunk/relationship set to a file
    fn export(
        &self,
        chunks: &[Chunk],
        relationships: &[ChunkRelationship],
        output: &Path,
        metadata: Option<&ExportMetadata>,
    ) -> Result<()>;

    /// Export from iterators, writing incrementally in batches.
    ///
    /// Input order is preserved per record type.
    fn export_streaming(
        &self,
        chunks: &mut dyn Iterator<Item = Chunk>,
        relationships: &mut dyn Iterator<Item = ChunkRelationship>,
        output: &Path,
    ) -> Result<()>;
}

/// Escape a string for a single-quoted SQL literal
pub(crate) fn sql_escape(text: &str) -> String {
    text.replace('\'', "''")
}

/// Escape a string for XML text or attribute content
pub(crate) fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_metadata_counts_and_dedups() {
        let chunk_a = Chunk::new("text", "a.txt", "t", "xx", 0, 2, 1, 1);
        let chunk_b = Chunk::new("text", "a.txt", "t", "yy", 2, 4, 1, 1);
        let metadata = ExportMetadata::generate(ExportFormat::Json, &[chunk_a, chunk_b], &[]);

        assert_eq!(metadata.chunk_count, 2);
        assert_eq!(metadata.source_files, vec!["a.txt".to_owned()]);
        assert_eq!(metadata.version, "1.0");
    }

    #[test]
    fn escapes() {
        assert_eq!(sql_escape("it's"), "it''s");
        assert_eq!(xml_escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
