//! PostgreSQL script export back-end
//!
//! Emits a self-contained SQL script: table DDL with JSONB columns, a
//! `BEGIN; ... COMMIT;` block of inserts with single-quote escaping, and
//! GIN indexes over the JSONB columns.

use crate::constants::EXPORT_BATCH_SIZE;
use crate::domain::error::{Error, Result};
use crate::domain::types::{Chunk, ChunkRelationship};
use crate::export::{sql_escape, ExportFormat, ExportMetadata, StructuredExporter};
use std::io::Write;
use std::path::Path;

const CREATE_TABLES: &str = "\
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    language TEXT NOT NULL,
    file_path TEXT NOT NULL,
    node_type TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    byte_start BIGINT NOT NULL,
    byte_end BIGINT NOT NULL,
    parent_context TEXT,
    content TEXT NOT NULL,
    parent_chunk_id TEXT,
    chunk_references JSONB DEFAULT '[]'::jsonb,
    chunk_dependencies JSONB DEFAULT '[]'::jsonb,
    metadata JSONB DEFAULT '{}'::jsonb
);

CREATE TABLE IF NOT EXISTS relationships (
    id BIGSERIAL PRIMARY KEY,
    source_chunk_id TEXT NOT NULL,
    target_chunk_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    metadata JSONB
);

CREATE TABLE IF NOT EXISTS export_metadata (
    id BIGSERIAL PRIMARY KEY,
    format TEXT NOT NULL,
    version TEXT NOT NULL,
    created_at TEXT NOT NULL,
    source_files JSONB NOT NULL,
    chunk_count INTEGER NOT NULL,
    relationship_count INTEGER NOT NULL,
    options JSONB
);
";

const CREATE_INDEXES: &str = "\
CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path);
CREATE INDEX IF NOT EXISTS idx_chunks_node_type ON chunks(node_type);
CREATE INDEX IF NOT EXISTS idx_chunks_language ON chunks(language);
CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_chunk_id);
CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_chunk_id);
CREATE INDEX IF NOT EXISTS idx_relationships_type ON relationships(relationship_type);
CREATE INDEX IF NOT EXISTS idx_chunks_references_gin ON chunks USING GIN (chunk_references);
CREATE INDEX IF NOT EXISTS idx_chunks_dependencies_gin ON chunks USING GIN (chunk_dependencies);
CREATE INDEX IF NOT EXISTS idx_chunks_metadata_gin ON chunks USING GIN (metadata);
CREATE INDEX IF NOT EXISTS idx_relationships_metadata_gin ON relationships USING GIN (metadata);
";

/// PostgreSQL DDL+DML script exporter
pub struct PostgresExporter {
    batch_size: usize,
}

impl Default for PostgresExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl PostgresExporter {
    /// Create a script exporter with the default batch size
    pub fn new() -> Self {
        Self {
            batch_size: EXPORT_BATCH_SIZE,
        }
    }

    /// Inserts per flushed batch during streaming
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn chunk_insert(chunk: &Chunk) -> Result<String> {
        Ok(format!(
            "INSERT INTO chunks (chunk_id, language, file_path, node_type, start_line, end_line, \
             byte_start, byte_end, parent_context, content, parent_chunk_id, chunk_references, \
             chunk_dependencies, metadata) VALUES ('{}', '{}', '{}', '{}', {}, {}, {}, {}, '{}', \
             '{}', {}, '{}'::jsonb, '{}'::jsonb, '{}'::jsonb) ON CONFLICT (chunk_id) DO NOTHING;",
            sql_escape(&chunk.chunk_id),
            sql_escape(&chunk.language),
            sql_escape(&chunk.file_path),
            sql_escape(&chunk.node_type),
            chunk.start_line,
            chunk.end_line,
            chunk.byte_start,
            chunk.byte_end,
            sql_escape(&chunk.parent_context),
            sql_escape(&chunk.content),
            match &chunk.parent_chunk_id {
                Some(id) => format!("'{}'", sql_escape(id)),
                None => "NULL".to_owned(),
            },
            sql_escape(&serde_json::to_string(&chunk.references)?),
            sql_escape(&serde_json::to_string(&chunk.dependencies)?),
            sql_escape(&serde_json::to_string(&chunk.metadata)?),
        ))
    }

    fn relationship_insert(relationship: &ChunkRelationship) -> Result<String> {
        Ok(format!(
            "INSERT INTO relationships (source_chunk_id, target_chunk_id, relationship_type, \
             metadata) VALUES ('{}', '{}', '{}', '{}'::jsonb);",
            sql_escape(&relationship.source_chunk_id),
            sql_escape(&relationship.target_chunk_id),
            relationship.kind.as_str(),
            sql_escape(&serde_json::to_string(&relationship.metadata)?),
        ))
    }

    fn metadata_insert(metadata: &ExportMetadata) -> Result<String> {
        Ok(format!(
            "INSERT INTO export_metadata (format, version, created_at, source_files, chunk_count, \
             relationship_count, options) VALUES ('{}', '{}', '{}', '{}'::jsonb, {}, {}, '{}'::jsonb);",
            metadata.format.as_str(),
            sql_escape(&metadata.version),
            sql_escape(&metadata.created_at),
            sql_escape(&serde_json::to_string(&metadata.source_files)?),
            metadata.chunk_count,
            metadata.relationship_count,
            sql_escape(&serde_json::to_string(&metadata.options)?),
        ))
    }

    fn open(output: &Path) -> Result<std::io::BufWriter<std::fs::File>> {
        let file = std::fs::File::create(output).map_err(|e| Error::ExportIo {
            message: format!("cannot create {}", output.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(std::io::BufWriter::new(file))
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writeln!(writer, "{line}").map_err(|e| Error::ExportIo {
        message: "cannot write SQL script".to_owned(),
        source: Some(Box::new(e)),
    })
}

impl StructuredExporter for PostgresExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Postgresql
    }

    fn export(
        &self,
        chunks: &[Chunk],
        relationships: &[ChunkRelationship],
        output: &Path,
        metadata: Option<&ExportMetadata>,
    ) -> Result<()> {
        let generated;
        let metadata = match metadata {
            Some(m) => m,
            None => {
                generated =
                    ExportMetadata::generate(ExportFormat::Postgresql, chunks, relationships);
                &generated
            }
        };

        let mut writer = Self::open(output)?;
        write_line(&mut writer, CREATE_TABLES)?;
        write_line(&mut writer, "BEGIN;")?;
        write_line(&mut writer, "")?;

        for chunk in chunks {
            write_line(&mut writer, &Self::chunk_insert(chunk)?)?;
        }
        write_line(&mut writer, "")?;
        for relationship in relationships {
            write_line(&mut writer, &Self::relationship_insert(relationship)?)?;
        }
        write_line(&mut writer, "")?;
        write_line(&mut writer, &Self::metadata_insert(metadata)?)?;

        write_line(&mut writer, "")?;
        write_line(&mut writer, "COMMIT;")?;
        write_line(&mut writer, "")?;
        write_line(&mut writer, CREATE_INDEXES)?;

        writer.flush().map_err(|e| Error::ExportIo {
            message: format!("cannot flush {}", output.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }

    fn export_streaming(
        &self,
        chunks: &mut dyn Iterator<Item = Chunk>,
        relationships: &mut dyn Iterator<Item = ChunkRelationship>,
        output: &Path,
    ) -> Result<()> {
        let mut writer = Self::open(output)?;
        write_line(&mut writer, CREATE_TABLES)?;
        write_line(&mut writer, "BEGIN;")?;

        let mut pending = 0usize;
        for chunk in chunks {
            write_line(&mut writer, &Self::chunk_insert(&chunk)?)?;
            pending += 1;
            if pending >= self.batch_size {
                writer.flush().map_err(|e| Error::ExportIo {
                    message: "cannot flush insert batch".to_owned(),
                    source: Some(Box::new(e)),
                })?;
                pending = 0;
            }
        }

        for relationship in relationships {
            write_line(&mut writer, &Self::relationship_insert(&relationship)?)?;
            pending += 1;
            if pending >= self.batch_size {
                writer.flush().map_err(|e| Error::ExportIo {
                    message: "cannot flush insert batch".to_owned(),
                    source: Some(Box::new(e)),
                })?;
                pending = 0;
            }
        }

        write_line(&mut writer, "COMMIT;")?;
        write_line(&mut writer, CREATE_INDEXES)?;
        writer.flush().map_err(|e| Error::ExportIo {
            message: format!("cannot flush {}", output.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn script_wraps_inserts_in_transaction() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.sql");

        let chunk = Chunk::new("text", "o'brien.txt", "t", "it's fine", 0, 9, 1, 1);
        PostgresExporter::new().export(&[chunk], &[], &path, None).unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        let begin = script.find("BEGIN;").unwrap();
        let insert = script.find("INSERT INTO chunks").unwrap();
        let commit = script.find("COMMIT;").unwrap();
        assert!(begin < insert && insert < commit);

        // Single quotes in user content are doubled
        assert!(script.contains("it''s fine"));
        assert!(script.contains("o''brien.txt"));
        assert!(script.contains("USING GIN"));
        assert!(script.contains("JSONB"));
    }
}
