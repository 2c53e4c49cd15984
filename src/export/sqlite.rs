//! SQLite export back-end
//!
//! Writes chunks, relationships and export metadata into three indexed
//! tables. All inserts happen inside a single transaction.

use crate::domain::error::{Error, Result};
use crate::domain::types::{Chunk, ChunkRelationship};
use crate::export::{ExportFormat, ExportMetadata, StructuredExporter};
use rusqlite::{params, Connection};
use std::path::Path;

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    chunk_id TEXT PRIMARY KEY,
    language TEXT NOT NULL,
    file_path TEXT NOT NULL,
    node_type TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    byte_start INTEGER NOT NULL,
    byte_end INTEGER NOT NULL,
    parent_context TEXT,
    content TEXT NOT NULL,
    parent_chunk_id TEXT,
    chunk_references TEXT DEFAULT '[]',
    chunk_dependencies TEXT DEFAULT '[]',
    metadata TEXT DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_chunk_id TEXT NOT NULL,
    target_chunk_id TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    metadata TEXT DEFAULT '{}'
);
CREATE TABLE IF NOT EXISTS export_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    format TEXT NOT NULL,
    version TEXT NOT NULL,
    created_at TEXT NOT NULL,
    source_files TEXT NOT NULL,
    chunk_count INTEGER NOT NULL,
    relationship_count INTEGER NOT NULL,
    options TEXT DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_chunks_chunk_id ON chunks(chunk_id);
CREATE INDEX IF NOT EXISTS idx_chunks_file_path ON chunks(file_path);
CREATE INDEX IF NOT EXISTS idx_chunks_node_type ON chunks(node_type);
CREATE INDEX IF NOT EXISTS idx_chunks_language ON chunks(language);
CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_chunk_id);
CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_chunk_id);
CREATE INDEX IF NOT EXISTS idx_relationships_type ON relationships(relationship_type);
";

/// SQLite database exporter
#[derive(Debug, Default)]
pub struct SqliteExporter;

impl SqliteExporter {
    /// Create the SQLite exporter
    pub fn new() -> Self {
        Self
    }

    fn open(output: &Path) -> Result<Connection> {
        let conn = Connection::open(output).map_err(|e| Error::ExportIo {
            message: format!("cannot open database {}", output.display()),
            source: Some(Box::new(e)),
        })?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| Error::ExportIo {
                message: "cannot create tables".to_owned(),
                source: Some(Box::new(e)),
            })?;
        Ok(conn)
    }

    fn insert_all<C, R>(
        conn: &mut Connection,
        chunks: C,
        relationships: R,
        metadata: &ExportMetadata,
    ) -> Result<(usize, usize)>
    where
        C: Iterator<Item = Chunk>,
        R: Iterator<Item = ChunkRelationship>,
    {
        let tx = conn.transaction().map_err(db_err)?;
        let mut chunk_count = 0usize;
        let mut relationship_count = 0usize;

        {
            let mut insert_chunk = tx
                .prepare(
                    "INSERT OR REPLACE INTO chunks (
                        chunk_id, language, file_path, node_type, start_line, end_line,
                        byte_start, byte_end, parent_context, content, parent_chunk_id,
                        chunk_references, chunk_dependencies, metadata
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                )
                .map_err(db_err)?;

            for chunk in chunks {
                insert_chunk
                    .execute(params![
                        chunk.chunk_id,
                        chunk.language,
                        chunk.file_path,
                        chunk.node_type,
                        chunk.start_line as i64,
                        chunk.end_line as i64,
                        chunk.byte_start as i64,
                        chunk.byte_end as i64,
                        chunk.parent_context,
                        chunk.content,
                        chunk.parent_chunk_id,
                        serde_json::to_string(&chunk.references)?,
                        serde_json::to_string(&chunk.dependencies)?,
                        serde_json::to_string(&chunk.metadata)?,
                    ])
                    .map_err(db_err)?;
                chunk_count += 1;
            }

            let mut insert_relationship = tx
                .prepare(
                    "INSERT INTO relationships (
                        source_chunk_id, target_chunk_id, relationship_type, metadata
                    ) VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(db_err)?;

            for relationship in relationships {
                insert_relationship
                    .execute(params![
                        relationship.source_chunk_id,
                        relationship.target_chunk_id,
                        relationship.kind.as_str(),
                        serde_json::to_string(&relationship.metadata)?,
                    ])
                    .map_err(db_err)?;
                relationship_count += 1;
            }

            tx.execute(
                "INSERT INTO export_metadata (
                    format, version, created_at, source_files,
                    chunk_count, relationship_count, options
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    metadata.format.as_str(),
                    metadata.version,
                    metadata.created_at,
                    serde_json::to_string(&metadata.source_files)?,
                    chunk_count as i64,
                    relationship_count as i64,
                    serde_json::to_string(&metadata.options)?,
                ],
            )
            .map_err(db_err)?;
        }

        tx.commit().map_err(db_err)?;
        Ok((chunk_count, relationship_count))
    }
}

fn db_err(e: rusqlite::Error) -> Error {
    Error::ExportIo {
        message: "database operation failed".to_owned(),
        source: Some(Box::new(e)),
    }
}

impl StructuredExporter for SqliteExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Sqlite
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
                generated = ExportMetadata::generate(ExportFormat::Sqlite, chunks, relationships);
                &generated
            }
        };

        let mut conn = Self::open(output)?;
        Self::insert_all(
            &mut conn,
            chunks.iter().cloned(),
            relationships.iter().cloned(),
            metadata,
        )?;
        Ok(())
    }

    fn export_streaming(
        &self,
        chunks: &mut dyn Iterator<Item = Chunk>,
        relationships: &mut dyn Iterator<Item = ChunkRelationship>,
        output: &Path,
    ) -> Result<()> {
        let metadata = ExportMetadata {
            format: ExportFormat::Sqlite,
            version: crate::constants::EXPORT_FORMAT_VERSION.to_owned(),
            created_at: chrono::Utc::now().to_rfc3339(),
            source_files: Vec::new(),
            chunk_count: 0,
            relationship_count: 0,
            options: std::collections::BTreeMap::new(),
        };

        let mut conn = Self::open(output)?;
        Self::insert_all(&mut conn, chunks, relationships, &metadata)?;
        Ok(())
    }
}
