//! Neo4j Cypher script export back-end
//!
//! Emits a uniqueness constraint on chunk ids, node creation via
//! `UNWIND ... MERGE` batches, and relationship creation grouped by type
//! with one `UNWIND ... MERGE` query per type per batch.

use crate::constants::EXPORT_BATCH_SIZE;
use crate::domain::error::{Error, Result};
use crate::domain::types::{Chunk, ChunkRelationship};
use crate::export::{ExportFormat, ExportMetadata, StructuredExporter};
use itertools::Itertools;
use std::io::Write;
use std::path::Path;

/// Neo4j Cypher exporter
pub struct Neo4jExporter {
    node_label: String,
    batch_size: usize,
    include_content: bool,
}

impl Default for Neo4jExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Neo4jExporter {
    /// Create an exporter labelling nodes `Chunk`
    pub fn new() -> Self {
        Self {
            node_label: "Chunk".to_owned(),
            batch_size: EXPORT_BATCH_SIZE,
            include_content: true,
        }
    }

    /// Override the node label
    pub fn with_node_label(mut self, label: impl Into<String>) -> Self {
        self.node_label = label.into();
        self
    }

    /// Relationships per `UNWIND` batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Skip chunk content in node properties
    pub fn without_content(mut self) -> Self {
        self.include_content = false;
        self
    }

    fn node_properties(&self, chunk: &Chunk) -> serde_json::Value {
        let mut properties = serde_json::json!({
            "chunk_id": chunk.chunk_id,
            "language": chunk.language,
            "file_path": chunk.file_path,
            "node_type": chunk.node_type,
            "start_line": chunk.start_line,
            "end_line": chunk.end_line,
            "byte_start": chunk.byte_start,
            "byte_end": chunk.byte_end,
            "parent_context": chunk.parent_context,
        });
        if self.include_content {
            properties["content"] = serde_json::json!(chunk.content);
        }
        properties
    }

    fn write_nodes<W: Write>(&self, writer: &mut W, chunks: &[Chunk]) -> Result<()> {
        for batch in chunks.chunks(self.batch_size) {
            let data: Vec<serde_json::Value> =
                batch.iter().map(|c| self.node_properties(c)).collect();

            write_line(writer, &format!("UNWIND {} AS chunk", serde_json::to_string(&data)?))?;
            write_line(
                writer,
                &format!(
                    "MERGE (c:{} {{chunk_id: chunk.chunk_id}})",
                    self.node_label
                ),
            )?;
            write_line(writer, "SET c += chunk;")?;
            write_line(writer, "")?;
        }
        Ok(())
    }

    fn write_relationships<W: Write>(
        &self,
        writer: &mut W,
        relationships: &[ChunkRelationship],
    ) -> Result<()> {
        // One UNWIND/MERGE query per relationship type per batch; the
        // relationship type becomes the Cypher edge label.
        let by_type = relationships
            .iter()
            .into_group_map_by(|r| r.kind.as_str());

        for (kind, edges) in by_type.into_iter().sorted_by_key(|(kind, _)| *kind) {
            let label = kind.to_uppercase();
            for batch in edges.chunks(self.batch_size) {
                let data: Vec<serde_json::Value> = batch
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "source": r.source_chunk_id,
                            "target": r.target_chunk_id,
                            "metadata": r.metadata,
                        })
                    })
                    .collect();

                write_line(writer, &format!("UNWIND {} AS rel", serde_json::to_string(&data)?))?;
                write_line(
                    writer,
                    &format!(
                        "MATCH (source:{0} {{chunk_id: rel.source}}) \
                         MATCH (target:{0} {{chunk_id: rel.target}})",
                        self.node_label
                    ),
                )?;
                write_line(writer, &format!("MERGE (source)-[r:{label}]->(target);"))?;
                write_line(writer, "")?;
            }
        }
        Ok(())
    }
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writeln!(writer, "{line}").map_err(|e| Error::ExportIo {
        message: "cannot write Cypher script".to_owned(),
        source: Some(Box::new(e)),
    })
}

impl StructuredExporter for Neo4jExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Neo4j
    }

    fn export(
        &self,
        chunks: &[Chunk],
        relationships: &[ChunkRelationship],
        output: &Path,
        _metadata: Option<&ExportMetadata>,
    ) -> Result<()> {
        let file = std::fs::File::create(output).map_err(|e| Error::ExportIo {
            message: format!("cannot create {}", output.display()),
            source: Some(Box::new(e)),
        })?;
        let mut writer = std::io::BufWriter::new(file);

        write_line(
            &mut writer,
            &format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (c:{}) REQUIRE c.chunk_id IS UNIQUE;",
                self.node_label
            ),
        )?;
        write_line(&mut writer, "")?;

        self.write_nodes(&mut writer, chunks)?;
        self.write_relationships(&mut writer, relationships)?;

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
        // Relationship grouping needs the full edge set; nodes stream in
        // batches regardless.
        let chunks: Vec<Chunk> = chunks.collect();
        let relationships: Vec<ChunkRelationship> = relationships.collect();
        self.export(&chunks, &relationships, output, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::RelationshipKind;
    use tempfile::TempDir;

    #[test]
    fn script_has_constraint_nodes_and_typed_edges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.cypher");

        let a = Chunk::new("rust", "a.rs", "function_item", "fn a() {}", 0, 9, 1, 1);
        let b = Chunk::new("rust", "a.rs", "function_item", "fn b() {}", 10, 19, 2, 2);
        let calls = ChunkRelationship::new(
            a.chunk_id.clone(),
            b.chunk_id.clone(),
            RelationshipKind::Calls,
        );
        let imports = ChunkRelationship::new(
            a.chunk_id.clone(),
            "import:std".to_owned(),
            RelationshipKind::Imports,
        );

        Neo4jExporter::new()
            .export(&[a, b], &[calls, imports], &path, None)
            .unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.contains("CREATE CONSTRAINT IF NOT EXISTS"));
        assert!(script.contains("UNWIND"));
        assert!(script.contains("MERGE (c:Chunk {chunk_id: chunk.chunk_id})"));
        assert!(script.contains("MERGE (source)-[r:CALLS]->(target);"));
        assert!(script.contains("MERGE (source)-[r:IMPORTS]->(target);"));
    }

    #[test]
    fn batching_splits_unwind_queries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("batched.cypher");

        let chunks: Vec<Chunk> = (0..5)
            .map(|i| {
                Chunk::new(
                    "text",
                    "f.txt",
                    "t",
                    format!("chunk number {i}"),
                    i * 20,
                    i * 20 + 14,
                    i + 1,
                    i + 1,
                )
            })
            .collect();

        Neo4jExporter::new()
            .with_batch_size(2)
            .export(&chunks, &[], &path, None)
            .unwrap();

        let script = std::fs::read_to_string(&path).unwrap();
        let unwinds = script.matches("UNWIND").count();
        assert_eq!(unwinds, 3);
    }
}
