//! GraphML and DOT export back-ends
//!
//! Chunks become nodes, relationships become typed directed edges.
//! Attribute inclusion is configurable; content is omitted by default in
//! DOT output where it would bloat labels.

use crate::domain::error::{Error, Result};
use crate::domain::types::{Chunk, ChunkRelationship};
use crate::export::{xml_escape, ExportFormat, ExportMetadata, StructuredExporter};
use std::io::Write;
use std::path::Path;

fn open(output: &Path) -> Result<std::io::BufWriter<std::fs::File>> {
    let file = std::fs::File::create(output).map_err(|e| Error::ExportIo {
        message: format!("cannot create {}", output.display()),
        source: Some(Box::new(e)),
    })?;
    Ok(std::io::BufWriter::new(file))
}

fn write_line<W: Write>(writer: &mut W, line: &str) -> Result<()> {
    writeln!(writer, "{line}").map_err(|e| Error::ExportIo {
        message: "cannot write graph document".to_owned(),
        source: Some(Box::new(e)),
    })
}

/// GraphML document exporter
pub struct GraphmlExporter {
    include_content: bool,
}

impl Default for GraphmlExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphmlExporter {
    /// Create a GraphML exporter including chunk content attributes
    pub fn new() -> Self {
        Self {
            include_content: true,
        }
    }

    /// Omit chunk content from node attributes
    pub fn without_content(mut self) -> Self {
        self.include_content = false;
        self
    }
}

impl StructuredExporter for GraphmlExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Graphml
    }

    fn export(
        &self,
        chunks: &[Chunk],
        relationships: &[ChunkRelationship],
        output: &Path,
        _metadata: Option<&ExportMetadata>,
    ) -> Result<()> {
        let mut writer = open(output)?;

        write_line(&mut writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
        write_line(
            &mut writer,
            r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns">"#,
        )?;

        let mut keys = vec![
            ("d_language", "language"),
            ("d_file_path", "file_path"),
            ("d_node_type", "node_type"),
            ("d_start_line", "start_line"),
            ("d_end_line", "end_line"),
        ];
        if self.include_content {
            keys.push(("d_content", "content"));
        }
        for (id, name) in &keys {
            write_line(
                &mut writer,
                &format!(
                    r#"  <key id="{id}" for="node" attr.name="{name}" attr.type="string"/>"#
                ),
            )?;
        }
        write_line(
            &mut writer,
            r#"  <key id="d_type" for="edge" attr.name="relationship_type" attr.type="string"/>"#,
        )?;
        write_line(&mut writer, r#"  <graph id="chunks" edgedefault="directed">"#)?;

        for chunk in chunks {
            write_line(
                &mut writer,
                &format!(r#"    <node id="{}">"#, xml_escape(&chunk.chunk_id)),
            )?;
            write_line(
                &mut writer,
                &format!(
                    r#"      <data key="d_language">{}</data>"#,
                    xml_escape(&chunk.language)
                ),
            )?;
            write_line(
                &mut writer,
                &format!(
                    r#"      <data key="d_file_path">{}</data>"#,
                    xml_escape(&chunk.file_path)
                ),
            )?;
            write_line(
                &mut writer,
                &format!(
                    r#"      <data key="d_node_type">{}</data>"#,
                    xml_escape(&chunk.node_type)
                ),
            )?;
            write_line(
                &mut writer,
                &format!(r#"      <data key="d_start_line">{}</data>"#, chunk.start_line),
            )?;
            write_line(
                &mut writer,
                &format!(r#"      <data key="d_end_line">{}</data>"#, chunk.end_line),
            )?;
            if self.include_content {
                write_line(
                    &mut writer,
                    &format!(
                        r#"      <data key="d_content">{}</data>"#,
                        xml_escape(&chunk.content)
                    ),
                )?;
            }
            write_line(&mut writer, "    </node>")?;
        }

        for (index, relationship) in relationships.iter().enumerate() {
            write_line(
                &mut writer,
                &format!(
                    r#"    <edge id="e{index}" source="{}" target="{}">"#,
                    xml_escape(&relationship.source_chunk_id),
                    xml_escape(&relationship.target_chunk_id),
                ),
            )?;
            write_line(
                &mut writer,
                &format!(
                    r#"      <data key="d_type">{}</data>"#,
                    relationship.kind.as_str()
                ),
            )?;
            write_line(&mut writer, "    </edge>")?;
        }

        write_line(&mut writer, "  </graph>")?;
        write_line(&mut writer, "</graphml>")?;
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
        // GraphML nodes must precede edges; both sections stream in
        // input order.
        let chunks: Vec<Chunk> = chunks.collect();
        let relationships: Vec<ChunkRelationship> = relationships.collect();
        self.export(&chunks, &relationships, output, None)
    }
}

/// Graphviz DOT exporter
pub struct DotExporter {
    include_attributes: bool,
}

impl Default for DotExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl DotExporter {
    /// Create a DOT exporter with node attributes enabled
    pub fn new() -> Self {
        Self {
            include_attributes: true,
        }
    }

    /// Emit bare nodes and edges only
    pub fn without_attributes(mut self) -> Self {
        self.include_attributes = false;
        self
    }

    fn node_label(chunk: &Chunk) -> String {
        let name = chunk
            .metadata
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or(&chunk.node_type);
        format!("{}\\n{}:{}", name, chunk.start_line, chunk.end_line)
    }
}

impl StructuredExporter for DotExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Dot
    }

    fn export(
        &self,
        chunks: &[Chunk],
        relationships: &[ChunkRelationship],
        output: &Path,
        _metadata: Option<&ExportMetadata>,
    ) -> Result<()> {
        let mut writer = open(output)?;
        write_line(&mut writer, "digraph chunks {")?;
        write_line(&mut writer, "  rankdir=TB;")?;
        write_line(&mut writer, "  node [shape=box];")?;
        write_line(&mut writer, "")?;

        for chunk in chunks {
            if self.include_attributes {
                write_line(
                    &mut writer,
                    &format!(
                        "  \"{}\" [label=\"{}\" tooltip=\"{}\"];",
                        chunk.chunk_id,
                        Self::node_label(chunk).replace('"', "\\\""),
                        chunk.file_path.replace('"', "\\\""),
                    ),
                )?;
            } else {
                write_line(&mut writer, &format!("  \"{}\";", chunk.chunk_id))?;
            }
        }
        write_line(&mut writer, "")?;

        for relationship in relationships {
            write_line(
                &mut writer,
                &format!(
                    "  \"{}\" -> \"{}\" [label=\"{}\"];",
                    relationship.source_chunk_id,
                    relationship.target_chunk_id,
                    relationship.kind.as_str(),
                ),
            )?;
        }

        write_line(&mut writer, "}")?;
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

    fn sample() -> (Vec<Chunk>, Vec<ChunkRelationship>) {
        let a = Chunk::new("rust", "a.rs", "function_item", "fn a() { b() }", 0, 14, 1, 1);
        let b = Chunk::new("rust", "a.rs", "function_item", "fn b() {}", 15, 24, 2, 2);
        let edge = ChunkRelationship::new(
            a.chunk_id.clone(),
            b.chunk_id.clone(),
            RelationshipKind::Calls,
        );
        (vec![a, b], vec![edge])
    }

    #[test]
    fn graphml_is_wellformed_enough() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.graphml");
        let (chunks, relationships) = sample();

        GraphmlExporter::new()
            .export(&chunks, &relationships, &path, None)
            .unwrap();

        let document = std::fs::read_to_string(&path).unwrap();
        assert!(document.starts_with("<?xml"));
        assert_eq!(document.matches("<node ").count(), 2);
        assert_eq!(document.matches("<edge ").count(), 1);
        assert!(document.contains(r#"<data key="d_type">calls</data>"#));
        assert!(document.contains("edgedefault=\"directed\""));
    }

    #[test]
    fn graphml_escapes_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("esc.graphml");

        let chunk = Chunk::new("text", "x.txt", "t", "a < b && c > d", 0, 14, 1, 1);
        GraphmlExporter::new().export(&[chunk], &[], &path, None).unwrap();

        let document = std::fs::read_to_string(&path).unwrap();
        assert!(document.contains("a &lt; b &amp;&amp; c &gt; d"));
    }

    #[test]
    fn dot_has_nodes_and_typed_edges() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.dot");
        let (chunks, relationships) = sample();

        DotExporter::new()
            .export(&chunks, &relationships, &path, None)
            .unwrap();

        let document = std::fs::read_to_string(&path).unwrap();
        assert!(document.starts_with("digraph chunks {"));
        assert!(document.contains("label=\"calls\""));
        assert!(document.contains(&chunks[0].chunk_id));
    }
}
