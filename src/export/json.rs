//! JSON and JSONL export back-ends
//!
//! JSON produces one `{metadata, chunks, relationships}` document with
//! stable field ordering. JSONL emits one record per line as
//! `{type, data}` with `type` one of `metadata`, `chunk`,
//! `relationship` — in that order. Both support optional gzip
//! compression.

use crate::constants::EXPORT_BATCH_SIZE;
use crate::domain::error::{Error, Result};
use crate::domain::types::{Chunk, ChunkRelationship};
use crate::export::{ExportFormat, ExportMetadata, StructuredExporter};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::path::Path;

fn open_output(path: &Path, compress: bool) -> Result<Box<dyn Write>> {
    let file = std::fs::File::create(path).map_err(|e| Error::ExportIo {
        message: format!("cannot create {}", path.display()),
        source: Some(Box::new(e)),
    })?;
    let writer = std::io::BufWriter::new(file);
    if compress {
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    } else {
        Ok(Box::new(writer))
    }
}

/// Whole-document JSON exporter
pub struct JsonExporter {
    pretty: bool,
    compress: bool,
}

impl Default for JsonExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonExporter {
    /// Create a pretty-printing, uncompressed JSON exporter
    pub fn new() -> Self {
        Self {
            pretty: true,
            compress: false,
        }
    }

    /// Emit compact JSON instead of pretty-printed
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Gzip-compress the output
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }
}

impl StructuredExporter for JsonExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
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
                generated = ExportMetadata::generate(ExportFormat::Json, chunks, relationships);
                &generated
            }
        };

        let document = serde_json::json!({
            "metadata": metadata,
            "chunks": chunks,
            "relationships": relationships,
        });

        let mut writer = open_output(output, self.compress)?;
        let result = if self.pretty {
            serde_json::to_writer_pretty(&mut writer, &document)
        } else {
            serde_json::to_writer(&mut writer, &document)
        };
        result.map_err(|e| Error::ExportIo {
            message: format!("cannot serialize to {}", output.display()),
            source: Some(Box::new(e)),
        })?;
        writer.flush().map_err(|e| Error::ExportIo {
            message: format!("cannot flush {}", output.display()),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }

    /// JSON needs the whole structure up front, so the streaming form
    /// collects before writing. For true streaming use
    /// [`JsonlExporter`].
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

/// Newline-delimited JSON exporter with true streaming
pub struct JsonlExporter {
    compress: bool,
    batch_size: usize,
}

impl Default for JsonlExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonlExporter {
    /// Create an uncompressed JSONL exporter
    pub fn new() -> Self {
        Self {
            compress: false,
            batch_size: EXPORT_BATCH_SIZE,
        }
    }

    /// Gzip-compress the output
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Records per flush during streaming
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn write_record<W: Write>(
        writer: &mut W,
        record_type: &str,
        data: &serde_json::Value,
    ) -> Result<()> {
        let record = serde_json::json!({ "type": record_type, "data": data });
        serde_json::to_writer(&mut *writer, &record)?;
        writer.write_all(b"\n").map_err(|e| Error::ExportIo {
            message: "cannot write JSONL record".to_owned(),
            source: Some(Box::new(e)),
        })?;
        Ok(())
    }
}

impl StructuredExporter for JsonlExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Jsonl
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
                generated = ExportMetadata::generate(ExportFormat::Jsonl, chunks, relationships);
                &generated
            }
        };

        let mut writer = open_output(output, self.compress)?;
        Self::write_record(&mut writer, "metadata", &serde_json::to_value(metadata)?)?;
        for chunk in chunks {
            Self::write_record(&mut writer, "chunk", &serde_json::to_value(chunk)?)?;
        }
        for relationship in relationships {
            Self::write_record(
                &mut writer,
                "relationship",
                &serde_json::to_value(relationship)?,
            )?;
        }
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
        let mut writer = open_output(output, self.compress)?;

        let header = serde_json::json!({
            "format": "jsonl",
            "version": crate::constants::EXPORT_FORMAT_VERSION,
            "created_at": chrono::Utc::now().to_rfc3339(),
            "streaming": true,
        });
        Self::write_record(&mut writer, "metadata", &header)?;

        let mut pending = 0usize;
        for chunk in chunks {
            Self::write_record(&mut writer, "chunk", &serde_json::to_value(&chunk)?)?;
            pending += 1;
            if pending >= self.batch_size {
                writer.flush().map_err(|e| Error::ExportIo {
                    message: "cannot flush chunk batch".to_owned(),
                    source: Some(Box::new(e)),
                })?;
                pending = 0;
            }
        }

        for relationship in relationships {
            Self::write_record(
                &mut writer,
                "relationship",
                &serde_json::to_value(&relationship)?,
            )?;
            pending += 1;
            if pending >= self.batch_size {
                writer.flush().map_err(|e| Error::ExportIo {
                    message: "cannot flush relationship batch".to_owned(),
                    source: Some(Box::new(e)),
                })?;
                pending = 0;
            }
        }

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

    fn sample() -> (Vec<Chunk>, Vec<ChunkRelationship>) {
        let a = Chunk::new("python", "m.py", "function_definition", "def a(): pass", 0, 13, 1, 1);
        let b = Chunk::new("python", "m.py", "function_definition", "def b(): pass", 14, 27, 3, 3);
        let edge = ChunkRelationship::new(
            a.chunk_id.clone(),
            b.chunk_id.clone(),
            crate::domain::types::RelationshipKind::Calls,
        );
        (vec![a, b], vec![edge])
    }

    #[test]
    fn json_document_shape() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.json");
        let (chunks, relationships) = sample();

        JsonExporter::new()
            .export(&chunks, &relationships, &path, None)
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["chunks"].as_array().unwrap().len(), 2);
        assert_eq!(value["relationships"].as_array().unwrap().len(), 1);
        assert_eq!(value["metadata"]["chunk_count"], 2);
        assert_eq!(
            value["relationships"][0]["relationship_type"],
            serde_json::json!("calls")
        );
    }

    #[test]
    fn jsonl_record_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jsonl");
        let (chunks, relationships) = sample();

        JsonlExporter::new()
            .export(&chunks, &relationships, &path, None)
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let types: Vec<String> = text
            .lines()
            .map(|line| {
                serde_json::from_str::<serde_json::Value>(line).unwrap()["type"]
                    .as_str()
                    .unwrap()
                    .to_owned()
            })
            .collect();
        assert_eq!(types, vec!["metadata", "chunk", "chunk", "relationship"]);
    }

    #[test]
    fn jsonl_streaming_matches_batch_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stream.jsonl");
        let (chunks, relationships) = sample();

        JsonlExporter::new()
            .with_batch_size(1)
            .export_streaming(
                &mut chunks.clone().into_iter(),
                &mut relationships.clone().into_iter(),
                &path,
            )
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }
}
