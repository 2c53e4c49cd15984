//! Adaptive chunking strategy
//!
//! Targets a chunk size in lines and widens or narrows region boundaries
//! so they coincide with top-level AST node boundaries. Useful for
//! languages whose top-level declarations are large relative to the
//! target size.

use crate::constants::{ADAPTIVE_AGGRESSIVENESS, ADAPTIVE_BASE_CHUNK_SIZE};
use crate::domain::error::Result;
use crate::domain::ports::{ChunkingStrategy, StrategyOptions};
use crate::domain::types::Chunk;
use crate::strategies::common::chunk_from_span;
use tree_sitter::Node;

/// Strategy producing size-targeted regions aligned to AST nodes
pub struct AdaptiveChunker {
    base_chunk_size: usize,
    aggressiveness: f64,
}

impl Default for AdaptiveChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl AdaptiveChunker {
    /// Create an adaptive chunker with default sizing
    pub fn new() -> Self {
        Self {
            base_chunk_size: ADAPTIVE_BASE_CHUNK_SIZE,
            aggressiveness: ADAPTIVE_AGGRESSIVENESS,
        }
    }

    fn tolerance(&self) -> usize {
        (self.base_chunk_size as f64 * self.aggressiveness).round() as usize
    }

    fn node_lines(node: Node<'_>) -> usize {
        node.end_position().row - node.start_position().row + 1
    }
}

impl ChunkingStrategy for AdaptiveChunker {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn can_handle(&self, _file_path: &str, language: &str) -> bool {
        crate::grammar::builtin_language(language).is_some()
    }

    fn chunk(
        &self,
        tree: &tree_sitter::Tree,
        source: &str,
        file_path: &str,
        language: &str,
    ) -> Result<Vec<Chunk>> {
        let root = tree.root_node();
        let mut cursor = root.walk();
        let nodes: Vec<Node<'_>> = root.named_children(&mut cursor).collect();

        if nodes.is_empty() {
            return Ok(Vec::new());
        }

        let max_lines = self.base_chunk_size + self.tolerance();
        let min_lines = self.base_chunk_size.saturating_sub(self.tolerance()).max(1);

        let mut chunks = Vec::new();
        let mut region: Option<(usize, usize, usize)> = None; // (byte_start, byte_end, lines)

        for node in nodes {
            let node_lines = Self::node_lines(node);

            match region.take() {
                None => {
                    region = Some((node.start_byte(), node.end_byte(), node_lines));
                }
                Some((start, end, lines)) => {
                    if lines + node_lines > max_lines && lines >= min_lines {
                        // Close the region at the previous node boundary
                        chunks.push(self.emit(source, file_path, language, start, end)?);
                        region = Some((node.start_byte(), node.end_byte(), node_lines));
                    } else {
                        region = Some((start, node.end_byte(), lines + node_lines));
                    }
                }
            }

            // A single node larger than the widened target becomes its own
            // region; boundaries never split a node
            if let Some((start, end, lines)) = region {
                if lines >= max_lines {
                    chunks.push(self.emit(source, file_path, language, start, end)?);
                    region = None;
                }
            }
        }

        if let Some((start, end, _)) = region {
            chunks.push(self.emit(source, file_path, language, start, end)?);
        }

        Ok(chunks)
    }

    fn configure(&mut self, options: &StrategyOptions) {
        if let Some(value) = options.get("base_chunk_size").and_then(|v| v.as_u64()) {
            self.base_chunk_size = (value as usize).max(1);
        }
        if let Some(value) = options
            .get("adaptive_aggressiveness")
            .and_then(|v| v.as_f64())
        {
            self.aggressiveness = value.clamp(0.0, 1.0);
        }
    }
}

impl AdaptiveChunker {
    fn emit(
        &self,
        source: &str,
        file_path: &str,
        language: &str,
        byte_start: usize,
        byte_end: usize,
    ) -> Result<Chunk> {
        let mut chunk = chunk_from_span(
            source,
            file_path,
            language,
            "adaptive_region",
            byte_start,
            byte_end,
        )?;
        chunk.set_metadata("strategy", serde_json::json!("adaptive"));
        chunk.set_metadata("base_chunk_size", serde_json::json!(self.base_chunk_size));
        Ok(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_with(code: &str, base: usize) -> Vec<Chunk> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("python grammar");
        let tree = parser.parse(code, None).expect("parse");

        let mut chunker = AdaptiveChunker::new();
        let mut options = StrategyOptions::new();
        options.insert("base_chunk_size".to_owned(), serde_json::json!(base));
        chunker.configure(&options);
        chunker
            .chunk(&tree, code, "test.py", "python")
            .expect("chunks")
    }

    #[test]
    fn small_file_is_one_region() {
        let code = "def a():\n    return 1\n\ndef b():\n    return 2\n";
        let chunks = chunk_with(code, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].node_type, "adaptive_region");
    }

    #[test]
    fn regions_respect_node_boundaries() {
        let mut code = String::new();
        for i in 0..12 {
            code.push_str(&format!("def f{i}():\n    x = {i}\n    return x\n\n"));
        }

        let chunks = chunk_with(&code, 6);
        assert!(chunks.len() > 1);

        for chunk in &chunks {
            assert_eq!(chunk.content, &code[chunk.byte_start..chunk.byte_end]);
            // Regions start at a definition boundary
            assert!(chunk.content.starts_with("def "));
        }
    }

    #[test]
    fn regions_advance_monotonically() {
        let mut code = String::new();
        for i in 0..12 {
            code.push_str(&format!("def f{i}():\n    return {i}\n\n"));
        }
        let chunks = chunk_with(&code, 4);
        for pair in chunks.windows(2) {
            assert!(pair[1].byte_start > pair[0].byte_start);
            assert!(pair[1].byte_start >= pair[0].byte_end);
        }
    }
}
