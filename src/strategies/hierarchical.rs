//! Hierarchical chunking strategy
//!
//! Emits chunks at multiple granularities; each chunk records the chunk id
//! of its enclosing definition, so the output forms a tree.

use crate::constants::HIERARCHICAL_MAX_DEPTH;
use crate::domain::error::Result;
use crate::domain::ports::{ChunkingStrategy, StrategyOptions};
use crate::domain::types::Chunk;
use crate::strategies::common::{chunk_from_node, is_container_kind, is_definition_kind, sort_chunks};
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// How deep into the structure the hierarchical strategy descends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Only top-level declarations
    Coarse,
    /// Declarations plus their methods
    Medium,
    /// Down to inner blocks
    Fine,
}

impl Granularity {
    fn depth_limit(self, max_depth: usize) -> usize {
        match self {
            Granularity::Coarse => 1,
            Granularity::Medium => 2,
            Granularity::Fine => max_depth,
        }
    }
}

/// Strategy producing a tree of chunks at configurable granularity
pub struct HierarchicalChunker {
    granularity: Granularity,
    max_depth: usize,
}

impl Default for HierarchicalChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchicalChunker {
    /// Create a hierarchical chunker at medium granularity
    pub fn new() -> Self {
        Self {
            granularity: Granularity::Medium,
            max_depth: HIERARCHICAL_MAX_DEPTH,
        }
    }

    /// Override the granularity
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    #[allow(clippy::too_many_arguments)]
    fn descend(
        &self,
        node: Node<'_>,
        source: &str,
        file_path: &str,
        language: &str,
        parent: Option<&Chunk>,
        depth: usize,
        limit: usize,
        chunks: &mut Vec<Chunk>,
    ) -> Result<()> {
        let mut cursor = node.walk();
        if !cursor.goto_first_child() {
            return Ok(());
        }

        loop {
            let child = cursor.node();
            let kind = child.kind();

            let emit = is_definition_kind(kind)
                || (self.granularity == Granularity::Fine
                    && matches!(kind, "block" | "compound_statement" | "suite")
                    && depth > 1);

            if emit {
                let parent_context = parent
                    .map(|p| {
                        p.metadata
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or(&p.node_type)
                            .to_owned()
                    })
                    .unwrap_or_default();

                let mut chunk =
                    chunk_from_node(child, source, file_path, language, &parent_context)?;
                chunk.parent_chunk_id = parent.map(|p| p.chunk_id.clone());
                chunk.set_metadata("strategy", serde_json::json!("hierarchical"));
                chunk.set_metadata("depth", serde_json::json!(depth));
                chunk.set_metadata(
                    "granularity",
                    serde_json::to_value(self.granularity).unwrap_or_default(),
                );

                let descend_further = depth < limit
                    && (is_container_kind(kind) || self.granularity == Granularity::Fine);
                if descend_further {
                    let snapshot = chunk.clone();
                    chunks.push(chunk);
                    self.descend(
                        child,
                        source,
                        file_path,
                        language,
                        Some(&snapshot),
                        depth + 1,
                        limit,
                        chunks,
                    )?;
                } else {
                    chunks.push(chunk);
                }
            } else {
                // Wrappers (decorated definitions, export statements) are
                // transparent to the hierarchy
                self.descend(
                    child, source, file_path, language, parent, depth, limit, chunks,
                )?;
            }

            if !cursor.goto_next_sibling() {
                break;
            }
        }

        Ok(())
    }
}

impl ChunkingStrategy for HierarchicalChunker {
    fn name(&self) -> &'static str {
        "hierarchical"
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
        let limit = self.granularity.depth_limit(self.max_depth);
        let mut chunks = Vec::new();
        self.descend(
            tree.root_node(),
            source,
            file_path,
            language,
            None,
            1,
            limit,
            &mut chunks,
        )?;
        sort_chunks(&mut chunks);
        Ok(chunks)
    }

    fn configure(&mut self, options: &StrategyOptions) {
        if let Some(value) = options.get("granularity") {
            if let Ok(granularity) = serde_json::from_value(value.clone()) {
                self.granularity = granularity;
            }
        }
        if let Some(value) = options.get("max_depth").and_then(|v| v.as_u64()) {
            self.max_depth = value as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "class Greeter:\n    def hello(self):\n        return \"hi\"\n\n    def bye(self):\n        return \"bye\"\n\ndef main():\n    pass\n";

    fn chunk_with(granularity: Granularity) -> Vec<Chunk> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("python grammar");
        let tree = parser.parse(CODE, None).expect("parse");
        HierarchicalChunker::new()
            .with_granularity(granularity)
            .chunk(&tree, CODE, "test.py", "python")
            .expect("chunks")
    }

    #[test]
    fn coarse_keeps_top_level_only() {
        let chunks = chunk_with(Granularity::Coarse);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.parent_chunk_id.is_none()));
    }

    #[test]
    fn medium_adds_methods_with_parents() {
        let chunks = chunk_with(Granularity::Medium);
        assert_eq!(chunks.len(), 4);

        let class_chunk = chunks
            .iter()
            .find(|c| c.node_type == "class_definition")
            .expect("class chunk");
        let methods: Vec<_> = chunks
            .iter()
            .filter(|c| c.parent_chunk_id.as_deref() == Some(class_chunk.chunk_id.as_str()))
            .collect();
        assert_eq!(methods.len(), 2);
        assert!(methods.iter().all(|m| m.parent_context == "Greeter"));
    }

    #[test]
    fn chunks_are_byte_ordered() {
        let chunks = chunk_with(Granularity::Medium);
        for pair in chunks.windows(2) {
            assert!(pair[0].byte_start <= pair[1].byte_start);
        }
    }
}
