//! Semantic chunking strategy
//!
//! Emits one chunk per function/method/class definition, annotated with
//! complexity and semantic-role metadata. Oversized definitions (complexity
//! above the per-node-type threshold) are split along their child
//! definitions; adjacent siblings with the same semantic role and high
//! cohesion are merged.

use crate::analysis::complexity::ComplexityAnalyzer;
use crate::analysis::semantics::SemanticAnalyzer;
use crate::constants::SEMANTIC_MERGE_COHESION_THRESHOLD;
use crate::domain::error::Result;
use crate::domain::ports::{ChunkingStrategy, StrategyOptions};
use crate::domain::types::Chunk;
use crate::strategies::common::{
    chunk_from_node, is_container_kind, is_definition_kind, sort_chunks,
};
use tree_sitter::Node;

/// Strategy that chunks along semantic definition boundaries
pub struct SemanticChunker {
    merge_related: bool,
    cohesion_threshold: f64,
    split_on_complexity: bool,
}

impl Default for SemanticChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl SemanticChunker {
    /// Create a semantic chunker with default settings
    pub fn new() -> Self {
        Self {
            merge_related: true,
            cohesion_threshold: SEMANTIC_MERGE_COHESION_THRESHOLD,
            split_on_complexity: true,
        }
    }

    fn collect_definitions<'t>(&self, node: Node<'t>, out: &mut Vec<Node<'t>>) {
        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                let child = cursor.node();
                if is_definition_kind(child.kind()) {
                    out.push(child);
                } else {
                    // Definitions hidden under wrappers (decorators, export
                    // statements) still count as top-level units
                    self.collect_definitions(child, out);
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
    }

    fn emit(
        &self,
        node: Node<'_>,
        source: &str,
        file_path: &str,
        language: &str,
        parent_context: &str,
        chunks: &mut Vec<Chunk>,
    ) -> Result<()> {
        let complexity = ComplexityAnalyzer::analyze(node, source.as_bytes());
        let threshold = ComplexityAnalyzer::threshold_for(node.kind());

        // Split oversized containers along their child definitions
        if self.split_on_complexity && complexity.score > threshold {
            let mut inner = Vec::new();
            if is_container_kind(node.kind()) {
                if let Some(body) = node.child_by_field_name("body") {
                    self.collect_definitions(body, &mut inner);
                } else {
                    self.collect_definitions(node, &mut inner);
                }
            }

            if !inner.is_empty() {
                let context = crate::analysis::semantics::node_name(node, source.as_bytes())
                    .unwrap_or_else(|| node.kind().to_owned());
                for child in inner {
                    self.emit(child, source, file_path, language, &context, chunks)?;
                }
                return Ok(());
            }
        }

        let semantics = SemanticAnalyzer::analyze(node, source.as_bytes());
        let mut chunk = chunk_from_node(node, source, file_path, language, parent_context)?;
        chunk.set_metadata("strategy", serde_json::json!("semantic"));
        chunk.set_metadata("semantic_role", serde_json::json!(semantics.role.as_str()));
        chunk.set_metadata("cohesion_score", serde_json::json!(semantics.cohesion_score));
        chunk.set_metadata("purity_score", serde_json::json!(semantics.purity_score));
        chunk.set_metadata("complexity_score", serde_json::json!(complexity.score));
        chunks.push(chunk);
        Ok(())
    }

    /// Merge immediately adjacent chunks that share a semantic role when
    /// both cohesion scores clear the threshold.
    fn merge_adjacent(&self, chunks: Vec<Chunk>, source: &str) -> Result<Vec<Chunk>> {
        let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let mergeable = merged.last().is_some_and(|prev| {
                same_role(prev, &chunk)
                    && cohesion(prev) >= self.cohesion_threshold
                    && cohesion(&chunk) >= self.cohesion_threshold
                    && prev.parent_context == chunk.parent_context
            });

            if mergeable {
                if let Some(prev) = merged.pop() {
                    merged.push(merge_pair(prev, chunk, source)?);
                    continue;
                }
            }
            merged.push(chunk);
        }

        Ok(merged)
    }
}

fn same_role(a: &Chunk, b: &Chunk) -> bool {
    a.metadata.get("semantic_role").is_some()
        && a.metadata.get("semantic_role") == b.metadata.get("semantic_role")
}

fn cohesion(chunk: &Chunk) -> f64 {
    chunk
        .metadata
        .get("cohesion_score")
        .and_then(serde_json::Value::as_f64)
        .unwrap_or(0.0)
}

fn merge_pair(first: Chunk, second: Chunk, source: &str) -> Result<Chunk> {
    let byte_start = first.byte_start.min(second.byte_start);
    let byte_end = first.byte_end.max(second.byte_end);

    let mut merged = crate::strategies::common::chunk_from_span(
        source,
        &first.file_path,
        &first.language,
        &first.node_type,
        byte_start,
        byte_end,
    )?;

    merged.parent_context = first.parent_context.clone();
    merged.metadata = first.metadata.clone();
    for (key, value) in second.metadata {
        merged.metadata.entry(key).or_insert(value);
    }
    merged.set_metadata("merged", serde_json::json!(true));

    merged.references = first.references;
    for reference in second.references {
        if !merged.references.contains(&reference) {
            merged.references.push(reference);
        }
    }
    merged.dependencies = first.dependencies;
    for dependency in second.dependencies {
        if !merged.dependencies.contains(&dependency) {
            merged.dependencies.push(dependency);
        }
    }

    Ok(merged)
}

impl ChunkingStrategy for SemanticChunker {
    fn name(&self) -> &'static str {
        "semantic"
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
        let mut definitions = Vec::new();
        self.collect_definitions(tree.root_node(), &mut definitions);

        let mut chunks = Vec::new();
        for node in definitions {
            self.emit(node, source, file_path, language, "", &mut chunks)?;
        }

        sort_chunks(&mut chunks);

        if self.merge_related {
            chunks = self.merge_adjacent(chunks, source)?;
        }

        Ok(chunks)
    }

    fn configure(&mut self, options: &StrategyOptions) {
        if let Some(value) = options.get("merge_related").and_then(|v| v.as_bool()) {
            self.merge_related = value;
        }
        if let Some(value) = options.get("cohesion_threshold").and_then(|v| v.as_f64()) {
            self.cohesion_threshold = value;
        }
        if let Some(value) = options.get("split_on_complexity").and_then(|v| v.as_bool()) {
            self.split_on_complexity = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_python(code: &str) -> Vec<Chunk> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("python grammar");
        let tree = parser.parse(code, None).expect("parse");
        SemanticChunker::new()
            .chunk(&tree, code, "test.py", "python")
            .expect("chunks")
    }

    #[test]
    fn one_chunk_per_definition() {
        let code = "def hello():\n    print(\"hi\")\n\ndef goodbye():\n    print(\"bye\")\n";
        let chunks = chunk_python(code);

        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.node_type == "function_definition"));
        assert_eq!(chunks[0].start_line, 1);
        assert_eq!(chunks[0].end_line, 2);
        assert_eq!(chunks[1].start_line, 4);
        assert_eq!(chunks[1].end_line, 5);
    }

    #[test]
    fn chunks_carry_role_metadata() {
        let code = "def validate_user(u):\n    assert u\n";
        let chunks = chunk_python(code);

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].metadata.get("semantic_role").unwrap(),
            &serde_json::json!("validation")
        );
    }

    #[test]
    fn content_is_exact_source_slice() {
        let code = "def a():\n    return 1\n\ndef b():\n    return 2\n";
        for chunk in chunk_python(code) {
            assert_eq!(chunk.content, &code[chunk.byte_start..chunk.byte_end]);
        }
    }
}
