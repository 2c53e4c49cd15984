//! Relationship inference over a chunk set
//!
//! Pure edge computation: no external name resolution is attempted.
//! Edges are keyed by chunk id strings, so cyclic graphs are natural and
//! exporters accept them as-is.

use crate::domain::types::{Chunk, ChunkRelationship, RelationshipKind};
use std::collections::HashMap;

/// Infers and accumulates edges between chunks
#[derive(Debug, Default)]
pub struct RelationshipTracker {
    relationships: Vec<ChunkRelationship>,
}

impl RelationshipTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Infer all relationships for a chunk set and return the edge list
    pub fn infer(chunks: &[Chunk]) -> Vec<ChunkRelationship> {
        let mut tracker = Self::new();
        tracker.track(chunks);
        tracker.into_relationships()
    }

    /// Accumulate relationships for a chunk set
    pub fn track(&mut self, chunks: &[Chunk]) {
        let by_id: HashMap<&str, &Chunk> =
            chunks.iter().map(|c| (c.chunk_id.as_str(), c)).collect();
        let by_name = name_index(chunks);

        for chunk in chunks {
            // Hierarchy edges come straight from parent links
            if let Some(parent_id) = &chunk.parent_chunk_id {
                if by_id.contains_key(parent_id.as_str()) {
                    self.relationships.push(ChunkRelationship::new(
                        parent_id.clone(),
                        chunk.chunk_id.clone(),
                        RelationshipKind::ParentChild,
                    ));
                }
            }

            // Calls: recorded dependencies that resolve to a chunk name
            for dependency in &chunk.dependencies {
                if is_import_line(dependency) {
                    self.push_import(chunk, dependency);
                    continue;
                }
                if let Some(target_ids) = by_name.get(base_name(dependency)) {
                    for target_id in target_ids {
                        if *target_id != chunk.chunk_id {
                            self.relationships.push(ChunkRelationship::new(
                                chunk.chunk_id.clone(),
                                target_id.clone(),
                                RelationshipKind::Calls,
                            ));
                        }
                    }
                }
            }

            // References: looser identifier matches
            for reference in &chunk.references {
                if let Some(target_ids) = by_name.get(reference.as_str()) {
                    for target_id in target_ids {
                        if *target_id != chunk.chunk_id {
                            let edge = ChunkRelationship::new(
                                chunk.chunk_id.clone(),
                                target_id.clone(),
                                RelationshipKind::References,
                            );
                            // A call edge subsumes a reference to the same target
                            let has_call = self.relationships.iter().any(|r| {
                                r.kind == RelationshipKind::Calls
                                    && r.source_chunk_id == edge.source_chunk_id
                                    && r.target_chunk_id == edge.target_chunk_id
                            });
                            if !has_call && !self.relationships.contains(&edge) {
                                self.relationships.push(edge);
                            }
                        }
                    }
                }
            }
        }
    }

    fn push_import(&mut self, chunk: &Chunk, import_line: &str) {
        let mut edge = ChunkRelationship::new(
            chunk.chunk_id.clone(),
            format!("import:{}", imported_module(import_line)),
            RelationshipKind::Imports,
        );
        edge.metadata
            .insert("statement".to_owned(), serde_json::json!(import_line));
        self.relationships.push(edge);
    }

    /// The accumulated edge list
    pub fn relationships(&self) -> &[ChunkRelationship] {
        &self.relationships
    }

    /// Consume the tracker, yielding the edge list
    pub fn into_relationships(self) -> Vec<ChunkRelationship> {
        self.relationships
    }
}

/// Index chunks by their declared name (from metadata or parent context)
fn name_index(chunks: &[Chunk]) -> HashMap<&str, Vec<String>> {
    let mut index: HashMap<&str, Vec<String>> = HashMap::new();
    for chunk in chunks {
        if let Some(name) = chunk.metadata.get("name").and_then(|v| v.as_str()) {
            index.entry(name).or_default().push(chunk.chunk_id.clone());
        }
    }
    index
}

/// Last path segment of a dotted or scoped callee name
fn base_name(dependency: &str) -> &str {
    dependency
        .rsplit(['.', ':'])
        .next()
        .unwrap_or(dependency)
}

fn is_import_line(dependency: &str) -> bool {
    let trimmed = dependency.trim_start();
    trimmed.starts_with("import ")
        || trimmed.starts_with("from ")
        || trimmed.starts_with("use ")
        || trimmed.starts_with("#include")
        || trimmed.starts_with("require")
}

/// Module named by an import statement
fn imported_module(line: &str) -> String {
    let trimmed = line.trim();
    let rest = trimmed
        .strip_prefix("from ")
        .or_else(|| trimmed.strip_prefix("import "))
        .or_else(|| trimmed.strip_prefix("use "))
        .or_else(|| trimmed.strip_prefix("#include "))
        .unwrap_or(trimmed);
    rest.split([' ', ';', '(', '<', '"'])
        .find(|s| !s.is_empty())
        .unwrap_or(rest)
        .trim_end_matches(';')
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_chunk(id_seed: &str, name: &str) -> Chunk {
        let mut chunk = Chunk::new(
            "python",
            "m.py",
            "function_definition",
            format!("def {name}(): pass # {id_seed}"),
            0,
            10 + id_seed.len(),
            1,
            1,
        );
        chunk.set_metadata("name", serde_json::json!(name));
        chunk
    }

    #[test]
    fn parent_links_become_edges() {
        let parent = named_chunk("p", "Outer");
        let mut child = named_chunk("c", "inner");
        child.parent_chunk_id = Some(parent.chunk_id.clone());

        let edges = RelationshipTracker::infer(&[parent.clone(), child.clone()]);
        assert!(edges.iter().any(|e| {
            e.kind == RelationshipKind::ParentChild
                && e.source_chunk_id == parent.chunk_id
                && e.target_chunk_id == child.chunk_id
        }));
    }

    #[test]
    fn dependencies_resolve_to_call_edges() {
        let callee = named_chunk("a", "helper");
        let mut caller = named_chunk("b", "main");
        caller.dependencies.push("helper".to_owned());

        let edges = RelationshipTracker::infer(&[callee.clone(), caller.clone()]);
        assert!(edges.iter().any(|e| {
            e.kind == RelationshipKind::Calls
                && e.source_chunk_id == caller.chunk_id
                && e.target_chunk_id == callee.chunk_id
        }));
    }

    #[test]
    fn import_lines_become_import_edges() {
        let mut chunk = named_chunk("m", "main");
        chunk.dependencies.push("import os".to_owned());

        let edges = RelationshipTracker::infer(&[chunk]);
        let import = edges
            .iter()
            .find(|e| e.kind == RelationshipKind::Imports)
            .expect("import edge");
        assert_eq!(import.target_chunk_id, "import:os");
    }

    #[test]
    fn cycles_are_representable() {
        let mut a = named_chunk("x", "ping");
        let mut b = named_chunk("y", "pong");
        a.dependencies.push("pong".to_owned());
        b.dependencies.push("ping".to_owned());

        let edges = RelationshipTracker::infer(&[a, b]);
        let calls = edges
            .iter()
            .filter(|e| e.kind == RelationshipKind::Calls)
            .count();
        assert_eq!(calls, 2);
    }
}
