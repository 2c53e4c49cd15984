//! Shared helpers for AST-based chunking strategies
//!
//! Node-to-chunk conversion keeps the byte range exactly equal to the
//! tree-sitter node span; the chunk content is always the exact source
//! slice of that range.

use crate::analysis::semantics::node_name;
use crate::analysis::walker::{NodeVisitor, TreeWalker, VisitFlow, WalkContext};
use crate::domain::error::{Error, Result};
use crate::domain::types::Chunk;
use tree_sitter::Node;

/// Node kinds treated as chunkable definitions across the built-in grammars
pub const DEFINITION_KINDS: &[&str] = &[
    "function_definition",
    "function_item",
    "function_declaration",
    "method_definition",
    "method_declaration",
    "class_definition",
    "class_declaration",
    "class_specifier",
    "struct_item",
    "struct_specifier",
    "enum_item",
    "trait_item",
    "impl_item",
    "mod_item",
    "interface_declaration",
    "type_declaration",
    "module",
    "method",
    "class",
];

/// Node kinds that import modules or symbols
pub const IMPORT_KINDS: &[&str] = &[
    "import_statement",
    "import_from_statement",
    "use_declaration",
    "import_declaration",
    "preproc_include",
    "require",
];

/// Whether a node kind is a chunkable definition
pub fn is_definition_kind(kind: &str) -> bool {
    DEFINITION_KINDS.contains(&kind)
}

/// Whether a node kind is a container whose members are themselves
/// chunkable (classes, impls, modules)
pub fn is_container_kind(kind: &str) -> bool {
    matches!(
        kind,
        "class_definition"
            | "class_declaration"
            | "class_specifier"
            | "impl_item"
            | "trait_item"
            | "mod_item"
            | "interface_declaration"
            | "module"
            | "class"
    )
}

/// Build a chunk whose byte range corresponds exactly to a node span
pub fn chunk_from_node(
    node: Node<'_>,
    source: &str,
    file_path: &str,
    language: &str,
    parent_context: &str,
) -> Result<Chunk> {
    let byte_start = node.start_byte();
    let byte_end = node.end_byte();

    if byte_start >= byte_end || byte_end > source.len() {
        return Err(Error::internal(format!(
            "node byte range {byte_start}..{byte_end} outside source of {} bytes",
            source.len()
        )));
    }

    let content = source
        .get(byte_start..byte_end)
        .ok_or_else(|| Error::internal("node byte range splits a UTF-8 codepoint"))?;

    let mut chunk = Chunk::new(
        language,
        file_path,
        node.kind(),
        content,
        byte_start,
        byte_end,
        node.start_position().row + 1,
        node.end_position().row + 1,
    );
    chunk.parent_context = parent_context.to_owned();

    let (references, dependencies) = collect_identifiers(node, source.as_bytes());
    chunk.references = references;
    chunk.dependencies = dependencies;

    if let Some(name) = node_name(node, source.as_bytes()) {
        chunk.set_metadata("name", serde_json::json!(name));
    }

    Ok(chunk)
}

/// Build a chunk spanning an explicit byte range (bounding span of several
/// nodes). The synthetic node type marks the chunk as region-derived.
pub fn chunk_from_span(
    source: &str,
    file_path: &str,
    language: &str,
    node_type: &str,
    byte_start: usize,
    byte_end: usize,
) -> Result<Chunk> {
    let content = source
        .get(byte_start..byte_end)
        .ok_or_else(|| Error::internal("span outside source or splits a codepoint"))?;

    let start_line = source[..byte_start].matches('\n').count() + 1;
    let end_line =
        start_line + content.matches('\n').count() - usize::from(content.ends_with('\n'));

    Ok(Chunk::new(
        language,
        file_path,
        node_type,
        content,
        byte_start,
        byte_end,
        start_line,
        end_line.max(start_line),
    ))
}

struct IdentifierCollector<'s> {
    source: &'s [u8],
    references: Vec<String>,
    dependencies: Vec<String>,
    budget: usize,
}

impl NodeVisitor for IdentifierCollector<'_> {
    fn enter(&mut self, node: Node<'_>, _source: &[u8], _ctx: &WalkContext) -> VisitFlow {
        if self.references.len() + self.dependencies.len() >= self.budget {
            return VisitFlow::Skip;
        }

        let kind = node.kind();

        if matches!(
            kind,
            "call" | "call_expression" | "method_call" | "method_invocation"
        ) {
            if let Some(name) = crate::analysis::complexity::extract_call_name(node, self.source) {
                if !self.dependencies.contains(&name) {
                    self.dependencies.push(name);
                }
            }
        } else if IMPORT_KINDS.contains(&kind) {
            if let Ok(text) = node.utf8_text(self.source) {
                let line = text.lines().next().unwrap_or(text).trim().to_owned();
                if !self.dependencies.contains(&line) {
                    self.dependencies.push(line);
                }
            }
        } else if kind == "identifier" || kind == "type_identifier" {
            if let Ok(text) = node.utf8_text(self.source) {
                let name = text.to_owned();
                if !self.references.contains(&name) {
                    self.references.push(name);
                }
            }
        }

        VisitFlow::Descend
    }
}

/// Identifiers referenced (`references`) and called/imported
/// (`dependencies`) inside a subtree, in discovery order
pub fn collect_identifiers(node: Node<'_>, source: &[u8]) -> (Vec<String>, Vec<String>) {
    let mut collector = IdentifierCollector {
        source,
        references: Vec::new(),
        dependencies: Vec::new(),
        budget: 256,
    };
    TreeWalker::walk_node(node, source, &mut collector, WalkContext::default());
    (collector.references, collector.dependencies)
}

/// Sort chunks into the emission order required of strategies
pub fn sort_chunks(chunks: &mut [Chunk]) {
    chunks.sort_by(|a, b| {
        a.byte_start
            .cmp(&b.byte_start)
            .then(a.byte_end.cmp(&b.byte_end))
    });
}
