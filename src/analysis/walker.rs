//! Tree walker with an explicit visitor contract
//!
//! Performs depth-first traversal of tree-sitter trees. The walker threads
//! an immutable [`WalkContext`] through the tree so visitors receive their
//! nesting depth explicitly instead of mutating shared traversal state.

use tree_sitter::{Node, Tree};

/// Whether traversal should continue into a node's children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitFlow {
    /// Visit the node's children
    Descend,
    /// Skip the node's subtree
    Skip,
}

/// Immutable traversal state handed to visitors at each node
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkContext {
    /// Distance from the walk root
    pub depth: usize,
    /// Number of nesting-introducing ancestors, as judged by the visitor's
    /// [`NodeVisitor::introduces_nesting`]
    pub nesting: usize,
}

/// Visitor trait for AST traversal
///
/// # Example
///
/// ```ignore
/// impl NodeVisitor for MyVisitor {
///     fn enter(&mut self, node: Node<'_>, _source: &[u8], _ctx: &WalkContext) -> VisitFlow {
///         VisitFlow::Descend
///     }
/// }
/// ```
pub trait NodeVisitor {
    /// Called before a node's children are visited
    fn enter(&mut self, node: Node<'_>, source: &[u8], ctx: &WalkContext) -> VisitFlow;

    /// Called after all children have been visited
    fn leave(&mut self, _node: Node<'_>, _source: &[u8], _ctx: &WalkContext) {}

    /// Whether this node increases the nesting depth seen by its descendants
    fn introduces_nesting(&self, _node: Node<'_>) -> bool {
        false
    }
}

/// Free-standing tree walker
pub struct TreeWalker;

impl TreeWalker {
    /// Walk a whole tree with a visitor
    pub fn walk<V: NodeVisitor>(tree: &Tree, source: &[u8], visitor: &mut V) {
        Self::walk_node(tree.root_node(), source, visitor, WalkContext::default());
    }

    /// Walk starting from a specific node
    pub fn walk_node<V: NodeVisitor>(
        node: Node<'_>,
        source: &[u8],
        visitor: &mut V,
        ctx: WalkContext,
    ) {
        let flow = visitor.enter(node, source, &ctx);

        if flow == VisitFlow::Descend {
            let child_ctx = WalkContext {
                depth: ctx.depth + 1,
                nesting: ctx.nesting + usize::from(visitor.introduces_nesting(node)),
            };

            let mut cursor = node.walk();
            if cursor.goto_first_child() {
                loop {
                    Self::walk_node(cursor.node(), source, visitor, child_ctx);
                    if !cursor.goto_next_sibling() {
                        break;
                    }
                }
            }
        }

        visitor.leave(node, source, &ctx);
    }

    /// Find all nodes of a specific kind
    pub fn find_by_kind<'a>(node: Node<'a>, kind: &str) -> Vec<Node<'a>> {
        let mut results = Vec::new();
        Self::find_by_kind_recursive(node, kind, &mut results);
        results
    }

    fn find_by_kind_recursive<'a>(node: Node<'a>, kind: &str, results: &mut Vec<Node<'a>>) {
        if node.kind() == kind {
            results.push(node);
        }

        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                Self::find_by_kind_recursive(cursor.node(), kind, results);
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }
    }

    /// Find the first node of a specific kind, depth-first
    pub fn find_first<'a>(node: Node<'a>, kind: &str) -> Option<Node<'a>> {
        if node.kind() == kind {
            return Some(node);
        }

        let mut cursor = node.walk();
        if cursor.goto_first_child() {
            loop {
                if let Some(found) = Self::find_first(cursor.node(), kind) {
                    return Some(found);
                }
                if !cursor.goto_next_sibling() {
                    break;
                }
            }
        }

        None
    }

    /// Get all ancestors of a node, nearest first
    pub fn ancestors(node: Node<'_>) -> Vec<Node<'_>> {
        let mut ancestors = Vec::new();
        let mut current = node;
        while let Some(parent) = current.parent() {
            ancestors.push(parent);
            current = parent;
        }
        ancestors
    }
}

/// A visitor that collects the byte spans of nodes of one kind
pub struct KindCollector {
    target_kind: String,
    /// Collected `(start_byte, end_byte)` spans in traversal order
    pub matches: Vec<(usize, usize)>,
}

impl KindCollector {
    /// Create a collector for one node kind
    pub fn new(target_kind: &str) -> Self {
        Self {
            target_kind: target_kind.to_owned(),
            matches: Vec::new(),
        }
    }
}

impl NodeVisitor for KindCollector {
    fn enter(&mut self, node: Node<'_>, _source: &[u8], _ctx: &WalkContext) -> VisitFlow {
        if node.kind() == self.target_kind {
            self.matches.push((node.start_byte(), node.end_byte()));
        }
        VisitFlow::Descend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_rust(code: &str) -> Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .expect("rust grammar");
        parser.parse(code, None).expect("parse")
    }

    #[test]
    fn find_by_kind_locates_functions() {
        let tree = parse_rust("fn foo() {} fn bar() {}");
        let functions = TreeWalker::find_by_kind(tree.root_node(), "function_item");
        assert_eq!(functions.len(), 2);
    }

    #[test]
    fn collector_visits_every_node() {
        let code = "fn main() { let x = 1; }";
        let tree = parse_rust(code);

        let mut collector = KindCollector::new("let_declaration");
        TreeWalker::walk(&tree, code.as_bytes(), &mut collector);
        assert_eq!(collector.matches.len(), 1);
    }

    #[test]
    fn skip_prunes_subtrees() {
        struct SkipAll {
            visits: usize,
        }
        impl NodeVisitor for SkipAll {
            fn enter(&mut self, _: Node<'_>, _: &[u8], _: &WalkContext) -> VisitFlow {
                self.visits += 1;
                VisitFlow::Skip
            }
        }

        let code = "fn main() { let x = 1; }";
        let tree = parse_rust(code);
        let mut visitor = SkipAll { visits: 0 };
        TreeWalker::walk(&tree, code.as_bytes(), &mut visitor);
        assert_eq!(visitor.visits, 1);
    }

    #[test]
    fn nesting_tracks_visitor_judgement() {
        struct MaxNesting {
            max: usize,
        }
        impl NodeVisitor for MaxNesting {
            fn enter(&mut self, _: Node<'_>, _: &[u8], ctx: &WalkContext) -> VisitFlow {
                self.max = self.max.max(ctx.nesting);
                VisitFlow::Descend
            }
            fn introduces_nesting(&self, node: Node<'_>) -> bool {
                node.kind() == "block"
            }
        }

        let code = "fn main() { if true { let x = 1; } }";
        let tree = parse_rust(code);
        let mut visitor = MaxNesting { max: 0 };
        TreeWalker::walk(&tree, code.as_bytes(), &mut visitor);
        assert!(visitor.max >= 2);
    }
}
