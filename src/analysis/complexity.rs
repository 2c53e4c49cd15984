//! Complexity analysis for AST subtrees
//!
//! Calculates cyclomatic and cognitive complexity, nesting depth, and
//! dependency counts directly from the tree, independent of language
//! grammar specifics: node kinds from every supported grammar share the
//! weight table.

use crate::analysis::walker::{NodeVisitor, TreeWalker, VisitFlow, WalkContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tree_sitter::Node;

/// Complexity metrics for a code unit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplexityReport {
    /// Weighted aggregate used for split decisions
    pub score: f64,
    /// One plus the weighted count of branch points
    pub cyclomatic: f64,
    /// Nesting-weighted cumulative count of control-flow constructs
    pub cognitive: f64,
    /// Deepest nesting level observed in the subtree
    pub max_nesting: usize,
    /// Identifiers the subtree depends on (called functions, annotations)
    pub dependencies: Vec<String>,
    /// Number of conditional branch nodes
    pub branches: usize,
    /// Number of loop nodes
    pub loops: usize,
    /// Number of exception-handling nodes
    pub exceptions: usize,
    /// Number of call nodes
    pub function_calls: usize,
}

/// Weight contributed by a node kind to cyclomatic complexity
fn complexity_weight(kind: &str) -> Option<f64> {
    match kind {
        "if_statement" | "if_expression" | "elif_clause" | "else_clause"
        | "conditional_expression" | "ternary_expression" | "match_arm" | "switch_statement"
        | "switch_case" | "case_statement" | "while_statement" | "while_expression"
        | "for_statement" | "for_expression" | "for_in_statement" | "loop_expression"
        | "try_statement" | "except_clause" | "finally_clause" | "catch_clause"
        | "boolean_operator" | "and" | "or" | "and_expression" | "or_expression" => Some(1.0),
        "not_operator" | "not" | "unary_expression" => Some(0.5),
        "call" | "call_expression" | "method_call" | "method_invocation" => Some(0.5),
        _ => None,
    }
}

fn is_branch(kind: &str) -> bool {
    matches!(
        kind,
        "if_statement"
            | "if_expression"
            | "conditional_expression"
            | "ternary_expression"
            | "switch_statement"
            | "match_expression"
    )
}

fn is_loop(kind: &str) -> bool {
    matches!(
        kind,
        "while_statement"
            | "while_expression"
            | "for_statement"
            | "for_expression"
            | "for_in_statement"
            | "loop_expression"
            | "do_statement"
    )
}

fn is_exception(kind: &str) -> bool {
    matches!(kind, "try_statement" | "except_clause" | "catch_clause")
}

fn is_call(kind: &str) -> bool {
    matches!(
        kind,
        "call" | "call_expression" | "method_call" | "method_invocation"
    )
}

fn is_nesting_node(kind: &str) -> bool {
    matches!(
        kind,
        "if_statement"
            | "if_expression"
            | "elif_clause"
            | "else_clause"
            | "while_statement"
            | "while_expression"
            | "for_statement"
            | "for_expression"
            | "for_in_statement"
            | "loop_expression"
            | "try_statement"
            | "except_clause"
            | "finally_clause"
            | "catch_clause"
            | "function_definition"
            | "function_item"
            | "function_declaration"
            | "method_definition"
            | "method_declaration"
            | "class_definition"
            | "class_declaration"
            | "with_statement"
            | "match_statement"
            | "match_expression"
            | "case_clause"
    )
}

struct ComplexityVisitor {
    cyclomatic: f64,
    cognitive: f64,
    max_nesting: usize,
    dependencies: BTreeSet<String>,
    branches: usize,
    loops: usize,
    exceptions: usize,
    function_calls: usize,
}

impl ComplexityVisitor {
    fn new() -> Self {
        Self {
            cyclomatic: 1.0,
            cognitive: 0.0,
            max_nesting: 0,
            dependencies: BTreeSet::new(),
            branches: 0,
            loops: 0,
            exceptions: 0,
            function_calls: 0,
        }
    }
}

impl NodeVisitor for ComplexityVisitor {
    fn enter(&mut self, node: Node<'_>, source: &[u8], ctx: &WalkContext) -> VisitFlow {
        let kind = node.kind();

        if let Some(weight) = complexity_weight(kind) {
            self.cyclomatic += weight;
        }

        if is_nesting_node(kind) {
            let depth = ctx.nesting + 1;
            self.max_nesting = self.max_nesting.max(depth);
            self.cognitive += depth as f64 * 0.5;
        }

        if is_branch(kind) {
            self.branches += 1;
        } else if is_loop(kind) {
            self.loops += 1;
        } else if is_exception(kind) {
            self.exceptions += 1;
        } else if is_call(kind) {
            self.function_calls += 1;
            if let Some(name) = extract_call_name(node, source) {
                self.dependencies.insert(name);
            }
        } else if kind == "identifier" {
            if let Some(parent) = node.parent() {
                if matches!(parent.kind(), "type" | "annotation" | "parameter") {
                    if let Ok(text) = node.utf8_text(source) {
                        self.dependencies.insert(text.to_owned());
                    }
                }
            }
        }

        VisitFlow::Descend
    }

    fn introduces_nesting(&self, node: Node<'_>) -> bool {
        is_nesting_node(node.kind())
    }
}

/// Extract the callee name from a call node
pub(crate) fn extract_call_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    let callee = node
        .child_by_field_name("function")
        .or_else(|| node.child(0))?;

    match callee.kind() {
        "identifier" => callee.utf8_text(source).ok().map(str::to_owned),
        "attribute" | "member_expression" | "field_expression" | "scoped_identifier" => {
            callee.utf8_text(source).ok().map(str::to_owned)
        }
        _ => None,
    }
}

/// Complexity analyzer over tree-sitter subtrees
pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    /// Calculate comprehensive complexity metrics for a subtree
    pub fn analyze(node: Node<'_>, source: &[u8]) -> ComplexityReport {
        let mut visitor = ComplexityVisitor::new();
        TreeWalker::walk_node(node, source, &mut visitor, WalkContext::default());

        let score = visitor.cyclomatic
            + visitor.cognitive * 0.5
            + visitor.max_nesting as f64 * 0.3
            + visitor.dependencies.len() as f64 * 0.2;

        ComplexityReport {
            score,
            cyclomatic: visitor.cyclomatic,
            cognitive: visitor.cognitive,
            max_nesting: visitor.max_nesting,
            dependencies: visitor.dependencies.into_iter().collect(),
            branches: visitor.branches,
            loops: visitor.loops,
            exceptions: visitor.exceptions,
            function_calls: visitor.function_calls,
        }
    }

    /// Recommended complexity threshold for a node type
    pub fn threshold_for(node_type: &str) -> f64 {
        match node_type {
            "function_definition" | "function_item" | "function_declaration" => 10.0,
            "method_definition" | "method_declaration" => 10.0,
            "class_definition" | "class_declaration" => 50.0,
            "module" | "source_file" | "program" | "translation_unit" => 100.0,
            "block" | "compound_statement" | "suite" => 5.0,
            _ => 15.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_python(code: &str) -> tree_sitter::Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .expect("python grammar");
        parser.parse(code, None).expect("parse")
    }

    #[test]
    fn straight_line_code_scores_low() {
        let code = "def f():\n    return 1\n";
        let tree = parse_python(code);
        let report = ComplexityAnalyzer::analyze(tree.root_node(), code.as_bytes());

        assert!(report.cyclomatic >= 1.0);
        assert_eq!(report.branches, 0);
        assert_eq!(report.loops, 0);
    }

    #[test]
    fn branches_and_loops_raise_cyclomatic() {
        let code = r#"
def f(items):
    total = 0
    for item in items:
        if item > 0:
            total += item
    return total
"#;
        let tree = parse_python(code);
        let report = ComplexityAnalyzer::analyze(tree.root_node(), code.as_bytes());

        assert_eq!(report.branches, 1);
        assert_eq!(report.loops, 1);
        assert!(report.cyclomatic >= 3.0);
        assert!(report.max_nesting >= 2);
        assert!(report.score > report.cyclomatic);
    }

    #[test]
    fn call_dependencies_are_recorded() {
        let code = "def f(x):\n    return helper(x)\n";
        let tree = parse_python(code);
        let report = ComplexityAnalyzer::analyze(tree.root_node(), code.as_bytes());

        assert!(report.function_calls >= 1);
        assert!(report.dependencies.iter().any(|d| d == "helper"));
    }

    #[test]
    fn thresholds_follow_unit_kind() {
        assert_eq!(ComplexityAnalyzer::threshold_for("function_definition"), 10.0);
        assert_eq!(ComplexityAnalyzer::threshold_for("class_definition"), 50.0);
        assert_eq!(ComplexityAnalyzer::threshold_for("module"), 100.0);
        assert_eq!(ComplexityAnalyzer::threshold_for("block"), 5.0);
        assert_eq!(ComplexityAnalyzer::threshold_for("unknown_kind"), 15.0);
    }
}
