//! Semantic analysis for understanding what a code block does
//!
//! Classifies subtrees into coarse semantic roles by matching identifier
//! substrings against a built-in lexicon and by observing side-effect
//! nodes. Also derives a purity score and a cohesion score used by the
//! semantic chunking strategy when deciding whether to merge siblings.

use crate::analysis::walker::{NodeVisitor, TreeWalker, VisitFlow, WalkContext};
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Coarse semantic classification of a code block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticRole {
    /// Object/state construction and setup
    Initialization,
    /// Input checking and assertions
    Validation,
    /// Pure-ish transformation of values
    Computation,
    /// Reads/writes against files, network, console
    IoOperation,
    /// Start/stop/open/close resource management
    Lifecycle,
    /// Catching, recovering, retrying
    ErrorHandling,
    /// Mutating program state
    StateManagement,
    /// Type/record definitions
    DataStructure,
    /// Imperative routine with side effects
    Procedure,
    /// No stronger classification applies
    General,
}

impl SemanticRole {
    /// Canonical wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticRole::Initialization => "initialization",
            SemanticRole::Validation => "validation",
            SemanticRole::Computation => "computation",
            SemanticRole::IoOperation => "io_operation",
            SemanticRole::Lifecycle => "lifecycle",
            SemanticRole::ErrorHandling => "error_handling",
            SemanticRole::StateManagement => "state_management",
            SemanticRole::DataStructure => "data_structure",
            SemanticRole::Procedure => "procedure",
            SemanticRole::General => "general",
        }
    }
}

/// Severity of an observed side effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectSeverity {
    /// Minor effect (local mutation)
    Low,
    /// State mutation or ordinary call
    Medium,
    /// I/O or thrown exception
    High,
}

impl SideEffectSeverity {
    fn purity_penalty(self) -> f64 {
        match self {
            SideEffectSeverity::Low => 0.1,
            SideEffectSeverity::Medium => 0.3,
            SideEffectSeverity::High => 0.5,
        }
    }
}

/// One observed side effect inside a subtree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideEffect {
    /// AST node kind that produced the effect
    pub node_type: String,
    /// Effect category (`state_mutation`, `io`, `function_call`, `exception`)
    pub effect: String,
    /// How strongly the effect reduces purity
    pub severity: SideEffectSeverity,
}

/// Result of semantic analysis over one subtree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticReport {
    /// Primary semantic role
    pub role: SemanticRole,
    /// Distinct role patterns observed anywhere in the subtree
    pub patterns: Vec<SemanticRole>,
    /// Observed side effects in traversal order
    pub side_effects: Vec<SideEffect>,
    /// 1.0 = pure, decremented per side effect severity
    pub purity_score: f64,
    /// 1.0 = single responsibility, reduced per extra pattern
    pub cohesion_score: f64,
}

/// Role lexicon: identifier substrings that suggest each role
const ROLE_LEXICON: &[(SemanticRole, &[&str])] = &[
    (
        SemanticRole::Initialization,
        &[
            "constructor",
            "__init__",
            "new",
            "create",
            "build",
            "setup",
            "initialize",
            "config",
            "configure",
        ],
    ),
    (
        SemanticRole::Validation,
        &[
            "validate", "check", "verify", "assert", "ensure", "is_valid", "can_", "should_",
            "must_",
        ],
    ),
    (
        SemanticRole::Computation,
        &[
            "calculate",
            "compute",
            "process",
            "transform",
            "convert",
            "parse",
            "analyze",
            "evaluate",
        ],
    ),
    (
        SemanticRole::IoOperation,
        &[
            "read", "write", "load", "save", "fetch", "send", "receive", "get", "put", "post",
        ],
    ),
    (
        SemanticRole::Lifecycle,
        &[
            "start",
            "stop",
            "begin",
            "end",
            "open",
            "close",
            "connect",
            "disconnect",
            "dispose",
        ],
    ),
    (
        SemanticRole::ErrorHandling,
        &[
            "handle", "catch", "error", "exception", "fail", "retry", "recover", "fallback",
        ],
    ),
];

const IO_VERBS: &[&str] = &["read", "write", "print", "send", "save", "load"];

fn is_assignment(kind: &str) -> bool {
    matches!(
        kind,
        "assignment" | "augmented_assignment" | "assignment_expression" | "compound_assignment_expr"
    )
}

fn is_call(kind: &str) -> bool {
    matches!(
        kind,
        "call" | "call_expression" | "method_call" | "method_invocation"
    )
}

fn is_raise(kind: &str) -> bool {
    matches!(kind, "raise_statement" | "throw_statement" | "throw_expression")
}

fn is_definition(kind: &str) -> bool {
    matches!(
        kind,
        "function_definition"
            | "function_item"
            | "function_declaration"
            | "method_definition"
            | "method_declaration"
            | "class_definition"
            | "class_declaration"
    )
}

struct SemanticVisitor<'s> {
    source: &'s [u8],
    patterns: Vec<SemanticRole>,
    side_effects: Vec<SideEffect>,
    purity_score: f64,
}

impl SemanticVisitor<'_> {
    fn record_effect(&mut self, node_type: &str, effect: &str, severity: SideEffectSeverity) {
        self.side_effects.push(SideEffect {
            node_type: node_type.to_owned(),
            effect: effect.to_owned(),
            severity,
        });
        self.purity_score = (self.purity_score - severity.purity_penalty()).max(0.0);
    }

    fn record_pattern(&mut self, role: SemanticRole) {
        if !self.patterns.contains(&role) {
            self.patterns.push(role);
        }
    }
}

impl NodeVisitor for SemanticVisitor<'_> {
    fn enter(&mut self, node: Node<'_>, _source: &[u8], _ctx: &WalkContext) -> VisitFlow {
        let kind = node.kind();

        if is_assignment(kind) {
            self.record_effect(kind, "state_mutation", SideEffectSeverity::Medium);
        } else if is_call(kind) {
            let callee = crate::analysis::complexity::extract_call_name(node, self.source)
                .unwrap_or_default()
                .to_lowercase();
            if IO_VERBS.iter().any(|verb| callee.contains(verb)) {
                self.record_effect(kind, "io", SideEffectSeverity::High);
            } else {
                self.record_effect(kind, "function_call", SideEffectSeverity::Medium);
            }
        } else if is_raise(kind) {
            self.record_effect(kind, "exception", SideEffectSeverity::High);
            self.record_pattern(SemanticRole::ErrorHandling);
        } else if kind == "try_statement" {
            self.record_pattern(SemanticRole::ErrorHandling);
        } else if is_definition(kind) {
            if let Some(name) = node_name(node, self.source) {
                let lowered = name.to_lowercase();
                for (role, words) in ROLE_LEXICON {
                    if words.iter().any(|w| lowered.contains(w)) {
                        self.record_pattern(*role);
                    }
                }
            }
        }

        VisitFlow::Descend
    }
}

/// Extract the declared name of a definition node
pub(crate) fn node_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    if let Some(name) = node.child_by_field_name("name") {
        return name.utf8_text(source).ok().map(str::to_owned);
    }

    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .find(|child| child.kind() == "identifier")?;
    found.utf8_text(source).ok().map(str::to_owned)
}

/// Semantic analyzer over tree-sitter subtrees
pub struct SemanticAnalyzer;

impl SemanticAnalyzer {
    /// Perform semantic analysis on a subtree
    pub fn analyze(node: Node<'_>, source: &[u8]) -> SemanticReport {
        let mut visitor = SemanticVisitor {
            source,
            patterns: Vec::new(),
            side_effects: Vec::new(),
            purity_score: 1.0,
        };
        TreeWalker::walk_node(node, source, &mut visitor, WalkContext::default());

        let role = Self::determine_role(node, source, &visitor);
        let cohesion = Self::cohesion(&visitor.patterns);

        SemanticReport {
            role,
            patterns: visitor.patterns,
            side_effects: visitor.side_effects,
            purity_score: visitor.purity_score,
            cohesion_score: cohesion,
        }
    }

    fn determine_role(node: Node<'_>, source: &[u8], visitor: &SemanticVisitor<'_>) -> SemanticRole {
        // Name match wins over every structural heuristic
        if let Some(name) = node_name(node, source) {
            let lowered = name.to_lowercase();
            for (role, words) in ROLE_LEXICON {
                if words.iter().any(|w| lowered.contains(w)) {
                    return *role;
                }
            }
        }

        if visitor.side_effects.iter().any(|e| e.effect == "io") {
            return SemanticRole::IoOperation;
        }
        if visitor
            .side_effects
            .iter()
            .any(|e| e.effect == "state_mutation")
        {
            return SemanticRole::StateManagement;
        }
        if visitor.patterns.contains(&SemanticRole::ErrorHandling) {
            return SemanticRole::ErrorHandling;
        }

        match node.kind() {
            "class_definition" | "class_declaration" | "struct_item" | "enum_item" => {
                SemanticRole::DataStructure
            }
            "function_definition" | "function_item" | "function_declaration"
            | "method_definition" | "method_declaration" => {
                if visitor.purity_score > 0.8 {
                    SemanticRole::Computation
                } else {
                    SemanticRole::Procedure
                }
            }
            _ => SemanticRole::General,
        }
    }

    /// Cohesion from the number of distinct patterns: one pattern is fully
    /// cohesive, each extra pattern costs 0.2, no pattern is neutral.
    fn cohesion(patterns: &[SemanticRole]) -> f64 {
        match patterns.len() {
            0 => 0.5,
            1 => 1.0,
            n => (1.0 - (n as f64 - 1.0) * 0.2).max(0.0),
        }
    }
}
