//! Per-node-type validators.
//!
//! Validators are looked up by [`NodeType`] in a [`ValidatorRegistry`]; the
//! walk itself never branches on node types.

use super::{Inconsistency, InconsistencyCategory, Severity, ValidationContext};
use crate::tracking::is_effectively_removed;
use manuscript_model::{Node, NodeType};
use std::collections::BTreeMap;

pub trait Validator: Send + Sync {
    fn validate(&self, node: &Node, pos: usize, ctx: &ValidationContext<'_>) -> Vec<Inconsistency>;
}

fn missing_reference(node: &Node, pos: usize, message: impl Into<String>) -> Inconsistency {
    Inconsistency {
        category: InconsistencyCategory::MissingReference,
        severity: Severity::Error,
        node_id: node.id().map(str::to_string),
        node_type: node.node_type,
        pos,
        message: message.into(),
    }
}

/// Citations whose items are not in the library
pub struct CitationValidator;

impl Validator for CitationValidator {
    fn validate(&self, node: &Node, pos: usize, ctx: &ValidationContext<'_>) -> Vec<Inconsistency> {
        let (Some(bibliography), Some(id)) = (ctx.bibliography, node.id()) else {
            return Vec::new();
        };
        match bibliography.citation(id) {
            Some(citation) if citation.is_missing() => {
                vec![missing_reference(node, pos, "Citation refers to a missing library item")]
            }
            _ => Vec::new(),
        }
    }
}

/// One inconsistency per rid `resolves` rejects; a node with no rids at all
/// gets a single one
fn unresolved_rids(
    node: &Node,
    pos: usize,
    what: &str,
    resolves: impl Fn(&str) -> bool,
) -> Vec<Inconsistency> {
    let rids = node.attr_str_list("rids");
    if rids.is_empty() {
        return vec![missing_reference(node, pos, format!("{what} has no target"))];
    }
    rids.iter()
        .filter(|rid| !resolves(rid.as_str()))
        .map(|rid| missing_reference(node, pos, format!("{what} target {rid} not found")))
        .collect()
}

/// Cross references with targets that do not exist
pub struct CrossReferenceValidator;

impl Validator for CrossReferenceValidator {
    fn validate(&self, node: &Node, pos: usize, ctx: &ValidationContext<'_>) -> Vec<Inconsistency> {
        let Some(objects) = ctx.objects else {
            return Vec::new();
        };
        unresolved_rids(node, pos, "Cross reference", |rid| objects.target(rid).is_some())
    }
}

/// Inline footnotes pointing at footnotes that do not exist
pub struct InlineFootnoteValidator;

impl Validator for InlineFootnoteValidator {
    fn validate(&self, node: &Node, pos: usize, ctx: &ValidationContext<'_>) -> Vec<Inconsistency> {
        let Some(footnotes) = ctx.footnotes else {
            return Vec::new();
        };
        unresolved_rids(node, pos, "Footnote reference", |rid| footnotes.has_footnote(rid))
    }
}

/// Footnotes without text. The footnote being edited is exempt.
pub struct EmptyFootnoteValidator;

impl Validator for EmptyFootnoteValidator {
    fn validate(&self, node: &Node, pos: usize, ctx: &ValidationContext<'_>) -> Vec<Inconsistency> {
        let end = pos + node.node_size();
        let head = ctx.selection.head;
        if (pos < head && head < end) || !node.text_content().trim().is_empty() {
            return Vec::new();
        }
        vec![Inconsistency {
            category: InconsistencyCategory::EmptyContent,
            severity: Severity::Warning,
            node_id: node.id().map(str::to_string),
            node_type: node.node_type,
            pos,
            message: "Footnote is empty".to_string(),
        }]
    }
}

/// Node type → validators
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: BTreeMap<NodeType, Vec<Box<dyn Validator>>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        Self::new()
            .with(NodeType::Citation, CitationValidator)
            .with(NodeType::CrossReference, CrossReferenceValidator)
            .with(NodeType::InlineFootnote, InlineFootnoteValidator)
            .with(NodeType::Footnote, EmptyFootnoteValidator)
    }

    pub fn register(&mut self, node_type: NodeType, validator: impl Validator + 'static) {
        self.validators
            .entry(node_type)
            .or_default()
            .push(Box::new(validator));
    }

    pub fn with(mut self, node_type: NodeType, validator: impl Validator + 'static) -> Self {
        self.register(node_type, validator);
        self
    }

    pub fn node_types(&self) -> impl Iterator<Item = NodeType> + '_ {
        self.validators.keys().copied()
    }

    /// Run every registered validator over `doc`. Subtrees tracked as
    /// removed are skipped.
    pub fn validate(&self, doc: &Node, ctx: &ValidationContext<'_>) -> Vec<Inconsistency> {
        let mut found = Vec::new();
        doc.descendants(|node, pos, _, _| {
            if is_effectively_removed(node) {
                return false;
            }
            if let Some(validators) = self.validators.get(&node.node_type) {
                for validator in validators {
                    found.extend(validator.validate(node, pos, ctx));
                }
            }
            true
        });
        found
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.node_types()).finish()
    }
}
