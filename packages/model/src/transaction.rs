//! # Transactions
//!
//! A transaction accumulates steps from one document snapshot to the next,
//! together with the mapping of every step, an optional explicit selection,
//! and metadata.
//!
//! ## Capability flags
//!
//! Whether a transaction is recorded in undo history and whether it is
//! recorded by the change-tracking overlay are typed flags rather than
//! conventional meta keys. [`Transaction::mark_corrective`] clears both; it is
//! what every derived-state repair must call.

use crate::error::TransformError;
use crate::node::{Attrs, Node};
use crate::selection::Selection;
use crate::step::{Mapping, Step};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How the editor's wrapping layer should treat a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionFlags {
    pub add_to_history: bool,
    pub skip_tracking: bool,
}

impl Default for TransactionFlags {
    fn default() -> Self {
        Self {
            add_to_history: true,
            skip_tracking: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Transaction {
    before: Arc<Node>,
    doc: Arc<Node>,
    steps: Vec<Step>,
    inverses: Vec<Step>,
    mapping: Mapping,
    selection: Option<Selection>,
    meta: BTreeMap<String, Value>,
    flags: TransactionFlags,
}

impl Transaction {
    pub fn new(doc: Arc<Node>) -> Self {
        Self {
            before: doc.clone(),
            doc,
            steps: Vec::new(),
            inverses: Vec::new(),
            mapping: Mapping::new(),
            selection: None,
            meta: BTreeMap::new(),
            flags: TransactionFlags::default(),
        }
    }

    /// Document the transaction started from
    pub fn before(&self) -> &Arc<Node> {
        &self.before
    }

    /// Document after all steps so far
    pub fn doc(&self) -> &Arc<Node> {
        &self.doc
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Inverse of every step, in application order
    pub fn inverses(&self) -> &[Step] {
        &self.inverses
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    pub fn doc_changed(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Apply a step. On failure the transaction is left untouched.
    pub fn step(&mut self, step: Step) -> Result<&mut Self, TransformError> {
        let mut next = (*self.doc).clone();
        let inverse = step.apply(&mut next)?;
        self.mapping.append_map(step.get_map());
        self.doc = Arc::new(next);
        self.inverses.push(inverse);
        self.steps.push(step);
        Ok(self)
    }

    pub fn replace_with(
        &mut self,
        from: usize,
        to: usize,
        nodes: Vec<Node>,
    ) -> Result<&mut Self, TransformError> {
        self.step(Step::Replace { from, to, nodes })
    }

    pub fn insert(&mut self, pos: usize, nodes: Vec<Node>) -> Result<&mut Self, TransformError> {
        self.replace_with(pos, pos, nodes)
    }

    pub fn delete(&mut self, from: usize, to: usize) -> Result<&mut Self, TransformError> {
        self.replace_with(from, to, Vec::new())
    }

    /// Delete the node starting at `pos`
    pub fn delete_node(&mut self, pos: usize) -> Result<&mut Self, TransformError> {
        let size = self
            .doc
            .node_at(pos)
            .map(Node::node_size)
            .ok_or(TransformError::NoNodeAt(pos))?;
        self.delete(pos, pos + size)
    }

    pub fn set_node_markup(&mut self, pos: usize, attrs: Attrs) -> Result<&mut Self, TransformError> {
        self.step(Step::SetAttrs { pos, attrs })
    }

    /// Set a single attribute on the node at `pos`, keeping the others
    pub fn set_node_attribute(
        &mut self,
        pos: usize,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, TransformError> {
        let node = self.doc.node_at(pos).ok_or(TransformError::NoNodeAt(pos))?;
        let mut attrs = node.attrs.clone();
        attrs.insert(key.to_string(), value.into());
        self.set_node_markup(pos, attrs)
    }

    pub fn set_selection(&mut self, selection: Selection) -> &mut Self {
        self.selection = Some(selection);
        self
    }

    /// Explicitly set selection, if any
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn selection_set(&self) -> bool {
        self.selection.is_some()
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.meta.insert(key.to_string(), value.into());
        self
    }

    pub fn get_meta(&self, key: &str) -> Option<&Value> {
        self.meta.get(key)
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.meta.contains_key(key)
    }

    pub fn flags(&self) -> TransactionFlags {
        self.flags
    }

    pub fn add_to_history(&self) -> bool {
        self.flags.add_to_history
    }

    pub fn skip_tracking(&self) -> bool {
        self.flags.skip_tracking
    }

    pub fn set_add_to_history(&mut self, add: bool) -> &mut Self {
        self.flags.add_to_history = add;
        self
    }

    pub fn set_skip_tracking(&mut self, skip: bool) -> &mut Self {
        self.flags.skip_tracking = skip;
        self
    }

    /// Flag as a derived-state repair: kept out of undo history and out of
    /// change tracking.
    pub fn mark_corrective(&mut self) -> &mut Self {
        self.flags = TransactionFlags {
            add_to_history: false,
            skip_tracking: true,
        };
        self
    }

    pub fn is_corrective(&self) -> bool {
        !self.flags.add_to_history && self.flags.skip_tracking
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::*;

    fn doc() -> Arc<Node> {
        Arc::new(manuscript(vec![paragraph(vec![
            text("see "),
            citation("c1", &["item-1"]),
        ])]))
    }

    #[test]
    fn test_steps_accumulate_mapping() {
        let mut tr = Transaction::new(doc());
        assert!(!tr.doc_changed());
        tr.insert(1, vec![text(">")]).unwrap();
        tr.insert(0, vec![paragraph(vec![])]).unwrap();
        assert!(tr.doc_changed());
        assert_eq!(tr.steps().len(), 2);
        // citation was at 5, shifted by one character then one empty paragraph
        assert_eq!(tr.mapping().map(5, 1), 8);
        assert_eq!(tr.doc().node_at(8).unwrap().id(), Some("c1"));
    }

    #[test]
    fn test_failed_step_leaves_transaction_untouched() {
        let mut tr = Transaction::new(doc());
        assert!(tr.delete(2, 40).is_err());
        assert!(!tr.doc_changed());
        assert!(Arc::ptr_eq(tr.doc(), tr.before()));
    }

    #[test]
    fn test_set_node_attribute_keeps_other_attributes() {
        let mut tr = Transaction::new(doc());
        tr.set_node_attribute(5, "contents", "(1)").unwrap();
        let node = tr.doc().node_at(5).unwrap();
        assert_eq!(node.attr_str("contents"), Some("(1)"));
        assert_eq!(node.id(), Some("c1"));
    }

    #[test]
    fn test_delete_node_removes_whole_node() {
        let mut tr = Transaction::new(doc());
        tr.delete_node(5).unwrap();
        assert!(tr.doc().find_by_id("c1").is_none());
        assert_eq!(tr.doc().text_content(), "see ");
    }

    #[test]
    fn test_corrective_flags() {
        let mut tr = Transaction::new(doc());
        assert!(tr.add_to_history());
        assert!(!tr.skip_tracking());
        tr.mark_corrective();
        assert!(tr.is_corrective());
        assert!(!tr.add_to_history());
        assert!(tr.skip_tracking());
    }
}
