//! # Undo/Redo History
//!
//! Records history-eligible transactions as the steps that revert them.
//!
//! ## Design
//!
//! - Each recorded transaction stores its inverted steps, last step first
//! - Undo applies them as one transaction and moves the batch to the redo
//!   stack, stored as the inverse of that undo transaction
//! - New recorded transactions clear the redo stack
//! - Transactions that are not recorded (corrective, remote) are mapped
//!   through so stored steps keep pointing at the same content
//! - Batches group several transactions into one undo step
//!
//! Mapping is per step over the whole foreign mapping, which is exact for the
//! usual case of one step per batch and approximate otherwise.

use crate::errors::EditorError;
use crate::state::EditorState;
use manuscript_model::{Mapping, Step, Transaction};

/// Steps that revert one undo level, in application order
#[derive(Debug, Clone, Default)]
pub struct HistoryBatch {
    pub revert: Vec<Step>,
    pub description: Option<String>,
}

impl HistoryBatch {
    fn reverting(tr: &Transaction) -> Self {
        Self {
            revert: tr.inverses().iter().rev().cloned().collect(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn map_through(&mut self, mapping: &Mapping) {
        self.revert = self.revert.iter().filter_map(|step| step.map(mapping)).collect();
    }
}

/// Which stack a transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    Undo,
    Redo,
}

impl HistoryAction {
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Undo => "undo",
            HistoryAction::Redo => "redo",
        }
    }
}

/// Meta key tagging undo/redo transactions
pub const HISTORY_META: &str = "history";

#[derive(Debug)]
pub struct History {
    undo_stack: Vec<HistoryBatch>,
    redo_stack: Vec<HistoryBatch>,

    /// 0 = unlimited
    max_levels: usize,

    current_batch: Option<HistoryBatch>,
}

impl History {
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Record a transaction. Transactions that opted out of history are
    /// mapped through instead.
    pub fn record(&mut self, tr: &Transaction) {
        if !tr.doc_changed() {
            return;
        }
        if !tr.add_to_history() {
            self.map_through(tr.mapping());
            return;
        }

        let batch = HistoryBatch::reverting(tr);
        match &mut self.current_batch {
            Some(current) => {
                // Newer changes are reverted first
                let mut revert = batch.revert;
                revert.append(&mut current.revert);
                current.revert = revert;
            }
            None => self.push_batch(batch),
        }
    }

    /// Carry every stored step over a change that is not itself recorded
    pub fn map_through(&mut self, mapping: &Mapping) {
        if mapping.is_empty() {
            return;
        }
        for batch in self
            .undo_stack
            .iter_mut()
            .chain(self.redo_stack.iter_mut())
            .chain(self.current_batch.iter_mut())
        {
            batch.map_through(mapping);
        }
        self.undo_stack.retain(|b| !b.revert.is_empty());
        self.redo_stack.retain(|b| !b.revert.is_empty());
    }

    pub fn begin_batch(&mut self) {
        self.current_batch = Some(HistoryBatch::default());
    }

    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.revert.is_empty() {
                self.push_batch(batch);
            }
        }
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    fn push_batch(&mut self, batch: HistoryBatch) {
        self.undo_stack.push(batch);
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
    }

    /// Build the transaction undoing the most recent batch. `None` when
    /// there is nothing to undo.
    pub fn undo(&mut self, state: &EditorState) -> Result<Option<Transaction>, EditorError> {
        self.end_batch();
        self.travel(state, HistoryAction::Undo)
    }

    /// Build the transaction redoing the most recently undone batch
    pub fn redo(&mut self, state: &EditorState) -> Result<Option<Transaction>, EditorError> {
        self.travel(state, HistoryAction::Redo)
    }

    fn travel(&mut self, state: &EditorState, action: HistoryAction) -> Result<Option<Transaction>, EditorError> {
        let (from, to) = match action {
            HistoryAction::Undo => (&mut self.undo_stack, &mut self.redo_stack),
            HistoryAction::Redo => (&mut self.redo_stack, &mut self.undo_stack),
        };
        let Some(batch) = from.pop() else {
            return Ok(None);
        };

        let mut tr = state.tr();
        let applied = batch
            .revert
            .iter()
            .try_for_each(|step| tr.step(step.clone()).map(|_| ()));
        if let Err(error) = applied {
            from.push(batch);
            return Err(error.into());
        }
        tr.set_add_to_history(false);
        tr.set_meta(HISTORY_META, action.as_str());

        to.push(HistoryBatch {
            revert: tr.inverses().iter().rev().cloned().collect(),
            description: batch.description,
        });
        tracing::debug!(action = action.as_str(), steps = tr.steps().len(), "History travel");
        Ok(Some(tr))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::state::PluginSet;
    use manuscript_model::builders::*;

    fn state() -> EditorState {
        EditorState::create(
            manuscript(vec![paragraph(vec![text("Hello")])]),
            PluginSet::new(),
            EditorConfig::default(),
        )
    }

    fn typed(state: &EditorState, pos: usize, s: &str) -> (EditorState, Transaction) {
        let mut tr = state.tr();
        tr.insert(pos, vec![text(s)]).unwrap();
        (state.apply(&tr).unwrap(), tr)
    }

    #[test]
    fn test_history_creation() {
        let history = History::new();
        assert_eq!(history.undo_levels(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_and_redo() {
        let mut history = History::new();
        let (state, tr) = typed(&state(), 6, " world");
        history.record(&tr);
        assert!(history.can_undo());

        let undo = history.undo(&state).unwrap().unwrap();
        assert!(!undo.add_to_history());
        assert_eq!(undo.doc().text_content(), "Hello");
        let state = state.apply(&undo).unwrap();
        assert_eq!(history.redo_levels(), 1);

        let redo = history.redo(&state).unwrap().unwrap();
        assert_eq!(redo.doc().text_content(), "Hello world");
        assert_eq!(history.undo_levels(), 1);
    }

    #[test]
    fn test_batches_undo_together() {
        let mut history = History::new();
        history.begin_batch();
        history.set_batch_description("Greeting");
        let (state, tr) = typed(&state(), 6, "!");
        history.record(&tr);
        let (state, tr) = typed(&state, 7, "!");
        history.record(&tr);
        history.end_batch();

        assert_eq!(history.undo_levels(), 1);
        assert_eq!(history.undo_description(), Some("Greeting"));
        let undo = history.undo(&state).unwrap().unwrap();
        assert_eq!(undo.doc().text_content(), "Hello");
    }

    #[test]
    fn test_corrective_changes_are_mapped_not_recorded() {
        let mut history = History::new();
        let (state, tr) = typed(&state(), 6, "!");
        history.record(&tr);

        // A corrective insert before the recorded text shifts it
        let mut fix = state.tr();
        fix.insert(1, vec![text(">")]).unwrap();
        fix.mark_corrective();
        history.record(&fix);
        let state = state.apply(&fix).unwrap();
        assert_eq!(history.undo_levels(), 1);

        let undo = history.undo(&state).unwrap().unwrap();
        assert_eq!(undo.doc().text_content(), ">Hello");
    }

    #[test]
    fn test_new_change_clears_redo_and_levels_are_capped() {
        let mut history = History::with_max_levels(2);
        let mut state = state();
        for _ in 0..3 {
            let (next, tr) = typed(&state, 1, "x");
            history.record(&tr);
            state = next;
        }
        assert_eq!(history.undo_levels(), 2);

        let undo = history.undo(&state).unwrap().unwrap();
        let state = state.apply(&undo).unwrap();
        assert_eq!(history.redo_levels(), 1);
        let (_, tr) = typed(&state, 1, "y");
        history.record(&tr);
        assert_eq!(history.redo_levels(), 0);
    }
}
