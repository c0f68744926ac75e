//! Suggestion selection and highlighting over the tracked-changes overlay.

use crate::decorations::{Decoration, DecorationSet};
use crate::meta;
use crate::state::{EditorState, Plugin, PluginKey};
use crate::tracking::{ChangeOperation, ChangeSet, TrackChangesOverlay, TrackedChange};
use manuscript_model::{Selection, Transaction};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackChangesState {
    pub changes: ChangeSet,

    /// Id of the selected suggestion
    pub selected: Option<String>,
}

impl TrackChangesState {
    pub fn selected_change(&self) -> Option<&TrackedChange> {
        self.selected.as_deref().and_then(|id| self.changes.get(id))
    }

    /// The selected change and, for a move, its other half
    pub fn highlighted(&self) -> Vec<&TrackedChange> {
        let Some(selected) = self.selected_change() else {
            return Vec::new();
        };
        match selected.move_node_id.as_deref() {
            Some(move_id) => self.changes.move_partners(move_id).collect(),
            None => vec![selected],
        }
    }
}

fn change_at(changes: &ChangeSet, pos: usize) -> Option<String> {
    changes.changes_at(pos).first().map(|c| c.id.clone())
}

fn change_class(change: &TrackedChange) -> &'static str {
    match change.operation {
        ChangeOperation::Insert => "tracked-insert",
        ChangeOperation::Delete => "tracked-delete",
        ChangeOperation::SetAttrs => "tracked-attrs",
    }
}

fn decorate(change: &TrackedChange, class: &str) -> Decoration {
    match &change.node_id {
        Some(id) => Decoration::node(id, class),
        None => Decoration::inline(change.from, change.to, class),
    }
}

pub struct TrackChangesPlugin {
    overlay: Arc<dyn TrackChangesOverlay>,
}

impl TrackChangesPlugin {
    pub fn new(overlay: Arc<dyn TrackChangesOverlay>) -> Self {
        Self { overlay }
    }
}

impl Plugin for TrackChangesPlugin {
    type State = TrackChangesState;
    const KEY: PluginKey<TrackChangesState> = PluginKey::new("track_changes");

    fn init(&self, state: &EditorState) -> TrackChangesState {
        let changes = self.overlay.change_set(state.doc());
        let selected = change_at(&changes, state.selection().head);
        TrackChangesState { changes, selected }
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<TrackChangesState>,
        _old: &EditorState,
        new: &EditorState,
    ) -> Arc<TrackChangesState> {
        let explicit = tr.get_meta(meta::SELECT_SUGGESTION);
        if explicit.is_none() && !tr.doc_changed() && !tr.selection_set() {
            return prev.clone();
        }

        let changes = if tr.doc_changed() {
            self.overlay.change_set(new.doc())
        } else {
            prev.changes.clone()
        };

        let selected = match explicit {
            Some(Value::String(id)) => changes.get(id).map(|c| c.id.clone()),
            Some(_) => None,
            None => change_at(&changes, new.selection().head),
        };
        if selected != prev.selected {
            tracing::debug!(selected = ?selected, "Suggestion selection changed");
        }
        Arc::new(TrackChangesState { changes, selected })
    }

    fn decorations(&self, state: &TrackChangesState, _editor: &EditorState) -> DecorationSet {
        let mut set: DecorationSet = state
            .changes
            .pending()
            .map(|change| decorate(change, change_class(change)))
            .collect();
        for change in state.highlighted() {
            set.push(decorate(change, "selected-suggestion"));
        }
        set
    }
}

/// Select a suggestion by id (or clear with `None`), moving the cursor to it
pub fn select_suggestion(state: &EditorState, change_id: Option<&str>) -> Transaction {
    let mut tr = state.tr();
    tr.set_meta(meta::SELECT_SUGGESTION, change_id.map_or(Value::Null, Value::from));
    let target = change_id.and_then(|id| {
        state
            .plugin_state(&TrackChangesPlugin::KEY)
            .and_then(|s| s.changes.get(id).map(|c| c.from))
    });
    if let Some(pos) = target {
        tr.set_selection(Selection::cursor(pos));
    }
    tr
}
