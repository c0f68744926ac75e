//! # Editor
//!
//! Owner of everything with a lifecycle: the current [`EditorState`], the
//! undo history, the overlay manager, the optional collaboration session and
//! the optional change recorder.
//!
//! ## Dispatch
//!
//! ```text
//! tr ──► EditorState::apply_transaction ──► [root, appended...]
//!                                              │
//!              ┌───────────────┬───────────────┼────────────────┐
//!              ▼               ▼               ▼                ▼
//!           History      ChangeRecorder   CollabSession   OverlayManager
//!        (record / map)  (user edits)     (local steps)     (prune)
//! ```
//!
//! Corrective transactions appended by enforcers never enter the undo stack
//! and never reach the change recorder; the history maps its stored steps
//! through them instead.

use crate::config::EditorConfig;
use crate::decorations::DecorationSet;
use crate::errors::EditorError;
use crate::history::History;
use crate::meta;
use crate::overlay::{Dialog, OverlayManager};
use crate::plugins::footnotes::FootnoteDeletion;
use crate::plugins::sections::CategoryOption;
use crate::plugins::{
    bibliography, default_plugins, find_replace, inconsistency, sections, track_changes, Collaborators,
};
use crate::session::{CollabSession, Sendable};
use crate::state::{EditorState, PluginKey};
use crate::statistics::{compute_alerts, RequirementAlert, Statistics};
use manuscript_model::{IdGenerator, Node, Step, Transaction};
use std::any::Any;
use std::sync::Arc;

/// Receives user transactions while change tracking is on
pub trait ChangeRecorder: Send {
    fn record(&mut self, tr: &Transaction, state: &EditorState);
}

/// Where a dispatched transaction came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    History,
    Remote,
}

pub struct Editor {
    state: EditorState,
    history: History,
    overlays: OverlayManager,
    ids: Arc<IdGenerator>,
    collaborators: Collaborators,
    recorder: Option<Box<dyn ChangeRecorder>>,
    collab: Option<CollabSession>,
    destroyed: bool,
}

impl Editor {
    /// Build the editor and run every enforcer once over the loaded document
    pub fn new(doc: Node, config: EditorConfig, collaborators: Collaborators) -> Result<Self, EditorError> {
        config.validate()?;
        let ids = Arc::new(IdGenerator::new(&config.document_key));
        let plugins = default_plugins(ids.clone(), &collaborators);
        let history = History::with_max_levels(config.history_depth);
        let state = EditorState::create(doc, plugins, config);

        let mut editor = Self {
            state,
            history,
            overlays: OverlayManager::new(),
            ids,
            collaborators,
            recorder: None,
            collab: None,
            destroyed: false,
        };
        editor.refresh()?;
        tracing::debug!(plugins = editor.state.plugins().len(), "Editor created");
        Ok(editor)
    }

    pub fn with_recorder(mut self, recorder: Box<dyn ChangeRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Start sending local steps to a collaboration authority at `version`
    pub fn enable_collaboration(&mut self, client_id: impl Into<String>, version: u64) {
        self.collab = Some(CollabSession::new(client_id, version));
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn doc(&self) -> &Arc<Node> {
        self.state.doc()
    }

    pub fn plugin_state<T: Any + Send + Sync>(&self, key: &PluginKey<T>) -> Option<Arc<T>> {
        self.state.plugin_state(key)
    }

    pub fn decorations(&self) -> DecorationSet {
        self.state.decorations()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Group the following dispatches into one undo level
    pub fn begin_batch(&mut self) {
        self.history.begin_batch();
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    pub fn overlays(&self) -> &OverlayManager {
        &self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut OverlayManager {
        &mut self.overlays
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub fn collab(&self) -> Option<&CollabSession> {
        self.collab.as_ref()
    }

    pub fn sendable(&self) -> Option<Sendable> {
        self.collab.as_ref().and_then(CollabSession::sendable)
    }

    pub fn dispatch(&mut self, tr: Transaction) -> Result<&EditorState, EditorError> {
        self.dispatch_with(tr, Origin::Local)
    }

    pub fn dispatch_with(&mut self, tr: Transaction, origin: Origin) -> Result<&EditorState, EditorError> {
        self.ensure_alive()?;
        let applied = self.state.apply_transaction(tr)?;
        let tracking = applied.state.config().track_changes;

        for (index, tr) in applied.transactions.iter().enumerate() {
            let root = index == 0;

            // Undo/redo already moved their batch between the stacks
            if !(root && origin == Origin::History) {
                self.history.record(tr);
            }

            if tracking && !tr.skip_tracking() && origin != Origin::Remote {
                if let Some(recorder) = self.recorder.as_mut() {
                    recorder.record(tr, &applied.state);
                }
            }

            if let Some(session) = self.collab.as_mut() {
                if !(root && origin == Origin::Remote) {
                    session.record_local(tr);
                }
            }
        }

        if !applied.appended().is_empty() {
            tracing::debug!(
                origin = ?origin,
                appended = applied.appended().len(),
                "Dispatched with corrections"
            );
        }
        self.state = applied.state;
        self.overlays.prune(self.state.doc());
        Ok(&self.state)
    }

    /// Ask every enforcer to re-check the document
    pub fn refresh(&mut self) -> Result<&EditorState, EditorError> {
        let mut tr = self.state.tr();
        tr.set_meta(meta::REFRESH, true);
        tr.mark_corrective();
        self.dispatch(tr)
    }

    /// The citation library changed outside the document
    pub fn library_updated(&mut self) -> Result<&EditorState, EditorError> {
        let mut tr = self.state.tr();
        tr.set_meta(meta::LIBRARY_UPDATED, true);
        self.dispatch(tr)
    }

    /// Returns `false` when there is nothing to undo
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        match self.history.undo(&self.state)? {
            Some(tr) => {
                self.dispatch_with(tr, Origin::History)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        match self.history.redo(&self.state)? {
            Some(tr) => {
                self.dispatch_with(tr, Origin::History)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Merge steps accepted by the authority. Returns `false` when every
    /// received step was our own.
    pub fn receive_remote(&mut self, steps: Vec<Step>, client_ids: &[String]) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        let session = self.collab.as_mut().ok_or(EditorError::CollaborationDisabled)?;
        match session.receive(&self.state, steps, client_ids)? {
            Some(tr) => {
                self.dispatch_with(tr, Origin::Remote)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Open the confirmation dialog for deleting a footnote
    pub fn request_footnote_deletion(&mut self, footnote_id: &str) -> Result<(), EditorError> {
        self.ensure_alive()?;
        self.overlays
            .open_dialog(Dialog::FootnoteDeletion(FootnoteDeletion::request(footnote_id)))
    }

    /// Confirm the open dialog. Returns `false` when no dialog was open or
    /// its target is gone.
    pub fn confirm_dialog(&mut self) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        let tr = match self.overlays.take_dialog() {
            Some(Dialog::FootnoteDeletion(deletion)) => deletion.confirm(&self.state)?,
            None => None,
        };
        match tr {
            Some(tr) => {
                self.dispatch(tr)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn cancel_dialog(&mut self) {
        self.overlays.cancel_dialog();
    }

    /// Returns `false` when the document already has a bibliography
    pub fn insert_bibliography_section(&mut self) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        match bibliography::insert_bibliography_section(&self.state, &self.ids)? {
            Some(tr) => {
                self.dispatch(tr)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn category_options(&self, section_id: &str) -> Result<Vec<CategoryOption>, EditorError> {
        sections::category_options(&self.state, section_id)
    }

    pub fn set_section_category(&mut self, section_id: &str, category_id: Option<&str>) -> Result<(), EditorError> {
        self.ensure_alive()?;
        let tr = sections::set_section_category(&self.state, section_id, category_id)?;
        self.dispatch(tr)?;
        Ok(())
    }

    pub fn find(&mut self, query: &str, case_sensitive: bool) -> Result<(), EditorError> {
        let tr = find_replace::find(&self.state, query, case_sensitive);
        self.dispatch(tr)?;
        Ok(())
    }

    pub fn set_active_match(&mut self, index: usize) -> Result<(), EditorError> {
        let tr = find_replace::set_active_match(&self.state, index);
        self.dispatch(tr)?;
        Ok(())
    }

    pub fn replace_current(&mut self, replacement: &str) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        match find_replace::replace_current(&self.state, replacement)? {
            Some(tr) => {
                self.dispatch(tr)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn replace_all(&mut self, replacement: &str) -> Result<bool, EditorError> {
        self.ensure_alive()?;
        match find_replace::replace_all(&self.state, replacement)? {
            Some(tr) => {
                self.dispatch(tr)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn select_suggestion(&mut self, change_id: Option<&str>) -> Result<(), EditorError> {
        let tr = track_changes::select_suggestion(&self.state, change_id);
        self.dispatch(tr)?;
        Ok(())
    }

    pub fn show_inconsistencies(&mut self, show: bool) -> Result<(), EditorError> {
        let tr = inconsistency::show_inconsistencies(&self.state, show);
        self.dispatch(tr)?;
        Ok(())
    }

    /// Counts for the current document, computed inline
    pub fn statistics(&self) -> Statistics {
        Statistics::of(self.state.doc())
    }

    pub fn requirement_alerts(&self) -> Vec<RequirementAlert> {
        compute_alerts(self.statistics(), &self.state.config().requirements)
    }

    /// Tear down overlays and history; every later dispatch fails
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.overlays.destroy();
        self.history.clear();
        self.recorder = None;
        self.destroyed = true;
        tracing::debug!("Editor destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    fn ensure_alive(&self) -> Result<(), EditorError> {
        if self.destroyed {
            Err(EditorError::Destroyed)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("state", &self.state)
            .field("history", &self.history)
            .field("collab", &self.collab)
            .field("destroyed", &self.destroyed)
            .finish_non_exhaustive()
    }
}
