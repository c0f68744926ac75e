//! # Inconsistency Detector
//!
//! Advisory warnings computed from the other plugins' indexes. The warning
//! list is rebuilt on every state transition; decorations are projected only
//! while the "show decorations" toggle is on. Nothing here writes to the
//! document.
//!
//! The toggle starts from [`EditorConfig::show_inconsistency_decorations`]
//! and is flipped with the [`meta::SHOW_INCONSISTENCIES`] transaction meta.
//!
//! [`EditorConfig::show_inconsistency_decorations`]: crate::config::EditorConfig

mod validators;

pub use validators::{
    CitationValidator, CrossReferenceValidator, EmptyFootnoteValidator, InlineFootnoteValidator,
    Validator, ValidatorRegistry,
};

use super::bibliography::{BibliographyPlugin, BibliographyState};
use super::footnotes::{FootnotesPlugin, FootnotesState};
use super::objects::{ObjectsPlugin, ObjectsState};
use crate::decorations::{Decoration, DecorationSet, Widget};
use crate::meta;
use crate::state::{EditorState, Plugin, PluginKey};
use manuscript_model::{NodeType, Selection, Transaction};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum InconsistencyCategory {
    MissingReference,
    EmptyContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inconsistency {
    pub category: InconsistencyCategory,
    pub severity: Severity,
    pub node_id: Option<String>,
    pub node_type: NodeType,
    pub pos: usize,
    pub message: String,
}

/// Read-only bundle handed to validators
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    pub bibliography: Option<&'a BibliographyState>,
    pub objects: Option<&'a ObjectsState>,
    pub footnotes: Option<&'a FootnotesState>,
    pub selection: Selection,
    pub show_decorations: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InconsistencyState {
    pub inconsistencies: Vec<Inconsistency>,
    pub show_decorations: bool,
}

impl InconsistencyState {
    pub fn of_category(&self, category: InconsistencyCategory) -> impl Iterator<Item = &Inconsistency> {
        self.inconsistencies.iter().filter(move |i| i.category == category)
    }

    pub fn for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Inconsistency> {
        self.inconsistencies
            .iter()
            .filter(move |i| i.node_id.as_deref() == Some(node_id))
    }
}

pub struct InconsistencyPlugin {
    registry: Arc<ValidatorRegistry>,
}

impl InconsistencyPlugin {
    pub fn new(registry: ValidatorRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    fn detect(&self, state: &EditorState, show_decorations: bool) -> InconsistencyState {
        let bibliography = state.plugin_state(&BibliographyPlugin::KEY);
        let objects = state.plugin_state(&ObjectsPlugin::KEY);
        let footnotes = state.plugin_state(&FootnotesPlugin::KEY);
        let ctx = ValidationContext {
            bibliography: bibliography.as_deref(),
            objects: objects.as_deref(),
            footnotes: footnotes.as_deref(),
            selection: state.selection(),
            show_decorations,
        };
        InconsistencyState {
            inconsistencies: self.registry.validate(state.doc(), &ctx),
            show_decorations,
        }
    }
}

impl Default for InconsistencyPlugin {
    fn default() -> Self {
        Self::new(ValidatorRegistry::with_defaults())
    }
}

impl Plugin for InconsistencyPlugin {
    type State = InconsistencyState;
    const KEY: PluginKey<InconsistencyState> = PluginKey::new("inconsistency");

    fn init(&self, state: &EditorState) -> InconsistencyState {
        self.detect(state, state.config().show_inconsistency_decorations)
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<InconsistencyState>,
        _old: &EditorState,
        new: &EditorState,
    ) -> Arc<InconsistencyState> {
        let show = tr
            .get_meta(meta::SHOW_INCONSISTENCIES)
            .and_then(|v| v.as_bool())
            .unwrap_or(prev.show_decorations);
        let state = self.detect(new, show);
        if state == **prev {
            return prev.clone();
        }
        if state.inconsistencies.len() != prev.inconsistencies.len() {
            tracing::debug!(found = state.inconsistencies.len(), "Inconsistencies changed");
        }
        Arc::new(state)
    }

    fn decorations(&self, state: &InconsistencyState, _editor: &EditorState) -> DecorationSet {
        if !state.show_decorations {
            return DecorationSet::new();
        }
        let mut set = DecorationSet::new();
        for inconsistency in &state.inconsistencies {
            let Some(id) = &inconsistency.node_id else {
                continue;
            };
            let class = match inconsistency.severity {
                Severity::Error => "inconsistency-error",
                Severity::Warning => "inconsistency-warning",
            };
            set.push(Decoration::node(id, class));
            set.push(Decoration::widget(id, Widget::Warning(inconsistency.message.clone())));
        }
        set
    }
}

/// Turn inconsistency decorations on or off
pub fn show_inconsistencies(state: &EditorState, show: bool) -> Transaction {
    let mut tr = state.tr();
    tr.set_meta(meta::SHOW_INCONSISTENCIES, show);
    tr
}
