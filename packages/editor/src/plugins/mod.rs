//! # Plugins
//!
//! Each plugin owns one derived index over the document and, where the
//! document has to mirror that index, an enforcer returning a single
//! corrective transaction.
//!
//! | plugin          | state                          | enforcer                          |
//! |-----------------|--------------------------------|-----------------------------------|
//! | persist         | none                           | unique ids                        |
//! | structure       | none                           | titles, empty footnotes           |
//! | track_changes   | change set + selected change   | none                              |
//! | footnotes       | labels, order, unused ids      | inline labels, footnote order     |
//! | bibliography    | citation requests              | citation text, bibliography       |
//! | sections        | section numbering              | none                              |
//! | objects         | figure/table/... labels        | cross reference labels            |
//! | find_replace    | query + matches                | none                              |
//! | inconsistency   | warnings + show toggle         | none                              |

pub mod bibliography;
pub mod find_replace;
pub mod footnotes;
pub mod inconsistency;
pub mod objects;
pub mod persist;
pub mod sections;
pub mod structure;
pub mod track_changes;

use crate::citation::{EngineHandle, InMemoryLibrary, Library};
use crate::meta;
use crate::state::PluginSet;
use crate::tracking::{AttributeOverlay, TrackChangesOverlay};
use manuscript_model::{IdGenerator, Transaction};
use std::sync::Arc;

/// External services the plugins consult
#[derive(Clone)]
pub struct Collaborators {
    pub library: Arc<dyn Library>,
    pub citation_engine: EngineHandle,
    pub overlay: Arc<dyn TrackChangesOverlay>,
}

impl Collaborators {
    pub fn new(library: Arc<dyn Library>) -> Self {
        Self {
            library,
            citation_engine: EngineHandle::new(),
            overlay: Arc::new(AttributeOverlay),
        }
    }

    pub fn with_engine(self, engine: EngineHandle) -> Self {
        Self {
            citation_engine: engine,
            ..self
        }
    }

    pub fn with_overlay(self, overlay: Arc<dyn TrackChangesOverlay>) -> Self {
        Self { overlay, ..self }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryLibrary::new()))
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("citation_engine", &self.citation_engine)
            .finish_non_exhaustive()
    }
}

/// Every plugin of the manuscript editor, in dependency order
pub fn default_plugins(ids: Arc<IdGenerator>, collaborators: &Collaborators) -> PluginSet {
    PluginSet::new()
        .with(persist::PersistPlugin::new(ids))
        .with(structure::StructurePlugin)
        .with(track_changes::TrackChangesPlugin::new(collaborators.overlay.clone()))
        .with(footnotes::FootnotesPlugin)
        .with(bibliography::BibliographyPlugin::new(
            collaborators.library.clone(),
            collaborators.citation_engine.clone(),
        ))
        .with(sections::SectionsPlugin)
        .with(objects::ObjectsPlugin)
        .with(find_replace::FindReplacePlugin)
        .with(inconsistency::InconsistencyPlugin::default())
}

/// Whether any transaction changed the document or asked for a refresh
pub(crate) fn needs_check(trs: &[Transaction]) -> bool {
    trs.iter().any(|tr| tr.doc_changed() || tr.has_meta(meta::REFRESH))
}
