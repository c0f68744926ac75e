//! # Manuscript Editor
//!
//! Plugin state machinery for the manuscript editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: node tree, steps, transactions       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ state: EditorState + plugin slots           │
//! │  - apply / append-transaction loop          │
//! │  - typed plugin keys                        │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ plugins: derived indexes + enforcers        │
//! │  - footnotes, bibliography, objects         │
//! │  - sections, track changes, find/replace    │
//! │  - inconsistency warnings                   │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: history, overlays, collaboration    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Document is source of truth**: every index is derived from it
//! 2. **One correction per enforcer per pass**: edits applied back to front
//! 3. **Corrections are not user edits**: never undone, never tracked
//! 4. **Decorations target node ids**: positions are resolved lazily
//!
//! ## Usage
//!
//! ```rust
//! use manuscript_editor::{Collaborators, Editor, EditorConfig, Plugin};
//! use manuscript_editor::plugins::footnotes::FootnotesPlugin;
//! use manuscript_model::builders::*;
//!
//! let doc = manuscript(vec![
//!     paragraph(vec![text("See"), inline_footnote("ref-1", &["fn-1"])]),
//!     footnotes_element("fe", vec![footnote("fn-1", "A note")]),
//! ]);
//! let editor = Editor::new(doc, EditorConfig::default(), Collaborators::default()).unwrap();
//!
//! let footnotes = editor.plugin_state(&FootnotesPlugin::KEY).unwrap();
//! assert_eq!(footnotes.label("fn-1"), Some("a"));
//! ```

mod citation;
mod config;
mod decorations;
mod editor;
mod errors;
mod history;
pub mod meta;
mod overlay;
pub mod plugins;
mod session;
mod state;
mod statistics;
mod tracking;

pub use citation::{
    Bibliography, BibliographyItem, CitationEngine, CitationEngineError, CitationRequest, EngineHandle,
    InMemoryLibrary, Library, NumericEngine, OutputMode, NO_PRINTED_FORM,
};
pub use config::{
    ConfigError, EditorConfig, SectionCategory, SectionCategoryCatalog, SectionGroup, StatisticsRequirements,
};
pub use decorations::{
    Decoration, DecorationKind, DecorationSet, DecorationTarget, MountDelta, ResolvedDecoration, Widget,
    WidgetMounts, WidgetRenderer,
};
pub use editor::{ChangeRecorder, Editor, Origin};
pub use errors::{EditorError, PluginError};
pub use history::{History, HistoryAction, HistoryBatch, HISTORY_META};
pub use overlay::{Dialog, OverlayManager, Popup, PopupId};
pub use plugins::Collaborators;
pub use session::{CollabSession, Sendable};
pub use state::{AppliedTransactions, EditorState, Plugin, PluginKey, PluginSet};
pub use statistics::{
    build_text, compute_alerts, count_characters, count_words, AlertBoard, RequestToken, RequirementAlert,
    Statistics, StatisticsError, StatisticsWorker,
};
pub use tracking::{
    is_effectively_removed, tracked_attrs, tracked_value, AttributeOverlay, ChangeOperation, ChangeSet,
    ChangeStatus, TrackChangesOverlay, TrackedAttrs, TrackedChange, TRACKED_ATTR,
};

// Re-export the document model for convenience
pub use manuscript_model as model;
