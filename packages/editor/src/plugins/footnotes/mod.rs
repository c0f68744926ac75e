//! # Footnotes
//!
//! Keeps footnote labels and footnote order in step with the inline
//! footnotes that reference them.
//!
//! ## Enforcer
//!
//! After a document change:
//!
//! 1. every live inline footnote's `contents` is set to its computed label
//! 2. every footnotes element whose children are out of label order is
//!    rewritten, whole child range in one step
//!
//! Unused footnotes are never removed here; they are decorated and can be
//! deleted through [`FootnoteDeletion`].

mod deletion;
mod index;
mod labels;

pub use deletion::FootnoteDeletion;
pub use index::{build_footnotes_state, FootnoteScope, FootnotesElementIndex, FootnotesState, Located};
pub use labels::{alphabetic_label, LabelScheme, LabelSequence};

use super::needs_check;
use crate::decorations::{Decoration, DecorationSet, Widget};
use crate::errors::PluginError;
use crate::state::{EditorState, Plugin, PluginKey};
use manuscript_model::{Node, TransformError, Transaction};
use std::sync::Arc;

pub struct FootnotesPlugin;

impl Plugin for FootnotesPlugin {
    type State = FootnotesState;
    const KEY: PluginKey<FootnotesState> = PluginKey::new("footnotes");

    fn init(&self, state: &EditorState) -> FootnotesState {
        build_footnotes_state(state.doc())
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<FootnotesState>,
        _old: &EditorState,
        new: &EditorState,
    ) -> Arc<FootnotesState> {
        if !tr.doc_changed() {
            return prev.clone();
        }
        let state = build_footnotes_state(new.doc());
        tracing::debug!(scopes = state.scopes.len(), "Rebuilt footnote index");
        Arc::new(state)
    }

    fn append_transaction(
        &self,
        trs: &[Transaction],
        _old: &EditorState,
        new: &EditorState,
    ) -> Result<Option<Transaction>, PluginError> {
        if !needs_check(trs) {
            return Ok(None);
        }
        let Some(footnotes) = new.plugin_state(&Self::KEY) else {
            return Ok(None);
        };

        let mut tr = new.tr();
        let mut relabeled = 0;
        let mut reordered = 0;

        for scope in &footnotes.scopes {
            for inline in &scope.inline_footnotes {
                let label = scope.inline_label(&inline.node);
                if inline.node.attr_str("contents") != Some(label.as_str()) {
                    tr.set_node_attribute(inline.pos, "contents", label)?;
                    relabeled += 1;
                }
            }
        }

        // Rewrites keep the element's size, but go back to front regardless
        let mut elements: Vec<&FootnotesElementIndex> = footnotes
            .scopes
            .iter()
            .flat_map(|scope| scope.elements.iter())
            .filter(|element| element.needs_reorder())
            .collect();
        elements.sort_by_key(|element| std::cmp::Reverse(element.pos));
        // Relabels keep node sizes, so indexed positions address the
        // relabeled footnotes in the transaction's current document
        for element in elements {
            let current = tr.doc().clone();
            let ordered = element
                .footnotes
                .iter()
                .map(|f| current.node_at(f.pos).cloned().ok_or(TransformError::NoNodeAt(f.pos)))
                .collect::<Result<Vec<Node>, _>>()?;
            let (from, to) = element.content_range();
            tr.replace_with(from, to, ordered)?;
            reordered += 1;
        }

        if !tr.doc_changed() {
            return Ok(None);
        }
        tr.mark_corrective();
        tracing::info!(relabeled, reordered, "Synchronized footnotes");
        Ok(Some(tr))
    }

    fn decorations(&self, state: &FootnotesState, _editor: &EditorState) -> DecorationSet {
        let mut set = DecorationSet::new();
        for scope in &state.scopes {
            for footnote_id in scope.footnote_ids() {
                match scope.labels.get(footnote_id) {
                    Some(label) => set.push(Decoration::widget(footnote_id, Widget::Label(label.clone()))),
                    None => {
                        set.push(Decoration::node(footnote_id, "footnote-unused"));
                        set.push(Decoration::widget(
                            footnote_id,
                            Widget::DeleteFootnote {
                                footnote_id: footnote_id.to_string(),
                            },
                        ));
                    }
                }
            }
        }
        set
    }
}
