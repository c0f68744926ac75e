//! Confirmed deletion of a footnote.
//!
//! The dialog only remembers the footnote id. Everything else (where the
//! footnote is, who references it, whether its container empties) is looked
//! up again when the user confirms, since the document may have changed in
//! the meantime.

use manuscript_model::{Node, NodeType, Transaction};
use serde_json::Value;

use crate::errors::EditorError;
use crate::state::EditorState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FootnoteDeletion {
    footnote_id: String,
}

#[derive(Debug, Clone, PartialEq)]
enum Edit {
    Remove { from: usize, to: usize },
    SetReferences { pos: usize, rids: Vec<String> },
}

impl Edit {
    fn pos(&self) -> usize {
        match self {
            Edit::Remove { from, .. } => *from,
            Edit::SetReferences { pos, .. } => *pos,
        }
    }
}

impl FootnoteDeletion {
    pub fn request(footnote_id: impl Into<String>) -> Self {
        Self {
            footnote_id: footnote_id.into(),
        }
    }

    pub fn footnote_id(&self) -> &str {
        &self.footnote_id
    }

    /// Dismiss the dialog without touching the document
    pub fn cancel(self) {
        tracing::debug!(footnote = %self.footnote_id, "Footnote deletion cancelled");
    }

    /// Build the deletion against the current state. `None` when the
    /// footnote no longer exists.
    pub fn confirm(&self, state: &EditorState) -> Result<Option<Transaction>, EditorError> {
        let doc = state.doc();
        let (footnote, pos) = match doc.find_by_id(&self.footnote_id) {
            Some(found) if found.0.node_type == NodeType::Footnote => found,
            _ => {
                tracing::debug!(footnote = %self.footnote_id, "Footnote already gone; nothing to delete");
                return Ok(None);
            }
        };

        // Remove the whole container when this is its last footnote
        let resolved = doc.resolve(pos)?;
        let removed = match resolved.ancestor(NodeType::FootnotesElement) {
            Some((depth, element)) if element.child_count() == 1 && depth > 0 => {
                let from = resolved.before(depth);
                (from, from + element.node_size())
            }
            _ => (pos, pos + footnote.node_size()),
        };

        let mut edits = vec![Edit::Remove {
            from: removed.0,
            to: removed.1,
        }];
        edits.extend(reference_edits(doc, &self.footnote_id, removed));

        edits.sort_by_key(|edit| std::cmp::Reverse(edit.pos()));
        let mut tr = state.tr();
        for edit in edits {
            match edit {
                Edit::Remove { from, to } => tr.delete(from, to)?,
                Edit::SetReferences { pos, rids } => {
                    let rids: Vec<Value> = rids.into_iter().map(Value::String).collect();
                    tr.set_node_attribute(pos, "rids", Value::Array(rids))?
                }
            };
        }

        tracing::info!(footnote = %self.footnote_id, "Deleting footnote");
        Ok(Some(tr))
    }
}

/// Edits to inline footnotes referencing `footnote_id` outside `removed`
fn reference_edits(doc: &Node, footnote_id: &str, removed: (usize, usize)) -> Vec<Edit> {
    doc.find_all(NodeType::InlineFootnote)
        .into_iter()
        .filter(|(_, pos)| *pos < removed.0 || *pos >= removed.1)
        .filter_map(|(node, pos)| {
            let rids = node.attr_str_list("rids");
            if !rids.iter().any(|rid| rid == footnote_id) {
                return None;
            }
            let remaining: Vec<String> = rids.into_iter().filter(|rid| rid != footnote_id).collect();
            Some(if remaining.is_empty() {
                Edit::Remove {
                    from: pos,
                    to: pos + node.node_size(),
                }
            } else {
                Edit::SetReferences {
                    pos,
                    rids: remaining,
                }
            })
        })
        .collect()
}
