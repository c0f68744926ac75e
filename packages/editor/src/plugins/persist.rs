//! Unique persistent ids for structural nodes

use super::needs_check;
use crate::errors::PluginError;
use crate::state::{EditorState, Plugin, PluginKey};
use manuscript_model::{IdGenerator, Transaction};
use std::collections::HashSet;
use std::sync::Arc;

/// Assigns an id to every id-requiring node that lacks one or repeats an
/// id seen earlier in document order
pub struct PersistPlugin {
    ids: Arc<IdGenerator>,
}

impl PersistPlugin {
    pub fn new(ids: Arc<IdGenerator>) -> Self {
        Self { ids }
    }
}

impl Plugin for PersistPlugin {
    type State = ();
    const KEY: PluginKey<()> = PluginKey::new("persist");

    fn init(&self, _state: &EditorState) {}

    fn apply(&self, _tr: &Transaction, prev: &Arc<()>, _old: &EditorState, _new: &EditorState) -> Arc<()> {
        prev.clone()
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

        let mut seen: HashSet<String> = HashSet::new();
        let mut assignments: Vec<(usize, String)> = Vec::new();

        new.doc().descendants(|node, pos, _, _| {
            if let Some(prefix) = node.node_type.spec().id_prefix {
                let needs_id = match node.id() {
                    Some(id) => !seen.insert(id.to_string()),
                    None => true,
                };
                if needs_id {
                    let id = self.ids.next_id(prefix);
                    seen.insert(id.clone());
                    assignments.push((pos, id));
                }
            }
            true
        });

        if assignments.is_empty() {
            return Ok(None);
        }

        let mut tr = new.tr();
        for (pos, id) in &assignments {
            tr.set_node_attribute(*pos, "id", id.as_str())?;
        }
        tr.mark_corrective();
        tracing::info!(assigned = assignments.len(), "Assigned persistent ids");
        Ok(Some(tr))
    }
}
