//! # Tracked Changes
//!
//! Read side of the change-tracking overlay. Suggestions are recorded in the
//! document itself:
//!
//! - block and inline nodes carry a `dataTracked` attribute (one object or a
//!   list of them)
//! - text carries `tracked_insert` / `tracked_delete` marks whose `dataTracked`
//!   attribute holds the same object
//!
//! ```text
//! { "id": "change-1", "status": "pending", "operation": "delete",
//!   "moveNodeId": "move-1" }
//! ```
//!
//! A move is recorded as a deletion at the source and an insertion at the
//! destination sharing one `moveNodeId`.

use manuscript_model::{MarkType, Node};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute / mark attribute holding tracking data
pub const TRACKED_ATTR: &str = "dataTracked";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOperation {
    Insert,
    Delete,
    SetAttrs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedAttrs {
    pub id: String,
    pub status: ChangeStatus,
    pub operation: ChangeOperation,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_node_id: Option<String>,
}

impl TrackedAttrs {
    /// Whether the tracked content is, or is about to be, gone
    pub fn removes_content(&self) -> bool {
        removes_content(self.operation, self.status)
    }

    fn from_value(value: &Value) -> Vec<TrackedAttrs> {
        match value {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            Value::Object(_) => serde_json::from_value(value.clone())
                .map(|attrs| vec![attrs])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

fn removes_content(operation: ChangeOperation, status: ChangeStatus) -> bool {
    match operation {
        ChangeOperation::Delete => status != ChangeStatus::Rejected,
        ChangeOperation::Insert => status == ChangeStatus::Rejected,
        ChangeOperation::SetAttrs => false,
    }
}

/// Tracking records on a node (attribute) or on its text marks
pub fn tracked_attrs(node: &Node) -> Vec<TrackedAttrs> {
    if node.is_text() {
        return node
            .marks
            .iter()
            .filter(|m| matches!(m.mark_type, MarkType::TrackedInsert | MarkType::TrackedDelete))
            .filter_map(|m| m.attrs.get(TRACKED_ATTR))
            .flat_map(TrackedAttrs::from_value)
            .collect();
    }
    node.attr(TRACKED_ATTR)
        .map(TrackedAttrs::from_value)
        .unwrap_or_default()
}

/// Whether a node should be treated as absent by derived indexes
pub fn is_effectively_removed(node: &Node) -> bool {
    tracked_attrs(node).iter().any(TrackedAttrs::removes_content)
}

/// One suggestion, located in the current document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedChange {
    pub id: String,
    pub from: usize,
    pub to: usize,
    pub status: ChangeStatus,
    pub operation: ChangeOperation,
    pub move_node_id: Option<String>,

    /// Id of the tracked node; `None` for text changes
    pub node_id: Option<String>,
}

impl TrackedChange {
    pub fn contains(&self, pos: usize) -> bool {
        self.from <= pos && pos <= self.to
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChangeStatus::Pending
    }

    pub fn is_text(&self) -> bool {
        self.node_id.is_none()
    }
}

/// All suggestions of a document, ordered by position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    changes: Vec<TrackedChange>,
    by_id: BTreeMap<String, usize>,
}

impl ChangeSet {
    pub fn from_doc(doc: &Node) -> Self {
        let mut changes: Vec<TrackedChange> = Vec::new();

        doc.descendants(|node, pos, _, _| {
            let end = pos + node.node_size();
            for attrs in tracked_attrs(node) {
                // Adjacent text pieces of one change collapse into one range
                if node.is_text() {
                    if let Some(last) = changes.last_mut() {
                        if last.id == attrs.id && last.to == pos && last.is_text() {
                            last.to = end;
                            continue;
                        }
                    }
                }
                changes.push(TrackedChange {
                    id: attrs.id,
                    from: pos,
                    to: end,
                    status: attrs.status,
                    operation: attrs.operation,
                    move_node_id: attrs.move_node_id,
                    node_id: if node.is_text() {
                        None
                    } else {
                        node.id().map(str::to_string)
                    },
                });
            }
            true
        });

        changes.sort_by_key(|c| c.from);
        let by_id = changes
            .iter()
            .enumerate()
            .map(|(index, change)| (change.id.clone(), index))
            .rev()
            .collect();

        Self { changes, by_id }
    }

    pub fn get(&self, id: &str) -> Option<&TrackedChange> {
        self.by_id.get(id).and_then(|&index| self.changes.get(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedChange> {
        self.changes.iter()
    }

    pub fn pending(&self) -> impl Iterator<Item = &TrackedChange> {
        self.changes.iter().filter(|c| c.is_pending())
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes covering `pos`, innermost (shortest) first
    pub fn changes_at(&self, pos: usize) -> Vec<&TrackedChange> {
        let mut found: Vec<&TrackedChange> = self.changes.iter().filter(|c| c.contains(pos)).collect();
        found.sort_by_key(|c| c.to - c.from);
        found
    }

    /// Both halves of a tracked move
    pub fn move_partners<'a>(&'a self, move_node_id: &'a str) -> impl Iterator<Item = &'a TrackedChange> {
        self.changes
            .iter()
            .filter(move |c| c.move_node_id.as_deref() == Some(move_node_id))
    }

    /// Whether the node with `node_id` is tracked as removed
    pub fn is_removed(&self, node_id: &str) -> bool {
        self.changes.iter().any(|c| {
            c.node_id.as_deref() == Some(node_id) && removes_content(c.operation, c.status)
        })
    }
}

/// Source of the change set for a document
pub trait TrackChangesOverlay: Send + Sync {
    fn change_set(&self, doc: &Node) -> ChangeSet;
}

/// Overlay reading suggestions straight from document attributes and marks
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeOverlay;

impl TrackChangesOverlay for AttributeOverlay {
    fn change_set(&self, doc: &Node) -> ChangeSet {
        ChangeSet::from_doc(doc)
    }
}

/// `dataTracked` value for a single record
pub fn tracked_value(attrs: &TrackedAttrs) -> Value {
    serde_json::to_value(vec![attrs]).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::builders::*;
    use manuscript_model::Mark;
    use serde_json::json;

    fn tracked(id: &str, status: &str, operation: &str) -> Value {
        json!([{ "id": id, "status": status, "operation": operation }])
    }

    fn tracked_text(t: &str, id: &str, mark_type: MarkType) -> Node {
        let mut attrs = manuscript_model::Attrs::new();
        attrs.insert(
            TRACKED_ATTR.to_string(),
            json!({ "id": id, "status": "pending", "operation": "insert" }),
        );
        Node::text_with_marks(t, vec![Mark::with_attrs(mark_type, attrs)])
    }

    #[test]
    fn test_change_set_collects_node_and_text_changes() {
        let doc = manuscript(vec![paragraph(vec![
            text("a"),
            tracked_text("bc", "ins-1", MarkType::TrackedInsert),
            citation("c1", &["item"]).with_attr(TRACKED_ATTR, tracked("del-1", "pending", "delete")),
        ])]);
        let changes = ChangeSet::from_doc(&doc);
        assert_eq!(changes.len(), 2);

        let insert = changes.get("ins-1").unwrap();
        assert_eq!((insert.from, insert.to), (2, 4));
        assert!(insert.is_text());

        let delete = changes.get("del-1").unwrap();
        assert_eq!(delete.node_id.as_deref(), Some("c1"));
        assert!(changes.is_removed("c1"));
        assert_eq!(changes.changes_at(3)[0].id, "ins-1");
    }

    #[test]
    fn test_rejected_insert_counts_as_removed() {
        let node = inline_footnote("fn-ref", &["fn1"])
            .with_attr(TRACKED_ATTR, tracked("x", "rejected", "insert"));
        assert!(is_effectively_removed(&node));

        let rejected_delete = inline_footnote("fn-ref", &["fn1"])
            .with_attr(TRACKED_ATTR, tracked("y", "rejected", "delete"));
        assert!(!is_effectively_removed(&rejected_delete));
    }

    #[test]
    fn test_move_partners_share_move_node_id() {
        let source = json!([{ "id": "m-src", "status": "pending", "operation": "delete", "moveNodeId": "move-1" }]);
        let dest = json!([{ "id": "m-dst", "status": "pending", "operation": "insert", "moveNodeId": "move-1" }]);
        let doc = manuscript(vec![
            paragraph(vec![inline_footnote("a", &["fn1"]).with_attr(TRACKED_ATTR, source)]),
            paragraph(vec![inline_footnote("b", &["fn1"]).with_attr(TRACKED_ATTR, dest)]),
        ]);
        let changes = ChangeSet::from_doc(&doc);
        assert_eq!(changes.move_partners("move-1").count(), 2);
    }

    #[test]
    fn test_malformed_tracking_is_ignored() {
        let node = paragraph(vec![]).with_attr(TRACKED_ATTR, json!({ "id": 3 }));
        assert!(tracked_attrs(&node).is_empty());
    }
}
