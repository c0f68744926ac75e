//! Cross-reference targets (figures, tables, equations, listings) and the
//! enforcer keeping every cross reference's `label` in step with them.

use super::needs_check;
use crate::decorations::{Decoration, DecorationSet, Widget};
use crate::errors::PluginError;
use crate::state::{EditorState, Plugin, PluginKey};
use crate::tracking::is_effectively_removed;
use manuscript_model::{Node, NodeType, Transaction};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTarget {
    pub node_type: NodeType,

    /// e.g. "Figure 2"
    pub label: String,
    pub caption: String,
    pub pos: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectsState {
    pub targets: BTreeMap<String, ObjectTarget>,

    /// `(cross reference, position)` in document order
    pub cross_references: Vec<(Node, usize)>,
}

impl ObjectsState {
    pub fn target(&self, id: &str) -> Option<&ObjectTarget> {
        self.targets.get(id)
    }

    /// Label a cross reference should display; `None` when no target resolves
    pub fn reference_label(&self, cross_reference: &Node) -> Option<String> {
        let labels: Vec<&str> = cross_reference
            .attr_str_list("rids")
            .iter()
            .filter_map(|rid| self.targets.get(rid).map(|t| t.label.as_str()))
            .collect();
        if labels.is_empty() {
            None
        } else {
            Some(labels.join(", "))
        }
    }
}

fn type_label(node_type: NodeType) -> &'static str {
    match node_type {
        NodeType::FigureElement => "Figure",
        NodeType::TableElement => "Table",
        NodeType::EquationElement => "Equation",
        NodeType::ListingElement => "Listing",
        _ => "Object",
    }
}

fn caption_of(node: &Node) -> String {
    node.content
        .iter()
        .find(|c| c.node_type == NodeType::Figcaption)
        .map(Node::text_content)
        .unwrap_or_default()
}

pub fn build_objects_state(doc: &Node) -> ObjectsState {
    let mut state = ObjectsState::default();
    let mut counters: BTreeMap<NodeType, usize> = BTreeMap::new();

    doc.descendants(|node, pos, _, _| {
        if is_effectively_removed(node) {
            return false;
        }
        if node.node_type.is_reference_target() {
            if let Some(id) = node.id() {
                let counter = counters.entry(node.node_type).or_default();
                *counter += 1;
                state.targets.insert(
                    id.to_string(),
                    ObjectTarget {
                        node_type: node.node_type,
                        label: format!("{} {}", type_label(node.node_type), counter),
                        caption: caption_of(node),
                        pos,
                    },
                );
            }
        } else if node.node_type == NodeType::CrossReference {
            state.cross_references.push((node.clone(), pos));
        }
        true
    });
    state
}

pub struct ObjectsPlugin;

impl Plugin for ObjectsPlugin {
    type State = ObjectsState;
    const KEY: PluginKey<ObjectsState> = PluginKey::new("objects");

    fn init(&self, state: &EditorState) -> ObjectsState {
        build_objects_state(state.doc())
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<ObjectsState>,
        _old: &EditorState,
        new: &EditorState,
    ) -> Arc<ObjectsState> {
        if !tr.doc_changed() {
            return prev.clone();
        }
        let state = build_objects_state(new.doc());
        tracing::debug!(targets = state.targets.len(), "Rebuilt object index");
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
        let Some(objects) = new.plugin_state(&Self::KEY) else {
            return Ok(None);
        };

        let mut tr = new.tr();
        for (cross_reference, pos) in &objects.cross_references {
            let Some(label) = objects.reference_label(cross_reference) else {
                continue;
            };
            if cross_reference.attr_str("label") != Some(label.as_str()) {
                tr.set_node_attribute(*pos, "label", label)?;
            }
        }

        if !tr.doc_changed() {
            return Ok(None);
        }
        tr.mark_corrective();
        tracing::info!(updated = tr.steps().len(), "Updated cross reference labels");
        Ok(Some(tr))
    }

    fn decorations(&self, state: &ObjectsState, _editor: &EditorState) -> DecorationSet {
        state
            .targets
            .iter()
            .map(|(id, target)| Decoration::widget(id, Widget::Label(target.label.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::meta;
    use crate::state::PluginSet;
    use manuscript_model::builders::*;

    fn state(doc: Node) -> EditorState {
        EditorState::create(doc, PluginSet::new().with(ObjectsPlugin), EditorConfig::default())
    }

    fn label_of(state: &EditorState, id: &str) -> Option<String> {
        let (node, _) = state.doc().find_by_id(id)?;
        node.attr_str("label").map(str::to_string)
    }

    #[test]
    fn test_counters_per_type() {
        let doc = manuscript(vec![
            figure_element("f1", "First"),
            table_element("t1", "Table", vec![vec![paragraph(vec![])]], None),
            figure_element("f2", "Second"),
            equation_element("e1"),
            listing_element("l1", "Code"),
        ]);
        let objects = build_objects_state(&doc);
        assert_eq!(objects.target("f1").unwrap().label, "Figure 1");
        assert_eq!(objects.target("f2").unwrap().label, "Figure 2");
        assert_eq!(objects.target("f2").unwrap().caption, "Second");
        assert_eq!(objects.target("t1").unwrap().label, "Table 1");
        assert_eq!(objects.target("e1").unwrap().label, "Equation 1");
        assert_eq!(objects.target("l1").unwrap().label, "Listing 1");
    }

    #[test]
    fn test_renumbering_cascades_to_cross_references() {
        let state = state(manuscript(vec![
            paragraph(vec![text("see "), cross_reference("x1", &["f2", "f1"])]),
            figure_element("f1", "First"),
            figure_element("f2", "Second"),
        ]));
        let mut tr = state.tr();
        tr.set_meta(meta::REFRESH, true);
        let state = state.apply_transaction(tr).unwrap().state;
        assert_eq!(label_of(&state, "x1").as_deref(), Some("Figure 2, Figure 1"));

        // Removing the first figure renumbers the second
        let (first, pos) = state.doc().find_by_id("f1").unwrap();
        let mut tr = state.tr();
        tr.delete(pos, pos + first.node_size()).unwrap();
        let applied = state.apply_transaction(tr).unwrap();
        assert_eq!(applied.appended().len(), 1);
        assert_eq!(label_of(&applied.state, "x1").as_deref(), Some("Figure 1"));
    }

    #[test]
    fn test_unresolved_reference_is_left_alone() {
        let state = state(manuscript(vec![paragraph(vec![cross_reference("x1", &["ghost"])])]));
        let mut tr = state.tr();
        tr.set_meta(meta::REFRESH, true);
        let applied = state.apply_transaction(tr).unwrap();
        assert!(applied.appended().is_empty());
        assert_eq!(label_of(&applied.state, "x1"), None);
    }
}
