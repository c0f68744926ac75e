//! Required-children repairs.
//!
//! - sections start with a `section_title`
//! - a footnote holds at least one paragraph
//! - footnote containers (`footnotes_element`, `table_element_footer`) that
//!   hold no footnotes are removed

use super::needs_check;
use crate::errors::PluginError;
use crate::state::{EditorState, Plugin, PluginKey};
use manuscript_model::builders::{paragraph, section_title};
use manuscript_model::{Node, NodeType, Transaction};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
enum Repair {
    Insert { pos: usize, node: Node },
    Remove { from: usize, to: usize },
}

impl Repair {
    fn pos(&self) -> usize {
        match self {
            Repair::Insert { pos, .. } => *pos,
            Repair::Remove { from, .. } => *from,
        }
    }

    /// Application order: back to front, removals before insertions at the
    /// same position so an inserted node is never the one removed
    fn order_key(&self) -> (std::cmp::Reverse<usize>, u8) {
        let rank = match self {
            Repair::Remove { .. } => 0,
            Repair::Insert { .. } => 1,
        };
        (std::cmp::Reverse(self.pos()), rank)
    }
}

fn is_titled_section(node_type: NodeType) -> bool {
    matches!(
        node_type,
        NodeType::Section | NodeType::FootnotesSection | NodeType::BibliographySection
    )
}

/// A footnote container with no footnote anywhere inside it
fn is_hollow_container(node: &Node) -> bool {
    matches!(
        node.node_type,
        NodeType::FootnotesElement | NodeType::TableElementFooter
    ) && node.content.iter().all(is_hollow_container)
}

fn collect_repairs(doc: &Node) -> Vec<Repair> {
    let mut repairs = Vec::new();
    doc.descendants(|node, pos, _, _| {
        if is_hollow_container(node) {
            repairs.push(Repair::Remove {
                from: pos,
                to: pos + node.node_size(),
            });
            return false;
        }
        if is_titled_section(node.node_type)
            && node.content.first().map(|c| c.node_type) != Some(NodeType::SectionTitle)
        {
            repairs.push(Repair::Insert {
                pos: pos + 1,
                node: section_title(""),
            });
        }
        if node.node_type == NodeType::Footnote && node.content.is_empty() {
            repairs.push(Repair::Insert {
                pos: pos + 1,
                node: paragraph(vec![]),
            });
        }
        true
    });
    repairs
}

pub struct StructurePlugin;

impl Plugin for StructurePlugin {
    type State = ();
    const KEY: PluginKey<()> = PluginKey::new("structure");

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

        let mut repairs = collect_repairs(new.doc());
        if repairs.is_empty() {
            return Ok(None);
        }

        repairs.sort_by_key(Repair::order_key);
        let mut tr = new.tr();
        for repair in &repairs {
            match repair {
                Repair::Insert { pos, node } => tr.insert(*pos, vec![node.clone()])?,
                Repair::Remove { from, to } => tr.delete(*from, *to)?,
            };
        }
        tr.mark_corrective();
        tracing::info!(repairs = repairs.len(), "Repaired document structure");
        Ok(Some(tr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::meta;
    use crate::state::PluginSet;
    use manuscript_model::builders::*;
    use manuscript_model::Attrs;

    fn refresh(doc: Node) -> EditorState {
        let state = EditorState::create(doc, PluginSet::new().with(StructurePlugin), EditorConfig::default());
        let mut tr = state.tr();
        tr.set_meta(meta::REFRESH, true);
        state.apply_transaction(tr).unwrap().state
    }

    #[test]
    fn test_section_without_title_gets_one() {
        let untitled = Node::new(NodeType::Section, Attrs::new(), vec![paragraph(vec![text("x")])])
            .with_id("MPSection:1");
        let state = refresh(manuscript(vec![untitled]));
        let section = &state.doc().content[0];
        assert_eq!(section.content[0].node_type, NodeType::SectionTitle);
        assert_eq!(section.content.len(), 2);
    }

    #[test]
    fn test_empty_footnote_gets_paragraph() {
        let empty = Node::new(NodeType::Footnote, Attrs::new(), vec![]).with_id("fn1");
        let state = refresh(manuscript(vec![footnotes_element("fe", vec![empty])]));
        let (footnote, _) = state.doc().find_by_id("fn1").unwrap();
        assert_eq!(footnote.content[0].node_type, NodeType::Paragraph);
    }

    #[test]
    fn test_hollow_table_footer_is_removed_whole() {
        let table = table_element(
            "MPTableElement:1",
            "Caption",
            vec![vec![paragraph(vec![text("cell")])]],
            Some(table_element_footer("footer", vec![footnotes_element("fe", vec![])])),
        );
        let state = refresh(manuscript(vec![table]));
        assert!(state.doc().find_by_id("footer").is_none());
        assert!(state.doc().find_by_id("fe").is_none());
        assert!(state.doc().find_by_id("MPTableElement:1").is_some());
    }

    #[test]
    fn test_untitled_section_with_hollow_first_child() {
        let untitled = Node::new(
            NodeType::FootnotesSection,
            Attrs::new(),
            vec![footnotes_element("fe", vec![])],
        )
        .with_id("MPSection:endnotes");
        let state = refresh(manuscript(vec![untitled]));

        let (section, _) = state.doc().find_by_id("MPSection:endnotes").unwrap();
        let children: Vec<_> = section.content.iter().map(|c| c.node_type).collect();
        assert_eq!(children, vec![NodeType::SectionTitle]);
        assert!(state.doc().find_by_id("fe").is_none());

        let mut tr = state.tr();
        tr.set_meta(meta::REFRESH, true);
        assert!(state.apply_transaction(tr).unwrap().appended().is_empty());
    }

    #[test]
    fn test_removals_sort_before_insertions_at_one_position() {
        let mut repairs = vec![
            Repair::Insert { pos: 1, node: section_title("") },
            Repair::Remove { from: 1, to: 3 },
            Repair::Insert { pos: 7, node: paragraph(vec![]) },
        ];
        repairs.sort_by_key(Repair::order_key);
        let positions: Vec<_> = repairs
            .iter()
            .map(|r| (r.pos(), matches!(r, Repair::Remove { .. })))
            .collect();
        assert_eq!(positions, vec![(7, false), (1, true), (1, false)]);
    }

    #[test]
    fn test_well_formed_document_is_untouched() {
        let doc = manuscript(vec![section("s1", "Intro", vec![paragraph(vec![])])]);
        let state = refresh(doc.clone());
        assert_eq!(**state.doc(), doc);
    }
}
