//! Footnote index builder.
//!
//! Footnotes are scoped: inline footnotes inside a table element are served
//! by the footnotes element in that table's footer and numbered 1, 2, 3;
//! everything else is served by the body footnotes elements and lettered
//! a, b, c.

use super::labels::LabelScheme;
use crate::tracking::is_effectively_removed;
use manuscript_model::{Node, NodeType};
use std::collections::{BTreeMap, BTreeSet};

/// A node together with its position in the indexed document
#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub node: Node,
    pub pos: usize,
}

impl Located {
    pub fn id(&self) -> Option<&str> {
        self.node.id()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FootnotesElementIndex {
    pub element_id: Option<String>,
    pub pos: usize,
    pub size: usize,

    /// Footnotes in label order, unused ones last in their original order
    pub footnotes: Vec<Located>,

    pub unused_footnote_ids: BTreeSet<String>,
}

impl FootnotesElementIndex {
    /// Whether the children are not yet in label order
    pub fn needs_reorder(&self) -> bool {
        self.footnotes.windows(2).any(|pair| pair[0].pos > pair[1].pos)
    }

    /// Content range of the element
    pub fn content_range(&self) -> (usize, usize) {
        (self.pos + 1, self.pos + self.size - 1)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FootnoteScope {
    /// Enclosing table element; `None` for the body scope
    pub table_id: Option<String>,
    pub scheme: LabelScheme,

    /// Live inline footnotes in document order
    pub inline_footnotes: Vec<Located>,

    /// Footnote id → label
    pub labels: BTreeMap<String, String>,

    pub elements: Vec<FootnotesElementIndex>,
}

impl FootnoteScope {
    fn new(table_id: Option<String>) -> Self {
        let scheme = if table_id.is_some() {
            LabelScheme::Numeric
        } else {
            LabelScheme::Alphabetic
        };
        Self {
            table_id,
            scheme,
            inline_footnotes: Vec::new(),
            labels: BTreeMap::new(),
            elements: Vec::new(),
        }
    }

    /// Label shown by an inline footnote: the labels of its footnotes, comma-joined
    pub fn inline_label(&self, inline: &Node) -> String {
        inline
            .attr_str_list("rids")
            .iter()
            .filter_map(|rid| self.labels.get(rid).map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn footnote_ids(&self) -> impl Iterator<Item = &str> {
        self.elements
            .iter()
            .flat_map(|e| e.footnotes.iter())
            .filter_map(Located::id)
    }

    fn assign_labels(&mut self) {
        let known: BTreeSet<String> = self.footnote_ids().map(str::to_string).collect();
        let mut sequence = self.scheme.sequence();
        let mut rank: BTreeMap<String, usize> = BTreeMap::new();

        for inline in &self.inline_footnotes {
            for rid in inline.node.attr_str_list("rids") {
                if known.contains(&rid) && !self.labels.contains_key(&rid) {
                    let label = sequence.next().unwrap_or_default();
                    rank.insert(rid.clone(), rank.len());
                    self.labels.insert(rid, label);
                }
            }
        }

        for element in &mut self.elements {
            // Stable sort keeps unused footnotes in their original order
            element
                .footnotes
                .sort_by_key(|f| f.id().and_then(|id| rank.get(id).copied()).unwrap_or(usize::MAX));
            element.unused_footnote_ids = element
                .footnotes
                .iter()
                .filter_map(Located::id)
                .filter(|id| !rank.contains_key(*id))
                .map(str::to_string)
                .collect();
        }
    }
}

/// Every footnote scope of a document, body scope first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootnotesState {
    pub scopes: Vec<FootnoteScope>,
}

impl FootnotesState {
    pub fn label(&self, footnote_id: &str) -> Option<&str> {
        self.scopes
            .iter()
            .find_map(|scope| scope.labels.get(footnote_id).map(String::as_str))
    }

    pub fn is_unused(&self, footnote_id: &str) -> bool {
        self.unused_footnote_ids().any(|id| id == footnote_id)
    }

    pub fn unused_footnote_ids(&self) -> impl Iterator<Item = &str> {
        self.scopes
            .iter()
            .flat_map(|s| s.elements.iter())
            .flat_map(|e| e.unused_footnote_ids.iter().map(String::as_str))
    }

    pub fn has_footnote(&self, footnote_id: &str) -> bool {
        self.scopes
            .iter()
            .any(|scope| scope.footnote_ids().any(|id| id == footnote_id))
    }

    pub fn body(&self) -> Option<&FootnoteScope> {
        self.scopes.iter().find(|s| s.table_id.is_none())
    }

    pub fn table(&self, table_id: &str) -> Option<&FootnoteScope> {
        self.scopes
            .iter()
            .find(|s| s.table_id.as_deref() == Some(table_id))
    }

    /// Scope whose inline footnotes include the node at `pos`
    pub fn scope_of_inline(&self, pos: usize) -> Option<&FootnoteScope> {
        self.scopes
            .iter()
            .find(|scope| scope.inline_footnotes.iter().any(|f| f.pos == pos))
    }
}

/// Build the footnote index. Never fails: dangling references get no label,
/// footnotes without ids are listed but never labeled.
pub fn build_footnotes_state(doc: &Node) -> FootnotesState {
    let tables: Vec<(Option<String>, usize, usize)> = doc
        .find_all(NodeType::TableElement)
        .into_iter()
        .map(|(node, pos)| (node.id().map(str::to_string), pos, pos + node.node_size()))
        .collect();

    // Innermost table wins; tables are listed outer before inner
    let scope_key = |pos: usize| -> Option<usize> {
        tables
            .iter()
            .enumerate()
            .rev()
            .find(|(_, (_, from, to))| *from < pos && pos < *to)
            .map(|(index, _)| index)
    };

    let mut scopes: BTreeMap<Option<usize>, FootnoteScope> = BTreeMap::new();
    let new_scope = |key: Option<usize>| -> FootnoteScope {
        FootnoteScope::new(key.and_then(|index| tables[index].0.clone()))
    };

    doc.descendants(|node, pos, _, _| {
        match node.node_type {
            NodeType::InlineFootnote if !is_effectively_removed(node) => {
                let key = scope_key(pos);
                scopes
                    .entry(key)
                    .or_insert_with(|| new_scope(key))
                    .inline_footnotes
                    .push(Located {
                        node: node.clone(),
                        pos,
                    });
            }
            NodeType::FootnotesElement => {
                let key = scope_key(pos);
                let mut offset = pos + 1;
                let mut footnotes = Vec::with_capacity(node.child_count());
                for child in &node.content {
                    if child.node_type == NodeType::Footnote {
                        footnotes.push(Located {
                            node: child.clone(),
                            pos: offset,
                        });
                    }
                    offset += child.node_size();
                }
                scopes
                    .entry(key)
                    .or_insert_with(|| new_scope(key))
                    .elements
                    .push(FootnotesElementIndex {
                        element_id: node.id().map(str::to_string),
                        pos,
                        size: node.node_size(),
                        footnotes,
                        unused_footnote_ids: BTreeSet::new(),
                    });
            }
            _ => {}
        }
        true
    });

    let scopes = scopes
        .into_values()
        .map(|mut scope| {
            scope.assign_labels();
            scope
        })
        .collect();

    FootnotesState { scopes }
}
