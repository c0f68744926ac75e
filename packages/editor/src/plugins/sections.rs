//! # Sections
//!
//! Display numbering of sections and boxes, plus the category picker
//! commands. Numbers are decorations only; nothing here writes to the tree
//! except the explicit [`set_section_category`] command.

use crate::config::{SectionCategoryCatalog, SectionGroup};
use crate::decorations::{Decoration, DecorationSet, Widget};
use crate::errors::EditorError;
use crate::state::{EditorState, Plugin, PluginKey};
use manuscript_model::builders::text;
use manuscript_model::{Node, NodeType, Transaction};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionsState {
    /// Section id → dotted number, in document order
    pub numbers: Vec<(String, String)>,
}

impl SectionsState {
    pub fn number(&self, section_id: &str) -> Option<&str> {
        self.numbers
            .iter()
            .find(|(id, _)| id == section_id)
            .map(|(_, n)| n.as_str())
    }
}

fn is_numbered(node: &Node) -> bool {
    matches!(node.node_type, NodeType::Section | NodeType::BoxElement)
}

fn number_children(parent: &Node, path: &mut Vec<usize>, out: &mut Vec<(String, String)>) {
    let mut counter = 0;
    for child in parent.content.iter().filter(|c| is_numbered(c)) {
        counter += 1;
        path.push(counter);
        if let Some(id) = child.id() {
            let dotted = path.iter().map(usize::to_string).collect::<Vec<_>>().join(".");
            out.push((id.to_string(), dotted));
        }
        number_children(child, path, out);
        path.pop();
    }
}

/// Number the sections of the body. Documents without a body element number
/// the root, skipping back matter and abstracts.
pub fn build_sections_state(doc: &Node) -> SectionsState {
    let mut numbers = Vec::new();
    let mut path = Vec::new();
    match doc.content.iter().find(|c| c.node_type == NodeType::Body) {
        Some(body) => number_children(body, &mut path, &mut numbers),
        None => {
            let mut main = doc.clone();
            main.content
                .retain(|c| !matches!(c.node_type, NodeType::Backmatter | NodeType::Abstracts));
            number_children(&main, &mut path, &mut numbers);
        }
    }
    SectionsState { numbers }
}

pub struct SectionsPlugin;

impl Plugin for SectionsPlugin {
    type State = SectionsState;
    const KEY: PluginKey<SectionsState> = PluginKey::new("sections");

    fn init(&self, state: &EditorState) -> SectionsState {
        build_sections_state(state.doc())
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<SectionsState>,
        _old: &EditorState,
        new: &EditorState,
    ) -> Arc<SectionsState> {
        if !tr.doc_changed() {
            return prev.clone();
        }
        let state = build_sections_state(new.doc());
        tracing::debug!(sections = state.numbers.len(), "Renumbered sections");
        Arc::new(state)
    }

    fn decorations(&self, state: &SectionsState, _editor: &EditorState) -> DecorationSet {
        state
            .numbers
            .iter()
            .map(|(id, number)| Decoration::widget(id, Widget::Label(number.clone())))
            .collect()
    }
}

/// Group of the section starting at `pos`
pub fn section_group(doc: &Node, pos: usize) -> SectionGroup {
    let Ok(resolved) = doc.resolve(pos) else {
        return SectionGroup::Body;
    };
    if resolved.has_ancestor(NodeType::Backmatter) {
        SectionGroup::Backmatter
    } else if resolved.has_ancestor(NodeType::Abstracts) {
        SectionGroup::Abstracts
    } else {
        SectionGroup::Body
    }
}

/// One entry of the category picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryOption {
    pub id: String,
    pub name: String,

    /// Unique category already used by another section of the group
    pub disabled: bool,
    pub selected: bool,
}

fn find_section<'a>(doc: &'a Node, section_id: &str) -> Result<(&'a Node, usize), EditorError> {
    let (node, pos) = doc
        .find_by_id(section_id)
        .ok_or_else(|| EditorError::NodeNotFound(section_id.to_string()))?;
    if node.node_type != NodeType::Section {
        return Err(EditorError::NotASection(section_id.to_string()));
    }
    Ok((node, pos))
}

/// Categories used per group, excluding the section `except`
fn used_categories(doc: &Node, except: &str) -> BTreeMap<SectionGroup, Vec<String>> {
    let mut used: BTreeMap<SectionGroup, Vec<String>> = BTreeMap::new();
    for (node, pos) in doc.find_all(NodeType::Section) {
        if node.id() == Some(except) {
            continue;
        }
        if let Some(category) = node.attr_str("category") {
            used.entry(section_group(doc, pos))
                .or_default()
                .push(category.to_string());
        }
    }
    used
}

/// Picker entries for a section: the editable categories of its group.
/// A section whose current category is not editable gets no options.
pub fn category_options(state: &EditorState, section_id: &str) -> Result<Vec<CategoryOption>, EditorError> {
    let doc = state.doc();
    let catalog: &SectionCategoryCatalog = &state.config().section_categories;
    let (section, pos) = find_section(doc, section_id)?;
    let current = section.attr_str("category");

    if current.and_then(|id| catalog.get(id)).is_some_and(|c| !c.is_editable) {
        return Ok(Vec::new());
    }

    let group = section_group(doc, pos);
    let used = used_categories(doc, section_id);
    let used_in_group = used.get(&group);

    Ok(catalog
        .in_group(group)
        .filter(|(_, category)| category.is_editable)
        .map(|(id, category)| CategoryOption {
            id: id.to_string(),
            name: category.name.clone(),
            disabled: category.is_unique && used_in_group.is_some_and(|u| u.iter().any(|c| c == id)),
            selected: current == Some(id),
        })
        .collect())
}

/// Set (or clear) a section's category. When the category restricts titles
/// and the section has none yet, the first allowed title is filled in.
pub fn set_section_category(
    state: &EditorState,
    section_id: &str,
    category_id: Option<&str>,
) -> Result<Transaction, EditorError> {
    let doc = state.doc();
    let (section, pos) = find_section(doc, section_id)?;
    let category = category_id
        .map(|id| {
            state
                .config()
                .section_categories
                .get(id)
                .ok_or_else(|| EditorError::UnknownCategory(id.to_string()))
        })
        .transpose()?;

    let mut tr = state.tr();
    let value = category_id.map_or(Value::Null, Value::from);
    tr.set_node_attribute(pos, "category", value)?;

    let first_title = category.and_then(|c| c.titles.first());
    let title = section
        .content
        .first()
        .filter(|c| c.node_type == NodeType::SectionTitle);
    if let (Some(first_title), Some(title)) = (first_title, title) {
        if title.text_content().trim().is_empty() {
            let from = pos + 2;
            tr.replace_with(from, from + title.content_size(), vec![text(first_title)])?;
        }
    }

    tracing::debug!(section = %section_id, category = ?category_id, "Set section category");
    Ok(tr)
}
