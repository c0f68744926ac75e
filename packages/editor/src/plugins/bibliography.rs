//! # Bibliography
//!
//! Citation index plus the enforcer that keeps generated citation text and
//! the bibliography listing in line with the citation engine.
//!
//! ## Regeneration protocol
//!
//! ```text
//! doc changed or signal? ──no──► skip
//!        │yes
//! requests deep-equal previous and no signal? ──yes──► skip
//!        │no
//! engine installed? ──no──► warn, skip
//!        │yes
//! rebuild + make_bibliography ──error──► log, skip (nothing written)
//!        │ok
//! write citation `contents`, bibliography markup and items in one transaction
//! ```
//!
//! Signals are the `BIBLIOGRAPHY_INSERTED`, `LIBRARY_UPDATED` and `REFRESH`
//! transaction metas.

use crate::citation::{
    Bibliography, CitationRequest, EngineHandle, Library, OutputMode, NO_PRINTED_FORM,
};
use crate::decorations::{Decoration, DecorationSet, Widget};
use crate::errors::{EditorError, PluginError};
use crate::meta;
use crate::state::{EditorState, Plugin, PluginKey};
use crate::tracking::is_effectively_removed;
use manuscript_model::builders::{backmatter, bibliography_section};
use manuscript_model::{
    diff_replacement_blocks, Attrs, IdGenerator, Node, NodeCoordinates, NodeType, Transaction,
};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct CitationEntry {
    pub citation_id: String,
    pub pos: usize,
    pub item_ids: Vec<String>,

    /// Referenced items absent from the library
    pub missing_item_ids: Vec<String>,

    /// Currently stored generated text
    pub contents: Option<String>,
}

impl CitationEntry {
    pub fn is_missing(&self) -> bool {
        !self.missing_item_ids.is_empty() || self.item_ids.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BibliographyState {
    pub citations: Vec<CitationEntry>,

    /// What the engine is asked to format, parallel to `citations`
    pub requests: Vec<CitationRequest>,

    /// `(id, position)` of every bibliography element
    pub elements: Vec<(String, usize)>,
}

impl BibliographyState {
    pub fn citation(&self, citation_id: &str) -> Option<&CitationEntry> {
        self.citations.iter().find(|c| c.citation_id == citation_id)
    }

    pub fn is_missing(&self, citation_id: &str) -> bool {
        self.citation(citation_id).is_some_and(CitationEntry::is_missing)
    }

    pub fn missing_citations(&self) -> impl Iterator<Item = &CitationEntry> {
        self.citations.iter().filter(|c| c.is_missing())
    }

    pub fn has_missing(&self) -> bool {
        self.missing_citations().next().is_some()
    }
}

pub fn build_bibliography_state(doc: &Node, library: &dyn Library) -> BibliographyState {
    let mut state = BibliographyState::default();
    doc.descendants(|node, pos, _, _| {
        match node.node_type {
            NodeType::Citation if !is_effectively_removed(node) => {
                if let Some(id) = node.id() {
                    let item_ids = node.attr_str_list("rids");
                    let missing_item_ids = item_ids
                        .iter()
                        .filter(|item| !library.has_library_item(item))
                        .cloned()
                        .collect();
                    state.requests.push(CitationRequest {
                        citation_id: id.to_string(),
                        item_ids: item_ids.clone(),
                    });
                    state.citations.push(CitationEntry {
                        citation_id: id.to_string(),
                        pos,
                        item_ids,
                        missing_item_ids,
                        contents: node.attr_str("contents").map(str::to_string),
                    });
                }
            }
            NodeType::BibliographyElement => {
                if let Some(id) = node.id() {
                    state.elements.push((id.to_string(), pos));
                }
            }
            _ => {}
        }
        true
    });
    state
}

fn normalize_citation_text(text: &str) -> String {
    if text.trim() == NO_PRINTED_FORM {
        String::new()
    } else {
        text.to_string()
    }
}

fn bibliography_markup(bibliography: &Bibliography) -> String {
    format!("<div class=\"csl-bib-body\">{}</div>", bibliography.entries.join(""))
}

fn bibliography_item(id: &str, contents: &str) -> Node {
    let mut attrs = Attrs::new();
    attrs.insert("id".to_string(), Value::from(id));
    attrs.insert("contents".to_string(), Value::from(contents));
    Node::new(NodeType::BibliographyItem, attrs, Vec::new())
}

pub struct BibliographyPlugin {
    library: Arc<dyn Library>,
    engine: EngineHandle,
}

impl BibliographyPlugin {
    pub fn new(library: Arc<dyn Library>, engine: EngineHandle) -> Self {
        Self { library, engine }
    }

    /// Write the engine output into the bibliography element at `pos`
    fn sync_element(
        tr: &mut Transaction,
        element: &Node,
        pos: usize,
        bibliography: &Bibliography,
    ) -> Result<(), PluginError> {
        let placeholder = bibliography.is_empty();
        let markup = if placeholder {
            String::new()
        } else {
            bibliography_markup(bibliography)
        };
        if element.attr_str("contents") != Some(markup.as_str()) || element.attr_bool("placeholder") != placeholder
        {
            let mut attrs = element.attrs.clone();
            attrs.insert("contents".to_string(), Value::from(markup));
            attrs.insert("placeholder".to_string(), Value::from(placeholder));
            tr.set_node_markup(pos, attrs)?;
        }

        let new_items: Vec<Node> = bibliography
            .entry_ids
            .iter()
            .zip(&bibliography.entries)
            .map(|(id, entry)| bibliography_item(id, entry))
            .collect();

        let mut offset = pos + 1;
        let mut old: Vec<NodeCoordinates> = Vec::with_capacity(element.child_count());
        for child in &element.content {
            let size = child.node_size();
            old.push(NodeCoordinates {
                id: child.id().unwrap_or_default().to_string(),
                from: offset,
                to: offset + size,
            });
            offset += size;
        }
        let content_end = offset;

        let block = diff_replacement_blocks(&old, &new_items);

        // Entries kept around the block may still carry stale text
        let suffix = old.len() - block.start - block.remove;
        let kept = (0..block.start).chain(old.len() - suffix..old.len());
        for index in kept {
            let new_index = if index < block.start {
                index
            } else {
                index + new_items.len() - old.len()
            };
            let (child, item) = (&element.content[index], &new_items[new_index]);
            if child.attrs != item.attrs {
                tr.set_node_markup(old[index].from, item.attrs.clone())?;
            }
        }

        if !block.is_noop() {
            let from = old.get(block.start).map_or(content_end, |c| c.from);
            let to = old
                .get(block.start + block.remove)
                .map_or(content_end, |c| c.from);
            tr.replace_with(from, to, block.insert)?;
        }
        Ok(())
    }
}

impl Plugin for BibliographyPlugin {
    type State = BibliographyState;
    const KEY: PluginKey<BibliographyState> = PluginKey::new("bibliography");

    fn init(&self, state: &EditorState) -> BibliographyState {
        build_bibliography_state(state.doc(), self.library.as_ref())
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<BibliographyState>,
        _old: &EditorState,
        new: &EditorState,
    ) -> Arc<BibliographyState> {
        let library_changed = tr.has_meta(meta::LIBRARY_UPDATED) || tr.has_meta(meta::REFRESH);
        if !tr.doc_changed() && !library_changed {
            return prev.clone();
        }
        let state = build_bibliography_state(new.doc(), self.library.as_ref());
        tracing::debug!(citations = state.citations.len(), "Rebuilt citation index");
        Arc::new(state)
    }

    fn append_transaction(
        &self,
        trs: &[Transaction],
        old: &EditorState,
        new: &EditorState,
    ) -> Result<Option<Transaction>, PluginError> {
        let signalled = trs.iter().any(|tr| {
            tr.has_meta(meta::BIBLIOGRAPHY_INSERTED)
                || tr.has_meta(meta::LIBRARY_UPDATED)
                || tr.has_meta(meta::REFRESH)
        });
        if !signalled && !trs.iter().any(Transaction::doc_changed) {
            return Ok(None);
        }

        let Some(current) = new.plugin_state(&Self::KEY) else {
            return Ok(None);
        };
        let previous = old.plugin_state(&Self::KEY);
        if !signalled && previous.is_some_and(|p| p.requests == current.requests) {
            return Ok(None);
        }

        let Some(engine) = self.engine.current() else {
            tracing::warn!("Citation engine not installed; skipping bibliography update");
            return Ok(None);
        };

        let formatted = match engine.rebuild_processor_state(&current.requests, OutputMode::Html) {
            Ok(formatted) => formatted,
            Err(error) => {
                tracing::error!(error = %error, "Citation engine failed to rebuild");
                return Ok(None);
            }
        };
        if formatted.len() != current.requests.len() {
            tracing::error!(
                expected = current.requests.len(),
                received = formatted.len(),
                "Citation engine returned a mismatched result"
            );
            return Ok(None);
        }
        let bibliography = match engine.make_bibliography() {
            Ok(bibliography) => bibliography,
            Err(error) => {
                tracing::error!(error = %error, "Citation engine failed to make bibliography");
                return Ok(None);
            }
        };

        let doc = new.doc().clone();
        let mut tr = new.tr();

        for (citation, text) in current.citations.iter().zip(&formatted) {
            if citation.is_missing() {
                continue;
            }
            let text = normalize_citation_text(text);
            if citation.contents.as_deref() != Some(text.as_str()) {
                tr.set_node_attribute(citation.pos, "contents", text)?;
            }
        }

        // A missing citation leaves the last good listing in place
        if current.has_missing() {
            tracing::warn!(
                missing = current.missing_citations().count(),
                "Citations reference missing items; keeping previous bibliography"
            );
        } else {
            // Item lists change size: last element first
            for (id, pos) in current.elements.iter().rev() {
                match doc.node_at(*pos) {
                    Some(element) if element.id() == Some(id.as_str()) => {
                        Self::sync_element(&mut tr, element, *pos, &bibliography)?;
                    }
                    _ => tracing::warn!(element = %id, "Bibliography element moved; skipping"),
                }
            }
        }

        if !tr.doc_changed() {
            return Ok(None);
        }
        tr.mark_corrective();
        tracing::info!(
            citations = current.citations.len(),
            entries = bibliography.entries.len(),
            "Regenerated citations and bibliography"
        );
        Ok(Some(tr))
    }

    fn decorations(&self, state: &BibliographyState, _editor: &EditorState) -> DecorationSet {
        let mut set = DecorationSet::new();
        for citation in state.missing_citations() {
            set.push(Decoration::node(&citation.citation_id, "citation-missing"));
        }
        if state.has_missing() {
            for (id, _) in &state.elements {
                set.push(Decoration::widget(
                    id,
                    Widget::Warning("The bibliography could not be generated".to_string()),
                ));
            }
        }
        set
    }
}

/// Insert `bibliography_section > bibliography_element` at the end of the
/// back matter (created if needed). `None` when the document already has a
/// bibliography element.
pub fn insert_bibliography_section(
    state: &EditorState,
    ids: &IdGenerator,
) -> Result<Option<Transaction>, EditorError> {
    let doc = state.doc();
    if !doc.find_all(NodeType::BibliographyElement).is_empty() {
        return Ok(None);
    }

    let section = bibliography_section(
        &ids.next_id("MPSection"),
        &ids.next_id("MPBibliographyElement"),
    );
    let mut tr = state.tr();
    match doc.find_all(NodeType::Backmatter).first() {
        Some((node, pos)) => {
            tr.insert(pos + node.node_size() - 1, vec![section])?;
        }
        None => {
            tr.insert(doc.content_size(), vec![backmatter(vec![section])])?;
        }
    }
    tr.set_meta(meta::BIBLIOGRAPHY_INSERTED, true);
    Ok(Some(tr))
}
