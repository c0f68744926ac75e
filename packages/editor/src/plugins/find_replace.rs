//! Find & replace.
//!
//! The query travels as transaction metadata ([`meta::FIND_QUERY`]); matches
//! are recomputed whenever the query or the document changes. Matches never
//! span two text nodes.

use crate::decorations::{Decoration, DecorationSet};
use crate::errors::EditorError;
use crate::meta;
use crate::state::{EditorState, Plugin, PluginKey};
use manuscript_model::{Mark, Node, Selection, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindQuery {
    pub query: String,

    #[serde(default)]
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FindMatch {
    pub from: usize,
    pub to: usize,

    /// Marks of the matched text, reapplied to replacements
    pub marks: Vec<Mark>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindReplaceState {
    pub query: FindQuery,
    pub matches: Vec<FindMatch>,
    pub active: Option<usize>,
}

impl FindReplaceState {
    pub fn active_match(&self) -> Option<&FindMatch> {
        self.active.and_then(|index| self.matches.get(index))
    }
}

fn chars_equal(a: char, b: char, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a == b || a.to_lowercase().eq(b.to_lowercase())
    }
}

/// Char offsets of non-overlapping occurrences of `needle` in `haystack`
fn find_in_text(haystack: &str, needle: &[char], case_sensitive: bool) -> Vec<usize> {
    let chars: Vec<char> = haystack.chars().collect();
    let mut found = Vec::new();
    if needle.is_empty() || needle.len() > chars.len() {
        return found;
    }
    let mut start = 0;
    while start + needle.len() <= chars.len() {
        let hit = chars[start..start + needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| chars_equal(*a, *b, case_sensitive));
        if hit {
            found.push(start);
            start += needle.len();
        } else {
            start += 1;
        }
    }
    found
}

pub fn find_matches(doc: &Node, query: &FindQuery) -> Vec<FindMatch> {
    let needle: Vec<char> = query.query.chars().collect();
    let mut matches = Vec::new();
    if needle.is_empty() {
        return matches;
    }
    doc.descendants(|node, pos, _, _| {
        if let Some(text) = &node.text {
            for offset in find_in_text(text, &needle, query.case_sensitive) {
                matches.push(FindMatch {
                    from: pos + offset,
                    to: pos + offset + needle.len(),
                    marks: node.marks.clone(),
                });
            }
        }
        true
    });
    matches
}

pub struct FindReplacePlugin;

impl Plugin for FindReplacePlugin {
    type State = FindReplaceState;
    const KEY: PluginKey<FindReplaceState> = PluginKey::new("find_replace");

    fn init(&self, _state: &EditorState) -> FindReplaceState {
        FindReplaceState::default()
    }

    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<FindReplaceState>,
        _old: &EditorState,
        new: &EditorState,
    ) -> Arc<FindReplaceState> {
        let query = tr
            .get_meta(meta::FIND_QUERY)
            .and_then(|value| serde_json::from_value::<FindQuery>(value.clone()).ok());
        let active = tr
            .get_meta(meta::FIND_ACTIVE)
            .and_then(|value| value.as_u64())
            .map(|index| index as usize);

        if query.is_none() && active.is_none() && !tr.doc_changed() {
            return prev.clone();
        }

        let query_changed = query.is_some();
        let query = query.unwrap_or_else(|| prev.query.clone());
        let matches = if query_changed || tr.doc_changed() {
            find_matches(new.doc(), &query)
        } else {
            prev.matches.clone()
        };

        let active = match active {
            Some(index) if !matches.is_empty() => Some(index % matches.len()),
            _ if matches.is_empty() => None,
            _ if query_changed => Some(0),
            _ => prev.active.map(|index| index.min(matches.len() - 1)),
        };

        if query_changed {
            tracing::debug!(query = %query.query, matches = matches.len(), "Search updated");
        }
        Arc::new(FindReplaceState {
            query,
            matches,
            active,
        })
    }

    fn decorations(&self, state: &FindReplaceState, _editor: &EditorState) -> DecorationSet {
        state
            .matches
            .iter()
            .enumerate()
            .map(|(index, m)| {
                let class = if Some(index) == state.active {
                    "find-match-active"
                } else {
                    "find-match"
                };
                Decoration::inline(m.from, m.to, class)
            })
            .collect()
    }
}

/// Start (or clear, with an empty query) a search
pub fn find(state: &EditorState, query: &str, case_sensitive: bool) -> Transaction {
    let mut tr = state.tr();
    let query = FindQuery {
        query: query.to_string(),
        case_sensitive,
    };
    tr.set_meta(
        meta::FIND_QUERY,
        serde_json::to_value(query).unwrap_or_default(),
    );
    tr
}

/// Move the active match; wraps around
pub fn set_active_match(state: &EditorState, index: usize) -> Transaction {
    let mut tr = state.tr();
    tr.set_meta(meta::FIND_ACTIVE, index as u64);
    if let Some(found) = state
        .plugin_state(&FindReplacePlugin::KEY)
        .and_then(|s| (!s.matches.is_empty()).then(|| s.matches[index % s.matches.len()].clone()))
    {
        tr.set_selection(Selection::range(found.from, found.to));
    }
    tr
}

/// Replace the active match. `None` when there is none.
pub fn replace_current(state: &EditorState, replacement: &str) -> Result<Option<Transaction>, EditorError> {
    let Some(find_state) = state.plugin_state(&FindReplacePlugin::KEY) else {
        return Ok(None);
    };
    let Some(found) = find_state.active_match() else {
        return Ok(None);
    };
    let mut tr = state.tr();
    tr.replace_with(found.from, found.to, replacement_nodes(replacement, &found.marks))?;
    Ok(Some(tr))
}

/// Replace every match in one transaction. `None` when nothing matches.
pub fn replace_all(state: &EditorState, replacement: &str) -> Result<Option<Transaction>, EditorError> {
    let Some(find_state) = state.plugin_state(&FindReplacePlugin::KEY) else {
        return Ok(None);
    };
    if find_state.matches.is_empty() {
        return Ok(None);
    }
    let mut tr = state.tr();
    for found in find_state.matches.iter().rev() {
        tr.replace_with(found.from, found.to, replacement_nodes(replacement, &found.marks))?;
    }
    tracing::info!(replaced = find_state.matches.len(), "Replaced all matches");
    Ok(Some(tr))
}

fn replacement_nodes(replacement: &str, marks: &[Mark]) -> Vec<Node> {
    if replacement.is_empty() {
        Vec::new()
    } else {
        vec![Node::text_with_marks(replacement, marks.to_vec())]
    }
}
