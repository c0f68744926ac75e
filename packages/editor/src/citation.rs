//! # Citation Collaborators
//!
//! The bibliography plugin talks to two things it does not own:
//!
//! - a [`Library`] answering "which bibliography items exist"
//! - a [`CitationEngine`] turning citation requests into formatted strings
//!
//! Engines are installed late (after the document has loaded), so the plugin
//! holds an [`EngineHandle`] and skips its work while the handle is empty.
//!
//! [`NumericEngine`] is a small built-in engine producing `[n]` style
//! citations ordered by first appearance.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;

/// Sentinel an engine emits for a citation it cannot print
pub const NO_PRINTED_FORM: &str = "[NO_PRINTED_FORM]";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CitationEngineError {
    #[error("Citation processor failed: {0}")]
    Processor(String),

    #[error("Citation processor has no state; rebuild it first")]
    NotBuilt,
}

/// One citation node as submitted to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationRequest {
    pub citation_id: String,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Html,
    Text,
}

/// Formatted bibliography listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bibliography {
    /// Library item id of each entry
    pub entry_ids: Vec<String>,

    /// Formatted entry markup, parallel to `entry_ids`
    pub entries: Vec<String>,
}

impl Bibliography {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub trait CitationEngine: Send + Sync {
    /// Reset the processor to `requests` and return one formatted string per
    /// request, in request order
    fn rebuild_processor_state(
        &self,
        requests: &[CitationRequest],
        mode: OutputMode,
    ) -> Result<Vec<String>, CitationEngineError>;

    /// Bibliography for the requests of the last rebuild
    fn make_bibliography(&self) -> Result<Bibliography, CitationEngineError>;
}

/// Bibliographic record as stored in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BibliographyItem {
    pub id: String,
    pub title: String,

    #[serde(default)]
    pub authors: Vec<String>,

    #[serde(default)]
    pub issued: Option<i32>,
}

impl BibliographyItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            issued: None,
        }
    }

    pub fn with_authors(mut self, authors: &[&str]) -> Self {
        self.authors = authors.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_issued(mut self, year: i32) -> Self {
        self.issued = Some(year);
        self
    }
}

/// Lookup of library items and other domain objects by id
pub trait Library: Send + Sync {
    fn get_library_item(&self, id: &str) -> Option<BibliographyItem>;

    fn get_model(&self, id: &str) -> Option<Value>;

    fn has_library_item(&self, id: &str) -> bool {
        self.get_library_item(id).is_some()
    }
}

/// Library kept in memory, shareable across threads
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    items: RwLock<BTreeMap<String, BibliographyItem>>,
    models: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = BibliographyItem>) -> Self {
        let library = Self::new();
        for item in items {
            library.insert_item(item);
        }
        library
    }

    pub fn insert_item(&self, item: BibliographyItem) {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.insert(item.id.clone(), item);
    }

    pub fn remove_item(&self, id: &str) -> Option<BibliographyItem> {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        items.remove(id)
    }

    pub fn insert_model(&self, id: impl Into<String>, model: Value) {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        models.insert(id.into(), model);
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Library for InMemoryLibrary {
    fn get_library_item(&self, id: &str) -> Option<BibliographyItem> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        items.get(id).cloned()
    }

    fn get_model(&self, id: &str) -> Option<Value> {
        let models = self.models.read().unwrap_or_else(PoisonError::into_inner);
        models.get(id).cloned()
    }
}

/// Late-bound, shared slot for the citation engine
#[derive(Clone, Default)]
pub struct EngineHandle {
    inner: Arc<RwLock<Option<Arc<dyn CitationEngine>>>>,
}

impl EngineHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(engine: Arc<dyn CitationEngine>) -> Self {
        let handle = Self::new();
        handle.install(engine);
        handle
    }

    pub fn install(&self, engine: Arc<dyn CitationEngine>) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(engine);
    }

    pub fn uninstall(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    pub fn current(&self) -> Option<Arc<dyn CitationEngine>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_installed(&self) -> bool {
        self.current().is_some()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("installed", &self.is_installed())
            .finish()
    }
}

/// Numeric citation style: items are numbered in order of first citation.
///
/// Citations whose items are all missing from the library get
/// [`NO_PRINTED_FORM`]; missing items are left out of the bibliography.
pub struct NumericEngine {
    library: Arc<dyn Library>,
    cited: Mutex<Option<Vec<String>>>,
}

impl NumericEngine {
    pub fn new(library: Arc<dyn Library>) -> Self {
        Self {
            library,
            cited: Mutex::new(None),
        }
    }

    fn format_entry(item: &BibliographyItem, number: usize, mode: OutputMode) -> String {
        let mut entry = format!("[{}] ", number);
        if !item.authors.is_empty() {
            entry.push_str(&item.authors.join(", "));
            entry.push_str(". ");
        }
        entry.push_str(&item.title);
        if let Some(year) = item.issued {
            entry.push_str(&format!(" ({})", year));
        }
        entry.push('.');
        match mode {
            OutputMode::Html => format!(
                "<div class=\"csl-entry\" id=\"{}\">{}</div>",
                item.id,
                escape_html(&entry)
            ),
            OutputMode::Text => entry,
        }
    }
}

impl CitationEngine for NumericEngine {
    fn rebuild_processor_state(
        &self,
        requests: &[CitationRequest],
        _mode: OutputMode,
    ) -> Result<Vec<String>, CitationEngineError> {
        let mut order: Vec<String> = Vec::new();
        let mut output = Vec::with_capacity(requests.len());

        for request in requests {
            let mut numbers = Vec::new();
            for item_id in &request.item_ids {
                if !self.library.has_library_item(item_id) {
                    continue;
                }
                let number = match order.iter().position(|id| id == item_id) {
                    Some(index) => index + 1,
                    None => {
                        order.push(item_id.clone());
                        order.len()
                    }
                };
                numbers.push(number.to_string());
            }
            if numbers.is_empty() {
                output.push(NO_PRINTED_FORM.to_string());
            } else {
                output.push(format!("[{}]", numbers.join(",")));
            }
        }

        let mut cited = self.cited.lock().unwrap_or_else(PoisonError::into_inner);
        *cited = Some(order);
        Ok(output)
    }

    fn make_bibliography(&self) -> Result<Bibliography, CitationEngineError> {
        let cited = self.cited.lock().unwrap_or_else(PoisonError::into_inner);
        let order = cited.as_ref().ok_or(CitationEngineError::NotBuilt)?;

        let mut bibliography = Bibliography::default();
        for (index, id) in order.iter().enumerate() {
            if let Some(item) = self.library.get_library_item(id) {
                bibliography.entry_ids.push(id.clone());
                bibliography
                    .entries
                    .push(Self::format_entry(&item, index + 1, OutputMode::Html));
            }
        }
        Ok(bibliography)
    }
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Arc<InMemoryLibrary> {
        Arc::new(InMemoryLibrary::with_items([
            BibliographyItem::new("item-1", "On Trees").with_authors(&["Knuth"]),
            BibliographyItem::new("item-2", "On Graphs").with_issued(1959),
        ]))
    }

    fn request(id: &str, items: &[&str]) -> CitationRequest {
        CitationRequest {
            citation_id: id.to_string(),
            item_ids: items.iter().map(|i| i.to_string()).collect(),
        }
    }

    #[test]
    fn test_numeric_engine_numbers_by_first_citation() {
        let engine = NumericEngine::new(library());
        let out = engine
            .rebuild_processor_state(
                &[
                    request("c1", &["item-2"]),
                    request("c2", &["item-1", "item-2"]),
                ],
                OutputMode::Html,
            )
            .unwrap();
        assert_eq!(out, vec!["[1]".to_string(), "[2,1]".to_string()]);

        let bibliography = engine.make_bibliography().unwrap();
        assert_eq!(bibliography.entry_ids, vec!["item-2", "item-1"]);
        assert!(bibliography.entries[0].contains("On Graphs (1959)."));
    }

    #[test]
    fn test_missing_items_have_no_printed_form() {
        let engine = NumericEngine::new(library());
        let out = engine
            .rebuild_processor_state(&[request("c1", &["nope"])], OutputMode::Text)
            .unwrap();
        assert_eq!(out, vec![NO_PRINTED_FORM.to_string()]);
        assert!(engine.make_bibliography().unwrap().is_empty());
    }

    #[test]
    fn test_bibliography_requires_rebuild() {
        let engine = NumericEngine::new(library());
        assert_eq!(engine.make_bibliography(), Err(CitationEngineError::NotBuilt));
    }

    #[test]
    fn test_engine_handle_install() {
        let handle = EngineHandle::new();
        assert!(!handle.is_installed());
        let shared = handle.clone();
        handle.install(Arc::new(NumericEngine::new(library())));
        assert!(shared.is_installed());
        shared.uninstall();
        assert!(handle.current().is_none());
    }

    #[test]
    fn test_library_lookup() {
        let library = library();
        assert!(library.has_library_item("item-1"));
        library.remove_item("item-1");
        assert!(!library.has_library_item("item-1"));
        library.insert_model("MPManuscript:1", serde_json::json!({ "title": "Paper" }));
        assert!(library.get_model("MPManuscript:1").is_some());
    }
}
