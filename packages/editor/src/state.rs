//! # Plugin State Machinery
//!
//! An [`EditorState`] is an immutable snapshot: the document, the selection,
//! and one derived-state slot per registered plugin.
//!
//! ## Transaction flow
//!
//! ```text
//! tr ──► EditorState::apply ──► plugin.apply (each slot, in order)
//!                 │
//!                 ▼
//!     plugin.append_transaction (each plugin, unseen transactions only)
//!                 │ Some(corrective)
//!                 └──► apply + loop again until nobody appends
//! ```
//!
//! Plugins registered later see the freshly computed slots of earlier ones
//! through [`EditorState::plugin_state`], which is the only way one plugin
//! reads another's state.

use crate::config::EditorConfig;
use crate::decorations::DecorationSet;
use crate::errors::{EditorError, PluginError};
use crate::meta;
use manuscript_model::{Node, Selection, Transaction};
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type Slot = Arc<dyn Any + Send + Sync>;

/// Typed name of a plugin's state slot
pub struct PluginKey<T> {
    name: &'static str,
    _state: PhantomData<fn() -> T>,
}

impl<T> PluginKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _state: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PluginKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PluginKey<T> {}

impl<T> fmt::Debug for PluginKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PluginKey({})", self.name)
    }
}

/// A unit of derived state kept in sync with the document
pub trait Plugin: Send + Sync + 'static {
    type State: Send + Sync + 'static;

    const KEY: PluginKey<Self::State>;

    /// Build the initial state. Slots of plugins registered earlier are
    /// already available on `state`.
    fn init(&self, state: &EditorState) -> Self::State;

    /// Compute the state after `tr`. Return `prev` itself when nothing
    /// relevant changed.
    fn apply(
        &self,
        tr: &Transaction,
        prev: &Arc<Self::State>,
        old: &EditorState,
        new: &EditorState,
    ) -> Arc<Self::State>;

    /// Inspect transactions not yet seen by this plugin and optionally
    /// return one corrective transaction built from `new`.
    fn append_transaction(
        &self,
        _trs: &[Transaction],
        _old: &EditorState,
        _new: &EditorState,
    ) -> Result<Option<Transaction>, PluginError> {
        Ok(None)
    }

    fn decorations(&self, _state: &Self::State, _editor: &EditorState) -> DecorationSet {
        DecorationSet::new()
    }
}

/// Object-safe view of a [`Plugin`]
trait AnyPlugin: Send + Sync {
    fn key_name(&self) -> &'static str;

    fn init_slot(&self, state: &EditorState) -> Slot;

    fn apply_slot(&self, tr: &Transaction, prev: &Slot, old: &EditorState, new: &EditorState) -> Slot;

    fn append_transaction(
        &self,
        trs: &[Transaction],
        old: &EditorState,
        new: &EditorState,
    ) -> Result<Option<Transaction>, PluginError>;

    fn decorations(&self, slot: &Slot, state: &EditorState) -> DecorationSet;
}

impl<P: Plugin> AnyPlugin for P {
    fn key_name(&self) -> &'static str {
        P::KEY.name()
    }

    fn init_slot(&self, state: &EditorState) -> Slot {
        Arc::new(self.init(state))
    }

    fn apply_slot(&self, tr: &Transaction, prev: &Slot, old: &EditorState, new: &EditorState) -> Slot {
        match prev.clone().downcast::<P::State>() {
            Ok(prev) => {
                let next: Slot = self.apply(tr, &prev, old, new);
                next
            }
            Err(_) => {
                tracing::warn!(plugin = P::KEY.name(), "State slot had an unexpected type; reinitializing");
                self.init_slot(new)
            }
        }
    }

    fn append_transaction(
        &self,
        trs: &[Transaction],
        old: &EditorState,
        new: &EditorState,
    ) -> Result<Option<Transaction>, PluginError> {
        Plugin::append_transaction(self, trs, old, new)
    }

    fn decorations(&self, slot: &Slot, state: &EditorState) -> DecorationSet {
        match slot.clone().downcast::<P::State>() {
            Ok(plugin_state) => Plugin::decorations(self, &plugin_state, state),
            Err(_) => DecorationSet::new(),
        }
    }
}

/// Ordered collection of plugins
#[derive(Default)]
pub struct PluginSet {
    plugins: Vec<Box<dyn AnyPlugin>>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. A second plugin with the same key replaces the first.
    pub fn with<P: Plugin>(mut self, plugin: P) -> Self {
        self.add(plugin);
        self
    }

    pub fn add<P: Plugin>(&mut self, plugin: P) {
        match self.index_of(P::KEY.name()) {
            Some(index) => {
                tracing::warn!(plugin = P::KEY.name(), "Replacing plugin with duplicate key");
                self.plugins[index] = Box::new(plugin);
            }
            None => self.plugins.push(Box::new(plugin)),
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.plugins.iter().map(|p| p.key_name())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.key_name() == name)
    }
}

impl fmt::Debug for PluginSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Result of [`EditorState::apply_transaction`]
#[derive(Debug, Clone)]
pub struct AppliedTransactions {
    pub state: EditorState,

    /// The root transaction followed by every appended one, in order
    pub transactions: Vec<Transaction>,
}

impl AppliedTransactions {
    /// Transactions appended by plugins
    pub fn appended(&self) -> &[Transaction] {
        self.transactions.get(1..).unwrap_or(&[])
    }
}

/// Immutable editor snapshot
#[derive(Clone)]
pub struct EditorState {
    doc: Arc<Node>,
    selection: Selection,
    config: Arc<EditorConfig>,
    plugins: Arc<PluginSet>,
    slots: Vec<Slot>,
}

impl EditorState {
    pub fn create(doc: impl Into<Arc<Node>>, plugins: PluginSet, config: EditorConfig) -> Self {
        Self::create_with_selection(doc, Selection::default(), plugins, config)
    }

    pub fn create_with_selection(
        doc: impl Into<Arc<Node>>,
        selection: Selection,
        plugins: PluginSet,
        config: EditorConfig,
    ) -> Self {
        let mut state = Self {
            doc: doc.into(),
            selection,
            config: Arc::new(config),
            plugins: Arc::new(plugins),
            slots: Vec::new(),
        };
        let plugins = state.plugins.clone();
        for plugin in &plugins.plugins {
            let slot = plugin.init_slot(&state);
            state.slots.push(slot);
        }
        state
    }

    pub fn doc(&self) -> &Arc<Node> {
        &self.doc
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginSet {
        &self.plugins
    }

    /// Start a transaction from this snapshot
    pub fn tr(&self) -> Transaction {
        Transaction::new(self.doc.clone())
    }

    /// Read another plugin's state. `None` if the plugin is not registered
    /// (or, during `apply`, has not been recomputed yet).
    pub fn plugin_state<T: Any + Send + Sync>(&self, key: &PluginKey<T>) -> Option<Arc<T>> {
        let index = self.plugins.index_of(key.name())?;
        self.slots.get(index)?.clone().downcast::<T>().ok()
    }

    /// Apply a single transaction without running append hooks
    pub fn apply(&self, tr: &Transaction) -> Result<EditorState, EditorError> {
        if !Arc::ptr_eq(tr.before(), &self.doc) {
            return Err(EditorError::MismatchedTransaction);
        }

        let selection = match tr.selection() {
            Some(selection) => selection,
            None => self.selection.map(tr.doc(), tr.mapping()),
        };

        let mut next = EditorState {
            doc: tr.doc().clone(),
            selection,
            config: self.config.clone(),
            plugins: self.plugins.clone(),
            slots: Vec::with_capacity(self.slots.len()),
        };
        for (plugin, prev) in self.plugins.plugins.iter().zip(&self.slots) {
            let slot = plugin.apply_slot(tr, prev, self, &next);
            next.slots.push(slot);
        }
        Ok(next)
    }

    /// Apply `root`, then let every plugin append corrective transactions
    /// until the state settles.
    pub fn apply_transaction(&self, root: Transaction) -> Result<AppliedTransactions, EditorError> {
        let mut state = self.apply(&root)?;
        let mut trs = vec![root];
        let plugin_count = self.plugins.len();

        // Per plugin: the state it last inspected and how many transactions it has seen
        let mut seen: Option<Vec<(EditorState, usize)>> = None;

        loop {
            let mut have_new = false;

            for (i, plugin) in self.plugins.plugins.iter().enumerate() {
                let (old, n) = match &seen {
                    Some(seen) => (seen[i].0.clone(), seen[i].1),
                    None => (self.clone(), 0),
                };

                if n < trs.len() {
                    let appended = match plugin.append_transaction(&trs[n..], &old, &state) {
                        Ok(appended) => appended,
                        Err(error) => {
                            tracing::warn!(
                                plugin = plugin.key_name(),
                                error = %error,
                                "Append hook failed; skipping correction"
                            );
                            None
                        }
                    };

                    if let Some(mut tr) = appended {
                        tr.set_meta(meta::APPENDED_TRANSACTION, true);
                        match state.apply(&tr) {
                            Ok(next) => {
                                if seen.is_none() {
                                    seen = Some(
                                        (0..plugin_count)
                                            .map(|j| {
                                                if j < i {
                                                    (state.clone(), trs.len())
                                                } else {
                                                    (self.clone(), 0)
                                                }
                                            })
                                            .collect(),
                                    );
                                }
                                tracing::debug!(
                                    plugin = plugin.key_name(),
                                    steps = tr.steps().len(),
                                    "Applied appended transaction"
                                );
                                trs.push(tr);
                                state = next;
                                have_new = true;
                            }
                            Err(error) => {
                                tracing::warn!(
                                    plugin = plugin.key_name(),
                                    error = %error,
                                    "Dropping appended transaction"
                                );
                            }
                        }
                    }
                }

                if let Some(seen) = seen.as_mut() {
                    seen[i] = (state.clone(), trs.len());
                }
            }

            if !have_new {
                return Ok(AppliedTransactions {
                    state,
                    transactions: trs,
                });
            }
        }
    }

    /// Every plugin's decorations, in registration order
    pub fn decorations(&self) -> DecorationSet {
        let mut set = DecorationSet::new();
        for (plugin, slot) in self.plugins.plugins.iter().zip(&self.slots) {
            set.extend(plugin.decorations(slot, self));
        }
        set
    }

    /// Decorations of a single plugin
    pub fn plugin_decorations<T>(&self, key: &PluginKey<T>) -> DecorationSet {
        match self.plugins.index_of(key.name()) {
            Some(index) => match self.slots.get(index) {
                Some(slot) => self.plugins.plugins[index].decorations(slot, self),
                None => DecorationSet::new(),
            },
            None => DecorationSet::new(),
        }
    }
}

impl fmt::Debug for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorState")
            .field("doc_size", &self.doc.content_size())
            .field("selection", &self.selection)
            .field("plugins", &self.plugins)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manuscript_model::builders::*;

    /// Counts paragraphs; keeps the previous slot for non-structural changes
    struct ParagraphCount;

    impl Plugin for ParagraphCount {
        type State = usize;
        const KEY: PluginKey<usize> = PluginKey::new("test.paragraphs");

        fn init(&self, state: &EditorState) -> usize {
            state.doc().find_all(manuscript_model::NodeType::Paragraph).len()
        }

        fn apply(
            &self,
            tr: &Transaction,
            prev: &Arc<usize>,
            _old: &EditorState,
            new: &EditorState,
        ) -> Arc<usize> {
            if !tr.doc_changed() {
                return prev.clone();
            }
            Arc::new(self.init(new))
        }
    }

    /// Keeps at least two paragraphs in the document. Does not re-see its
    /// own corrections, so it repairs everything in one go.
    struct MinimumParagraphs;

    impl Plugin for MinimumParagraphs {
        type State = ();
        const KEY: PluginKey<()> = PluginKey::new("test.minimum");

        fn init(&self, _state: &EditorState) {}

        fn apply(&self, _tr: &Transaction, prev: &Arc<()>, _old: &EditorState, _new: &EditorState) -> Arc<()> {
            prev.clone()
        }

        fn append_transaction(
            &self,
            _trs: &[Transaction],
            _old: &EditorState,
            new: &EditorState,
        ) -> Result<Option<Transaction>, PluginError> {
            let count = new.plugin_state(&ParagraphCount::KEY).map_or(0, |c| *c);
            if count >= 2 {
                return Ok(None);
            }
            let missing = 2 - count;
            let mut tr = new.tr();
            tr.insert(new.doc().content_size(), vec![paragraph(vec![]); missing])?;
            tr.mark_corrective();
            Ok(Some(tr))
        }
    }

    fn state() -> EditorState {
        let plugins = PluginSet::new().with(ParagraphCount).with(MinimumParagraphs);
        EditorState::create(
            manuscript(vec![paragraph(vec![text("one")]), paragraph(vec![text("two")])]),
            plugins,
            EditorConfig::default(),
        )
    }

    #[test]
    fn test_selection_only_transaction_keeps_slot() {
        let state = state();
        let before = state.plugin_state(&ParagraphCount::KEY).unwrap();
        let mut tr = state.tr();
        tr.set_selection(Selection::cursor(2));
        let next = state.apply(&tr).unwrap();
        let after = next.plugin_state(&ParagraphCount::KEY).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(next.selection(), Selection::cursor(2));
    }

    #[test]
    fn test_append_hook_repairs_until_settled() {
        let state = state();
        let mut tr = state.tr();
        tr.delete(0, 10).unwrap();
        let applied = state.apply_transaction(tr).unwrap();
        assert_eq!(applied.transactions.len(), 2);
        assert_eq!(*applied.state.plugin_state(&ParagraphCount::KEY).unwrap(), 2);
        for appended in applied.appended() {
            assert!(appended.is_corrective());
            assert!(appended.has_meta(meta::APPENDED_TRANSACTION));
        }
    }

    #[test]
    fn test_stale_transaction_is_rejected() {
        let state = state();
        let mut tr = state.tr();
        tr.insert(1, vec![text("x")]).unwrap();
        let next = state.apply(&tr).unwrap();
        assert!(matches!(next.apply(&tr), Err(EditorError::MismatchedTransaction)));
    }

    #[test]
    fn test_unknown_key_has_no_state() {
        let state = state();
        let key: PluginKey<u8> = PluginKey::new("test.absent");
        assert!(state.plugin_state(&key).is_none());
        assert_eq!(state.plugins().keys().collect::<Vec<_>>(), vec!["test.paragraphs", "test.minimum"]);
    }
}
