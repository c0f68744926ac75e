//! # Decorations
//!
//! Render-only annotations projected from plugin state. Nothing here touches
//! the document.
//!
//! Node decorations and widgets target a node by its stable `id` and are
//! resolved to positions only when rendered ([`DecorationSet::resolve`]), so
//! a set computed for one snapshot stays meaningful while positions shift.
//! Inline decorations (text ranges) are positional and are recomputed with the
//! state that owns them.
//!
//! Mounted widget elements live in a [`WidgetMounts`] arena indexed by
//! `(node id, widget)`; see [`WidgetMounts::sync`].

use manuscript_model::Node;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecorationTarget {
    /// The whole node carrying this id
    Node(String),

    /// A content range of the snapshot the decoration was computed for
    Range { from: usize, to: usize },
}

/// Small render-only element
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Widget {
    /// Generated label (footnote marker, section number)
    Label(String),

    /// Advisory warning
    Warning(String),

    /// Button opening the footnote deletion dialog
    DeleteFootnote { footnote_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecorationKind {
    Node { class: String },
    Inline { class: String },
    Widget(Widget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub target: DecorationTarget,
    pub kind: DecorationKind,
}

impl Decoration {
    pub fn node(id: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            target: DecorationTarget::Node(id.into()),
            kind: DecorationKind::Node {
                class: class.into(),
            },
        }
    }

    pub fn inline(from: usize, to: usize, class: impl Into<String>) -> Self {
        Self {
            target: DecorationTarget::Range { from, to },
            kind: DecorationKind::Inline {
                class: class.into(),
            },
        }
    }

    pub fn widget(id: impl Into<String>, widget: Widget) -> Self {
        Self {
            target: DecorationTarget::Node(id.into()),
            kind: DecorationKind::Widget(widget),
        }
    }

    pub fn class(&self) -> Option<&str> {
        match &self.kind {
            DecorationKind::Node { class } | DecorationKind::Inline { class } => Some(class),
            DecorationKind::Widget(_) => None,
        }
    }

    pub fn as_widget(&self) -> Option<&Widget> {
        match &self.kind {
            DecorationKind::Widget(widget) => Some(widget),
            _ => None,
        }
    }

    pub fn node_id(&self) -> Option<&str> {
        match &self.target {
            DecorationTarget::Node(id) => Some(id),
            DecorationTarget::Range { .. } => None,
        }
    }
}

/// Decoration located in a concrete document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDecoration<'a> {
    pub from: usize,
    pub to: usize,
    pub decoration: &'a Decoration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecorationSet {
    decorations: Vec<Decoration>,
}

impl DecorationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, decoration: Decoration) {
        self.decorations.push(decoration);
    }

    pub fn extend(&mut self, other: DecorationSet) {
        self.decorations.extend(other.decorations);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Decoration> {
        self.decorations.iter()
    }

    pub fn len(&self) -> usize {
        self.decorations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorations.is_empty()
    }

    /// Decorations attached to the node with `id`
    pub fn for_node<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Decoration> {
        self.decorations.iter().filter(move |d| d.node_id() == Some(id))
    }

    pub fn widgets(&self) -> impl Iterator<Item = (&str, &Widget)> {
        self.decorations
            .iter()
            .filter_map(|d| Some((d.node_id()?, d.as_widget()?)))
    }

    /// Locate every decoration in `doc`, sorted by start position.
    ///
    /// Node targets that no longer exist and ranges outside the document are
    /// dropped.
    pub fn resolve<'a>(&'a self, doc: &Node) -> Vec<ResolvedDecoration<'a>> {
        let size = doc.content_size();
        let mut resolved: Vec<ResolvedDecoration<'a>> = self
            .decorations
            .iter()
            .filter_map(|decoration| {
                let (from, to) = match &decoration.target {
                    DecorationTarget::Node(id) => {
                        let (node, pos) = doc.find_by_id(id)?;
                        (pos, pos + node.node_size())
                    }
                    DecorationTarget::Range { from, to } => {
                        if *to > size || from > to {
                            return None;
                        }
                        (*from, *to)
                    }
                };
                Some(ResolvedDecoration {
                    from,
                    to,
                    decoration,
                })
            })
            .collect();
        resolved.sort_by_key(|d| (d.from, d.to));
        resolved
    }
}

impl FromIterator<Decoration> for DecorationSet {
    fn from_iter<I: IntoIterator<Item = Decoration>>(iter: I) -> Self {
        Self {
            decorations: iter.into_iter().collect(),
        }
    }
}

/// Produces host elements for widgets
pub trait WidgetRenderer {
    type Element;

    fn render(&mut self, node_id: &str, widget: &Widget) -> Self::Element;
}

type MountKey = (String, Widget);

/// Arena of mounted widget elements keyed by node id rather than position
#[derive(Debug)]
pub struct WidgetMounts<E> {
    slots: Vec<Option<(MountKey, E)>>,
    index: BTreeMap<MountKey, usize>,
    free: Vec<usize>,
}

impl<E> Default for WidgetMounts<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            index: BTreeMap::new(),
            free: Vec::new(),
        }
    }
}

/// Outcome of a [`WidgetMounts::sync`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountDelta {
    pub mounted: usize,
    pub unmounted: usize,
    pub kept: usize,
}

impl<E> WidgetMounts<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount widgets that appeared in `set`, unmount those that vanished,
    /// keep the rest untouched.
    pub fn sync<R>(&mut self, set: &DecorationSet, renderer: &mut R) -> MountDelta
    where
        R: WidgetRenderer<Element = E>,
    {
        let mut delta = MountDelta::default();
        let wanted: BTreeSet<MountKey> = set
            .widgets()
            .map(|(id, widget)| (id.to_string(), widget.clone()))
            .collect();

        let stale: Vec<MountKey> = self
            .index
            .keys()
            .filter(|key| !wanted.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(slot) = self.index.remove(&key) {
                self.slots[slot] = None;
                self.free.push(slot);
                delta.unmounted += 1;
            }
        }

        for key in wanted {
            if self.index.contains_key(&key) {
                delta.kept += 1;
                continue;
            }
            let element = renderer.render(&key.0, &key.1);
            let slot = match self.free.pop() {
                Some(slot) => {
                    self.slots[slot] = Some((key.clone(), element));
                    slot
                }
                None => {
                    self.slots.push(Some((key.clone(), element)));
                    self.slots.len() - 1
                }
            };
            self.index.insert(key, slot);
            delta.mounted += 1;
        }

        delta
    }

    /// Elements mounted for a node
    pub fn elements<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a E> {
        self.slots
            .iter()
            .flatten()
            .filter(move |((id, _), _)| id == node_id)
            .map(|(_, element)| element)
    }

    /// Current position of a mounted widget's node
    pub fn position_of(&self, node_id: &str, doc: &Node) -> Option<usize> {
        if !self.index.keys().any(|(id, _)| id == node_id) {
            return None;
        }
        doc.find_by_id(node_id).map(|(_, pos)| pos)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Drop every mounted element
    pub fn clear(&mut self) {
        self.slots.clear();
        self.index.clear();
        self.free.clear();
    }
}
