//! # Document Nodes
//!
//! Immutable-by-convention tree of typed nodes.
//!
//! ## Positions
//!
//! ```text
//! <section>  <section_title> T i t l e </section_title> </section>
//! 0          1               2 3 4 5 6 7                8
//! ```
//!
//! - text counts one position per character
//! - inline leaves (citations, inline footnotes, ...) count one
//! - every other node counts two (open + close) plus its content
//!
//! The document root's content starts at position 0.

use crate::error::TransformError;
use crate::schema::{MarkType, NodeType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Node attribute map
pub type Attrs = Map<String, Value>;

/// Inline annotation on a text node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    #[serde(rename = "type")]
    pub mark_type: MarkType,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,
}

impl Mark {
    pub fn new(mark_type: MarkType) -> Self {
        Self {
            mark_type,
            attrs: Attrs::new(),
        }
    }

    pub fn with_attrs(mark_type: MarkType, attrs: Attrs) -> Self {
        Self { mark_type, attrs }
    }
}

/// A node of the document tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "type")]
    pub node_type: NodeType,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Attrs,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<Node>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub marks: Vec<Mark>,
}

impl Node {
    pub fn new(node_type: NodeType, attrs: Attrs, content: Vec<Node>) -> Self {
        Self {
            node_type,
            attrs,
            content,
            text: None,
            marks: Vec::new(),
        }
    }

    /// Create a text node
    pub fn text(text: impl Into<String>) -> Self {
        Self::text_with_marks(text, Vec::new())
    }

    pub fn text_with_marks(text: impl Into<String>, marks: Vec<Mark>) -> Self {
        Self {
            node_type: NodeType::Text,
            attrs: Attrs::new(),
            content: Vec::new(),
            text: Some(text.into()),
            marks,
        }
    }

    /// Create a node without children
    pub fn leaf(node_type: NodeType, attrs: Attrs) -> Self {
        Self::new(node_type, attrs, Vec::new())
    }

    /// Builder-style attribute setter
    pub fn with_attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }

    pub fn with_id(self, id: &str) -> Self {
        self.with_attr("id", id)
    }

    /// Non-empty `id` attribute
    pub fn id(&self) -> Option<&str> {
        self.attr_str("id").filter(|id| !id.is_empty())
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }

    pub fn attr_bool(&self, key: &str) -> bool {
        self.attrs.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// String list attribute (e.g. `rids`). Non-string entries are skipped.
    pub fn attr_str_list(&self, key: &str) -> Vec<String> {
        match self.attrs.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(single)) if !single.is_empty() => vec![single.clone()],
            _ => Vec::new(),
        }
    }

    pub fn is_text(&self) -> bool {
        self.node_type.is_text()
    }

    pub fn is_leaf(&self) -> bool {
        self.node_type.is_leaf()
    }

    pub fn has_mark(&self, mark_type: MarkType) -> bool {
        self.marks.iter().any(|m| m.mark_type == mark_type)
    }

    pub fn child_count(&self) -> usize {
        self.content.len()
    }

    /// Size of the node's content
    pub fn content_size(&self) -> usize {
        self.content.iter().map(Node::node_size).sum()
    }

    /// Number of positions the node occupies in its parent
    pub fn node_size(&self) -> usize {
        if self.is_text() {
            self.text.as_deref().map_or(0, |t| t.chars().count())
        } else if self.is_leaf() {
            1
        } else {
            self.content_size() + 2
        }
    }

    /// Concatenated text of all descendant text nodes
    pub fn text_content(&self) -> String {
        if let Some(text) = &self.text {
            return text.clone();
        }
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.content {
            match &child.text {
                Some(text) => out.push_str(text),
                None => child.collect_text(out),
            }
        }
    }

    /// Pre-order walk over all descendants.
    ///
    /// The visitor receives `(node, pos, parent, index)`; returning `false`
    /// skips the node's children.
    pub fn descendants<F>(&self, mut f: F)
    where
        F: FnMut(&Node, usize, &Node, usize) -> bool,
    {
        self.walk_descendants(0, &mut f);
    }

    fn walk_descendants<F>(&self, start: usize, f: &mut F)
    where
        F: FnMut(&Node, usize, &Node, usize) -> bool,
    {
        let mut offset = start;
        for (index, child) in self.content.iter().enumerate() {
            if f(child, offset, self, index) && !child.content.is_empty() {
                child.walk_descendants(offset + 1, f);
            }
            offset += child.node_size();
        }
    }

    /// Find the first descendant with the given id
    pub fn find_by_id(&self, id: &str) -> Option<(&Node, usize)> {
        let mut found: Option<(&Node, usize)> = None;
        self.find_with(0, &mut |node, pos| {
            if found.is_none() && node.id() == Some(id) {
                found = Some((node, pos));
            }
            found.is_none()
        });
        found
    }

    /// Collect every descendant of a type, in document order
    pub fn find_all(&self, node_type: NodeType) -> Vec<(&Node, usize)> {
        let mut out = Vec::new();
        self.find_with(0, &mut |node, pos| {
            if node.node_type == node_type {
                out.push((node, pos));
            }
            true
        });
        out
    }

    // Lifetime-preserving variant of `descendants` used by the finders above.
    fn find_with<'a, F>(&'a self, start: usize, f: &mut F) -> bool
    where
        F: FnMut(&'a Node, usize) -> bool,
    {
        let mut offset = start;
        for child in &self.content {
            if !f(child, offset) {
                return false;
            }
            if !child.content.is_empty() && !child.find_with(offset + 1, f) {
                return false;
            }
            offset += child.node_size();
        }
        true
    }

    /// Node starting exactly at `pos`
    pub fn node_at(&self, pos: usize) -> Option<&Node> {
        let mut node = self;
        let mut start = 0;
        'descend: loop {
            let mut offset = start;
            for child in &node.content {
                let size = child.node_size();
                if offset == pos {
                    return Some(child);
                }
                if pos > offset && pos < offset + size {
                    if child.is_text() || child.is_leaf() {
                        return None;
                    }
                    node = child;
                    start = offset + 1;
                    continue 'descend;
                }
                offset += size;
            }
            return None;
        }
    }

    fn node_at_mut(&mut self, pos: usize) -> Option<&mut Node> {
        let mut offset = 0;
        let mut target = None;
        for (index, child) in self.content.iter().enumerate() {
            let size = child.node_size();
            if offset == pos {
                target = Some((index, None));
                break;
            }
            if pos > offset && pos < offset + size {
                if child.is_text() || child.is_leaf() {
                    return None;
                }
                target = Some((index, Some(pos - offset - 1)));
                break;
            }
            offset += size;
        }
        match target {
            Some((index, None)) => self.content.get_mut(index),
            Some((index, Some(inner))) => self.content[index].node_at_mut(inner),
            None => None,
        }
    }

    /// Resolve a position into the chain of ancestors containing it
    pub fn resolve(&self, pos: usize) -> Result<ResolvedPos<'_>, TransformError> {
        let size = self.content_size();
        if pos > size {
            return Err(TransformError::PositionOutOfRange { pos, size });
        }

        let mut levels = vec![ResolvedLevel {
            node: self,
            start: 0,
            index: 0,
        }];
        let mut node = self;
        let mut start = 0;

        'descend: loop {
            let mut offset = start;
            for (index, child) in node.content.iter().enumerate() {
                let size = child.node_size();
                let last = levels.len() - 1;
                if pos < offset + size || (pos == offset && index == 0) {
                    levels[last].index = index;
                    if pos > offset && pos < offset + size && !child.is_text() && !child.is_leaf()
                    {
                        levels.push(ResolvedLevel {
                            node: child,
                            start: offset + 1,
                            index: 0,
                        });
                        node = child;
                        start = offset + 1;
                        continue 'descend;
                    }
                    break 'descend;
                }
                offset += size;
                levels[last].index = index + 1;
            }
            break;
        }

        Ok(ResolvedPos { pos, levels })
    }

    /// Replace the content range `from..to` with `nodes`, returning the removed
    /// children. `from` and `to` must share a parent; they may fall inside text.
    pub(crate) fn replace(
        &mut self,
        from: usize,
        to: usize,
        nodes: Vec<Node>,
    ) -> Result<Vec<Node>, TransformError> {
        let size = self.content_size();
        if to > size {
            return Err(TransformError::PositionOutOfRange { pos: to, size });
        }
        if from > to {
            return Err(TransformError::InvalidRange { from, to });
        }
        self.replace_in(0, from, to, nodes)
    }

    fn replace_in(
        &mut self,
        start: usize,
        from: usize,
        to: usize,
        nodes: Vec<Node>,
    ) -> Result<Vec<Node>, TransformError> {
        let mut offset = start;
        let mut descend = None;
        for (index, child) in self.content.iter().enumerate() {
            let end = offset + child.node_size();
            if !child.is_text() && !child.is_leaf() && from > offset && to < end {
                descend = Some((index, offset + 1));
                break;
            }
            if offset > to {
                break;
            }
            offset = end;
        }

        if let Some((index, child_start)) = descend {
            return self.content[index].replace_in(child_start, from, to, nodes);
        }

        self.split_text_at(start, to, from, to)?;
        self.split_text_at(start, from, from, to)?;
        let from_index = self.index_at_boundary(start, from, to)?;
        let to_index = self.index_at_boundary(start, to, from)?;

        let removed: Vec<Node> = self.content.splice(from_index..to_index, nodes).collect();
        self.normalize_text();
        Ok(removed)
    }

    fn split_text_at(
        &mut self,
        start: usize,
        pos: usize,
        from: usize,
        to: usize,
    ) -> Result<(), TransformError> {
        let mut offset = start;
        for index in 0..self.content.len() {
            let size = self.content[index].node_size();
            if pos > offset && pos < offset + size {
                let child = &self.content[index];
                let text = match (&child.text, child.is_text()) {
                    (Some(text), true) => text,
                    _ => return Err(TransformError::InvalidRange { from, to }),
                };
                let split = text
                    .char_indices()
                    .nth(pos - offset)
                    .map_or(text.len(), |(byte, _)| byte);
                let head = Node::text_with_marks(&text[..split], child.marks.clone());
                let tail = Node::text_with_marks(&text[split..], child.marks.clone());
                self.content.splice(index..=index, [head, tail]);
                return Ok(());
            }
            offset += size;
        }
        Ok(())
    }

    fn index_at_boundary(
        &self,
        start: usize,
        pos: usize,
        other: usize,
    ) -> Result<usize, TransformError> {
        let (from, to) = (pos.min(other), pos.max(other));
        let mut offset = start;
        for (index, child) in self.content.iter().enumerate() {
            if offset == pos {
                return Ok(index);
            }
            offset += child.node_size();
        }
        if offset == pos {
            Ok(self.content.len())
        } else {
            Err(TransformError::InvalidRange { from, to })
        }
    }

    fn normalize_text(&mut self) {
        let mut merged: Vec<Node> = Vec::with_capacity(self.content.len());
        for child in self.content.drain(..) {
            if child.is_text() && child.text.as_deref().map_or(true, str::is_empty) {
                continue;
            }
            match merged.last_mut() {
                Some(prev) if prev.is_text() && child.is_text() && prev.marks == child.marks => {
                    if let (Some(prev_text), Some(text)) = (prev.text.as_mut(), child.text) {
                        prev_text.push_str(&text);
                    }
                }
                _ => merged.push(child),
            }
        }
        self.content = merged;
    }

    /// Replace the attributes of the node at `pos`, returning the old ones
    pub(crate) fn set_attrs_at(&mut self, pos: usize, attrs: Attrs) -> Result<Attrs, TransformError> {
        let node = self.node_at_mut(pos).ok_or(TransformError::NoNodeAt(pos))?;
        if node.is_text() {
            return Err(TransformError::TextNode(pos));
        }
        Ok(std::mem::replace(&mut node.attrs, attrs))
    }
}

/// One ancestor level of a resolved position
#[derive(Debug, Clone, Copy)]
pub struct ResolvedLevel<'a> {
    pub node: &'a Node,

    /// Position where this node's content starts
    pub start: usize,

    /// Index of the child the position points into (or before)
    pub index: usize,
}

/// A position together with its ancestors, root first
#[derive(Debug, Clone)]
pub struct ResolvedPos<'a> {
    pub pos: usize,
    levels: Vec<ResolvedLevel<'a>>,
}

impl<'a> ResolvedPos<'a> {
    /// Depth of the innermost parent (root = 0)
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn parent(&self) -> &'a Node {
        self.levels[self.depth()].node
    }

    pub fn node(&self, depth: usize) -> &'a Node {
        self.levels[depth].node
    }

    pub fn start(&self, depth: usize) -> usize {
        self.levels[depth].start
    }

    /// Position directly before the ancestor at `depth` (depth > 0)
    pub fn before(&self, depth: usize) -> usize {
        self.levels[depth].start.saturating_sub(1)
    }

    pub fn index(&self, depth: usize) -> usize {
        self.levels[depth].index
    }

    /// Innermost ancestor of the given type, as `(depth, node)`
    pub fn ancestor(&self, node_type: NodeType) -> Option<(usize, &'a Node)> {
        self.levels
            .iter()
            .enumerate()
            .rev()
            .find(|(_, level)| level.node.node_type == node_type)
            .map(|(depth, level)| (depth, level.node))
    }

    pub fn has_ancestor(&self, node_type: NodeType) -> bool {
        self.ancestor(node_type).is_some()
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &'a Node> + '_ {
        self.levels.iter().rev().map(|level| level.node)
    }
}
