//! Text selection over document positions

use crate::node::Node;
use crate::step::Mapping;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: usize,
    pub head: usize,
}

impl Selection {
    pub fn cursor(pos: usize) -> Self {
        Self {
            anchor: pos,
            head: pos,
        }
    }

    pub fn range(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    pub fn from(&self) -> usize {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> usize {
        self.anchor.max(self.head)
    }

    pub fn is_empty(&self) -> bool {
        self.anchor == self.head
    }

    /// Carry the selection through `mapping` into `doc`.
    ///
    /// Endpoints whose content was removed land on the nearest surviving
    /// position, clamped to the document.
    pub fn map(&self, doc: &Node, mapping: &Mapping) -> Selection {
        let size = doc.content_size();
        let anchor = mapping.map(self.anchor, 1).min(size);
        let head = mapping.map(self.head, 1).min(size);
        Selection { anchor, head }
    }
}

impl Default for Selection {
    fn default() -> Self {
        Self::cursor(0)
    }
}
