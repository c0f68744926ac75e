//! # Steps and Position Mapping
//!
//! A [`Step`] is the atomic unit of change. Every applied step produces a
//! [`StepMap`] describing which ranges were replaced, so positions captured
//! before the step can be carried forward.
//!
//! Steps are serializable so batches can be exchanged with a collaboration
//! server, and can be mapped through foreign changes for rebasing.

use crate::error::TransformError;
use crate::node::{Attrs, Node};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stepType", rename_all = "snake_case")]
pub enum Step {
    /// Replace the content between `from` and `to` with `nodes`
    Replace {
        from: usize,
        to: usize,
        #[serde(default)]
        nodes: Vec<Node>,
    },

    /// Replace the attributes of the node starting at `pos`
    SetAttrs { pos: usize, attrs: Attrs },
}

impl Step {
    /// Apply to `doc` in place, returning the inverse step
    pub fn apply(&self, doc: &mut Node) -> Result<Step, TransformError> {
        match self {
            Step::Replace { from, to, nodes } => {
                let inserted: usize = nodes.iter().map(Node::node_size).sum();
                let removed = doc.replace(*from, *to, nodes.clone())?;
                Ok(Step::Replace {
                    from: *from,
                    to: *from + inserted,
                    nodes: removed,
                })
            }
            Step::SetAttrs { pos, attrs } => {
                let old = doc.set_attrs_at(*pos, attrs.clone())?;
                Ok(Step::SetAttrs {
                    pos: *pos,
                    attrs: old,
                })
            }
        }
    }

    pub fn get_map(&self) -> StepMap {
        match self {
            Step::Replace { from, to, nodes } => StepMap {
                ranges: vec![ReplacedRange {
                    start: *from,
                    old_size: to - from,
                    new_size: nodes.iter().map(Node::node_size).sum(),
                }],
            },
            Step::SetAttrs { .. } => StepMap::empty(),
        }
    }

    /// Carry the step over changes described by `mapping`.
    ///
    /// Returns `None` when the content the step targets was deleted.
    pub fn map(&self, mapping: &Mapping) -> Option<Step> {
        match self {
            Step::Replace { from, to, nodes } => {
                let mapped_from = mapping.map_result(*from, 1);
                let mapped_to = mapping.map_result(*to, -1);
                if from != to && mapped_from.deleted && mapped_to.deleted {
                    return None;
                }
                Some(Step::Replace {
                    from: mapped_from.pos,
                    to: mapped_from.pos.max(mapped_to.pos),
                    nodes: nodes.clone(),
                })
            }
            Step::SetAttrs { pos, attrs } => {
                let mapped = mapping.map_result(*pos, 1);
                if mapped.deleted {
                    return None;
                }
                Some(Step::SetAttrs {
                    pos: mapped.pos,
                    attrs: attrs.clone(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ReplacedRange {
    start: usize,
    old_size: usize,
    new_size: usize,
}

/// Ranges replaced by a single step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<ReplacedRange>,
}

/// Outcome of mapping a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,

    /// The position sat inside (or on the deleted side of) a replaced range
    pub deleted: bool,
}

impl StepMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Map a position. `assoc < 0` sticks to content before the position,
    /// otherwise to content after it.
    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            if range.start > pos {
                break;
            }
            let end = range.start + range.old_size;
            if pos <= end {
                let side = if range.old_size == 0 {
                    assoc
                } else if pos == range.start {
                    -1
                } else if pos == end {
                    1
                } else {
                    assoc
                };
                let base = (range.start as isize + diff) as usize;
                let mapped = if side < 0 { base } else { base + range.new_size };
                let deleted = if assoc < 0 {
                    pos != range.start
                } else {
                    pos != end
                };
                return MapResult {
                    pos: mapped,
                    deleted,
                };
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        MapResult {
            pos: (pos as isize + diff).max(0) as usize,
            deleted: false,
        }
    }

    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.map_result(pos, assoc).pos
    }
}

/// A pipeline of step maps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_map(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn append_mapping(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Mapping restricted to the maps from index `from` onwards
    pub fn slice(&self, from: usize) -> Mapping {
        Mapping {
            maps: self.maps.iter().skip(from).cloned().collect(),
        }
    }

    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut deleted = false;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            deleted |= result.deleted;
            pos = result.pos;
        }
        MapResult { pos, deleted }
    }

    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.map_result(pos, assoc).pos
    }
}
