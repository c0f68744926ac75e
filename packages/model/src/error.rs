//! Error types for tree transforms

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("Position {pos} out of range (content size {size})")]
    PositionOutOfRange { pos: usize, size: usize },

    #[error("Invalid replace range {from}..{to}")]
    InvalidRange { from: usize, to: usize },

    #[error("No node at position {0}")]
    NoNodeAt(usize),

    #[error("Cannot set attributes on text at position {0}")]
    TextNode(usize),
}
