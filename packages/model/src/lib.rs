//! # Manuscript Model
//!
//! Tree and transaction substrate for the manuscript editor.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: Node tree + positions                │
//! │  - typed nodes with JSON attributes         │
//! │  - steps with invertible, mappable effects  │
//! │  - transactions with capability flags       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: plugin state, enforcers, decorations│
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Tree is source of truth**: every index is derived from it
//! 2. **Snapshots are immutable**: a transaction produces a new `Arc<Node>`
//! 3. **Positions are mappable**: every step records what it replaced
//!
//! ## Usage
//!
//! ```rust
//! use manuscript_model::{builders::*, Transaction};
//! use std::sync::Arc;
//!
//! let doc = Arc::new(manuscript(vec![paragraph(vec![text("Hello")])]));
//! let mut tr = Transaction::new(doc);
//! tr.insert(6, vec![text(", world")]).unwrap();
//! assert_eq!(tr.doc().text_content(), "Hello, world");
//! ```

pub mod builders;
mod diff;
mod error;
mod id_generator;
mod node;
mod schema;
mod selection;
mod step;
mod transaction;
pub mod visitor;

pub use diff::{diff_replacement_blocks, NodeCoordinates, ReplacementBlock};
pub use error::TransformError;
pub use id_generator::{document_seed, IdGenerator};
pub use node::{Attrs, Mark, Node, ResolvedLevel, ResolvedPos};
pub use schema::{MarkType, NodeSpec, NodeType};
pub use selection::Selection;
pub use step::{MapResult, Mapping, Step, StepMap};
pub use transaction::{Transaction, TransactionFlags};
pub use visitor::Visitor;
