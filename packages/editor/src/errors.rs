//! Error types for the editor

use crate::citation::CitationEngineError;
use crate::config::ConfigError;
use manuscript_model::TransformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Transaction was not created from the current document")]
    MismatchedTransaction,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node {0} is not a section")]
    NotASection(String),

    #[error("Unknown section category: {0}")]
    UnknownCategory(String),

    #[error("Editor has been destroyed")]
    Destroyed,

    #[error("Collaboration is not enabled")]
    CollaborationDisabled,
}

/// Failure inside a plugin's append-transaction hook.
///
/// Never surfaces to callers: the state machinery logs it and treats the
/// hook as having produced no correction.
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Citation engine error: {0}")]
    CitationEngine(#[from] CitationEngineError),
}
