//! Error types for codegen operations.

use thiserror::Error;

/// Result type for codegen operations.
pub type Result<T> = std::result::Result<T, CodegenError>;

/// Errors that can occur during code generation.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOp(String),

    #[error("Unsupported {kind} layout '{layout}' on node '{node}'")]
    UnsupportedLayout {
        node: String,
        kind: &'static str,
        layout: String,
    },

    #[error("Invalid tensor shape: {0}")]
    InvalidShape(String),

    #[error("Node '{node}' ({op_type}) is missing argument {index}")]
    MissingArgument {
        node: String,
        op_type: String,
        index: usize,
    },

    #[error("Graph error: {0}")]
    Core(#[from] offload_core::Error),
}
