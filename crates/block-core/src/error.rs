use thiserror::Error;

use crate::node::NodeKey;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invariant failed: {0}")]
    PreconditionViolation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeKey),

    #[error("Unsupported element type: {0}")]
    UnsupportedElement(&'static str),

    #[error("Unhandled dragging edge")]
    UnhandledDragContext,

    #[error("Unsupported block type: {0}")]
    UnsupportedBlockType(String),

    #[error("Invalid column span: {column_count} columns over {items} items")]
    InvalidColumnSpan { column_count: u32, items: usize },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn precondition(message: impl Into<String>) -> Self {
        EngineError::PreconditionViolation(message.into())
    }

    /// Classification failures: fatal to the operation, not to the session.
    pub fn is_unsupported_shape(&self) -> bool {
        matches!(
            self,
            EngineError::UnsupportedElement(_)
                | EngineError::UnhandledDragContext
                | EngineError::UnsupportedBlockType(_)
        )
    }

    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            EngineError::PreconditionViolation(_) | EngineError::NodeNotFound(_)
        )
    }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Returns a `PreconditionViolation` unless `condition` holds.
pub(crate) fn invariant(condition: bool, message: &str) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(EngineError::precondition(message))
    }
}
