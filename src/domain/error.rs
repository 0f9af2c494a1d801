//! Domain-level errors (no I/O concerns)

use thiserror::Error;

/// Domain errors represent structure violations and refused mutations.
///
/// Parsing errors are fatal for the whole `parse` call; mutation errors leave
/// the tree exactly as it was before the call.
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("unknown node type '{type_name}' for {provider} structure")]
    UnknownType {
        provider: &'static str,
        type_name: String,
    },

    #[error("malformed node item: {reason}")]
    MalformedItem { reason: String },

    #[error("duplicate node id: {0}")]
    DuplicateId(String),

    #[error("node handle does not belong to this tree")]
    StaleHandle,

    #[error("no node with id: {0}")]
    UnknownId(String),

    #[error("cannot {op} node {id}: {reason}")]
    InvalidOperation {
        op: &'static str,
        id: String,
        reason: String,
    },

    #[error("node {id} has no {ancestor} ancestor")]
    MissingAncestor { id: String, ancestor: &'static str },

    #[error("corrupt tree: {0}")]
    Corrupt(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TreeError {
    pub(crate) fn invalid(op: &'static str, id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            op,
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedItem {
            reason: reason.into(),
        }
    }
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
