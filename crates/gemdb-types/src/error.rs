use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("unknown dependency scope: {0}")]
    UnknownScope(String),

    #[error("dependency entry {index} has an empty {field}")]
    EmptyDependencyField { index: usize, field: &'static str },

    #[error("serialization error: {0}")]
    Serialization(String),
}
