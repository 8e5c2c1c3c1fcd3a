//! Error types for the reconcile crate.

use gemdb_types::{PackageId, TypeError, VersionId};

/// Errors surfaced by the reconciler.
///
/// Duplicate-insert races never appear here: they are resolved internally by
/// re-reading the winning row.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The gemspec or an argument is missing a required value.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A version was resolved against a package id with no row.
    #[error("unknown package id: {0}")]
    UnknownPackage(PackageId),

    /// Dependencies were inserted for a version id with no row.
    #[error("unknown version id: {0}")]
    UnknownVersion(VersionId),

    /// An insert hit a uniqueness constraint but the row it collided with
    /// could not be read back.
    #[error("{table} insert conflicted but no existing row matches {key}")]
    ConflictUnresolved { table: &'static str, key: String },

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] gemdb_store::StoreError),
}

impl From<TypeError> for ReconcileError {
    fn from(err: TypeError) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

impl ReconcileError {
    /// Returns `true` for errors caused by the caller's input rather than the
    /// store.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::MalformedInput(_) | Self::UnknownPackage(_) | Self::UnknownVersion(_)
        )
    }
}

/// Convenience alias for reconcile results.
pub type ReconcileResult<T> = Result<T, ReconcileError>;
