/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An insert collided with an existing row on a uniqueness constraint.
    ///
    /// This is the expected outcome of two workers racing on the same key;
    /// callers recover by re-reading the winning row.
    #[error("unique constraint violated on {table}")]
    UniqueViolation { table: &'static str },

    /// An insert referenced a parent row that does not exist.
    #[error("foreign key constraint violated on {table}")]
    ForeignKeyViolation { table: &'static str },

    /// An update targeted a row id that does not exist.
    #[error("{table} row {id} not found")]
    RowNotFound { table: &'static str, id: i64 },

    /// A persisted value could not be decoded.
    #[error("corrupt {table} row: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// The backend cannot serve requests (connection lost, closed, etc.).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A lock guarding backend state was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other SQLite failure.
    #[cfg(feature = "sqlite")]
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// Returns `true` for the recoverable duplicate-insert case.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
