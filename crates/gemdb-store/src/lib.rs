//! Relational storage for gemdb.
//!
//! Three tables hold everything ever ingested:
//!
//! - `package(id, name UNIQUE)`
//! - `version(id, package_id, number, platform, indexed, prerelease, full_name,
//!   UNIQUE(package_id, number, platform))`
//! - `dependency(id, package_id, version_id, requirements, scope,
//!   UNIQUE(package_id, version_id, requirements, scope))`
//!
//! # Storage Backends
//!
//! All backends implement the [`GemStore`] trait:
//!
//! - [`InMemoryGemStore`] -- map-based store for tests and embedding
//! - [`SqliteGemStore`] -- SQLite database file (feature `sqlite`, on by default)
//!
//! # Design Rules
//!
//! 1. The store's uniqueness constraints are authoritative. A duplicate insert
//!    is reported as [`StoreError::UniqueViolation`], never silently merged.
//! 2. Rows are never deleted and identifying columns never change.
//! 3. Absent rows are `Ok(None)`; `Err` always means the backend failed or a
//!    constraint rejected the write.
//! 4. All I/O errors are propagated, never silently ignored.

#[cfg(test)]
mod conformance;
pub mod error;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryGemStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteGemStore;
pub use traits::{GemStore, StoreCounts};
