//! Find-or-create reconciliation of gemspecs into gemdb.
//!
//! Given gemspec metadata pulled from a gem index, the [`Reconciler`] makes
//! sure the package, its version, and every declared dependency exist exactly
//! once in a [`GemStore`](gemdb_store::GemStore), returning the row ids. It
//! may be called repeatedly and concurrently with the same inputs.
//!
//! # Key Types
//!
//! - [`Reconciler`] -- Find-or-create entry points and whole-gemspec ingestion
//! - [`IdentityCache`] -- Package name to id memo shared by workers
//! - [`Resolution`] -- A row id plus whether this call created it
//! - [`IngestReport`] -- What one `ingest` call resolved

pub mod cache;
pub mod error;
pub mod reconciler;
pub mod report;

pub use cache::{IdentityCache, InMemoryIdentityCache};
pub use error::{ReconcileError, ReconcileResult};
pub use reconciler::Reconciler;
pub use report::{DependencyTally, IngestReport, Resolution};
