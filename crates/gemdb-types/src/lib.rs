//! Foundation types for gemdb.
//!
//! This crate provides the identity, row, and gemspec types shared by the
//! store backends and the reconciler. Every other gemdb crate depends on
//! `gemdb-types`.
//!
//! # Key Types
//!
//! - [`PackageId`], [`VersionId`], [`DependencyId`] — store-assigned row identities
//! - [`DependencyScope`] — closed set of dependency kinds (`runtime`, `development`)
//! - [`Gemspec`] — capability contract consumed by the reconciler
//! - [`GemSpec`] — owned, serde-friendly gemspec value
//! - [`DependencyEntry`] — a dependency in either accepted surface shape
//! - [`CanonicalDependency`] — the normalized `{name, requirement, scope}` record
//! - [`GemCoordinates`] — `{name, number, platform, prerelease}` lookup payload

pub mod coordinates;
pub mod error;
pub mod gemspec;
pub mod ids;
pub mod record;
pub mod scope;

pub use coordinates::{full_name, is_prerelease, GemCoordinates, RUBY_PLATFORM};
pub use error::TypeError;
pub use gemspec::{
    normalize_dependencies, parse_gemspecs, CanonicalDependency, DependencyEntry, GemSpec,
    Gemspec,
};
pub use ids::{DependencyId, PackageId, VersionId};
pub use record::{
    DependencyKey, DependencyRow, ExistingGem, NewVersion, PackageRow, VersionKey, VersionRow,
};
pub use scope::DependencyScope;
