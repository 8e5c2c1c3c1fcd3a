use serde::{Deserialize, Serialize};

use gemdb_types::{
    DependencyId, DependencyKey, DependencyRow, ExistingGem, NewVersion, PackageId, PackageRow,
    VersionId, VersionKey, VersionRow,
};

use crate::error::StoreResult;

/// Row counts per table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub packages: u64,
    pub versions: u64,
    pub dependencies: u64,
}

/// Relational store holding packages, versions, and dependencies.
///
/// All implementations must satisfy these invariants:
/// - `package.name` is unique; `insert_package` on an existing name fails
///   with [`StoreError::UniqueViolation`](crate::StoreError::UniqueViolation).
/// - `(package_id, number, platform)` is unique among versions.
/// - `(package_id, version_id, requirements, scope)` is unique among
///   dependencies.
/// - Inserts referencing a missing parent row fail with
///   [`StoreError::ForeignKeyViolation`](crate::StoreError::ForeignKeyViolation).
/// - Rows are never deleted, and the identifying columns of a row never
///   change.
/// - Lookups return `Ok(None)` for absent rows; `Err` is reserved for backend
///   failures.
pub trait GemStore: Send + Sync {
    fn find_package(&self, name: &str) -> StoreResult<Option<PackageRow>>;

    fn package_by_id(&self, id: PackageId) -> StoreResult<Option<PackageRow>>;

    /// Insert a package row and return its id.
    fn insert_package(&self, name: &str) -> StoreResult<PackageId>;

    fn find_version(&self, key: &VersionKey) -> StoreResult<Option<VersionRow>>;

    fn version_by_id(&self, id: VersionId) -> StoreResult<Option<VersionRow>>;

    /// Insert a version row and return its id.
    fn insert_version(&self, version: &NewVersion) -> StoreResult<VersionId>;

    /// Set `indexed = true` on a version.
    ///
    /// Returns `true` if the flag changed, `false` if it was already set.
    fn mark_indexed(&self, id: VersionId) -> StoreResult<bool>;

    fn find_dependency(&self, key: &DependencyKey) -> StoreResult<Option<DependencyRow>>;

    /// Insert a dependency row and return its id.
    fn insert_dependency(&self, key: &DependencyKey) -> StoreResult<DependencyId>;

    /// All dependency rows whose depending version is `version_id`, ordered
    /// by id.
    fn dependencies_of(&self, version_id: VersionId) -> StoreResult<Vec<DependencyRow>>;

    fn counts(&self) -> StoreResult<StoreCounts>;

    /// Exact-match presence check joining package and version.
    ///
    /// Default implementation issues two lookups. Backends may override with
    /// a single joined query.
    fn lookup_existing(
        &self,
        package_name: &str,
        number: &str,
        platform: &str,
    ) -> StoreResult<Option<ExistingGem>> {
        let Some(package) = self.find_package(package_name)? else {
            return Ok(None);
        };
        let key = VersionKey::new(package.id, number, platform);
        Ok(self.find_version(&key)?.map(|version| ExistingGem {
            package_id: package.id,
            version_id: version.id,
        }))
    }
}
