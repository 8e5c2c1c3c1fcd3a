//! Row types for the three persisted entities and the keys that identify them.

use serde::{Deserialize, Serialize};

use crate::coordinates::{full_name, is_prerelease};
use crate::ids::{DependencyId, PackageId, VersionId};
use crate::scope::DependencyScope;

/// A row in the `package` table. `name` is globally unique.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRow {
    pub id: PackageId,
    pub name: String,
}

/// A row in the `version` table.
///
/// `(package_id, number, platform)` is the identifying triple and never
/// changes after insertion. `indexed` may only be promoted to `true`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRow {
    pub id: VersionId,
    pub package_id: PackageId,
    pub number: String,
    pub platform: String,
    pub indexed: bool,
    pub prerelease: bool,
    pub full_name: String,
}

impl VersionRow {
    pub fn key(&self) -> VersionKey {
        VersionKey {
            package_id: self.package_id,
            number: self.number.clone(),
            platform: self.platform.clone(),
        }
    }
}

/// A row in the `dependency` table.
///
/// `package_id` is the depended-upon package, `version_id` the depending
/// version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRow {
    pub id: DependencyId,
    pub package_id: PackageId,
    pub version_id: VersionId,
    pub requirements: String,
    pub scope: DependencyScope,
}

impl DependencyRow {
    pub fn key(&self) -> DependencyKey {
        DependencyKey {
            package_id: self.package_id,
            version_id: self.version_id,
            requirements: self.requirements.clone(),
            scope: self.scope,
        }
    }
}

/// Uniqueness key of a version row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionKey {
    pub package_id: PackageId,
    pub number: String,
    pub platform: String,
}

impl VersionKey {
    pub fn new(package_id: PackageId, number: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            package_id,
            number: number.into(),
            platform: platform.into(),
        }
    }
}

/// Uniqueness key of a dependency row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyKey {
    pub package_id: PackageId,
    pub version_id: VersionId,
    pub requirements: String,
    pub scope: DependencyScope,
}

/// Column values for a version insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewVersion {
    pub package_id: PackageId,
    pub number: String,
    pub platform: String,
    pub indexed: bool,
    pub prerelease: bool,
    pub full_name: String,
}

impl NewVersion {
    /// Build the insert for `package_name`'s release `number` on `platform`,
    /// deriving the descriptive columns.
    pub fn new(
        package_id: PackageId,
        package_name: &str,
        number: impl Into<String>,
        platform: impl Into<String>,
        indexed: bool,
    ) -> Self {
        let number = number.into();
        let platform = platform.into();
        Self {
            package_id,
            prerelease: is_prerelease(&number),
            full_name: full_name(package_name, &number, &platform),
            number,
            platform,
            indexed,
        }
    }

    pub fn key(&self) -> VersionKey {
        VersionKey {
            package_id: self.package_id,
            number: self.number.clone(),
            platform: self.platform.clone(),
        }
    }
}

/// Result of a presence check: the package and version ids of an existing
/// release.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExistingGem {
    pub package_id: PackageId,
    pub version_id: VersionId,
}
