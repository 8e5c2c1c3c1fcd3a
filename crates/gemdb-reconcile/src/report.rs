//! Outcome types returned by the reconciler.

use serde::{Deserialize, Serialize};

use gemdb_types::{PackageId, VersionId};

/// Result of a find-or-create: the row's id and whether this call inserted it.
///
/// `created` reports insertion only. Promoting an existing version's
/// `indexed` flag is not a creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution<Id> {
    pub created: bool,
    pub id: Id,
}

impl<Id> Resolution<Id> {
    /// The row was inserted by this call.
    pub fn created(id: Id) -> Self {
        Self { created: true, id }
    }

    /// The row already existed.
    pub fn found(id: Id) -> Self {
        Self { created: false, id }
    }
}

/// Dependency rows written versus already present for one version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyTally {
    pub inserted: usize,
    pub existing: usize,
    /// Depended-upon packages that had no row yet and were inserted as
    /// placeholders.
    pub packages_created: usize,
}

impl DependencyTally {
    pub fn total(&self) -> usize {
        self.inserted + self.existing
    }
}

/// Everything one gemspec ingestion resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub package: Resolution<PackageId>,
    pub version: Resolution<VersionId>,
    pub dependencies: DependencyTally,
}

impl IngestReport {
    /// Returns `true` if this ingestion wrote no new rows.
    pub fn is_noop(&self) -> bool {
        !self.package.created
            && !self.version.created
            && self.dependencies.inserted == 0
            && self.dependencies.packages_created == 0
    }

    /// Package rows this ingestion inserted, its own and placeholders.
    pub fn packages_created(&self) -> usize {
        usize::from(self.package.created) + self.dependencies.packages_created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_constructors() {
        assert!(Resolution::created(PackageId::new(1)).created);
        assert!(!Resolution::found(PackageId::new(1)).created);
    }

    #[test]
    fn noop_report() {
        let report = IngestReport {
            package: Resolution::found(PackageId::new(1)),
            version: Resolution::found(VersionId::new(2)),
            dependencies: DependencyTally {
                inserted: 0,
                existing: 3,
                packages_created: 0,
            },
        };
        assert!(report.is_noop());
        assert_eq!(report.dependencies.total(), 3);
    }

    #[test]
    fn report_serializes_ids_as_integers() {
        let report = IngestReport {
            package: Resolution::created(PackageId::new(1)),
            version: Resolution::created(VersionId::new(2)),
            dependencies: DependencyTally::default(),
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["package"]["id"], 1);
        assert_eq!(json["version"]["created"], true);
        assert!(!report.is_noop());
    }

    #[test]
    fn placeholder_packages_count_as_writes() {
        let report = IngestReport {
            package: Resolution::found(PackageId::new(1)),
            version: Resolution::found(VersionId::new(2)),
            dependencies: DependencyTally {
                inserted: 0,
                existing: 1,
                packages_created: 2,
            },
        };
        assert!(!report.is_noop());
        assert_eq!(report.packages_created(), 2);
    }
}
