use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use gemdb_types::{
    DependencyId, DependencyKey, DependencyRow, NewVersion, PackageId, PackageRow, VersionId,
    VersionKey, VersionRow,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{GemStore, StoreCounts};

/// In-memory store with the same uniqueness and foreign-key rules as the
/// relational schema.
///
/// Intended for tests and embedding. All tables live behind a single
/// `RwLock`, so each insert checks its constraints and writes atomically.
pub struct InMemoryGemStore {
    state: RwLock<MemoryState>,
    unavailable: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    packages: BTreeMap<PackageId, PackageRow>,
    package_names: HashMap<String, PackageId>,
    versions: BTreeMap<VersionId, VersionRow>,
    version_keys: HashMap<VersionKey, VersionId>,
    dependencies: BTreeMap<DependencyId, DependencyRow>,
    dependency_keys: HashMap<DependencyKey, DependencyId>,
    last_id: i64,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

impl InMemoryGemStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(MemoryState::default()),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Simulate a lost backend: while set, every operation fails with
    /// [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of every version row, ordered by id.
    pub fn all_versions(&self) -> StoreResult<Vec<VersionRow>> {
        Ok(self.read()?.versions.values().cloned().collect())
    }

    /// Snapshot of every dependency row, ordered by id.
    pub fn all_dependencies(&self) -> StoreResult<Vec<DependencyRow>> {
        Ok(self.read()?.dependencies.values().cloned().collect())
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, MemoryState>> {
        self.check_available()?;
        self.state
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, MemoryState>> {
        self.check_available()?;
        self.state
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryGemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GemStore for InMemoryGemStore {
    fn find_package(&self, name: &str) -> StoreResult<Option<PackageRow>> {
        let state = self.read()?;
        Ok(state
            .package_names
            .get(name)
            .and_then(|id| state.packages.get(id))
            .cloned())
    }

    fn package_by_id(&self, id: PackageId) -> StoreResult<Option<PackageRow>> {
        Ok(self.read()?.packages.get(&id).cloned())
    }

    fn insert_package(&self, name: &str) -> StoreResult<PackageId> {
        let mut state = self.write()?;
        if state.package_names.contains_key(name) {
            return Err(StoreError::UniqueViolation { table: "package" });
        }
        let id = PackageId::new(state.next_id());
        state.package_names.insert(name.to_string(), id);
        state.packages.insert(
            id,
            PackageRow {
                id,
                name: name.to_string(),
            },
        );
        Ok(id)
    }

    fn find_version(&self, key: &VersionKey) -> StoreResult<Option<VersionRow>> {
        let state = self.read()?;
        Ok(state
            .version_keys
            .get(key)
            .and_then(|id| state.versions.get(id))
            .cloned())
    }

    fn version_by_id(&self, id: VersionId) -> StoreResult<Option<VersionRow>> {
        Ok(self.read()?.versions.get(&id).cloned())
    }

    fn insert_version(&self, version: &NewVersion) -> StoreResult<VersionId> {
        let mut state = self.write()?;
        if !state.packages.contains_key(&version.package_id) {
            return Err(StoreError::ForeignKeyViolation { table: "version" });
        }
        let key = version.key();
        if state.version_keys.contains_key(&key) {
            return Err(StoreError::UniqueViolation { table: "version" });
        }
        let id = VersionId::new(state.next_id());
        state.version_keys.insert(key, id);
        state.versions.insert(
            id,
            VersionRow {
                id,
                package_id: version.package_id,
                number: version.number.clone(),
                platform: version.platform.clone(),
                indexed: version.indexed,
                prerelease: version.prerelease,
                full_name: version.full_name.clone(),
            },
        );
        Ok(id)
    }

    fn mark_indexed(&self, id: VersionId) -> StoreResult<bool> {
        let mut state = self.write()?;
        let row = state.versions.get_mut(&id).ok_or(StoreError::RowNotFound {
            table: "version",
            id: id.get(),
        })?;
        let changed = !row.indexed;
        row.indexed = true;
        Ok(changed)
    }

    fn find_dependency(&self, key: &DependencyKey) -> StoreResult<Option<DependencyRow>> {
        let state = self.read()?;
        Ok(state
            .dependency_keys
            .get(key)
            .and_then(|id| state.dependencies.get(id))
            .cloned())
    }

    fn insert_dependency(&self, key: &DependencyKey) -> StoreResult<DependencyId> {
        let mut state = self.write()?;
        if !state.packages.contains_key(&key.package_id)
            || !state.versions.contains_key(&key.version_id)
        {
            return Err(StoreError::ForeignKeyViolation { table: "dependency" });
        }
        if state.dependency_keys.contains_key(key) {
            return Err(StoreError::UniqueViolation { table: "dependency" });
        }
        let id = DependencyId::new(state.next_id());
        state.dependency_keys.insert(key.clone(), id);
        state.dependencies.insert(
            id,
            DependencyRow {
                id,
                package_id: key.package_id,
                version_id: key.version_id,
                requirements: key.requirements.clone(),
                scope: key.scope,
            },
        );
        Ok(id)
    }

    fn dependencies_of(&self, version_id: VersionId) -> StoreResult<Vec<DependencyRow>> {
        Ok(self
            .read()?
            .dependencies
            .values()
            .filter(|dep| dep.version_id == version_id)
            .cloned()
            .collect())
    }

    fn counts(&self) -> StoreResult<StoreCounts> {
        let state = self.read()?;
        Ok(StoreCounts {
            packages: state.packages.len() as u64,
            versions: state.versions.len() as u64,
            dependencies: state.dependencies.len() as u64,
        })
    }
}

impl std::fmt::Debug for InMemoryGemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("InMemoryGemStore");
        if let Ok(counts) = self.counts() {
            s.field("packages", &counts.packages)
                .field("versions", &counts.versions)
                .field("dependencies", &counts.dependencies);
        }
        s.finish()
    }
}
