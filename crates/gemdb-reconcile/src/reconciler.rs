//! Find-or-create of package, version, and dependency rows.
//!
//! Every write follows the same two-step protocol: look the row up by its
//! uniqueness key, and insert only when absent. An insert that loses a race
//! comes back as [`StoreError::UniqueViolation`]; the reconciler then re-reads
//! the key once and continues with the winning row. Package resolution
//! additionally runs its miss path under a lock, so concurrent workers rarely
//! reach the store's constraint at all.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use gemdb_store::{GemStore, StoreError};
use gemdb_types::{
    normalize_dependencies, CanonicalDependency, DependencyKey, ExistingGem, GemCoordinates,
    Gemspec, NewVersion, PackageId, VersionId, VersionKey, VersionRow, RUBY_PLATFORM,
};

use crate::cache::{IdentityCache, InMemoryIdentityCache};
use crate::error::{ReconcileError, ReconcileResult};
use crate::report::{DependencyTally, IngestReport, Resolution};

/// Reconciles gemspecs into a [`GemStore`].
///
/// A `Reconciler` is `Send + Sync`; ingestion workers share one behind an
/// `Arc`. It performs blocking store calls and spawns nothing itself.
pub struct Reconciler {
    store: Arc<dyn GemStore>,
    cache: Arc<dyn IdentityCache>,
    /// Serializes the cache-miss path of package resolution. Shared by every
    /// reconciler built with [`Reconciler::share_identity`].
    package_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Create a reconciler with its own empty identity cache.
    pub fn new(store: Arc<dyn GemStore>) -> Self {
        Self::with_cache(store, Arc::new(InMemoryIdentityCache::new()))
    }

    /// Create a reconciler over an existing identity cache.
    ///
    /// The new reconciler gets its own package lock: concurrent misses on the
    /// same name from two reconcilers built this way are arbitrated by the
    /// store's uniqueness constraint rather than the lock. Use
    /// [`share_identity`](Self::share_identity) to share both.
    pub fn with_cache(store: Arc<dyn GemStore>, cache: Arc<dyn IdentityCache>) -> Self {
        Self {
            store,
            cache,
            package_lock: Arc::new(Mutex::new(())),
        }
    }

    /// A reconciler over `store` sharing this one's identity cache and
    /// package lock.
    pub fn share_identity(&self, store: Arc<dyn GemStore>) -> Self {
        Self {
            store,
            cache: self.cache.clone(),
            package_lock: self.package_lock.clone(),
        }
    }

    pub fn store(&self) -> &Arc<dyn GemStore> {
        &self.store
    }

    // ---------------------------------------------------------------
    // Packages
    // ---------------------------------------------------------------

    /// Return the id of the package called `name`, inserting it if needed.
    pub fn find_or_create_package(&self, name: &str) -> ReconcileResult<Resolution<PackageId>> {
        if name.trim().is_empty() {
            return Err(ReconcileError::MalformedInput("package name is empty".into()));
        }

        if let Some(id) = self.cache.get(name) {
            return Ok(Resolution::found(id));
        }

        let _guard = self
            .package_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another worker may have resolved the name while we waited.
        if let Some(id) = self.cache.get(name) {
            return Ok(Resolution::found(id));
        }

        if let Some(row) = self.store.find_package(name)? {
            self.cache.set(name, row.id);
            return Ok(Resolution::found(row.id));
        }

        match self.store.insert_package(name) {
            Ok(id) => {
                self.cache.set(name, id);
                debug!(package = name, %id, "created package");
                Ok(Resolution::created(id))
            }
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(package = name, "package insert lost a race; re-reading");
                let row = self.store.find_package(name)?.ok_or_else(|| {
                    ReconcileError::ConflictUnresolved {
                        table: "package",
                        key: name.to_string(),
                    }
                })?;
                self.cache.set(name, row.id);
                Ok(Resolution::found(row.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Side-effect-free presence check for an exact name/number/platform.
    pub fn lookup_existing(
        &self,
        package_name: &str,
        number: &str,
        platform: &str,
    ) -> ReconcileResult<Option<ExistingGem>> {
        Ok(self.store.lookup_existing(package_name, number, platform)?)
    }

    /// [`lookup_existing`](Self::lookup_existing) keyed by index coordinates.
    pub fn lookup_coordinates(
        &self,
        coordinates: &GemCoordinates,
    ) -> ReconcileResult<Option<ExistingGem>> {
        self.lookup_existing(
            &coordinates.name,
            &coordinates.number,
            &coordinates.platform,
        )
    }

    // ---------------------------------------------------------------
    // Versions
    // ---------------------------------------------------------------

    /// Return the id of `spec`'s version row under `package_id`, inserting it
    /// if needed.
    ///
    /// `platform` comes from the index and overrides the gemspec's own
    /// platform when given. `indexed` is three-valued:
    ///
    /// - on insert, `None` means indexed and only `Some(false)` stores `false`;
    /// - on an existing row, `Some(true)` promotes the flag and anything else
    ///   leaves it untouched.
    pub fn find_or_create_version<G: Gemspec + ?Sized>(
        &self,
        spec: &G,
        package_id: PackageId,
        platform: Option<&str>,
        indexed: Option<bool>,
    ) -> ReconcileResult<Resolution<VersionId>> {
        let number = required_version(spec)?;

        let package = self
            .store
            .package_by_id(package_id)?
            .ok_or(ReconcileError::UnknownPackage(package_id))?;

        let platform = resolve_platform(platform, spec.platform());
        let key = VersionKey::new(package_id, number, platform);

        if let Some(row) = self.store.find_version(&key)? {
            self.promote_indexed(&row, indexed)?;
            return Ok(Resolution::found(row.id));
        }

        let new = NewVersion::new(
            package_id,
            &package.name,
            number,
            platform,
            indexed.unwrap_or(true),
        );
        match self.store.insert_version(&new) {
            Ok(id) => {
                debug!(
                    version = %new.full_name,
                    %id,
                    indexed = new.indexed,
                    "created version"
                );
                Ok(Resolution::created(id))
            }
            Err(StoreError::UniqueViolation { .. }) => {
                debug!(version = %new.full_name, "version insert lost a race; re-reading");
                let row = self.store.find_version(&key)?.ok_or_else(|| {
                    ReconcileError::ConflictUnresolved {
                        table: "version",
                        key: new.full_name.clone(),
                    }
                })?;
                self.promote_indexed(&row, indexed)?;
                Ok(Resolution::found(row.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn promote_indexed(&self, row: &VersionRow, indexed: Option<bool>) -> ReconcileResult<()> {
        if indexed == Some(true) && !row.indexed && self.store.mark_indexed(row.id)? {
            debug!(version = %row.full_name, id = %row.id, "marked version indexed");
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Dependencies
    // ---------------------------------------------------------------

    /// Make sure a dependency row exists for every entry of `spec`'s
    /// dependency list under `version_id`.
    ///
    /// Depended-upon packages are created as placeholders when unseen. All
    /// entries are validated before anything is written.
    pub fn insert_dependencies<G: Gemspec + ?Sized>(
        &self,
        spec: &G,
        version_id: VersionId,
    ) -> ReconcileResult<()> {
        let dependencies = canonical_dependencies(spec)?;
        self.reconcile_dependencies(dependencies, version_id).map(|_| ())
    }

    fn reconcile_dependencies(
        &self,
        dependencies: Vec<CanonicalDependency>,
        version_id: VersionId,
    ) -> ReconcileResult<DependencyTally> {
        if self.store.version_by_id(version_id)?.is_none() {
            return Err(ReconcileError::UnknownVersion(version_id));
        }

        let mut tally = DependencyTally::default();
        for dep in dependencies {
            let package = self.find_or_create_package(&dep.name)?;
            tally.packages_created += usize::from(package.created);
            let key = DependencyKey {
                package_id: package.id,
                version_id,
                requirements: dep.requirement,
                scope: dep.scope,
            };

            if self.store.find_dependency(&key)?.is_some() {
                tally.existing += 1;
                continue;
            }

            match self.store.insert_dependency(&key) {
                Ok(id) => {
                    debug!(
                        dependency = %dep.name,
                        requirements = %key.requirements,
                        scope = %key.scope,
                        %version_id,
                        %id,
                        "created dependency"
                    );
                    tally.inserted += 1;
                }
                Err(StoreError::UniqueViolation { .. }) => {
                    debug!(dependency = %dep.name, %version_id, "dependency already inserted by another worker");
                    tally.existing += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(tally)
    }

    // ---------------------------------------------------------------
    // Whole gemspecs
    // ---------------------------------------------------------------

    /// Resolve package, version, and dependencies for one gemspec, in that
    /// order.
    ///
    /// The gemspec is validated in full first; malformed input writes no
    /// rows at all.
    pub fn ingest<G: Gemspec + ?Sized>(
        &self,
        spec: &G,
        platform: Option<&str>,
        indexed: Option<bool>,
    ) -> ReconcileResult<IngestReport> {
        if spec.name().trim().is_empty() {
            return Err(ReconcileError::MalformedInput("package name is empty".into()));
        }
        required_version(spec)?;
        let canonical = canonical_dependencies(spec)?;

        let package = self.find_or_create_package(spec.name())?;
        let version = self.find_or_create_version(spec, package.id, platform, indexed)?;
        let dependencies = self.reconcile_dependencies(canonical, version.id)?;
        Ok(IngestReport {
            package,
            version,
            dependencies,
        })
    }
}

fn required_version<G: Gemspec + ?Sized>(spec: &G) -> ReconcileResult<&str> {
    let number = spec.version();
    if number.trim().is_empty() {
        return Err(ReconcileError::MalformedInput(format!(
            "gemspec {} has an empty version",
            spec.name()
        )));
    }
    Ok(number)
}

fn canonical_dependencies<G: Gemspec + ?Sized>(
    spec: &G,
) -> ReconcileResult<Vec<CanonicalDependency>> {
    normalize_dependencies(spec.dependencies())
        .map_err(|e| ReconcileError::MalformedInput(format!("gemspec {}: {e}", spec.name())))
}

/// The index's platform wins; an absent or empty one falls back to the
/// gemspec's, and an empty gemspec platform means `ruby`.
fn resolve_platform<'a>(explicit: Option<&'a str>, embedded: &'a str) -> &'a str {
    match explicit.filter(|p| !p.is_empty()) {
        Some(platform) => platform,
        None if embedded.is_empty() => RUBY_PLATFORM,
        None => embedded,
    }
}
