//! SQLite-backed [`GemStore`].
//!
//! Uniqueness and foreign-key rules are enforced by the schema itself, so
//! several processes sharing one database file still converge on a single
//! row per key. Constraint failures are mapped onto
//! [`StoreError::UniqueViolation`] and [`StoreError::ForeignKeyViolation`].

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use gemdb_types::{
    DependencyId, DependencyKey, DependencyRow, DependencyScope, ExistingGem, NewVersion,
    PackageId, PackageRow, VersionId, VersionKey, VersionRow,
};

use crate::error::{StoreError, StoreResult};
use crate::traits::{GemStore, StoreCounts};

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS package (
    id   INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS version (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER NOT NULL REFERENCES package(id),
    number     TEXT NOT NULL,
    platform   TEXT NOT NULL,
    indexed    INTEGER NOT NULL DEFAULT 1,
    prerelease INTEGER NOT NULL DEFAULT 0,
    full_name  TEXT NOT NULL,
    UNIQUE (package_id, number, platform)
);

CREATE TABLE IF NOT EXISTS dependency (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id   INTEGER NOT NULL REFERENCES package(id),
    version_id   INTEGER NOT NULL REFERENCES version(id),
    requirements TEXT NOT NULL,
    scope        TEXT NOT NULL CHECK (scope IN ('runtime', 'development')),
    UNIQUE (package_id, version_id, requirements, scope)
);

CREATE INDEX IF NOT EXISTS dependency_version_idx ON dependency (version_id);
";

const VERSION_COLUMNS: &str = "id, package_id, number, platform, indexed, prerelease, full_name";
const DEPENDENCY_COLUMNS: &str = "id, package_id, version_id, requirements, scope";

/// SQLite implementation of [`GemStore`].
#[derive(Debug)]
pub struct SqliteGemStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteGemStore {
    /// Open (or create) a database at `path`, creating missing parent
    /// directories and tables.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(unavailable)?;
        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        debug!(path = %path.display(), "opened sqlite gem store");
        Ok(store)
    }

    /// Create a private in-memory database.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        let store = Self {
            conn: Mutex::new(conn),
            path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// The database file, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn initialize(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        // In-memory databases answer `memory` and keep that mode.
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(journal_mode = %mode, "sqlite journal mode");
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }
}

fn unavailable(err: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

/// Map an insert failure, recognizing the constraint violations callers are
/// expected to handle.
fn classify_insert_error(table: &'static str, err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    return StoreError::UniqueViolation { table };
                }
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => {
                    return StoreError::ForeignKeyViolation { table };
                }
                _ => {}
            }
        }
    }
    StoreError::Sqlite(err)
}

fn version_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VersionRow> {
    Ok(VersionRow {
        id: VersionId::new(row.get(0)?),
        package_id: PackageId::new(row.get(1)?),
        number: row.get(2)?,
        platform: row.get(3)?,
        indexed: row.get(4)?,
        prerelease: row.get(5)?,
        full_name: row.get(6)?,
    })
}

type RawDependency = (i64, i64, i64, String, String);

fn raw_dependency(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDependency> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn dependency_from_raw(raw: RawDependency) -> StoreResult<DependencyRow> {
    let (id, package_id, version_id, requirements, scope) = raw;
    let scope: DependencyScope = scope.parse().map_err(|e| StoreError::Corrupt {
        table: "dependency",
        reason: format!("row {id}: {e}"),
    })?;
    Ok(DependencyRow {
        id: DependencyId::new(id),
        package_id: PackageId::new(package_id),
        version_id: VersionId::new(version_id),
        requirements,
        scope,
    })
}

impl GemStore for SqliteGemStore {
    fn find_package(&self, name: &str) -> StoreResult<Option<PackageRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name FROM package WHERE name = ?1",
                params![name],
                |row| {
                    Ok(PackageRow {
                        id: PackageId::new(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn package_by_id(&self, id: PackageId) -> StoreResult<Option<PackageRow>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT id, name FROM package WHERE id = ?1",
                params![id.get()],
                |row| {
                    Ok(PackageRow {
                        id: PackageId::new(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn insert_package(&self, name: &str) -> StoreResult<PackageId> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO package (name) VALUES (?1)", params![name])
            .map_err(|e| classify_insert_error("package", e))?;
        Ok(PackageId::new(conn.last_insert_rowid()))
    }

    fn find_version(&self, key: &VersionKey) -> StoreResult<Option<VersionRow>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM version
             WHERE package_id = ?1 AND number = ?2 AND platform = ?3"
        );
        let row = conn
            .query_row(
                &sql,
                params![key.package_id.get(), key.number, key.platform],
                version_from_row,
            )
            .optional()?;
        Ok(row)
    }

    fn version_by_id(&self, id: VersionId) -> StoreResult<Option<VersionRow>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {VERSION_COLUMNS} FROM version WHERE id = ?1");
        let row = conn
            .query_row(&sql, params![id.get()], version_from_row)
            .optional()?;
        Ok(row)
    }

    fn insert_version(&self, version: &NewVersion) -> StoreResult<VersionId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO version (package_id, number, platform, indexed, prerelease, full_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                version.package_id.get(),
                version.number,
                version.platform,
                version.indexed,
                version.prerelease,
                version.full_name,
            ],
        )
        .map_err(|e| classify_insert_error("version", e))?;
        Ok(VersionId::new(conn.last_insert_rowid()))
    }

    fn mark_indexed(&self, id: VersionId) -> StoreResult<bool> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE version SET indexed = 1 WHERE id = ?1 AND indexed = 0",
            params![id.get()],
        )?;
        if changed > 0 {
            return Ok(true);
        }
        let exists = conn
            .query_row("SELECT 1 FROM version WHERE id = ?1", params![id.get()], |_| Ok(()))
            .optional()?
            .is_some();
        if exists {
            Ok(false)
        } else {
            Err(StoreError::RowNotFound {
                table: "version",
                id: id.get(),
            })
        }
    }

    fn find_dependency(&self, key: &DependencyKey) -> StoreResult<Option<DependencyRow>> {
        let raw = {
            let conn = self.conn()?;
            let sql = format!(
                "SELECT {DEPENDENCY_COLUMNS} FROM dependency
                 WHERE package_id = ?1 AND version_id = ?2 AND requirements = ?3 AND scope = ?4"
            );
            conn.query_row(
                &sql,
                params![
                    key.package_id.get(),
                    key.version_id.get(),
                    key.requirements,
                    key.scope.as_str(),
                ],
                raw_dependency,
            )
            .optional()?
        };
        raw.map(dependency_from_raw).transpose()
    }

    fn insert_dependency(&self, key: &DependencyKey) -> StoreResult<DependencyId> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO dependency (package_id, version_id, requirements, scope)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                key.package_id.get(),
                key.version_id.get(),
                key.requirements,
                key.scope.as_str(),
            ],
        )
        .map_err(|e| classify_insert_error("dependency", e))?;
        Ok(DependencyId::new(conn.last_insert_rowid()))
    }

    fn dependencies_of(&self, version_id: VersionId) -> StoreResult<Vec<DependencyRow>> {
        let raws = {
            let conn = self.conn()?;
            let sql = format!(
                "SELECT {DEPENDENCY_COLUMNS} FROM dependency WHERE version_id = ?1 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![version_id.get()], raw_dependency)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };
        raws.into_iter().map(dependency_from_raw).collect()
    }

    fn counts(&self) -> StoreResult<StoreCounts> {
        let conn = self.conn()?;
        let count = |table: &str| -> StoreResult<u64> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(StoreCounts {
            packages: count("package")?,
            versions: count("version")?,
            dependencies: count("dependency")?,
        })
    }

    fn lookup_existing(
        &self,
        package_name: &str,
        number: &str,
        platform: &str,
    ) -> StoreResult<Option<ExistingGem>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT p.id, v.id FROM package p
                 JOIN version v ON v.package_id = p.id
                 WHERE p.name = ?1 AND v.number = ?2 AND v.platform = ?3",
                params![package_name, number, platform],
                |row| {
                    Ok(ExistingGem {
                        package_id: PackageId::new(row.get(0)?),
                        version_id: VersionId::new(row.get(1)?),
                    })
                },
            )
            .optional()?;
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance;

    fn store() -> SqliteGemStore {
        SqliteGemStore::in_memory().unwrap()
    }

    #[test]
    fn package_names_are_unique() {
        conformance::package_names_are_unique(&store());
    }

    #[test]
    fn version_triples_are_unique() {
        conformance::version_triples_are_unique(&store());
    }

    #[test]
    fn version_requires_existing_package() {
        conformance::version_requires_existing_package(&store());
    }

    #[test]
    fn mark_indexed_promotes_once() {
        conformance::mark_indexed_promotes_once(&store());
    }

    #[test]
    fn mark_indexed_unknown_row() {
        conformance::mark_indexed_unknown_row(&store());
    }

    #[test]
    fn dependency_keys_are_unique() {
        conformance::dependency_keys_are_unique(&store());
    }

    #[test]
    fn dependency_scope_is_part_of_key() {
        conformance::dependency_scope_is_part_of_key(&store());
    }

    #[test]
    fn lookup_existing_requires_exact_match() {
        conformance::lookup_existing_requires_exact_match(&store());
    }

    #[test]
    fn counts_track_inserts() {
        conformance::counts_track_inserts(&store());
    }

    #[test]
    fn reopened_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gems.db");

        let id = {
            let store = SqliteGemStore::open(&path).unwrap();
            assert_eq!(store.path(), Some(path.as_path()));
            store.insert_package("foo").unwrap()
        };

        let store = SqliteGemStore::open(&path).unwrap();
        assert_eq!(store.find_package("foo").unwrap().unwrap().id, id);
        assert!(store.insert_package("foo").unwrap_err().is_unique_violation());
    }

    fn journal_mode(store: &SqliteGemStore) -> String {
        store
            .conn()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn file_store_uses_wal_journal() {
        let dir = tempfile::tempdir().unwrap();
        let file = SqliteGemStore::open(dir.path().join("gems.db")).unwrap();
        assert_eq!(journal_mode(&file), "wal");
        assert_eq!(journal_mode(&store()), "memory");
    }

    #[test]
    fn two_connections_share_constraints() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gems.db");
        let a = SqliteGemStore::open(&path).unwrap();
        let b = SqliteGemStore::open(&path).unwrap();

        let foo = a.insert_package("foo").unwrap();
        assert!(b.insert_package("foo").unwrap_err().is_unique_violation());

        a.insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
            .unwrap();
        let err = b
            .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
            .unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[test]
    fn unknown_scope_is_reported_as_corrupt() {
        let store = store();
        let foo = store.insert_package("foo").unwrap();
        let v = store
            .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
            .unwrap();
        {
            let conn = store.conn().unwrap();
            conn.execute_batch("PRAGMA ignore_check_constraints = ON;").unwrap();
            conn.execute(
                "INSERT INTO dependency (package_id, version_id, requirements, scope)
                 VALUES (?1, ?2, '>= 0', 'optional')",
                params![foo.get(), v.get()],
            )
            .unwrap();
        }

        let err = store.dependencies_of(v).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { table: "dependency", .. }), "{err}");
    }
}
