//! Behavior every [`GemStore`] backend must share. Each backend's test module
//! runs these against a fresh instance.

use gemdb_types::{DependencyKey, DependencyScope, NewVersion, PackageId, VersionId, VersionKey};

use crate::error::StoreError;
use crate::traits::{GemStore, StoreCounts};

fn runtime_dep(package_id: PackageId, version_id: VersionId, requirements: &str) -> DependencyKey {
    DependencyKey {
        package_id,
        version_id,
        requirements: requirements.to_string(),
        scope: DependencyScope::Runtime,
    }
}

pub fn package_names_are_unique(store: &dyn GemStore) {
    let id = store.insert_package("foo").unwrap();
    let err = store.insert_package("foo").unwrap_err();
    assert!(err.is_unique_violation(), "expected unique violation, got: {err}");

    let row = store.find_package("foo").unwrap().expect("package should exist");
    assert_eq!(row.id, id);
    assert_eq!(store.package_by_id(id).unwrap().unwrap().name, "foo");
    assert!(store.find_package("bar").unwrap().is_none());
}

pub fn version_triples_are_unique(store: &dyn GemStore) {
    let foo = store.insert_package("foo").unwrap();
    let ruby = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
        .unwrap();
    let java = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "java", false))
        .unwrap();
    assert_ne!(ruby, java);

    // Same triple with a different indexed flag is still a duplicate.
    let err = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", false))
        .unwrap_err();
    assert!(err.is_unique_violation(), "expected unique violation, got: {err}");

    let row = store
        .find_version(&VersionKey::new(foo, "1.0", "java"))
        .unwrap()
        .expect("version should exist");
    assert_eq!(row.id, java);
    assert!(!row.indexed);
    assert_eq!(row.full_name, "foo-1.0-java");
    assert_eq!(store.version_by_id(ruby).unwrap().unwrap().platform, "ruby");
}

pub fn version_requires_existing_package(store: &dyn GemStore) {
    let err = store
        .insert_version(&NewVersion::new(PackageId::new(999), "ghost", "1.0", "ruby", true))
        .unwrap_err();
    assert!(
        matches!(err, StoreError::ForeignKeyViolation { table: "version" }),
        "expected foreign key violation, got: {err}"
    );
}

pub fn mark_indexed_promotes_once(store: &dyn GemStore) {
    let foo = store.insert_package("foo").unwrap();
    let v = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", false))
        .unwrap();

    assert!(store.mark_indexed(v).unwrap());
    assert!(!store.mark_indexed(v).unwrap());
    assert!(store.version_by_id(v).unwrap().unwrap().indexed);
}

pub fn mark_indexed_unknown_row(store: &dyn GemStore) {
    let err = store.mark_indexed(VersionId::new(4242)).unwrap_err();
    assert!(
        matches!(err, StoreError::RowNotFound { table: "version", id: 4242 }),
        "expected row not found, got: {err}"
    );
}

pub fn dependency_keys_are_unique(store: &dyn GemStore) {
    let foo = store.insert_package("foo").unwrap();
    let bar = store.insert_package("bar").unwrap();
    let v = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
        .unwrap();

    let key = runtime_dep(bar, v, "~> 1.0");
    let id = store.insert_dependency(&key).unwrap();
    let err = store.insert_dependency(&key).unwrap_err();
    assert!(err.is_unique_violation(), "expected unique violation, got: {err}");

    let row = store.find_dependency(&key).unwrap().expect("dependency should exist");
    assert_eq!(row.id, id);
    assert_eq!(row.key(), key);

    let other = runtime_dep(bar, v, ">= 2.0");
    assert!(store.find_dependency(&other).unwrap().is_none());
    store.insert_dependency(&other).unwrap();
    assert_eq!(store.dependencies_of(v).unwrap().len(), 2);
}

pub fn dependency_scope_is_part_of_key(store: &dyn GemStore) {
    let foo = store.insert_package("foo").unwrap();
    let rspec = store.insert_package("rspec").unwrap();
    let v = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
        .unwrap();

    let runtime = runtime_dep(rspec, v, ">= 0");
    let development = DependencyKey {
        scope: DependencyScope::Development,
        ..runtime.clone()
    };
    store.insert_dependency(&runtime).unwrap();
    store.insert_dependency(&development).unwrap();

    let scopes: Vec<DependencyScope> = store
        .dependencies_of(v)
        .unwrap()
        .into_iter()
        .map(|dep| dep.scope)
        .collect();
    assert_eq!(scopes, vec![DependencyScope::Runtime, DependencyScope::Development]);
}

pub fn lookup_existing_requires_exact_match(store: &dyn GemStore) {
    assert!(store.lookup_existing("foo", "1.0", "ruby").unwrap().is_none());

    let foo = store.insert_package("foo").unwrap();
    assert!(store.lookup_existing("foo", "1.0", "ruby").unwrap().is_none());

    let v = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
        .unwrap();
    let found = store.lookup_existing("foo", "1.0", "ruby").unwrap().unwrap();
    assert_eq!(found.package_id, foo);
    assert_eq!(found.version_id, v);

    assert!(store.lookup_existing("foo", "1.0", "java").unwrap().is_none());
    assert!(store.lookup_existing("foo", "1.1", "ruby").unwrap().is_none());
    assert!(store.lookup_existing("fo", "1.0", "ruby").unwrap().is_none());
}

pub fn counts_track_inserts(store: &dyn GemStore) {
    assert_eq!(store.counts().unwrap(), StoreCounts::default());

    let foo = store.insert_package("foo").unwrap();
    let bar = store.insert_package("bar").unwrap();
    let v = store
        .insert_version(&NewVersion::new(foo, "foo", "1.0", "ruby", true))
        .unwrap();
    store.insert_dependency(&runtime_dep(bar, v, "~> 1.0")).unwrap();
    let _ = store.insert_package("foo");

    assert_eq!(
        store.counts().unwrap(),
        StoreCounts {
            packages: 2,
            versions: 1,
            dependencies: 1,
        }
    );
}
