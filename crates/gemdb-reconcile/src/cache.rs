//! Process-wide name → package-id memo.
//!
//! The cache only saves store round trips. A miss costs a lookup, never a
//! wrong answer, because the store's uniqueness constraint on package names
//! stays authoritative. No eviction is performed.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use gemdb_types::PackageId;

/// Get/set contract of the identity cache.
pub trait IdentityCache: Send + Sync {
    fn get(&self, name: &str) -> Option<PackageId>;

    fn set(&self, name: &str, id: PackageId);
}

impl<C: IdentityCache + ?Sized> IdentityCache for Arc<C> {
    fn get(&self, name: &str) -> Option<PackageId> {
        (**self).get(name)
    }

    fn set(&self, name: &str, id: PackageId) {
        (**self).set(name, id)
    }
}

/// `HashMap` behind a `RwLock`. Hits take only the read lock.
#[derive(Debug, Default)]
pub struct InMemoryIdentityCache {
    entries: RwLock<HashMap<String, PackageId>>,
}

impl InMemoryIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached names.
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(map) => map.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// A poisoned lock still guards a consistent map: every write is a single
// `insert`, so the poison flag is ignored rather than turned into a miss.
impl IdentityCache for InMemoryIdentityCache {
    fn get(&self, name: &str) -> Option<PackageId> {
        match self.entries.read() {
            Ok(map) => map.get(name).copied(),
            Err(poisoned) => poisoned.into_inner().get(name).copied(),
        }
    }

    fn set(&self, name: &str, id: PackageId) {
        let mut map = match self.entries.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.insert(name.to_string(), id);
    }
}
