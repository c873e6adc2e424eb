//! # Dependency Watch Registry
//!
//! Reverse index from a watched secondary object to the primary resources
//! that must be reconciled when that object changes.
//!
//! All mutation goes through [`DependencyRegistry::ensure_watched`] and
//! [`DependencyRegistry::ensure_watched_multi_kind`]. Both take the write lock
//! for their whole duration so additions and stale-entry removals land
//! atomically. Readers get a deep copy via [`DependencyRegistry::snapshot`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Namespaced identity of a Kubernetes object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A secondary object being observed, identified by kind and key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchedObject {
    pub kind: String,
    pub key: ObjectKey,
}

impl WatchedObject {
    #[must_use]
    pub fn new(kind: impl Into<String>, key: ObjectKey) -> Self {
        Self {
            kind: kind.into(),
            key,
        }
    }
}

impl fmt::Display for WatchedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.key)
    }
}

/// One kind's worth of watched objects for [`DependencyRegistry::ensure_watched_multi_kind`]
#[derive(Debug, Clone)]
pub struct KindWatches {
    pub kind: String,
    pub watched: Vec<ObjectKey>,
}

impl KindWatches {
    #[must_use]
    pub fn new(kind: impl Into<String>, watched: impl IntoIterator<Item = ObjectKey>) -> Self {
        Self {
            kind: kind.into(),
            watched: watched.into_iter().collect(),
        }
    }
}

/// Point-in-time copy of the index. Ordered so diagnostics and test
/// assertions are stable.
pub type RegistrySnapshot = BTreeMap<WatchedObject, Vec<ObjectKey>>;

#[derive(Debug, Default)]
pub struct DependencyRegistry {
    index: RwLock<HashMap<WatchedObject, HashSet<ObjectKey>>>,
}

impl DependencyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `dependent` currently needs exactly `watched` objects of
    /// `kind` tracked. Previously tracked objects of the same kind that are
    /// not in `watched` lose `dependent`. An empty `watched` clears the kind.
    pub fn ensure_watched<I>(&self, dependent: &ObjectKey, kind: &str, watched: I)
    where
        I: IntoIterator<Item = ObjectKey>,
    {
        let desired: HashSet<ObjectKey> = watched.into_iter().collect();
        let mut index = self.write();
        replace_kind(&mut index, dependent, kind, &desired);
    }

    /// Same contract as [`Self::ensure_watched`] across several kinds in one
    /// atomic pass. Entries that repeat a kind are merged.
    pub fn ensure_watched_multi_kind<I>(&self, dependent: &ObjectKey, entries: I)
    where
        I: IntoIterator<Item = KindWatches>,
    {
        let mut by_kind: HashMap<String, HashSet<ObjectKey>> = HashMap::new();
        for entry in entries {
            by_kind.entry(entry.kind).or_default().extend(entry.watched);
        }

        let mut index = self.write();
        for (kind, desired) in &by_kind {
            replace_kind(&mut index, dependent, kind, desired);
        }
    }

    /// Drop `dependent` from every watched object of every kind
    pub fn forget(&self, dependent: &ObjectKey) {
        let mut index = self.write();
        index.retain(|_, dependents| {
            dependents.remove(dependent);
            !dependents.is_empty()
        });
    }

    /// Dependents registered for `watched`, sorted
    #[must_use]
    pub fn dependents_of(&self, watched: &WatchedObject) -> Vec<ObjectKey> {
        let index = self.read();
        let mut dependents: Vec<ObjectKey> = index
            .get(watched)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        dependents.sort();
        dependents
    }

    #[must_use]
    pub fn snapshot(&self) -> RegistrySnapshot {
        let index = self.read();
        index
            .iter()
            .map(|(watched, dependents)| {
                let mut dependents: Vec<ObjectKey> = dependents.iter().cloned().collect();
                dependents.sort();
                (watched.clone(), dependents)
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // The index holds no invariants that a panicking writer could break
    // half-way (every mutation is a set insert/remove), so a poisoned lock is
    // still usable.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<WatchedObject, HashSet<ObjectKey>>> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<WatchedObject, HashSet<ObjectKey>>> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn replace_kind(
    index: &mut HashMap<WatchedObject, HashSet<ObjectKey>>,
    dependent: &ObjectKey,
    kind: &str,
    desired: &HashSet<ObjectKey>,
) {
    index.retain(|watched, dependents| {
        if watched.kind == kind && !desired.contains(&watched.key) {
            dependents.remove(dependent);
        }
        !dependents.is_empty()
    });

    for key in desired {
        index
            .entry(WatchedObject::new(kind, key.clone()))
            .or_default()
            .insert(dependent.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn key(name: &str) -> ObjectKey {
        ObjectKey::new("ns", name)
    }

    fn secret(name: &str) -> WatchedObject {
        WatchedObject::new("Secret", key(name))
    }

    #[test]
    fn test_ensure_watched_is_idempotent() {
        let registry = DependencyRegistry::new();
        let user = key("user");

        registry.ensure_watched(&user, "Secret", vec![key("a"), key("b")]);
        let first = registry.snapshot();
        registry.ensure_watched(&user, "Secret", vec![key("a"), key("b")]);

        assert_eq!(first, registry.snapshot());
    }

    #[test]
    fn test_ensure_watched_replaces_stale_entries() {
        let registry = DependencyRegistry::new();
        let user = key("user");
        let other = key("other");

        registry.ensure_watched(&other, "Secret", vec![key("a")]);
        registry.ensure_watched(&user, "Secret", vec![key("a"), key("b")]);
        registry.ensure_watched(&user, "Secret", vec![key("a"), key("c")]);

        assert_eq!(registry.dependents_of(&secret("a")), vec![other.clone(), user.clone()]);
        assert!(registry.dependents_of(&secret("b")).is_empty());
        assert_eq!(registry.dependents_of(&secret("c")), vec![user]);
        assert!(!registry.snapshot().contains_key(&secret("b")));
    }

    #[test]
    fn test_empty_declaration_clears_kind_only() {
        let registry = DependencyRegistry::new();
        let user = key("user");

        registry.ensure_watched(&user, "Secret", vec![key("a")]);
        registry.ensure_watched(&user, "ConfigMap", vec![key("a")]);
        registry.ensure_watched(&user, "Secret", Vec::new());

        let snapshot = registry.snapshot();
        assert!(!snapshot.contains_key(&secret("a")));
        assert_eq!(
            snapshot.get(&WatchedObject::new("ConfigMap", key("a"))),
            Some(&vec![user])
        );
    }

    #[test]
    fn test_multi_kind_replaces_each_kind() {
        let registry = DependencyRegistry::new();
        let user = key("user");

        registry.ensure_watched_multi_kind(
            &user,
            vec![
                KindWatches::new("Secret", vec![key("a")]),
                KindWatches::new("BackupPolicy", vec![key("p1")]),
            ],
        );
        registry.ensure_watched_multi_kind(
            &user,
            vec![
                KindWatches::new("Secret", vec![key("b")]),
                KindWatches::new("Secret", vec![key("c")]),
                KindWatches::new("BackupPolicy", vec![key("p1")]),
            ],
        );

        assert!(registry.dependents_of(&secret("a")).is_empty());
        assert_eq!(registry.dependents_of(&secret("b")), vec![user.clone()]);
        assert_eq!(registry.dependents_of(&secret("c")), vec![user.clone()]);
        assert_eq!(
            registry.dependents_of(&WatchedObject::new("BackupPolicy", key("p1"))),
            vec![user]
        );
    }

    #[test]
    fn test_multi_kind_leaves_unlisted_kinds_alone() {
        let registry = DependencyRegistry::new();
        let user = key("user");

        registry.ensure_watched(&user, "ConfigMap", vec![key("cm")]);
        registry.ensure_watched_multi_kind(&user, vec![KindWatches::new("Secret", vec![key("a")])]);

        assert_eq!(
            registry.dependents_of(&WatchedObject::new("ConfigMap", key("cm"))),
            vec![user]
        );
    }

    #[test]
    fn test_forget_removes_dependent_everywhere() {
        let registry = DependencyRegistry::new();
        let user = key("user");
        let other = key("other");

        registry.ensure_watched(&user, "Secret", vec![key("a"), key("b")]);
        registry.ensure_watched(&other, "Secret", vec![key("b")]);
        registry.forget(&user);

        assert!(registry.dependents_of(&secret("a")).is_empty());
        assert_eq!(registry.dependents_of(&secret("b")), vec![other]);
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let registry = DependencyRegistry::new();
        let user = key("user");
        registry.ensure_watched(&user, "Secret", vec![key("a")]);

        let snapshot = registry.snapshot();
        registry.ensure_watched(&user, "Secret", Vec::new());

        assert_eq!(snapshot.get(&secret("a")), Some(&vec![user]));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_registrations() {
        let registry = Arc::new(DependencyRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let dependent = key(&format!("user-{i}"));
                    for round in 0..50 {
                        registry.ensure_watched(
                            &dependent,
                            "Secret",
                            vec![key("shared"), key(&format!("own-{i}-{round}"))],
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.get(&secret("shared")).map(Vec::len), Some(8));
        // one shared entry plus the final private entry of each dependent
        assert_eq!(snapshot.len(), 9);
        for i in 0..8 {
            assert!(snapshot.contains_key(&secret(&format!("own-{i}-49"))));
        }
    }
}
