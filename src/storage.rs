//! Keyed storage for the dependency registry
//!
//! Uses `DashMap` with `ahash` so lookups stay lock-free; guards are never
//! held across user factories (resolve closures are cloned out first).

use crate::entry::{ErasedResolve, RegistryEntry, SingleEntry};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::TypeId;

/// Identity of a registered dependency: a type plus an optional string
/// identifier.
///
/// Keys with and without an identifier are distinct, as are keys with
/// different identifiers, so the same type can be registered any number of
/// times under different identifiers without interference.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub(crate) struct DependencyKey {
    type_id: TypeId,
    identifier: Option<Box<str>>,
}

impl DependencyKey {
    #[inline]
    pub(crate) fn new<T: ?Sized + 'static>(identifier: Option<&str>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            identifier: identifier.map(Box::from),
        }
    }
}

/// Entry store: plain entries and cached single entries, keyed by
/// `DependencyKey`.
///
/// A key holds at most one of the two entry kinds at a time; inserting
/// either kind removes the other, so the latest registration always wins.
pub(crate) struct Store {
    entries: DashMap<DependencyKey, RegistryEntry, RandomState>,
    singles: DashMap<DependencyKey, SingleEntry, RandomState>,
}

impl Store {
    /// Create an empty store.
    ///
    /// 8 shards balances map creation cost against read concurrency for
    /// the few dozen keys a typical composition root registers.
    #[inline]
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
            singles: DashMap::with_capacity_and_hasher_and_shard_amount(0, RandomState::new(), 8),
        }
    }

    /// Insert a plain entry, displacing any single entry for the key
    #[inline]
    pub(crate) fn insert_entry(&self, key: DependencyKey, entry: RegistryEntry) {
        self.singles.remove(&key);
        self.entries.insert(key, entry);
    }

    /// Insert a single entry, displacing any plain entry for the key
    #[inline]
    pub(crate) fn insert_single(&self, key: DependencyKey, entry: SingleEntry) {
        self.entries.remove(&key);
        self.singles.insert(key, entry);
    }

    /// The resolve closure for a key, single entries first.
    ///
    /// Returns a clone so the caller can invoke it after the map guard is
    /// gone; factories may re-enter the store through `resolve` freely.
    #[inline]
    pub(crate) fn resolver(&self, key: &DependencyKey) -> Option<ErasedResolve> {
        if let Some(single) = self.singles.get(key) {
            return Some(single.resolver());
        }
        self.entries.get(key).map(|entry| entry.resolver())
    }

    /// Check whether any entry kind exists for a key
    #[inline]
    pub(crate) fn contains(&self, key: &DependencyKey) -> bool {
        self.singles.contains_key(key) || self.entries.contains_key(key)
    }

    /// Remove both entry kinds for a key; idempotent
    #[inline]
    pub(crate) fn remove(&self, key: &DependencyKey) {
        self.entries.remove(key);
        self.singles.remove(key);
    }

    /// Remove every entry for every key
    #[inline]
    pub(crate) fn clear(&self) {
        self.entries.clear();
        self.singles.clear();
    }

    /// Number of registered keys across both entry kinds
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.entries.len() + self.singles.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.singles.is_empty()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("entries", &self.entries.len())
            .field("singles", &self.singles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::downcast_value;
    use std::sync::Arc;

    struct TestService {
        value: i32,
    }

    fn resolve_service(store: &Store, key: &DependencyKey) -> Option<Arc<TestService>> {
        store.resolver(key).and_then(|resolve| downcast_value::<TestService>(resolve()))
    }

    #[test]
    fn test_keys_with_and_without_identifier_are_distinct() {
        let bare = DependencyKey::new::<TestService>(None);
        let named = DependencyKey::new::<TestService>(Some("x"));
        let other = DependencyKey::new::<TestService>(Some("y"));

        assert_ne!(bare, named);
        assert_ne!(named, other);
        assert_eq!(bare, DependencyKey::new::<TestService>(None));
        assert_eq!(named, DependencyKey::new::<TestService>(Some("x")));
    }

    #[test]
    fn test_insert_entry_displaces_single() {
        let store = Store::new();
        let key = DependencyKey::new::<TestService>(None);

        store.insert_single(key.clone(), SingleEntry::strong(|| Arc::new(TestService { value: 1 })));
        store.insert_entry(key.clone(), RegistryEntry::value(Arc::new(TestService { value: 2 })));

        assert_eq!(store.len(), 1);
        assert_eq!(resolve_service(&store, &key).unwrap().value, 2);
    }

    #[test]
    fn test_insert_single_displaces_entry() {
        let store = Store::new();
        let key = DependencyKey::new::<TestService>(None);

        store.insert_entry(key.clone(), RegistryEntry::value(Arc::new(TestService { value: 2 })));
        store.insert_single(key.clone(), SingleEntry::strong(|| Arc::new(TestService { value: 1 })));

        assert_eq!(store.len(), 1);
        assert_eq!(resolve_service(&store, &key).unwrap().value, 1);
    }

    #[test]
    fn test_remove_is_idempotent_and_scoped_to_its_key() {
        let store = Store::new();
        let key = DependencyKey::new::<TestService>(None);
        let named = DependencyKey::new::<TestService>(Some("keep"));

        store.insert_entry(key.clone(), RegistryEntry::value(Arc::new(TestService { value: 1 })));
        store.insert_entry(named.clone(), RegistryEntry::value(Arc::new(TestService { value: 9 })));

        store.remove(&key);
        store.remove(&key);

        assert!(!store.contains(&key));
        assert_eq!(resolve_service(&store, &named).unwrap().value, 9);
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = Store::new();
        store.insert_entry(
            DependencyKey::new::<TestService>(None),
            RegistryEntry::value(Arc::new(TestService { value: 1 })),
        );
        store.insert_single(
            DependencyKey::new::<TestService>(Some("x")),
            SingleEntry::strong(|| Arc::new(TestService { value: 2 })),
        );

        store.clear();

        assert!(store.is_empty());
    }
}
