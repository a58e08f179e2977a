//! Entry representations for registered dependencies
//!
//! Every entry is stored as a type-erased resolve closure built at
//! registration time, when the concrete type is still known. The closure
//! captures the typed value (or factory plus its typed cache slot), so
//! resolution needs no runtime type tags beyond the `TypeId` in the key.

#![allow(dead_code)]

use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::{Arc, Mutex, Weak};

/// A resolved dependency, erased for storage. Always a boxed `Arc<T>`.
pub(crate) type ErasedValue = Box<dyn Any + Send + Sync>;

/// Type-erased resolve closure shared between the store and callers.
///
/// Cloned out of the map before invocation so no map guard is held while
/// user factories run.
pub(crate) type ErasedResolve = Arc<dyn Fn() -> ErasedValue + Send + Sync>;

/// Recover the typed `Arc<T>` from an erased resolve result.
#[inline]
pub(crate) fn downcast_value<T: ?Sized + Send + Sync + 'static>(value: ErasedValue) -> Option<Arc<T>> {
    value.downcast::<Arc<T>>().ok().map(|boxed| *boxed)
}

/// How a plain entry produces its value
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum EntryKind {
    /// Stored instance, shared on every resolve
    Value,
    /// Factory re-invoked on every resolve
    Factory,
}

/// A plain registry entry: a stored value or a transient factory
pub(crate) struct RegistryEntry {
    kind: EntryKind,
    resolve: ErasedResolve,
}

impl RegistryEntry {
    /// Entry wrapping an existing instance
    #[inline]
    pub(crate) fn value<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            kind: EntryKind::Value,
            resolve: Arc::new(move || Box::new(Arc::clone(&value)) as ErasedValue),
        }
    }

    /// Entry wrapping a transient factory
    #[inline]
    pub(crate) fn factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        Self {
            kind: EntryKind::Factory,
            resolve: Arc::new(move || Box::new(factory()) as ErasedValue),
        }
    }

    #[inline]
    pub(crate) fn resolver(&self) -> ErasedResolve {
        Arc::clone(&self.resolve)
    }

    #[inline]
    pub(crate) fn kind(&self) -> EntryKind {
        self.kind
    }
}

/// Caching policy of a single entry
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum SingleLifetime {
    /// Result cached and kept alive by the registry
    Strong,
    /// Result cached without ownership; expires with its last strong owner
    Weak,
}

/// A cached single entry: an uninvoked factory plus its cache slot
pub(crate) struct SingleEntry {
    lifetime: SingleLifetime,
    resolve: ErasedResolve,
}

impl SingleEntry {
    /// Single entry whose cache keeps the first result alive
    pub(crate) fn strong<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let cache: OnceCell<Arc<T>> = OnceCell::new();
        Self {
            lifetime: SingleLifetime::Strong,
            resolve: Arc::new(move || {
                let value = cache.get_or_init(&factory);
                Box::new(Arc::clone(value)) as ErasedValue
            }),
        }
    }

    /// Single entry whose cache holds only a non-owning reference.
    ///
    /// When the cached object has no strong owner left, the slot reads as
    /// empty and the factory runs again.
    pub(crate) fn weak<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        let slot: Mutex<Option<Weak<T>>> = Mutex::new(None);
        Self {
            lifetime: SingleLifetime::Weak,
            resolve: Arc::new(move || {
                let cached = slot.lock().unwrap().as_ref().and_then(Weak::upgrade);
                if let Some(value) = cached {
                    return Box::new(value) as ErasedValue;
                }
                let fresh = factory();
                *slot.lock().unwrap() = Some(Arc::downgrade(&fresh));
                Box::new(fresh) as ErasedValue
            }),
        }
    }

    #[inline]
    pub(crate) fn resolver(&self) -> ErasedResolve {
        Arc::clone(&self.resolve)
    }

    #[inline]
    pub(crate) fn lifetime(&self) -> SingleLifetime {
        self.lifetime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct TestService {
        id: u32,
    }

    #[test]
    fn test_value_entry_shares_one_instance() {
        let entry = RegistryEntry::value(Arc::new(TestService { id: 42 }));

        let a = downcast_value::<TestService>((entry.resolver())()).unwrap();
        let b = downcast_value::<TestService>((entry.resolver())()).unwrap();

        assert_eq!(a.id, 42);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(entry.kind(), EntryKind::Value);
    }

    #[test]
    fn test_factory_entry_runs_on_every_resolve() {
        let counter = Arc::new(AtomicU32::new(0));
        let factory_counter = Arc::clone(&counter);
        let entry = RegistryEntry::factory(move || {
            Arc::new(TestService {
                id: factory_counter.fetch_add(1, Ordering::SeqCst),
            })
        });

        let a = downcast_value::<TestService>((entry.resolver())()).unwrap();
        let b = downcast_value::<TestService>((entry.resolver())()).unwrap();

        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(entry.kind(), EntryKind::Factory);
    }

    #[test]
    fn test_strong_single_runs_factory_once() {
        let counter = Arc::new(AtomicU32::new(0));
        let factory_counter = Arc::clone(&counter);
        let entry = SingleEntry::strong(move || {
            factory_counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(TestService { id: 7 })
        });

        assert_eq!(counter.load(Ordering::SeqCst), 0);

        let a = downcast_value::<TestService>((entry.resolver())()).unwrap();
        let b = downcast_value::<TestService>((entry.resolver())()).unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(entry.lifetime(), SingleLifetime::Strong);
    }

    #[test]
    fn test_weak_single_rebuilds_after_owners_drop() {
        let counter = Arc::new(AtomicU32::new(0));
        let factory_counter = Arc::clone(&counter);
        let entry = SingleEntry::weak(move || {
            Arc::new(TestService {
                id: factory_counter.fetch_add(1, Ordering::SeqCst),
            })
        });

        let first = downcast_value::<TestService>((entry.resolver())()).unwrap();
        let again = downcast_value::<TestService>((entry.resolver())()).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        drop(first);
        drop(again);

        let rebuilt = downcast_value::<TestService>((entry.resolver())()).unwrap();
        assert_eq!(rebuilt.id, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_weak_single_does_not_keep_its_object_alive() {
        let entry = SingleEntry::weak(|| Arc::new(TestService { id: 1 }));

        let value = downcast_value::<TestService>((entry.resolver())()).unwrap();
        let observer = Arc::downgrade(&value);
        drop(value);

        assert!(observer.upgrade().is_none());
    }

    #[test]
    fn test_erased_value_downcast_mismatch_is_none() {
        let entry = RegistryEntry::value(Arc::new(TestService { id: 1 }));
        assert!(downcast_value::<String>((entry.resolver())()).is_none());
    }
}
