//! Runtime dependency registry
//!
//! The `Registry` wires collaborating components without their constructors
//! knowing about each other: the composition root registers values and
//! factories, consumers resolve by type plus an optional string identifier.
//!
//! A registry is an explicit value owned by the composition root and handed
//! out by cheap `Clone` (clones share one store), so tests can build fully
//! isolated registries instead of fighting over ambient state.

use crate::entry::{downcast_value, ErasedValue, RegistryEntry, SingleEntry};
use crate::proxy::Proxy;
use crate::storage::{DependencyKey, Store};
use ahash::RandomState;
use dashmap::DashMap;
use std::any::type_name;
use std::sync::{Arc, Mutex};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Marker trait for types that can participate in the registry.
///
/// Automatically implemented for every `Send + Sync + 'static` type,
/// including trait objects whose traits carry those supertraits. You never
/// implement it manually.
pub trait Wireable: Send + Sync + 'static {}

impl<T: ?Sized + Send + Sync + 'static> Wireable for T {}

/// What `resolve` does when no matching entry exists.
///
/// A miss is a wiring bug, so the default policy terminates with a message
/// naming the type (and identifier, if any). The policy stays injectable so
/// test harnesses can observe the message and keep going with a stub.
enum MissPolicy {
    Fatal,
    Recover {
        stub: ErasedValue,
        observer: Box<dyn Fn(&str) + Send + Sync>,
    },
}

struct RegistryInner {
    store: Store,
    proxies: DashMap<DependencyKey, Arc<Proxy>, RandomState>,
    miss: Mutex<MissPolicy>,
}

/// Runtime dependency-resolution registry.
///
/// Entries are addressed by `(type, identifier)`; a type registered without
/// an identifier and the same type registered under `"x"` coexist without
/// ever seeing each other. Three lifetimes are available per key:
///
/// - [`register_factory`](Self::register_factory): transient, the factory
///   runs on every resolve
/// - [`register_single`](Self::register_single): the factory runs once,
///   the result is cached and kept alive by the registry
/// - [`register_weak_single`](Self::register_weak_single): cached without
///   ownership; once the last external owner drops the object, the next
///   resolve rebuilds it
///
/// Registering a plain value or factory for a key removes any cached single
/// entry for that key, and vice versa: the latest registration always wins.
///
/// # Examples
///
/// ```rust
/// use cellwire::Registry;
///
/// struct Database {
///     url: String,
/// }
///
/// struct UserService {
///     db: std::sync::Arc<Database>,
/// }
///
/// let registry = Registry::new();
/// registry.register(Database { url: "postgres://localhost".into() });
///
/// let wiring = registry.clone();
/// registry.register_factory(move || {
///     std::sync::Arc::new(UserService { db: wiring.resolve::<Database>() })
/// });
///
/// let users = registry.resolve::<UserService>();
/// assert_eq!(users.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Create an empty registry
    #[inline]
    pub fn new() -> Self {
        #[cfg(feature = "logging")]
        debug!(target: "cellwire", "Creating new dependency registry");

        Self {
            inner: Arc::new(RegistryInner {
                store: Store::new(),
                proxies: DashMap::with_hasher(RandomState::new()),
                miss: Mutex::new(MissPolicy::Fatal),
            }),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a value for `T`.
    ///
    /// Accepts either a plain value or an already-shared `Arc`, so trait
    /// objects register naturally:
    ///
    /// ```rust
    /// use cellwire::Registry;
    /// use std::sync::Arc;
    ///
    /// trait Greeter: Send + Sync {
    ///     fn greet(&self) -> String;
    /// }
    ///
    /// struct English;
    /// impl Greeter for English {
    ///     fn greet(&self) -> String {
    ///         "hello".into()
    ///     }
    /// }
    ///
    /// let registry = Registry::new();
    /// let greeter: Arc<dyn Greeter> = Arc::new(English);
    /// registry.register::<dyn Greeter>(greeter);
    ///
    /// assert_eq!(registry.resolve::<dyn Greeter>().greet(), "hello");
    /// ```
    #[inline]
    pub fn register<T: Wireable + ?Sized>(&self, value: impl Into<Arc<T>>) {
        self.register_keyed(None, value.into());
    }

    /// Register a value for `T` under a string identifier
    #[inline]
    pub fn register_for<T: Wireable + ?Sized>(&self, identifier: &str, value: impl Into<Arc<T>>) {
        self.register_keyed(Some(identifier), value.into());
    }

    fn register_keyed<T: Wireable + ?Sized>(&self, identifier: Option<&str>, value: Arc<T>) {
        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            service = type_name::<T>(),
            identifier = identifier.unwrap_or_default(),
            lifetime = "value",
            "Registering dependency"
        );

        self.inner
            .store
            .insert_entry(DependencyKey::new::<T>(identifier), RegistryEntry::value(value));
    }

    /// Register a transient factory for `T`; it runs on every resolve
    #[inline]
    pub fn register_factory<T, F>(&self, factory: F)
    where
        T: Wireable + ?Sized,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.register_factory_keyed(None, factory);
    }

    /// Register a transient factory for `T` under a string identifier
    #[inline]
    pub fn register_factory_for<T, F>(&self, identifier: &str, factory: F)
    where
        T: Wireable + ?Sized,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.register_factory_keyed(Some(identifier), factory);
    }

    fn register_factory_keyed<T, F>(&self, identifier: Option<&str>, factory: F)
    where
        T: Wireable + ?Sized,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            service = type_name::<T>(),
            identifier = identifier.unwrap_or_default(),
            lifetime = "transient",
            "Registering dependency factory (new instance on every resolve)"
        );

        self.inner
            .store
            .insert_entry(DependencyKey::new::<T>(identifier), RegistryEntry::factory(factory));
    }

    /// Register a cached singleton factory for `T`.
    ///
    /// The factory runs on first resolve; the result is cached and kept
    /// alive by the registry until the key is released or overwritten.
    #[inline]
    pub fn register_single<T, F>(&self, factory: F)
    where
        T: Wireable + ?Sized,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.register_single_keyed::<T>(None, SingleEntry::strong(factory), "single");
    }

    /// Register a cached singleton factory for `T` under a string identifier
    #[inline]
    pub fn register_single_for<T, F>(&self, identifier: &str, factory: F)
    where
        T: Wireable + ?Sized,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.register_single_keyed::<T>(Some(identifier), SingleEntry::strong(factory), "single");
    }

    /// Register a weakly cached singleton factory for `T`.
    ///
    /// Resolves share one instance for as long as somebody outside the
    /// registry keeps it alive; after the last owner drops it, the next
    /// resolve runs the factory again.
    #[inline]
    pub fn register_weak_single<T, F>(&self, factory: F)
    where
        T: Wireable + ?Sized,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.register_single_keyed::<T>(None, SingleEntry::weak(factory), "weak single");
    }

    /// Register a weakly cached singleton factory for `T` under a string
    /// identifier
    #[inline]
    pub fn register_weak_single_for<T, F>(&self, identifier: &str, factory: F)
    where
        T: Wireable + ?Sized,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.register_single_keyed::<T>(Some(identifier), SingleEntry::weak(factory), "weak single");
    }

    fn register_single_keyed<T: Wireable + ?Sized>(
        &self,
        identifier: Option<&str>,
        entry: SingleEntry,
        #[allow(unused_variables)] lifetime: &'static str,
    ) {
        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            service = type_name::<T>(),
            identifier = identifier.unwrap_or_default(),
            lifetime = lifetime,
            "Registering cached dependency factory"
        );

        self.inner.store.insert_single(DependencyKey::new::<T>(identifier), entry);
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve a dependency by type.
    ///
    /// A miss invokes the resolution-miss policy: by default that is a
    /// panic naming the type, because an unresolvable key means the
    /// composition root forgot a registration. See
    /// [`on_resolution_miss`](Self::on_resolution_miss) for the test
    /// override.
    #[inline]
    pub fn resolve<T: Wireable + ?Sized>(&self) -> Arc<T> {
        self.resolve_keyed(None)
    }

    /// Resolve a dependency by type and identifier
    #[inline]
    pub fn resolve_for<T: Wireable + ?Sized>(&self, identifier: &str) -> Arc<T> {
        self.resolve_keyed(Some(identifier))
    }

    fn resolve_keyed<T: Wireable + ?Sized>(&self, identifier: Option<&str>) -> Arc<T> {
        match self.lookup::<T>(identifier) {
            Some(value) => value,
            None => self.miss::<T>(identifier),
        }
    }

    /// Resolve, returning `None` instead of engaging the miss policy
    #[inline]
    pub fn try_resolve<T: Wireable + ?Sized>(&self) -> Option<Arc<T>> {
        self.lookup(None)
    }

    /// Identifier-keyed variant of [`try_resolve`](Self::try_resolve)
    #[inline]
    pub fn try_resolve_for<T: Wireable + ?Sized>(&self, identifier: &str) -> Option<Arc<T>> {
        self.lookup(Some(identifier))
    }

    fn lookup<T: Wireable + ?Sized>(&self, identifier: Option<&str>) -> Option<Arc<T>> {
        let key = DependencyKey::new::<T>(identifier);
        // the resolver is cloned out of the map, so factories are free to
        // resolve other keys re-entrantly
        let resolve = self.inner.store.resolver(&key)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "cellwire",
            service = type_name::<T>(),
            identifier = identifier.unwrap_or_default(),
            "Resolving dependency"
        );

        downcast_value::<T>(resolve())
    }

    #[cold]
    fn miss<T: Wireable + ?Sized>(&self, identifier: Option<&str>) -> Arc<T> {
        let message = match identifier {
            Some(identifier) => {
                format!("cannot resolve {} for identifier: {identifier}", type_name::<T>())
            }
            None => format!("cannot resolve {}", type_name::<T>()),
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            service = type_name::<T>(),
            identifier = identifier.unwrap_or_default(),
            "Resolution miss"
        );

        let policy = self.inner.miss.lock().unwrap();
        match &*policy {
            MissPolicy::Fatal => panic!("{message}"),
            MissPolicy::Recover { stub, observer } => {
                observer(&message);
                stub.downcast_ref::<Arc<T>>().cloned().unwrap_or_else(|| {
                    panic!("resolution miss stub does not match {}", type_name::<T>())
                })
            }
        }
    }

    /// Replace the fatal miss policy with an observer plus stub value.
    ///
    /// Meant for test isolation only: `observer` receives the miss message
    /// and `stub` is returned in place of the missing dependency. The stub
    /// must match the missed type.
    pub fn on_resolution_miss<T: Wireable + ?Sized>(
        &self,
        stub: impl Into<Arc<T>>,
        observer: impl Fn(&str) + Send + Sync + 'static,
    ) {
        *self.inner.miss.lock().unwrap() = MissPolicy::Recover {
            stub: Box::new(stub.into()),
            observer: Box::new(observer),
        };
    }

    /// Restore the default fatal miss policy
    pub fn reset_resolution_miss(&self) {
        *self.inner.miss.lock().unwrap() = MissPolicy::Fatal;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Check whether any entry is registered for `T`
    #[inline]
    pub fn contains<T: Wireable + ?Sized>(&self) -> bool {
        self.inner.store.contains(&DependencyKey::new::<T>(None))
    }

    /// Check whether any entry is registered for `T` under an identifier
    #[inline]
    pub fn contains_for<T: Wireable + ?Sized>(&self, identifier: &str) -> bool {
        self.inner.store.contains(&DependencyKey::new::<T>(Some(identifier)))
    }

    /// Number of registered keys
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    /// Check whether nothing is registered
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Remove every entry kind registered for `T`; idempotent
    #[inline]
    pub fn release<T: Wireable + ?Sized>(&self) {
        self.release_keyed::<T>(None);
    }

    /// Remove every entry kind registered for `T` under an identifier
    #[inline]
    pub fn release_for<T: Wireable + ?Sized>(&self, identifier: &str) {
        self.release_keyed::<T>(Some(identifier));
    }

    fn release_keyed<T: Wireable + ?Sized>(&self, identifier: Option<&str>) {
        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            service = type_name::<T>(),
            identifier = identifier.unwrap_or_default(),
            "Releasing dependency"
        );

        self.inner.store.remove(&DependencyKey::new::<T>(identifier));
    }

    /// Remove all entries for all keys.
    ///
    /// Proxies are forward-reference slots rather than entries and survive
    /// a clear.
    #[inline]
    pub fn clear(&self) {
        let count = self.inner.store.len();
        self.inner.store.clear();

        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            entries_removed = count,
            "Registry cleared"
        );
        #[cfg(not(feature = "logging"))]
        let _ = count;
    }

    // =========================================================================
    // Deferred proxies
    // =========================================================================

    /// Allocate a [`Proxy`] for the future object of concrete type `T`.
    ///
    /// Call this during wiring, before the real object exists; the proxy is
    /// stored under `T`'s key so a later
    /// [`notify_ready`](Self::notify_ready) with a `T` instance binds it.
    /// Wiring code registers the returned proxy (wrapped in capability
    /// adapters) wherever consumers expect those capabilities.
    ///
    /// `reusable` controls queuing across replacements: a reusable proxy
    /// keeps queuing commands whenever it is unbound, a non-reusable proxy
    /// only queues until its first object arrives.
    #[inline]
    pub fn create_proxy<T: Wireable>(&self, reusable: bool) -> Arc<Proxy> {
        self.create_proxy_keyed::<T>(None, reusable)
    }

    /// Identifier-keyed variant of [`create_proxy`](Self::create_proxy)
    #[inline]
    pub fn create_proxy_for<T: Wireable>(&self, identifier: &str, reusable: bool) -> Arc<Proxy> {
        self.create_proxy_keyed::<T>(Some(identifier), reusable)
    }

    fn create_proxy_keyed<T: Wireable>(&self, identifier: Option<&str>, reusable: bool) -> Arc<Proxy> {
        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            service = type_name::<T>(),
            identifier = identifier.unwrap_or_default(),
            reusable = reusable,
            "Creating dependency proxy"
        );

        let proxy = Arc::new(Proxy::new(reusable));
        self.inner
            .proxies
            .insert(DependencyKey::new::<T>(identifier), Arc::clone(&proxy));
        proxy
    }

    /// The proxy created for `T`, if any; used to re-fetch a proxy while
    /// wiring is still in progress
    #[inline]
    pub fn proxy<T: Wireable>(&self) -> Option<Arc<Proxy>> {
        self.proxy_keyed::<T>(None)
    }

    /// The proxy created for `T` under an identifier, if any
    #[inline]
    pub fn proxy_for<T: Wireable>(&self, identifier: &str) -> Option<Arc<Proxy>> {
        self.proxy_keyed::<T>(Some(identifier))
    }

    fn proxy_keyed<T: Wireable>(&self, identifier: Option<&str>) -> Option<Arc<Proxy>> {
        self.inner
            .proxies
            .get(&DependencyKey::new::<T>(identifier))
            .map(|proxy| Arc::clone(&proxy))
    }

    /// Announce that the real object for a proxy exists now.
    ///
    /// Binds the proxy created for `T` (holding the object weakly) and runs
    /// its queued commands. A no-op when no proxy was created for the key,
    /// so views can announce themselves unconditionally.
    #[inline]
    pub fn notify_ready<T: Wireable>(&self, object: &Arc<T>) {
        self.notify_ready_keyed(None, object);
    }

    /// Identifier-keyed variant of [`notify_ready`](Self::notify_ready)
    #[inline]
    pub fn notify_ready_for<T: Wireable>(&self, identifier: &str, object: &Arc<T>) {
        self.notify_ready_keyed(Some(identifier), object);
    }

    fn notify_ready_keyed<T: Wireable>(&self, identifier: Option<&str>, object: &Arc<T>) {
        let key = DependencyKey::new::<T>(identifier);
        let Some(proxy) = self.inner.proxies.get(&key).map(|proxy| Arc::clone(&proxy)) else {
            return;
        };
        // guard is gone; queued commands may hit the registry again
        proxy.attach(object);
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("entries", &self.inner.store.len())
            .field("proxies", &self.inner.proxies.len())
            .finish()
    }
}
