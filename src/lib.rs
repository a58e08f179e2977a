//! # cellwire: runtime dependency wiring for view hierarchies
//!
//! A small dependency-resolution registry for wiring collaborating
//! components without their constructors knowing about each other, plus the
//! two pieces UI composition actually needs on top:
//!
//! - 🔑 **Keyed registry** - entries addressed by type plus an optional
//!   string identifier, with value, transient-factory, cached-singleton and
//!   weakly-cached-singleton lifetimes
//! - ⏳ **Deferred proxies** - consumers wire against an object before it
//!   exists; commands queue until the real object announces itself
//! - ♻️ **Position-scoped configurator** - per-row dependencies for
//!   recyclable list cells, built once per position and rebound on reuse
//! - 🪶 **Weak by design** - views are always held through non-owning,
//!   rebindable handles; the registry never extends a view's lifetime
//! - 📊 **Observable** - optional tracing integration with JSON or pretty
//!   output
//!
//! # Quick start
//!
//! ```rust
//! use cellwire::Registry;
//! use std::sync::Arc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let registry = Registry::new();
//! registry.register(Database { url: "postgres://localhost".into() });
//!
//! let wiring = registry.clone();
//! registry.register_factory(move || {
//!     Arc::new(UserService { db: wiring.resolve::<Database>() })
//! });
//!
//! let users = registry.resolve::<UserService>();
//! assert_eq!(users.db.url, "postgres://localhost");
//! ```
//!
//! # Lifetimes
//!
//! ```rust
//! use cellwire::Registry;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Config {
//!     debug: bool,
//! }
//!
//! let registry = Registry::new();
//!
//! // Transient: the factory runs on every resolve.
//! registry.register_factory(|| Arc::new(Config::default()));
//!
//! // Cached singleton: built once, kept alive by the registry.
//! registry.register_single(|| Arc::new(Config::default()));
//!
//! // Weakly cached singleton: shared while someone owns it, rebuilt after
//! // the last owner lets go.
//! registry.register_weak_single(|| Arc::new(Config::default()));
//! ```
//!
//! # Wiring ahead of the object
//!
//! A [`Proxy`] stands in for a view that its host has not instantiated yet.
//! Register capability adapters over the proxy during wiring; once the view
//! calls [`Registry::notify_ready`], queued commands replay against it.
//!
//! # Per-position wiring
//!
//! The [`CellConfigurator`] scopes bindings to a row/section [`Position`] so
//! a recyclable cell can be rebuilt any number of times without re-running
//! factories or losing state; see its type-level docs for a full example.

mod configurator;
mod entry;
mod error;
mod handle;
#[cfg(feature = "logging")]
pub mod logging;
mod proxy;
mod registry;
mod storage;

pub use configurator::{CellArgs, CellConfigurator, CellDependency, DependencyHolder, Position};
pub use error::{Result, WireError};
pub use handle::WeakHandle;
pub use proxy::Proxy;
pub use registry::{Registry, Wireable};

// Re-export tracing macros for convenience when the logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        CellArgs, CellConfigurator, CellDependency, DependencyHolder, Position, Proxy, Registry,
        Result, WeakHandle, WireError, Wireable,
    };
    pub use std::sync::Arc;
}
