//! Position-scoped dependency wiring for recyclable list cells
//!
//! List hosts create and recycle their cells freely; the dependencies wired
//! to a cell must stay with the *position*, not with whichever cell object
//! happens to render it right now. The [`CellConfigurator`] binds weak view
//! handles and one-shot constructor arguments per `(capability, position)`
//! pair, builds each dependency type exactly once per position, and repoints
//! the existing handles when a recycled cell comes back.

use crate::error::{Result, WireError};
use crate::handle::WeakHandle;
use crate::registry::Registry;
use ahash::RandomState;
use std::any::{Any, TypeId};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Row/section coordinate that scopes per-cell wiring
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Position {
    pub row: usize,
    pub section: usize,
}

impl Position {
    #[inline]
    pub fn new(row: usize, section: usize) -> Self {
        Self { row, section }
    }

    /// Sub-identifier composed for registry entries scoped to this position
    #[inline]
    fn registry_identifier(&self) -> String {
        format!("{}_{}", self.row, self.section)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}, section {}", self.row, self.section)
    }
}

/// A view handle bound for one `(capability, position)` pair.
///
/// `handle_addr` is the handle's allocation address, used to reject reuse
/// of one handle across several bindings.
struct BoundView {
    handle: Arc<dyn Any + Send + Sync>,
    handle_addr: usize,
}

/// A one-shot build input cached for one `(capability, position)` pair
struct OnceArgument(Box<dyn Any + Send + Sync>);

/// A dependency built and cached for one `(type, position)` pair
struct BuiltDependency(Box<dyn Any + Send + Sync>);

type CapabilityMap<V> = HashMap<TypeId, V, RandomState>;
type PositionMap<V> = HashMap<Position, CapabilityMap<V>, RandomState>;

/// Everything cached for one position, handed to [`CellDependency::build`]
pub struct CellArgs<'a> {
    views: Option<&'a CapabilityMap<BoundView>>,
    values: Option<&'a CapabilityMap<OnceArgument>>,
}

impl CellArgs<'_> {
    /// The weak view handle bound for capability `C` at this position.
    ///
    /// Builders keep the handle and upgrade at every use, so they follow
    /// the position through cell recycling automatically.
    pub fn view<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<WeakHandle<C>>> {
        let bound = self.views?.get(&TypeId::of::<C>())?;
        Arc::clone(&bound.handle).downcast::<WeakHandle<C>>().ok()
    }

    /// The one-shot argument cached for capability `C` at this position
    pub fn value<C: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<C>> {
        self.values?
            .get(&TypeId::of::<C>())?
            .0
            .downcast_ref::<Arc<C>>()
            .cloned()
    }
}

/// A per-position dependency assembled from the views and arguments cached
/// for that position
pub trait CellDependency: Send + Sync + Sized + 'static {
    /// Assemble from the position's cached inputs; `None` when a required
    /// input is missing
    fn build(args: &CellArgs<'_>) -> Option<Self>;
}

/// Receiver of a built per-position dependency, typically the cell itself
pub trait DependencyHolder {
    type Dependency;

    fn set_dependency(&self, dependency: Arc<Self::Dependency>);
}

/// Wires per-position dependencies for views created and recycled by an
/// external list host.
///
/// Bindings and built dependencies are mirrored into the owned [`Registry`]
/// under a `"{row}_{section}"` identifier; dropping (or clearing) the
/// configurator releases every mirrored entry again.
///
/// Invariants upheld across all operations:
///
/// 1. one [`WeakHandle`] allocation serves at most one
///    `(capability, position)` binding at a time;
/// 2. binding a view at a position withdraws that same view from every
///    other position it held for the same capability;
/// 3. a dependency type is built at most once per position; later
///    [`build_dependency`](Self::build_dependency) calls hand out the
///    cached instance.
///
/// # Examples
///
/// ```rust
/// use cellwire::{CellArgs, CellConfigurator, CellDependency, DependencyHolder, Position, Registry, WeakHandle};
/// use std::sync::{Arc, Mutex};
///
/// trait RowView: Send + Sync {
///     fn show(&self, text: &str);
/// }
///
/// #[derive(Default)]
/// struct RowCell {
///     shown: Mutex<String>,
///     handler: Mutex<Option<Arc<RowHandler>>>,
/// }
///
/// impl RowView for RowCell {
///     fn show(&self, text: &str) {
///         *self.shown.lock().unwrap() = text.into();
///     }
/// }
///
/// impl DependencyHolder for RowCell {
///     type Dependency = RowHandler;
///
///     fn set_dependency(&self, dependency: Arc<RowHandler>) {
///         *self.handler.lock().unwrap() = Some(dependency);
///     }
/// }
///
/// struct RowHandler {
///     view: Arc<WeakHandle<dyn RowView>>,
///     title: Arc<str>,
/// }
///
/// impl RowHandler {
///     fn refresh(&self) {
///         if let Some(view) = self.view.get() {
///             view.show(&self.title);
///         }
///     }
/// }
///
/// impl CellDependency for RowHandler {
///     fn build(args: &CellArgs<'_>) -> Option<Self> {
///         Some(Self {
///             view: args.view::<dyn RowView>()?,
///             title: args.value::<str>()?,
///         })
///     }
/// }
///
/// let mut configurator = CellConfigurator::new(Registry::new());
/// let position = Position::new(0, 0);
///
/// let cell = Arc::new(RowCell::default());
/// let as_view: Arc<dyn RowView> = cell.clone();
/// configurator
///     .set_configurable(&Arc::new(WeakHandle::bound(&as_view)), position)
///     .unwrap();
/// configurator.set_once_argument::<str>(Arc::from("first row"), position);
/// configurator.build_dependency(&*cell, position).unwrap();
///
/// cell.handler.lock().unwrap().as_ref().unwrap().refresh();
/// assert_eq!(*cell.shown.lock().unwrap(), "first row");
/// ```
pub struct CellConfigurator {
    registry: Registry,
    views: PositionMap<BoundView>,
    values: PositionMap<OnceArgument>,
    built: PositionMap<BuiltDependency>,
    releases: Vec<Box<dyn FnOnce() + Send>>,
}

impl CellConfigurator {
    /// Configurator mirroring its bindings into `registry`
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            views: PositionMap::default(),
            values: PositionMap::default(),
            built: PositionMap::default(),
            releases: Vec::new(),
        }
    }

    /// Bind a weak view handle as capability `C` at `position`.
    ///
    /// The handle must hold a live view
    /// ([`CapabilityMismatch`](WireError::CapabilityMismatch) otherwise) and
    /// must not already serve another binding
    /// ([`DuplicateWeakHandle`](WireError::DuplicateWeakHandle)). On
    /// success the underlying view is withdrawn from every other position
    /// holding it for `C`; when this position already has a handle for `C`
    /// (a recycled cell coming back) that cached handle is repointed at
    /// the new view and the passed handle is dropped.
    pub fn set_configurable<C>(&mut self, handle: &Arc<WeakHandle<C>>, position: Position) -> Result<()>
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let Some(object) = handle.get() else {
            return Err(WireError::capability_mismatch::<WeakHandle<C>, C>());
        };
        let handle_addr = Arc::as_ptr(handle) as *const () as usize;
        if self.is_handle_in_use(handle_addr) {
            return Err(WireError::DuplicateWeakHandle);
        }

        self.withdraw_from_other_positions::<C>(&object);

        match self.views.entry(position).or_default().entry(TypeId::of::<C>()) {
            Entry::Occupied(occupied) => {
                if let Ok(cached) = Arc::clone(&occupied.get().handle).downcast::<WeakHandle<C>>() {
                    cached.rebind(&object);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(BoundView {
                    handle: Arc::clone(handle) as Arc<dyn Any + Send + Sync>,
                    handle_addr,
                });

                let identifier = position.registry_identifier();
                self.registry.register_for::<WeakHandle<C>>(&identifier, Arc::clone(handle));
                let registry = self.registry.clone();
                self.releases.push(Box::new(move || {
                    registry.release_for::<WeakHandle<C>>(&identifier);
                }));
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            capability = std::any::type_name::<C>(),
            row = position.row,
            section = position.section,
            "Bound configurable view"
        );

        Ok(())
    }

    /// Cache a one-shot build input as capability `C` at `position`.
    ///
    /// Available to [`CellDependency::build`] for exactly this position;
    /// later calls for the same `(capability, position)` pair overwrite.
    pub fn set_once_argument<C>(&mut self, value: impl Into<Arc<C>>, position: Position)
    where
        C: ?Sized + Send + Sync + 'static,
    {
        self.values
            .entry(position)
            .or_default()
            .insert(TypeId::of::<C>(), OnceArgument(Box::new(value.into())));
    }

    /// Build (or fetch) the holder's dependency for `position` and hand it
    /// over.
    ///
    /// The first call per `(type, position)` pair runs
    /// [`CellDependency::build`] over the position's cached views and
    /// arguments and caches the result; every later call hands out the same
    /// instance without rebuilding. Fails with
    /// [`BuildFailed`](WireError::BuildFailed) when a required input is
    /// missing.
    pub fn build_dependency<H, D>(&mut self, holder: &H, position: Position) -> Result<()>
    where
        H: DependencyHolder<Dependency = D>,
        D: CellDependency,
    {
        let dependency_type = TypeId::of::<D>();
        let cached = self
            .built
            .get(&position)
            .and_then(|dependencies| dependencies.get(&dependency_type))
            .and_then(|dependency| dependency.0.downcast_ref::<Arc<D>>().cloned());
        if let Some(dependency) = cached {
            holder.set_dependency(dependency);
            return Ok(());
        }

        let args = CellArgs {
            views: self.views.get(&position),
            values: self.values.get(&position),
        };
        let Some(dependency) = D::build(&args) else {
            return Err(WireError::build_failed::<D>(position.row, position.section));
        };
        let dependency = Arc::new(dependency);

        #[cfg(feature = "logging")]
        debug!(
            target: "cellwire",
            service = std::any::type_name::<D>(),
            row = position.row,
            section = position.section,
            "Built cell dependency"
        );

        self.built
            .entry(position)
            .or_default()
            .insert(dependency_type, BuiltDependency(Box::new(Arc::clone(&dependency))));

        let identifier = position.registry_identifier();
        self.registry.register_for::<D>(&identifier, Arc::clone(&dependency));
        let registry = self.registry.clone();
        self.releases.push(Box::new(move || {
            registry.release_for::<D>(&identifier);
        }));

        holder.set_dependency(dependency);
        Ok(())
    }

    /// Release every mirrored registry entry and drop all per-position
    /// caches; safe to call repeatedly
    pub fn clear(&mut self) {
        for release in self.releases.drain(..) {
            release();
        }
        self.views.clear();
        self.values.clear();
        self.built.clear();
    }

    fn is_handle_in_use(&self, handle_addr: usize) -> bool {
        self.views
            .values()
            .flat_map(|capabilities| capabilities.values())
            .any(|bound| bound.handle_addr == handle_addr)
    }

    /// Empty every other slot for capability `C` that points at `object`;
    /// a view never claims two positions at once.
    fn withdraw_from_other_positions<C>(&self, object: &Arc<C>)
    where
        C: ?Sized + Send + Sync + 'static,
    {
        let capability = TypeId::of::<C>();
        for capabilities in self.views.values() {
            let Some(bound) = capabilities.get(&capability) else {
                continue;
            };
            let Ok(handle) = Arc::clone(&bound.handle).downcast::<WeakHandle<C>>() else {
                continue;
            };
            if handle.holds(object) {
                handle.clear();
            }
        }
    }
}

impl Drop for CellConfigurator {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for CellConfigurator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellConfigurator")
            .field("positions", &self.views.len())
            .field("built", &self.built.values().map(|deps| deps.len()).sum::<usize>())
            .finish()
    }
}
