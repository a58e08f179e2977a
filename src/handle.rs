//! Rebindable weak view handles

use std::sync::{Arc, Mutex, Weak};

/// Non-owning, rebindable slot for a view bound against a capability.
///
/// The slot never keeps its view alive; every dereference goes through
/// [`get`](Self::get), which upgrades to a strong reference or yields
/// `None` once the view is gone. The configurator repoints the slot when a
/// recycled cell comes back at the same position, so dependencies that
/// captured the handle keep talking to whichever view currently occupies
/// the position.
///
/// The capability parameter is usually a trait object
/// (`WeakHandle<dyn CounterView>`); coercing the concrete view's `Arc` at
/// the call site is what proves it implements the capability.
pub struct WeakHandle<C: ?Sized> {
    slot: Mutex<Option<Weak<C>>>,
}

impl<C: ?Sized> WeakHandle<C> {
    /// Handle pointing at `target`
    #[inline]
    pub fn bound(target: &Arc<C>) -> Self {
        Self {
            slot: Mutex::new(Some(Arc::downgrade(target))),
        }
    }

    /// Handle with an empty slot
    #[inline]
    pub fn unbound() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Upgrade to the current view, or `None` when the slot is empty or
    /// the view has been dropped
    #[inline]
    pub fn get(&self) -> Option<Arc<C>> {
        self.slot.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }

    /// Point the slot at a different view
    #[inline]
    pub fn rebind(&self, target: &Arc<C>) {
        *self.slot.lock().unwrap() = Some(Arc::downgrade(target));
    }

    /// Empty the slot
    #[inline]
    pub fn clear(&self) {
        *self.slot.lock().unwrap() = None;
    }

    /// Whether the slot currently points at this exact view allocation
    #[inline]
    pub(crate) fn holds(&self, object: &Arc<C>) -> bool {
        self.get()
            .is_some_and(|current| std::ptr::addr_eq(Arc::as_ptr(&current), Arc::as_ptr(object)))
    }
}

impl<C: ?Sized> Default for WeakHandle<C> {
    fn default() -> Self {
        Self::unbound()
    }
}

impl<C: ?Sized> std::fmt::Debug for WeakHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let alive = self.get().is_some();
        f.debug_struct("WeakHandle").field("alive", &alive).finish()
    }
}
