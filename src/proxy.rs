//! Deferred-command forward references
//!
//! A [`Proxy`] stands in for an object that will only exist later (a view
//! still waiting to be instantiated by its host, typically). Consumers can
//! be wired against the proxy immediately; commands sent before the real
//! object arrives are queued and run the moment it is attached.

use std::any::Any;
use std::sync::{Arc, Mutex, Weak};

#[cfg(feature = "logging")]
use tracing::debug;

/// A queued proxy command
type Command = Box<dyn FnOnce() + Send>;

/// Forward reference to an object that does not exist yet.
///
/// The proxy is **Unbound** until an object is attached through
/// [`Registry::notify_ready`](crate::Registry::notify_ready), then **Bound**
/// while that object is alive. The attached object is held weakly; a proxy
/// never extends its lifetime.
///
/// One proxy can back several capability interfaces at once: each adapter
/// forwards through [`execute_or_postpone`](Self::execute_or_postpone) and
/// reads the live object with [`target`](Self::target).
///
/// # Examples
///
/// ```rust
/// use cellwire::Registry;
/// use std::sync::{Arc, Mutex};
///
/// #[derive(Default)]
/// struct Banner {
///     text: Mutex<String>,
/// }
///
/// let registry = Registry::new();
/// let proxy = registry.create_proxy::<Banner>(true);
///
/// // Queued: no banner exists yet.
/// let forward = Arc::clone(&proxy);
/// proxy.execute_or_postpone(move || {
///     if let Some(banner) = forward.target::<Banner>() {
///         *banner.text.lock().unwrap() = "ready".into();
///     }
/// });
///
/// let banner = Arc::new(Banner::default());
/// registry.notify_ready(&banner);
/// assert_eq!(*banner.text.lock().unwrap(), "ready");
/// ```
pub struct Proxy {
    reusable: bool,
    state: Mutex<State>,
}

struct State {
    target: Option<Weak<dyn Any + Send + Sync>>,
    commands: Vec<Command>,
    was_bound: bool,
}

impl State {
    /// Upgrade the current target. Observing an expired target is the
    /// Bound -> Unbound transition: queued commands are discarded unrun.
    fn live_target(&mut self) -> Option<Arc<dyn Any + Send + Sync>> {
        match self.target.as_ref().and_then(Weak::upgrade) {
            Some(object) => Some(object),
            None => {
                if self.target.take().is_some() {
                    self.commands.clear();
                }
                None
            }
        }
    }
}

impl Proxy {
    pub(crate) fn new(reusable: bool) -> Self {
        Self {
            reusable,
            state: Mutex::new(State {
                target: None,
                commands: Vec::new(),
                was_bound: false,
            }),
        }
    }

    /// Whether commands keep being queued across attach/detach cycles
    #[inline]
    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    /// Whether a live object is currently attached
    pub fn is_bound(&self) -> bool {
        self.state.lock().unwrap().live_target().is_some()
    }

    /// Run `command` now when a live object is attached, otherwise queue it
    /// for the next attach.
    ///
    /// A non-reusable proxy only queues while it has never been bound; once
    /// the first attached object is gone again, further unbound-state
    /// commands are dropped so stale closures cannot pile up across an
    /// object's replacement.
    pub fn execute_or_postpone(&self, command: impl FnOnce() + Send + 'static) {
        let mut state = self.state.lock().unwrap();
        if let Some(_object) = state.live_target() {
            drop(state);
            command();
            return;
        }
        if self.reusable || !state.was_bound {
            state.commands.push(Box::new(command));
        }
    }

    /// The attached object, if it is alive and of type `T`.
    ///
    /// Capability adapters call this inside their forwarded commands to
    /// reach the concrete object.
    pub fn target<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let object = self.state.lock().unwrap().live_target()?;
        object.downcast::<T>().ok()
    }

    /// Drop the attached object reference and discard queued commands
    pub fn detach(&self) {
        let mut state = self.state.lock().unwrap();
        state.target = None;
        state.commands.clear();
    }

    /// Attach `object` and run every queued command, in order.
    ///
    /// The object is stored weakly; the queue is empty afterwards.
    pub(crate) fn attach<T: Send + Sync + 'static>(&self, object: &Arc<T>) {
        let pending = {
            let mut state = self.state.lock().unwrap();
            let cloned: Arc<T> = Arc::clone(object);
            let erased: Arc<dyn Any + Send + Sync> = cloned;
            state.target = Some(Arc::downgrade(&erased));
            state.was_bound = true;
            std::mem::take(&mut state.commands)
        };

        #[cfg(feature = "logging")]
        if !pending.is_empty() {
            debug!(
                target: "cellwire",
                service = std::any::type_name::<T>(),
                commands = pending.len(),
                "Proxy bound, running queued commands"
            );
        }

        for command in pending {
            command();
        }
    }
}

impl std::fmt::Debug for Proxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().unwrap();
        let bound = state.target.as_ref().is_some_and(|target| target.strong_count() > 0);
        f.debug_struct("Proxy")
            .field("reusable", &self.reusable)
            .field("bound", &bound)
            .field("queued_commands", &state.commands.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Screen;

    fn counting_command(counter: &Arc<AtomicU32>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_attach_runs_queued_commands_once() {
        let proxy = Proxy::new(true);
        let calls = Arc::new(AtomicU32::new(0));
        proxy.execute_or_postpone(counting_command(&calls));
        proxy.execute_or_postpone(counting_command(&calls));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let screen = Arc::new(Screen);
        proxy.attach(&screen);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // queue was cleared; a second attach must not replay anything
        proxy.attach(&screen);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_commands_run_immediately_while_bound() {
        let proxy = Proxy::new(true);
        let screen = Arc::new(Screen);
        proxy.attach(&screen);

        let calls = Arc::new(AtomicU32::new(0));
        proxy.execute_or_postpone(counting_command(&calls));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_non_reusable_queues_only_before_first_bind() {
        let proxy = Proxy::new(false);
        let calls = Arc::new(AtomicU32::new(0));

        proxy.execute_or_postpone(counting_command(&calls));

        let screen = Arc::new(Screen);
        proxy.attach(&screen);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(screen);
        proxy.execute_or_postpone(counting_command(&calls));

        let replacement = Arc::new(Screen);
        proxy.attach(&replacement);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reusable_keeps_queuing_across_replacements() {
        let proxy = Proxy::new(true);
        let screen = Arc::new(Screen);
        proxy.attach(&screen);
        drop(screen);

        let calls = Arc::new(AtomicU32::new(0));
        proxy.execute_or_postpone(counting_command(&calls));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let replacement = Arc::new(Screen);
        proxy.attach(&replacement);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_detach_discards_queued_commands() {
        let proxy = Proxy::new(true);
        let calls = Arc::new(AtomicU32::new(0));
        proxy.execute_or_postpone(counting_command(&calls));

        proxy.detach();

        let screen = Arc::new(Screen);
        proxy.attach(&screen);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_expired_target_discards_queue_without_running() {
        let proxy = Proxy::new(true);
        let screen = Arc::new(Screen);
        proxy.attach(&screen);

        // queue while bound is impossible; bind a replacement period instead
        drop(screen);
        let calls = Arc::new(AtomicU32::new(0));
        proxy.execute_or_postpone(counting_command(&calls));
        assert!(!proxy.is_bound());

        let revived = Arc::new(Screen);
        proxy.attach(&revived);
        drop(revived);

        // the queued command already ran on attach; expiry must not rerun it
        assert!(!proxy.is_bound());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_proxy_does_not_retain_its_target() {
        let proxy = Proxy::new(true);
        let screen = Arc::new(Screen);
        let observer = Arc::downgrade(&screen);
        proxy.attach(&screen);

        drop(screen);

        assert!(observer.upgrade().is_none());
        assert!(!proxy.is_bound());
    }

    #[test]
    fn test_queued_command_captures_are_released_after_attach() {
        let proxy = Proxy::new(true);
        let payload = Arc::new(Screen);
        let captured = Arc::clone(&payload);
        let observer = Arc::downgrade(&payload);
        proxy.execute_or_postpone(move || {
            let _ = &captured;
        });
        drop(payload);
        assert!(observer.upgrade().is_some());

        let screen = Arc::new(Screen);
        proxy.attach(&screen);

        assert!(observer.upgrade().is_none());
    }

    #[test]
    fn test_target_downcasts_to_the_attached_type() {
        struct Other;

        let proxy = Proxy::new(true);
        let screen = Arc::new(Screen);
        proxy.attach(&screen);

        assert!(proxy.target::<Screen>().is_some());
        assert!(proxy.target::<Other>().is_none());
    }
}
