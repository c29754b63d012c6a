//! Process-wide set of active connection listeners.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::event::ConnectionEvent;
use crate::listener::ConnectionListener;

type Snapshot = Arc<Vec<Arc<dyn ConnectionListener>>>;

static GLOBAL_REGISTRY: Lazy<Arc<ListenerRegistry>> = Lazy::new(|| Arc::new(ListenerRegistry::new()));

/// Listeners that profiled connections dispatch to.
///
/// Registration replaces the listener list, and dispatch iterates over the
/// list it found when it started, so no lock is held while listeners run.
/// A listener registered twice receives every event twice.
#[derive(Default)]
pub struct ListenerRegistry {
    listeners: RwLock<Snapshot>,
}

impl ListenerRegistry {
    /// Create an empty registry, independent from the global one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry. Empty at process start.
    pub fn global() -> Arc<ListenerRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    pub fn register(&self, listener: Arc<dyn ConnectionListener>) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::with_capacity(listeners.len() + 1);
        next.extend(listeners.iter().cloned());
        next.push(listener);
        *listeners = Arc::new(next);
        tracing::debug!(listeners = listeners.len(), "connection listener registered");
    }

    /// Remove every registration of `listener`. Unknown listeners are ignored.
    pub fn unregister(&self, listener: &dyn ConnectionListener) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if !listeners.iter().any(|l| same_listener(l.as_ref(), listener)) {
            return;
        }
        let next: Vec<_> = listeners
            .iter()
            .filter(|l| !same_listener(l.as_ref(), listener))
            .cloned()
            .collect();
        *listeners = Arc::new(next);
        tracing::debug!(listeners = listeners.len(), "connection listener unregistered");
    }

    pub fn clear(&self) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        *listeners = Arc::default();
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Deliver an event to every registered listener, in registration order.
    ///
    /// Listener failures are logged and swallowed.
    pub fn dispatch(&self, event: &ConnectionEvent<'_>) {
        for listener in self.snapshot().iter() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => tracing::warn!(
                    connection = %event.connection_id(),
                    operation = event.operation.name(),
                    error = %err,
                    "connection listener failed"
                ),
                Err(_) => tracing::error!(
                    connection = %event.connection_id(),
                    operation = event.operation.name(),
                    "connection listener panicked"
                ),
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        Arc::clone(&self.listeners.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

fn same_listener(a: &dyn ConnectionListener, b: &dyn ConnectionListener) -> bool {
    std::ptr::addr_eq(a as *const dyn ConnectionListener, b as *const dyn ConnectionListener)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProfilerError;
    use crate::event::{ConnectionHandle, ConnectionId, Operation};
    use sea_orm::DbErr;
    use std::sync::Mutex;

    struct Handle(ConnectionId);

    impl ConnectionHandle for Handle {
        fn id(&self) -> ConnectionId {
            self.0
        }

        fn current_isolation(&self) -> Result<i32, DbErr> {
            Ok(2)
        }
    }

    struct Collector {
        name: &'static str,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ConnectionListener for Collector {
        fn on_event(&self, event: &ConnectionEvent<'_>) -> Result<(), ProfilerError> {
            self.seen
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.operation.name()));
            Ok(())
        }
    }

    struct Failing;

    impl ConnectionListener for Failing {
        fn on_event(&self, _event: &ConnectionEvent<'_>) -> Result<(), ProfilerError> {
            Err(ProfilerError::listener("boom"))
        }
    }

    struct Panicking;

    impl ConnectionListener for Panicking {
        fn on_event(&self, _event: &ConnectionEvent<'_>) -> Result<(), ProfilerError> {
            panic!("listener bug");
        }
    }

    fn commit(registry: &ListenerRegistry) {
        let handle = Handle(ConnectionId::next());
        registry.dispatch(&ConnectionEvent::new(&handle, Operation::Commit));
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(Collector { name: "a", seen: seen.clone() }));
        registry.register(Arc::new(Collector { name: "b", seen: seen.clone() }));

        commit(&registry);

        assert_eq!(*seen.lock().unwrap(), vec!["a:commit", "b:commit"]);
    }

    #[test]
    fn test_empty_registry_dispatch_is_noop() {
        let registry = ListenerRegistry::new();
        assert!(registry.is_empty());
        commit(&registry);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn ConnectionListener> = Arc::new(Collector { name: "a", seen: seen.clone() });
        registry.register(listener.clone());
        registry.register(listener.clone());
        assert_eq!(registry.len(), 2);

        registry.unregister(listener.as_ref());
        registry.unregister(listener.as_ref());
        assert!(registry.is_empty());

        commit(&registry);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_registration_receives_twice() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        let listener: Arc<dyn ConnectionListener> = Arc::new(Collector { name: "a", seen: seen.clone() });
        registry.register(listener.clone());
        registry.register(listener);

        commit(&registry);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_failing_listeners_do_not_stop_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let registry = ListenerRegistry::new();
        registry.register(Arc::new(Failing));
        registry.register(Arc::new(Panicking));
        registry.register(Arc::new(Collector { name: "a", seen: seen.clone() }));

        commit(&registry);
        assert_eq!(*seen.lock().unwrap(), vec!["a:commit"]);
    }

    #[test]
    fn test_concurrent_registration_and_dispatch() {
        let registry = Arc::new(ListenerRegistry::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let seen = seen.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let listener: Arc<dyn ConnectionListener> =
                            Arc::new(Collector { name: "t", seen: seen.clone() });
                        registry.register(listener.clone());
                        commit(&registry);
                        registry.unregister(listener.as_ref());
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert!(registry.is_empty());
        // Each dispatch reaches at least the listener its own thread registered.
        assert!(seen.lock().unwrap().len() >= 400);
    }
}
