//! Panic-isolated observer lists
//!
//! Progress and live-preview callbacks are caller code. A panicking
//! callback is logged and skipped; the remaining observers still run and
//! the evaluation never sees the panic.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Callback invoked with every published value
pub type Observer<T> = Box<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`ObserverSet::add`], used to remove the observer again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Ordered list of observers notified in registration order
pub struct ObserverSet<T> {
    observers: Vec<(ObserverId, Observer<T>)>,
    next_id: u64,
}

impl<T> ObserverSet<T> {
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
            next_id: 0,
        }
    }

    /// Register an observer
    pub fn add<F>(&mut self, observer: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer, returning whether it was registered
    pub fn remove(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Deliver `value` to every observer, returning how many panicked
    pub fn notify(&self, value: &T) -> usize {
        let mut panicked = 0;
        for (id, observer) in &self.observers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer(value))) {
                panicked += 1;
                tracing::warn!(
                    observer = id.0,
                    panic = %panic_message(payload.as_ref()),
                    "Observer panicked, continuing"
                );
            }
        }
        panicked
    }
}

impl<T> Default for ObserverSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ObserverSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_panicking_observer_is_isolated() {
        let seen = Arc::new(AtomicUsize::new(0));
        let mut set = ObserverSet::<u32>::new();

        set.add(|_| panic!("observer failure"));
        let counter = seen.clone();
        set.add(move |v| {
            counter.fetch_add(*v as usize, Ordering::SeqCst);
        });

        assert_eq!(set.notify(&3), 1);
        assert_eq!(set.notify(&4), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_remove_observer() {
        let mut set = ObserverSet::<()>::new();
        let id = set.add(|_| {});
        assert_eq!(set.len(), 1);
        assert!(set.remove(id));
        assert!(!set.remove(id));
        assert!(set.is_empty());
    }
}
