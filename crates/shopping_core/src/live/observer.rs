//! Observer contracts and per-observable observer bookkeeping.
//!
//! Each observable keeps the latest published value and a version counter.
//! Observers remember the last version they were handed, so:
//!   - a newly attached observer receives the current value, if any;
//!   - nobody receives the same version twice.
//!
//! The registry never calls observers itself. It hands back a [`Delivery`]
//! that the caller dispatches after releasing its lock. An observer detached
//! while a delivery is in flight is skipped by that delivery.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Handle returned by `observe`, used to detach the observer again.
pub type ObserverId = u64;

static NEXT_OBSERVER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a process-wide unique observer id.
///
/// Ids are handed out before the attach job runs, so `observe` can return
/// one without waiting for the delivery context.
pub(crate) fn next_observer_id() -> ObserverId {
    NEXT_OBSERVER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Receiver of pushed snapshots.
pub trait Observer<T>: Send + Sync {
    fn on_changed(&self, value: &T);
}

impl<T, F> Observer<T> for F
where
    F: Fn(&T) + Send + Sync,
{
    fn on_changed(&self, value: &T) {
        self(value)
    }
}

struct ObserverEntry<T> {
    id: ObserverId,
    observer: Arc<dyn Observer<T>>,
    attached: Arc<AtomicBool>,
    last_version: u64,
}

pub(crate) struct ObserverRegistry<T> {
    entries: Vec<ObserverEntry<T>>,
    value: Option<Arc<T>>,
    version: u64,
}

impl<T> ObserverRegistry<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            value: None,
            version: 0,
        }
    }

    pub(crate) fn attach(&mut self, id: ObserverId, observer: Arc<dyn Observer<T>>) {
        self.entries.push(ObserverEntry {
            id,
            observer,
            attached: Arc::new(AtomicBool::new(true)),
            last_version: 0,
        });
    }

    /// Returns `false` when `id` was not attached (already removed).
    pub(crate) fn detach(&mut self, id: ObserverId) -> bool {
        let Some(index) = self.entries.iter().position(|entry| entry.id == id) else {
            return false;
        };
        let entry = self.entries.remove(index);
        entry.attached.store(false, Ordering::SeqCst);
        true
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn value(&self) -> Option<Arc<T>> {
        self.value.clone()
    }

    /// Stores `value` as a new version and returns the delivery for every
    /// attached observer.
    pub(crate) fn publish(&mut self, value: T) -> Delivery<T> {
        self.version += 1;
        let value = Arc::new(value);
        self.value = Some(Arc::clone(&value));
        let observers = self.take_behind();
        Delivery { value, observers }
    }

    /// Returns the delivery for observers that have not seen the current
    /// version yet, or `None` when there is nothing to hand out.
    pub(crate) fn pending(&mut self) -> Option<Delivery<T>> {
        let value = self.value.clone()?;
        let observers = self.take_behind();
        if observers.is_empty() {
            return None;
        }
        Some(Delivery { value, observers })
    }

    fn take_behind(&mut self) -> Vec<Recipient<T>> {
        let version = self.version;
        self.entries
            .iter_mut()
            .filter(|entry| entry.last_version < version)
            .map(|entry| {
                entry.last_version = version;
                Recipient {
                    observer: Arc::clone(&entry.observer),
                    attached: Arc::clone(&entry.attached),
                }
            })
            .collect()
    }
}

struct Recipient<T> {
    observer: Arc<dyn Observer<T>>,
    attached: Arc<AtomicBool>,
}

/// One value and the observers it must be handed to.
pub(crate) struct Delivery<T> {
    value: Arc<T>,
    observers: Vec<Recipient<T>>,
}

impl<T> Delivery<T> {
    /// Hands the value to every recipient still attached at its turn.
    ///
    /// Returns how many observers were called.
    pub(crate) fn dispatch(self) -> usize {
        let mut called = 0;
        for recipient in &self.observers {
            if !recipient.attached.load(Ordering::SeqCst) {
                continue;
            }
            recipient.observer.on_changed(&self.value);
            called += 1;
        }
        called
    }
}

#[cfg(test)]
mod tests {
    use super::{next_observer_id, Observer, ObserverRegistry};
    use std::sync::{Arc, Mutex};

    fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> Arc<dyn Observer<i32>> {
        let log = Arc::clone(log);
        Arc::new(move |value: &i32| log.lock().unwrap().push(format!("{tag}:{value}")))
    }

    #[test]
    fn publish_reaches_every_attached_observer() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.attach(next_observer_id(), recorder(&log, "a"));
        registry.attach(next_observer_id(), recorder(&log, "b"));

        assert_eq!(registry.publish(1).dispatch(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
    }

    #[test]
    fn late_observer_receives_current_value_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        registry.attach(next_observer_id(), recorder(&log, "a"));
        registry.publish(5).dispatch();

        registry.attach(next_observer_id(), recorder(&log, "late"));
        let delivery = registry.pending().expect("late observer is behind");
        assert_eq!(delivery.dispatch(), 1);
        assert!(registry.pending().is_none());

        assert_eq!(*log.lock().unwrap(), vec!["a:5", "late:5"]);
    }

    #[test]
    fn pending_without_value_is_none() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry: ObserverRegistry<i32> = ObserverRegistry::new();
        registry.attach(next_observer_id(), recorder(&log, "a"));
        assert!(registry.pending().is_none());
    }

    #[test]
    fn detach_reports_whether_observer_was_attached() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        let id = next_observer_id();
        registry.attach(id, recorder(&log, "a"));

        assert!(registry.detach(id));
        assert!(!registry.detach(id));
        assert!(registry.is_empty());
        assert_eq!(registry.publish(3).dispatch(), 0);
        assert_eq!(registry.value().as_deref(), Some(&3));
    }

    #[test]
    fn observer_detached_during_dispatch_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ObserverRegistry::new();
        let first = next_observer_id();
        let second = next_observer_id();
        registry.attach(first, recorder(&log, "a"));
        registry.attach(second, recorder(&log, "b"));

        let delivery = registry.publish(4);
        assert!(registry.detach(second));

        assert_eq!(delivery.dispatch(), 1);
        assert_eq!(*log.lock().unwrap(), vec!["a:4"]);
    }

    #[test]
    fn observer_ids_are_unique() {
        let first = next_observer_id();
        let second = next_observer_id();
        assert_ne!(first, second);
    }
}
