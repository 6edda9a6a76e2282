//! Table-keyed invalidation tracker.
//!
//! # Responsibility
//! - Remember which live queries read which table.
//! - On a table mutation, schedule one delivery job that re-evaluates every
//!   live query still alive for that table.
//!
//! # Invariants
//! - The tracker only holds weak handles; dropping the last `LiveQuery`
//!   handle unregisters it lazily on the next register or notify.

use crate::live::delivery::DeliveryContext;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Hook implemented by anything that must re-evaluate after a table changes.
///
/// Always called on the delivery context.
pub(crate) trait TableObserver: Send + Sync {
    fn on_invalidated(&self);
}

pub struct InvalidationTracker {
    delivery: Arc<DeliveryContext>,
    tables: Mutex<HashMap<String, Vec<Weak<dyn TableObserver>>>>,
}

impl InvalidationTracker {
    pub fn new(delivery: Arc<DeliveryContext>) -> Self {
        Self {
            delivery,
            tables: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn register(&self, table: &str, observer: Weak<dyn TableObserver>) {
        let mut tables = self.tables.lock();
        let observers = tables.entry(table.to_string()).or_default();
        observers.retain(|handle| handle.strong_count() > 0);
        observers.push(observer);
    }

    /// Schedules re-evaluation of every live query reading `table`.
    ///
    /// Returns how many live queries were scheduled.
    pub fn notify(&self, table: &str) -> usize {
        let targets: Vec<Arc<dyn TableObserver>> = {
            let mut tables = self.tables.lock();
            let Some(observers) = tables.get_mut(table) else {
                return 0;
            };
            observers.retain(|observer| observer.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };

        let scheduled = targets.len();
        debug!("event=table_invalidated module=live status=ok table={table} live_queries={scheduled}");
        if scheduled > 0 {
            self.delivery.post(move || {
                for target in targets {
                    target.on_invalidated();
                }
            });
        }
        scheduled
    }

    #[cfg(test)]
    fn handle_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, Vec::len)
    }

    /// Number of live queries still alive for `table`.
    pub fn tracked_count(&self, table: &str) -> usize {
        self.tables.lock().get(table).map_or(0, |observers| {
            observers
                .iter()
                .filter(|observer| observer.strong_count() > 0)
                .count()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidationTracker, TableObserver};
    use crate::live::delivery::DeliveryContext;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};

    struct Counter(AtomicUsize);

    impl TableObserver for Counter {
        fn on_invalidated(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn notify_reaches_only_matching_table() {
        let context = Arc::new(DeliveryContext::spawn("test-tracker").unwrap());
        let tracker = InvalidationTracker::new(Arc::clone(&context));
        let items = Arc::new(Counter(AtomicUsize::new(0)));
        let other = Arc::new(Counter(AtomicUsize::new(0)));
        let items_weak: Weak<dyn TableObserver> = Arc::downgrade(&items) as Weak<dyn TableObserver>;
        let other_weak: Weak<dyn TableObserver> = Arc::downgrade(&other) as Weak<dyn TableObserver>;
        tracker.register("items", items_weak);
        tracker.register("other", other_weak);

        assert_eq!(tracker.notify("items"), 1);
        assert_eq!(tracker.notify("missing"), 0);
        context.run_sync(|| ());

        assert_eq!(items.0.load(Ordering::SeqCst), 1);
        assert_eq!(other.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let context = Arc::new(DeliveryContext::spawn("test-prune").unwrap());
        let tracker = InvalidationTracker::new(context);
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let weak: Weak<dyn TableObserver> = Arc::downgrade(&counter) as Weak<dyn TableObserver>;
        tracker.register("items", weak);
        assert_eq!(tracker.tracked_count("items"), 1);

        drop(counter);
        assert_eq!(tracker.tracked_count("items"), 0);
        assert_eq!(tracker.notify("items"), 0);
    }

    #[test]
    fn register_prunes_dropped_handles() {
        let context = Arc::new(DeliveryContext::spawn("test-register-prune").unwrap());
        let tracker = InvalidationTracker::new(context);

        for _ in 0..16 {
            let counter = Arc::new(Counter(AtomicUsize::new(0)));
            let weak: Weak<dyn TableObserver> = Arc::downgrade(&counter) as Weak<dyn TableObserver>;
            tracker.register("items", weak);
        }

        assert_eq!(tracker.handle_count("items"), 1);
        assert_eq!(tracker.tracked_count("items"), 0);
    }
}
