//! Manually-set observable value.

use crate::live::delivery::DeliveryContext;
use crate::live::observable::Observable;
use crate::live::observer::{next_observer_id, Observer, ObserverId, ObserverRegistry};
use parking_lot::Mutex;
use std::sync::Arc;

/// Observable holder whose value is pushed explicitly with
/// [`LiveValue::set_value`].
///
/// Every `set_value` becomes one delivery job, so two quick updates reach
/// observers as two separate, ordered deliveries.
pub struct LiveValue<T> {
    inner: Arc<LiveValueInner<T>>,
}

struct LiveValueInner<T> {
    delivery: Arc<DeliveryContext>,
    registry: Mutex<ObserverRegistry<T>>,
}

impl<T> Clone for LiveValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> LiveValue<T> {
    /// Creates an empty holder; observers receive nothing until a value is set.
    pub fn new(delivery: Arc<DeliveryContext>) -> Self {
        Self {
            inner: Arc::new(LiveValueInner {
                delivery,
                registry: Mutex::new(ObserverRegistry::new()),
            }),
        }
    }

    /// Publishes `value` to every observer from the delivery context.
    pub fn set_value(&self, value: T) {
        let inner = Arc::clone(&self.inner);
        self.inner.delivery.post(move || {
            let delivery = inner.registry.lock().publish(value);
            delivery.dispatch();
        });
    }

    /// Latest published value.
    ///
    /// A value passed to `set_value` becomes visible here once its delivery
    /// job has run.
    pub fn value(&self) -> Option<Arc<T>> {
        self.inner.registry.lock().value()
    }
}

impl<T: Send + Sync + 'static> Observable<T> for LiveValue<T> {
    fn observe(&self, observer: Arc<dyn Observer<T>>) -> ObserverId {
        let id = next_observer_id();
        let inner = Arc::clone(&self.inner);
        let catch_up = move || {
            let pending = inner.registry.lock().pending();
            if let Some(delivery) = pending {
                delivery.dispatch();
            }
        };

        if self.inner.delivery.is_current() {
            self.inner.registry.lock().attach(id, observer);
            self.inner.delivery.post(catch_up);
        } else {
            let attach_to = Arc::clone(&self.inner);
            self.inner.delivery.post(move || {
                attach_to.registry.lock().attach(id, observer);
                catch_up();
            });
        }
        id
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        let inner = Arc::clone(&self.inner);
        self.inner
            .delivery
            .run_sync(move || inner.registry.lock().detach(id))
    }

    fn observer_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    fn delivery_context(&self) -> &Arc<DeliveryContext> {
        &self.inner.delivery
    }
}

#[cfg(test)]
mod tests {
    use super::LiveValue;
    use crate::live::delivery::DeliveryContext;
    use crate::live::observable::Observable;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn set_values_are_delivered_in_order() {
        let context = Arc::new(DeliveryContext::spawn("test-live-value").unwrap());
        let live = LiveValue::new(Arc::clone(&context));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        live.observe_with(move |value: &u32| sink.lock().unwrap().push(*value));
        live.set_value(1);
        live.set_value(2);
        context.run_sync(|| ());

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(live.value().as_deref(), Some(&2));
    }

    #[test]
    fn observer_attached_after_set_receives_latest_value() {
        let context = Arc::new(DeliveryContext::spawn("test-live-late").unwrap());
        let live = LiveValue::new(Arc::clone(&context));
        live.set_value("first".to_string());
        live.set_value("second".to_string());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = live.observe_with(move |value: &String| sink.lock().unwrap().push(value.clone()));
        context.run_sync(|| ());

        assert_eq!(*seen.lock().unwrap(), vec!["second".to_string()]);
        assert!(live.remove_observer(id));
        assert_eq!(live.observer_count(), 0);
    }

    #[test]
    fn removed_observer_is_not_called_after_removal_returns() {
        let context = Arc::new(DeliveryContext::spawn("test-live-remove").unwrap());
        let live = LiveValue::new(Arc::clone(&context));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (gate_tx, gate_rx) = mpsc::channel::<()>();
        let entered_tx = Mutex::new(entered_tx);
        let gate_rx = Mutex::new(gate_rx);
        live.observe_with(move |_: &u8| {
            let _ = entered_tx.lock().unwrap().send(());
            let _ = gate_rx.lock().unwrap().recv_timeout(Duration::from_secs(2));
        });

        let removed = Arc::new(AtomicBool::new(false));
        let late_calls = Arc::new(AtomicUsize::new(0));
        let blocked_id = {
            let removed = Arc::clone(&removed);
            let late_calls = Arc::clone(&late_calls);
            live.observe_with(move |_: &u8| {
                if removed.load(Ordering::SeqCst) {
                    late_calls.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        live.set_value(1);
        entered_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let remover = {
            let live = live.clone();
            let removed = Arc::clone(&removed);
            thread::spawn(move || {
                let detached = live.remove_observer(blocked_id);
                removed.store(true, Ordering::SeqCst);
                detached
            })
        };
        thread::sleep(Duration::from_millis(50));
        gate_tx.send(()).unwrap();

        assert!(remover.join().unwrap());
        live.set_value(2);
        gate_tx.send(()).unwrap();
        context.run_sync(|| ());

        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        assert_eq!(live.observer_count(), 1);
    }

    #[test]
    fn observer_removed_by_earlier_observer_skips_same_delivery() {
        let context = Arc::new(DeliveryContext::spawn("test-live-self-remove").unwrap());
        let live: LiveValue<u8> = LiveValue::new(Arc::clone(&context));
        let calls = Arc::new(AtomicUsize::new(0));
        let target = Arc::new(Mutex::new(None));

        {
            let handle = live.clone();
            let target = Arc::clone(&target);
            live.observe_with(move |_: &u8| {
                if let Some(id) = target.lock().unwrap().take() {
                    handle.remove_observer(id);
                }
            });
        }
        let second = {
            let calls = Arc::clone(&calls);
            live.observe_with(move |_: &u8| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        *target.lock().unwrap() = Some(second);

        live.set_value(7);
        context.run_sync(|| ());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(live.observer_count(), 1);
    }
}
