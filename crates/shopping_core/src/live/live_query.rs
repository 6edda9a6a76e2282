//! Query-backed observable.
//!
//! # Responsibility
//! - Run a read query against the shared connection and push the result as
//!   a full snapshot to attached observers.
//! - Re-run the query after every invalidation while observed.
//!
//! # Invariants
//! - Queries run only on the delivery context, never while the state lock
//!   is held, and observers are called with no lock held.
//! - While nobody observes, invalidations only mark the query stale; the
//!   next attached observer triggers a fresh evaluation.
//! - Observers are attached and detached on the delivery context, so a
//!   detached observer is never called once `remove_observer` returns.

use crate::live::delivery::DeliveryContext;
use crate::live::invalidation::TableObserver;
use crate::live::observable::Observable;
use crate::live::observer::{next_observer_id, Observer, ObserverId, ObserverRegistry};
use crate::repo::shopping_repo::RepoResult;
use log::{debug, error};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::{Arc, Weak};
use std::time::Instant;

type ComputeFn<T> = dyn Fn(&Connection) -> RepoResult<T> + Send + Sync;

/// Continuously updated query result.
///
/// Cloning yields another handle to the same query and observers.
pub struct LiveQuery<T> {
    inner: Arc<LiveQueryInner<T>>,
}

struct LiveQueryInner<T> {
    label: String,
    conn: Arc<Mutex<Connection>>,
    delivery: Arc<DeliveryContext>,
    compute: Box<ComputeFn<T>>,
    state: Mutex<QueryState<T>>,
}

struct QueryState<T> {
    registry: ObserverRegistry<T>,
    stale: bool,
}

impl<T> Clone for LiveQuery<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> LiveQuery<T> {
    pub(crate) fn new(
        label: impl Into<String>,
        conn: Arc<Mutex<Connection>>,
        delivery: Arc<DeliveryContext>,
        compute: impl Fn(&Connection) -> RepoResult<T> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(LiveQueryInner {
                label: label.into(),
                conn,
                delivery,
                compute: Box::new(compute),
                state: Mutex::new(QueryState {
                    registry: ObserverRegistry::new(),
                    stale: true,
                }),
            }),
        }
    }

    pub(crate) fn table_observer(&self) -> Weak<dyn TableObserver> {
        let weak: Weak<LiveQueryInner<T>> = Arc::downgrade(&self.inner);
        weak
    }

    /// Latest delivered snapshot, if the query has been evaluated.
    pub fn value(&self) -> Option<Arc<T>> {
        self.inner.state.lock().registry.value()
    }
}

impl<T: Send + Sync + 'static> LiveQueryInner<T> {
    fn on_attached(&self) {
        let pending = {
            let mut state = self.state.lock();
            if state.registry.is_empty() {
                return;
            }
            if state.stale {
                drop(state);
                self.refresh();
                return;
            }
            state.registry.pending()
        };

        if let Some(delivery) = pending {
            delivery.dispatch();
        }
    }

    fn detach(&self, id: ObserverId) -> bool {
        let mut state = self.state.lock();
        let removed = state.registry.detach(id);
        if removed && state.registry.is_empty() {
            debug!(
                "event=live_query_inactive module=live status=ok query={}",
                self.label
            );
        }
        removed
    }

    fn refresh(&self) {
        let started_at = Instant::now();
        let result = {
            let conn = self.conn.lock();
            (self.compute)(&conn)
        };

        match result {
            Ok(value) => {
                let delivery = {
                    let mut state = self.state.lock();
                    state.stale = false;
                    state.registry.publish(value)
                };
                let observers = delivery.dispatch();
                debug!(
                    "event=live_query_refresh module=live status=ok query={} observers={} duration_ms={}",
                    self.label,
                    observers,
                    started_at.elapsed().as_millis()
                );
            }
            Err(err) => {
                error!(
                    "event=live_query_refresh module=live status=error query={} duration_ms={} error={}",
                    self.label,
                    started_at.elapsed().as_millis(),
                    err
                );
            }
        }
    }
}

impl<T: Send + Sync + 'static> TableObserver for LiveQueryInner<T> {
    fn on_invalidated(&self) {
        {
            let mut state = self.state.lock();
            if state.registry.is_empty() {
                state.stale = true;
                return;
            }
        }
        self.refresh();
    }
}

impl<T: Send + Sync + 'static> Observable<T> for LiveQuery<T> {
    fn observe(&self, observer: Arc<dyn Observer<T>>) -> ObserverId {
        let id = next_observer_id();
        let inner = Arc::clone(&self.inner);
        if self.inner.delivery.is_current() {
            self.inner.state.lock().registry.attach(id, observer);
            self.inner.delivery.post(move || inner.on_attached());
        } else {
            self.inner.delivery.post(move || {
                inner.state.lock().registry.attach(id, observer);
                inner.on_attached();
            });
        }
        id
    }

    fn remove_observer(&self, id: ObserverId) -> bool {
        let inner = Arc::clone(&self.inner);
        self.inner.delivery.run_sync(move || inner.detach(id))
    }

    fn observer_count(&self) -> usize {
        self.inner.state.lock().registry.len()
    }

    fn delivery_context(&self) -> &Arc<DeliveryContext> {
        &self.inner.delivery
    }
}
