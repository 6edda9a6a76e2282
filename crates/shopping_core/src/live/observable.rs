//! Common surface of push-based observable values.

use crate::live::delivery::DeliveryContext;
use crate::live::observer::{Observer, ObserverId};
use std::sync::Arc;

/// A value that pushes snapshots to attached observers on its delivery
/// context.
///
/// Deliveries for one observable are serialized on
/// [`Observable::delivery_context`]; attaching and detaching there as well
/// avoids racing an in-flight delivery.
pub trait Observable<T>: Send + Sync {
    /// Attaches `observer`. The current value, if any, is delivered
    /// asynchronously on the delivery context.
    ///
    /// Called on the delivery context the observer is attached before this
    /// returns; from any other thread the attach is queued as a job.
    fn observe(&self, observer: Arc<dyn Observer<T>>) -> ObserverId;

    /// Detaches an observer on the delivery context and blocks until done.
    /// Returns `false` when it was not attached.
    fn remove_observer(&self, id: ObserverId) -> bool;

    fn observer_count(&self) -> usize;

    fn delivery_context(&self) -> &Arc<DeliveryContext>;

    /// Closure flavour of [`Observable::observe`].
    fn observe_with<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&T) + Send + Sync + 'static,
        T: 'static,
        Self: Sized,
    {
        self.observe(Arc::new(callback))
    }
}
