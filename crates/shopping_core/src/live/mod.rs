//! Observable values and continuously updated queries.
//!
//! # Responsibility
//! - Push full snapshots to observers whenever the underlying data changes.
//! - Serialize every delivery, attach and detach on one delivery context.
//! - Bridge an observable to a blocking, timeout-bounded single value.
//!
//! # Invariants
//! - Observers are never invoked while any internal lock is held.
//! - Deliveries for one observable never run concurrently.

pub mod await_value;
pub mod delivery;
pub mod invalidation;
pub mod latch;
pub mod live_query;
pub mod live_value;
pub mod observable;
pub mod observer;

pub use await_value::{await_first_value, await_value, AwaitError, DEFAULT_AWAIT_TIMEOUT};
pub use delivery::DeliveryContext;
pub use invalidation::InvalidationTracker;
pub use latch::OneShotLatch;
pub use live_query::LiveQuery;
pub use live_value::LiveValue;
pub use observable::Observable;
pub use observer::{Observer, ObserverId};
