//! Blocking bridge from a push-based observable to a single value.
//!
//! # Responsibility
//! - Attach a one-shot observer on the observable's delivery context.
//! - Run the caller's hook right after attaching, in the same job.
//! - Block the caller until the first value or the timeout.
//!
//! # Invariants
//! - At most one value is captured; later deliveries are ignored.
//! - The observer is detached before this returns, on every path.
//! - Called from the observable's own delivery context it fails at once:
//!   waiting there would block the thread that has to deliver the value.

use crate::live::latch::OneShotLatch;
use crate::live::observable::Observable;
use crate::live::observer::{Observer, ObserverId};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wait budget used by [`await_value`].
pub const DEFAULT_AWAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Failure of a blocking wait on an observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwaitError {
    /// No value was delivered within `waited`.
    Timeout { waited: Duration },
}

impl Display for AwaitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout { waited } => write!(
                f,
                "observable value was never set within {} ms",
                waited.as_millis()
            ),
        }
    }
}

impl Error for AwaitError {}

/// Waits up to [`DEFAULT_AWAIT_TIMEOUT`] for the first value of `observable`.
pub fn await_value<T, O>(observable: &O) -> Result<T, AwaitError>
where
    T: Clone + Send + Sync + 'static,
    O: Observable<T> + Clone + 'static,
{
    await_first_value(observable, DEFAULT_AWAIT_TIMEOUT, || {})
}

/// Attaches a one-shot observer, runs `on_subscribed`, and blocks until the
/// first delivered value or until `timeout` elapses.
///
/// `on_subscribed` runs on the delivery context after the observer is
/// attached, so a mutation performed there cannot be missed. A panic in the
/// hook detaches the observer and is re-raised on the caller.
///
/// # Errors
/// - Returns [`AwaitError::Timeout`] when nothing was delivered in time.
/// - Returns [`AwaitError::Timeout`] with a zero wait, without attaching or
///   running the hook, when called on the observable's delivery context.
pub fn await_first_value<T, O, F>(
    observable: &O,
    timeout: Duration,
    on_subscribed: F,
) -> Result<T, AwaitError>
where
    T: Clone + Send + Sync + 'static,
    O: Observable<T> + Clone + 'static,
    F: FnOnce() + Send + 'static,
{
    let context = Arc::clone(observable.delivery_context());
    if context.is_current() {
        warn!(
            "event=await_value module=live status=error context={} error_code=called_on_delivery_context",
            context.name()
        );
        return Err(AwaitError::Timeout {
            waited: Duration::ZERO,
        });
    }

    let started_at = Instant::now();
    let latch = Arc::new(OneShotLatch::new());
    let target = observable.clone();
    let attached = {
        let latch = Arc::clone(&latch);
        context.run_sync(move || attach_one_shot(target, latch, on_subscribed))
    };

    match latch.wait_timeout(timeout) {
        Some(value) => {
            debug!(
                "event=await_value module=live status=ok observer_id={} duration_ms={}",
                attached,
                started_at.elapsed().as_millis()
            );
            Ok(value)
        }
        None => {
            observable.remove_observer(attached);
            warn!(
                "event=await_value module=live status=timeout observer_id={} timeout_ms={}",
                attached,
                timeout.as_millis()
            );
            Err(AwaitError::Timeout { waited: timeout })
        }
    }
}

fn attach_one_shot<T, O, F>(target: O, latch: Arc<OneShotLatch<T>>, on_subscribed: F) -> ObserverId
where
    T: Clone + Send + Sync + 'static,
    O: Observable<T> + Clone + 'static,
    F: FnOnce(),
{
    // Deliveries are separate jobs on this context, so the id is always set
    // before the observer can run.
    let slot: Arc<OnceCell<ObserverId>> = Arc::new(OnceCell::new());

    let observer: Arc<dyn Observer<T>> = {
        let slot = Arc::clone(&slot);
        let detach_target = target.clone();
        Arc::new(move |value: &T| {
            if latch.is_released() {
                return;
            }
            if let Some(id) = slot.get() {
                detach_target.remove_observer(*id);
            }
            latch.release(value.clone());
        })
    };

    let id = target.observe(observer);
    let _ = slot.set(id);

    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(on_subscribed)) {
        target.remove_observer(id);
        panic::resume_unwind(payload);
    }

    id
}
