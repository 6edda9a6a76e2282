//! Single-threaded delivery context for observable values.
//!
//! # Responsibility
//! - Run posted jobs one at a time, in posting order, on a dedicated thread.
//! - Let blocking callers run a closure on the context and get its result.
//!
//! # Invariants
//! - Jobs never run concurrently with each other.
//! - A panicking job is logged and does not stop the worker.
//! - The worker exits only after the context's sender is dropped.

use log::{debug, error};
use parking_lot::Mutex;
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A named worker thread that serializes observer delivery work.
pub struct DeliveryContext {
    name: String,
    sender: Mutex<Option<Sender<Job>>>,
    thread_id: ThreadId,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeliveryContext {
    /// Spawns the worker thread backing a new context.
    ///
    /// # Errors
    /// - Returns the OS error when the thread cannot be spawned.
    pub fn spawn(name: impl Into<String>) -> io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>();
        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(worker_name, receiver))?;

        debug!("event=delivery_start module=live status=ok context={name}");

        Ok(Self {
            thread_id: handle.thread().id(),
            name,
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns whether the calling thread is this context's worker.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queues `job` behind every job posted before it.
    ///
    /// Returns `false` when the context is shutting down and the job was
    /// dropped without running.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) -> bool {
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(sender) => sender.send(Box::new(job)).is_ok(),
            None => false,
        }
    }

    /// Runs `job` on the context and blocks until it has finished.
    ///
    /// Runs inline when already called from the worker, so a job may call
    /// this without deadlocking. A panic inside `job` is re-raised on the
    /// calling thread.
    pub fn run_sync<R>(&self, job: impl FnOnce() -> R + Send + 'static) -> R
    where
        R: Send + 'static,
    {
        if self.is_current() {
            return job();
        }

        let (result_tx, result_rx) = mpsc::sync_channel(1);
        self.post(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            let _ = result_tx.send(outcome);
        });

        match result_rx
            .recv()
            .expect("delivery worker outlives its context and runs every posted job")
        {
            Ok(value) => value,
            Err(payload) => panic::resume_unwind(payload),
        }
    }
}

impl Drop for DeliveryContext {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain remaining jobs and exit.
        self.sender.lock().take();
        let handle = self.handle.lock().take();
        if self.is_current() {
            return;
        }
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(
                    "event=delivery_stop module=live status=error context={} error_code=worker_join_failed",
                    self.name
                );
            }
        }
    }
}

fn run_worker(name: String, receiver: Receiver<Job>) {
    while let Ok(job) = receiver.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            error!(
                "event=delivery_job module=live status=error context={} error_code=job_panicked payload={}",
                name,
                panic_message(payload.as_ref())
            );
        }
    }
    debug!("event=delivery_stop module=live status=ok context={name}");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::DeliveryContext;
    use std::sync::{Arc, Mutex};

    #[test]
    fn posted_jobs_run_in_order() {
        let context = DeliveryContext::spawn("test-order").unwrap();
        let log = Arc::new(Mutex::new(Vec::new()));

        for index in 0..5 {
            let log = Arc::clone(&log);
            assert!(context.post(move || log.lock().unwrap().push(index)));
        }
        context.run_sync(|| ());

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn run_sync_executes_on_worker_thread() {
        let context = Arc::new(DeliveryContext::spawn("test-worker").unwrap());
        assert!(!context.is_current());

        let probe = Arc::clone(&context);
        let (on_worker, name) = context.run_sync(move || {
            (
                probe.is_current(),
                std::thread::current().name().map(str::to_string),
            )
        });

        assert!(on_worker);
        assert_eq!(name.as_deref(), Some("test-worker"));
    }

    #[test]
    fn nested_run_sync_runs_inline() {
        let context = Arc::new(DeliveryContext::spawn("test-nested").unwrap());
        let inner = Arc::clone(&context);
        let value = context.run_sync(move || inner.run_sync(|| 41) + 1);
        assert_eq!(value, 42);
    }

    #[test]
    fn panicking_job_does_not_stop_worker() {
        let context = DeliveryContext::spawn("test-panic").unwrap();
        context.post(|| panic!("job failure"));

        assert_eq!(context.run_sync(|| 7), 7);
    }

    #[test]
    fn run_sync_reraises_job_panic() {
        let context = DeliveryContext::spawn("test-reraise").unwrap();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            context.run_sync(|| -> u8 { panic!("hook failure") })
        }));

        assert!(outcome.is_err());
        assert_eq!(context.run_sync(|| "alive"), "alive");
    }
}
