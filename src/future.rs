use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use log::error;

use crate::{Error, Result};

/// What a job produced: its value, or the message it panicked with.
pub(crate) type Outcome<T> = std::result::Result<T, String>;

type Callback<T> = Box<dyn FnOnce(&Future<T>) + Send + 'static>;

/// A single-assignment result cell.
///
/// A `Future` is completed at most once, normally by the pool worker that
/// ran the job, and read any number of times by any number of threads.
/// Cloning a `Future` yields another handle to the same cell.
///
/// Readers receive a clone of the stored value, so the value-returning
/// getters require `T: Clone`. A job that panicked completes its future
/// with [`Error::JobPanicked`], which every reader observes.
pub struct Future<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    completed: Condvar,
}

struct Slot<T> {
    outcome: Option<Outcome<T>>,
    callbacks: Vec<Callback<T>>,
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Future {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Future<T> {
    /// Creates a future that has not been completed yet.
    pub fn pending() -> Self {
        Future {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    outcome: None,
                    callbacks: Vec::new(),
                }),
                completed: Condvar::new(),
            }),
        }
    }

    /// Creates a future that is already completed with `value`.
    pub fn ready(value: T) -> Self {
        let future = Self::pending();
        future.inner.slot.lock().unwrap().outcome = Some(Ok(value));
        future
    }

    /// Completes the future with `value`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyCompleted`] if the future already holds a value.
    /// The stored value is left untouched.
    pub fn set(&self, value: T) -> Result<()> {
        self.complete(Ok(value))
    }

    /// Stores the outcome, wakes every waiter and runs registered callbacks.
    pub(crate) fn complete(&self, outcome: Outcome<T>) -> Result<()> {
        let callbacks = {
            let mut slot = self.inner.slot.lock().unwrap();
            if slot.outcome.is_some() {
                return Err(Error::AlreadyCompleted);
            }
            slot.outcome = Some(outcome);
            self.inner.completed.notify_all();
            mem::take(&mut slot.callbacks)
        };

        // Callbacks may read this future, so they run after the lock is released.
        // A panicking callback must not keep the later ones from running.
        for callback in callbacks {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| callback(self))) {
                error!("Future callback panicked: {}", panic_message(payload));
            }
        }
        Ok(())
    }

    /// Returns `true` once the future has been completed.
    pub fn is_ready(&self) -> bool {
        self.inner.slot.lock().unwrap().outcome.is_some()
    }

    /// Blocks until the future is completed, without reading the value.
    pub fn wait(&self) {
        let slot = self.inner.slot.lock().unwrap();
        let _slot = self
            .inner
            .completed
            .wait_while(slot, |slot| slot.outcome.is_none())
            .unwrap();
    }

    fn on_complete(&self, callback: Callback<T>) {
        {
            let mut slot = self.inner.slot.lock().unwrap();
            if slot.outcome.is_none() {
                slot.callbacks.push(callback);
                return;
            }
        }
        callback(self);
    }
}

impl<T: Clone> Future<T> {
    /// Returns the result if the future is completed, `None` otherwise.
    ///
    /// Never blocks.
    pub fn get_now(&self) -> Option<Result<T>> {
        let slot = self.inner.slot.lock().unwrap();
        slot.outcome.as_ref().map(to_result)
    }

    /// Blocks until the future is completed and returns the result.
    pub fn get_wait(&self) -> Result<T> {
        let slot = self.inner.slot.lock().unwrap();
        let slot = self
            .inner
            .completed
            .wait_while(slot, |slot| slot.outcome.is_none())
            .unwrap();
        match slot.outcome.as_ref() {
            Some(outcome) => to_result(outcome),
            None => unreachable!("woken without an outcome"),
        }
    }

    /// Blocks for at most `timeout` waiting for the result.
    ///
    /// Returns `None` if the future is still pending when the timeout
    /// expires. The eventual value is not consumed; later calls still see it.
    pub fn get_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let slot = self.inner.slot.lock().unwrap();
        let (slot, _) = self
            .inner
            .completed
            .wait_timeout_while(slot, timeout, |slot| slot.outcome.is_none())
            .unwrap();
        slot.outcome.as_ref().map(to_result)
    }
}

impl<T: Clone + Send + 'static> Future<T> {
    /// Registers `callback` to run with the result once the future completes.
    ///
    /// The callback runs on the thread that completes the future, or right
    /// away on the calling thread if the future is already completed.
    pub fn then<F>(&self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        self.on_complete(Box::new(move |future: &Future<T>| {
            if let Some(result) = future.get_now() {
                callback(result);
            }
        }));
    }

    /// Returns a future completed with `f` applied to this future's value.
    ///
    /// A failure of this future, or a panic inside `f`, completes the mapped
    /// future with [`Error::JobPanicked`].
    pub fn map<U, F>(&self, f: F) -> Future<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let mapped = Future::pending();
        let target = mapped.clone();
        self.then(move |result| {
            let outcome = match result {
                Ok(value) => run_catching(move || f(value)),
                Err(Error::JobPanicked(message)) => Err(message),
                Err(e) => Err(e.to_string()),
            };
            // `target` is only reachable from here, so this is its one completion.
            let _ = target.complete(outcome);
        });
        mapped
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("ready", &self.is_ready())
            .finish()
    }
}

fn to_result<T: Clone>(outcome: &Outcome<T>) -> Result<T> {
    match outcome {
        Ok(value) => Ok(value.clone()),
        Err(message) => Err(Error::JobPanicked(message.clone())),
    }
}

/// Runs `f`, turning a panic into an `Err` carrying the panic message.
pub(crate) fn run_catching<T, F>(f: F) -> Outcome<T>
where
    F: FnOnce() -> T,
{
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(panic_message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
