use std::fmt;
use std::thread;
use std::time::Duration;

use log::trace;

use crate::{Future, Result, ThreadPool};

/// The futures of one batch submission, kept in submission order.
///
/// A single background waiter per group watches every member and raises a
/// one-shot aggregate signal once all of them are completed, so callers can
/// test or wait for the whole batch without polling each future.
pub struct FutureGroup<T> {
    futures: Vec<Future<T>>,
    pool: ThreadPool,
    all_ready: Future<()>,
}

impl<T: Send + 'static> FutureGroup<T> {
    /// Groups `futures` produced by `pool` and spawns the aggregate waiter.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if the waiter thread cannot be spawned.
    pub fn new(futures: Vec<Future<T>>, pool: ThreadPool) -> Result<Self> {
        let all_ready = Future::pending();
        let members = futures.clone();
        let signal = all_ready.clone();
        thread::Builder::new()
            .name("future-group-waiter".to_owned())
            .spawn(move || {
                for future in &members {
                    future.wait();
                }
                trace!("All {} futures of the group are ready", members.len());
                let _ = signal.set(());
            })?;

        Ok(FutureGroup {
            futures,
            pool,
            all_ready,
        })
    }
}

impl<T> FutureGroup<T> {
    /// Number of member futures.
    pub fn count(&self) -> usize {
        self.futures.len()
    }

    /// Number of member futures completed right now. Never blocks.
    pub fn ready_count(&self) -> usize {
        if self.is_all_ready() {
            return self.futures.len();
        }
        self.futures.iter().filter(|f| f.is_ready()).count()
    }

    /// Whether the aggregate signal has been raised. Never blocks.
    pub fn is_all_ready(&self) -> bool {
        self.all_ready.is_ready()
    }

    /// The member futures, in submission order.
    pub fn futures(&self) -> &[Future<T>] {
        &self.futures
    }

    /// The pool the batch was submitted to.
    pub fn thread_pool(&self) -> &ThreadPool {
        &self.pool
    }
}

impl<T: Clone> FutureGroup<T> {
    /// Blocks until every member is completed and returns the values in
    /// submission order.
    ///
    /// # Errors
    ///
    /// Returns the failure of the first failed member, by submission order.
    pub fn wait_all(&self) -> Result<Vec<T>> {
        self.futures.iter().map(Future::get_wait).collect()
    }

    /// Blocks until every member is completed and returns every outcome,
    /// failures included, in submission order.
    pub fn wait_all_settled(&self) -> Vec<Result<T>> {
        self.futures.iter().map(Future::get_wait).collect()
    }

    /// Blocks for at most `timeout` waiting for the whole group.
    ///
    /// Returns `None` if the group is not complete by then; partial results
    /// are never returned.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<Vec<T>>> {
        if self.all_ready.get_timeout(timeout).is_none() {
            return None;
        }
        Some(self.wait_all())
    }
}

impl<T> fmt::Debug for FutureGroup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureGroup")
            .field("count", &self.count())
            .field("ready", &self.ready_count())
            .field("all_ready", &self.is_all_ready())
            .finish()
    }
}
