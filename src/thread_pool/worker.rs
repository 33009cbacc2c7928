use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::Receiver;
use log::{debug, error, trace, warn};

use crate::future::{run_catching, Future};

/// A type-erased job: runs the computation and completes its future.
pub(super) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Counters shared between the pool handle and its workers.
#[derive(Default)]
pub(super) struct Counters {
    pub(super) live: AtomicUsize,
    pub(super) active: AtomicUsize,
    pub(super) completed: AtomicU64,
}

/// Pairs a computation with the future that receives its result.
pub(super) fn package<T, F>(job: F) -> (Job, Future<T>)
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let future = Future::pending();
    let target = future.clone();
    let job: Job = Box::new(move || {
        let outcome = run_catching(job);
        if let Err(message) = &outcome {
            error!("Job panicked: {message}");
        }
        if target.complete(outcome).is_err() {
            warn!("Job result discarded: its future was completed by someone else");
        }
    });
    (job, future)
}

/// Spawns a single worker thread that pulls jobs from the receiver until
/// the queue is closed and drained.
pub(super) fn spawn_worker(
    id: usize,
    rx: Receiver<Job>,
    counters: Arc<Counters>,
) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("pool-worker-{id}"))
        .spawn(move || {
            debug!("Worker {id} started");
            loop {
                match rx.recv() {
                    Ok(job) => {
                        counters.active.fetch_add(1, Ordering::SeqCst);
                        trace!("Worker {id} executing job");
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("Worker {id} job panicked, continuing");
                        }
                        counters.active.fetch_sub(1, Ordering::SeqCst);
                        counters.completed.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(_) => {
                        debug!("Worker {id}: queue closed and drained, shutting down");
                        counters.live.fetch_sub(1, Ordering::SeqCst);
                        return;
                    }
                }
            }
        })
}
