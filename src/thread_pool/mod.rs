use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender, TrySendError};
use log::{error, info};
use serde::Serialize;

use crate::{Error, Future, FutureGroup, Result};

mod worker;

use self::worker::{package, spawn_worker, Counters, Job};

/// Lifecycle of a [`ThreadPool`].
///
/// `Created -> Started -> Draining -> Drained`, one way only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PoolState {
    /// Constructed, no workers yet.
    Created,
    /// Workers running, jobs accepted.
    Started,
    /// Shut down: no new jobs, queued jobs still run.
    Draining,
    /// Every worker has exited.
    Drained,
}

impl PoolState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => PoolState::Created,
            1 => PoolState::Started,
            2 => PoolState::Draining,
            _ => PoolState::Drained,
        }
    }
}

/// A point-in-time snapshot of a pool's sizes and counters.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    /// Number of worker threads.
    pub workers: usize,
    /// Capacity of the job queue.
    pub queue_depth: usize,
    /// Lifecycle state.
    pub state: PoolState,
    /// Worker threads spawned and not yet exited.
    pub live_workers: usize,
    /// Jobs currently executing.
    pub active: usize,
    /// Jobs queued but not started.
    pub pending: usize,
    /// Jobs finished since the pool started.
    pub completed: u64,
}

impl PoolStats {
    /// Serializes the snapshot as a single-line JSON object.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A fixed-size pool of worker threads fed by a bounded job queue.
///
/// Workers are spawned once by [`start`](ThreadPool::start) and never
/// resized. [`submit`](ThreadPool::submit) blocks while the queue is full,
/// so no job is ever rejected for capacity reasons, only delayed.
///
/// `ThreadPool` is a cheap handle; clones refer to the same pool. If every
/// handle is dropped without a shutdown, the queue closes and the workers
/// exit once it is drained.
#[derive(Clone)]
pub struct ThreadPool {
    shared: Arc<Shared>,
}

/// Pool state owned by the handles. Workers only see the receiver and the counters.
struct Shared {
    workers: usize,
    queue_depth: usize,
    state: AtomicU8,
    sender: Mutex<Option<Sender<Job>>>,
    receiver: Receiver<Job>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    started_at: OnceLock<SystemTime>,
    shutdown_at: OnceLock<SystemTime>,
}

impl ThreadPool {
    /// Creates a pool with `workers` threads and room for `queue_depth`
    /// pending jobs. The pool does nothing until it is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if either argument is zero.
    pub fn new(workers: usize, queue_depth: usize) -> Result<Self> {
        if workers == 0 {
            return Err(Error::InvalidConfig(
                "worker count must be positive".to_owned(),
            ));
        }
        if queue_depth == 0 {
            return Err(Error::InvalidConfig(
                "queue depth must be positive".to_owned(),
            ));
        }

        let (tx, rx) = channel::bounded::<Job>(queue_depth);
        Ok(ThreadPool {
            shared: Arc::new(Shared {
                workers,
                queue_depth,
                state: AtomicU8::new(PoolState::Created as u8),
                sender: Mutex::new(Some(tx)),
                receiver: rx,
                handles: Mutex::new(Vec::with_capacity(workers)),
                counters: Arc::new(Counters::default()),
                started_at: OnceLock::new(),
                shutdown_at: OnceLock::new(),
            }),
        })
    }

    /// Spawns the worker threads.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] if the pool was started before, and
    /// [`Error::Io`] if a worker thread cannot be spawned. In the latter case
    /// the pool is shut down and [`wait`](ThreadPool::wait) joins the workers
    /// that did start.
    pub fn start(&self) -> Result<()> {
        // Held across the transition so `wait` cannot run before the workers exist.
        let mut handles = self.shared.handles.lock().unwrap();
        self.transition(PoolState::Created, PoolState::Started)
            .map_err(|_| Error::AlreadyStarted)?;
        let _ = self.shared.started_at.set(SystemTime::now());

        for id in 0..self.shared.workers {
            let rx = self.shared.receiver.clone();
            match spawn_worker(id, rx, self.shared.counters.clone()) {
                Ok(handle) => {
                    self.shared.counters.live.fetch_add(1, Ordering::SeqCst);
                    handles.push(handle);
                }
                Err(e) => {
                    error!("Failed to spawn worker {id}: {e}");
                    drop(handles);
                    if self.transition(PoolState::Started, PoolState::Draining).is_ok() {
                        self.close_queue();
                    }
                    return Err(e.into());
                }
            }
        }

        info!(
            "Thread pool started with {} workers, queue depth {}",
            self.shared.workers, self.shared.queue_depth
        );
        Ok(())
    }

    /// Stops accepting new jobs. Jobs already queued still run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] if the pool was never started and
    /// [`Error::AlreadyShutdown`] on a second call.
    pub fn shutdown(&self) -> Result<()> {
        self.transition(PoolState::Started, PoolState::Draining)
            .map_err(|current| match current {
                PoolState::Created => Error::NotStarted,
                _ => Error::AlreadyShutdown,
            })?;
        self.close_queue();
        info!(
            "Thread pool shut down, {} jobs left to drain",
            self.pending_count() + self.active_count()
        );
        Ok(())
    }

    /// Blocks until every worker has exited, i.e. the queue is drained.
    ///
    /// After this returns, every future produced by the pool is completed.
    /// Calling it again, or from several threads, is fine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotShutdown`] if called before
    /// [`shutdown`](ThreadPool::shutdown), where it would block forever.
    pub fn wait(&self) -> Result<()> {
        match self.state() {
            PoolState::Created | PoolState::Started => return Err(Error::NotShutdown),
            PoolState::Draining | PoolState::Drained => {}
        }

        let mut handles = self.shared.handles.lock().unwrap();
        for handle in handles.drain(..) {
            if handle.join().is_err() {
                error!("Worker thread panicked");
            }
        }
        if self.transition(PoolState::Draining, PoolState::Drained).is_ok() {
            info!(
                "Thread pool drained, {} jobs completed",
                self.completed_count()
            );
        }
        Ok(())
    }

    /// Submits a job and returns the future that receives its result.
    ///
    /// Blocks while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotStarted`] before [`start`](ThreadPool::start) and
    /// [`Error::ShutDown`] after [`shutdown`](ThreadPool::shutdown).
    pub fn submit<T, F>(&self, job: F) -> Result<Future<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let tx = self.sender()?;
        let (job, future) = package(job);
        tx.send(job).map_err(|_| Error::ShutDown)?;
        Ok(future)
    }

    /// Submits a job only if the queue has room right now.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](ThreadPool::submit), plus [`Error::QueueFull`] if
    /// the queue is at capacity. The job is dropped in every error case.
    pub fn try_submit<T, F>(&self, job: F) -> Result<Future<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let tx = self.sender()?;
        let (job, future) = package(job);
        tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => Error::QueueFull,
            TrySendError::Disconnected(_) => Error::ShutDown,
        })?;
        Ok(future)
    }

    /// Submits a job, blocking at most `timeout` for a free queue slot.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](ThreadPool::submit), plus [`Error::Timeout`] if no
    /// slot freed up in time. The job is dropped in every error case.
    pub fn submit_timeout<T, F>(&self, job: F, timeout: Duration) -> Result<Future<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let tx = self.sender()?;
        let (job, future) = package(job);
        tx.send_timeout(job, timeout).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => Error::Timeout,
            SendTimeoutError::Disconnected(_) => Error::ShutDown,
        })?;
        Ok(future)
    }

    /// Submits every job in order and groups their futures.
    ///
    /// # Errors
    ///
    /// Fails like [`submit`](ThreadPool::submit). Jobs submitted before the
    /// failure keep running.
    pub fn submit_batch<T, F, I>(&self, jobs: I) -> Result<FutureGroup<T>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        let futures = jobs
            .into_iter()
            .map(|job| self.submit(job))
            .collect::<Result<Vec<_>>>()?;
        FutureGroup::new(futures, self.clone())
    }

    /// Submits a job that produces no value.
    pub fn execute<F>(&self, job: F) -> Result<Future<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(job)
    }

    /// Submits jobs that produce no value and groups their futures.
    pub fn execute_batch<F, I>(&self, jobs: I) -> Result<FutureGroup<()>>
    where
        F: FnOnce() + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        self.submit_batch(jobs)
    }

    /// Number of worker threads spawned and not yet exited.
    pub fn live_workers(&self) -> usize {
        self.shared.counters.live.load(Ordering::SeqCst)
    }

    /// Number of workers currently executing a job.
    pub fn active_count(&self) -> usize {
        self.shared.counters.active.load(Ordering::SeqCst)
    }

    /// Number of jobs queued but not yet picked up by a worker.
    pub fn pending_count(&self) -> usize {
        self.shared.receiver.len()
    }

    /// Number of jobs finished since the pool started. Never decreases.
    pub fn completed_count(&self) -> u64 {
        self.shared.counters.completed.load(Ordering::SeqCst)
    }

    /// When the pool was started, if it was.
    pub fn started_at(&self) -> Option<SystemTime> {
        self.shared.started_at.get().copied()
    }

    /// When the pool was shut down, if it was.
    pub fn shutdown_at(&self) -> Option<SystemTime> {
        self.shared.shutdown_at.get().copied()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        PoolState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    /// Whether [`start`](ThreadPool::start) has been called.
    pub fn is_started(&self) -> bool {
        self.state() != PoolState::Created
    }

    /// Whether the pool stopped accepting jobs.
    pub fn is_shutdown(&self) -> bool {
        matches!(self.state(), PoolState::Draining | PoolState::Drained)
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.shared.workers
    }

    /// Capacity of the job queue.
    pub fn queue_depth(&self) -> usize {
        self.shared.queue_depth
    }

    /// Snapshot of sizes, counters and state.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            workers: self.shared.workers,
            queue_depth: self.shared.queue_depth,
            state: self.state(),
            live_workers: self.live_workers(),
            active: self.active_count(),
            pending: self.pending_count(),
            completed: self.completed_count(),
        }
    }

    /// Moves `from -> to` atomically, or returns the state actually found.
    fn transition(&self, from: PoolState, to: PoolState) -> std::result::Result<(), PoolState> {
        self.shared
            .state
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ())
            .map_err(PoolState::from_u8)
    }

    /// Drops the stored sender; workers exit once in-flight senders are gone and the queue is empty.
    fn close_queue(&self) {
        let _ = self.shared.shutdown_at.set(SystemTime::now());
        self.shared.sender.lock().unwrap().take();
    }

    fn sender(&self) -> Result<Sender<Job>> {
        match self.state() {
            PoolState::Created => Err(Error::NotStarted),
            PoolState::Started => self
                .shared
                .sender
                .lock()
                .unwrap()
                .clone()
                .ok_or(Error::ShutDown),
            PoolState::Draining | PoolState::Drained => Err(Error::ShutDown),
        }
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.shared.workers)
            .field("queue_depth", &self.shared.queue_depth)
            .field("state", &self.state())
            .field("live_workers", &self.live_workers())
            .field("active", &self.active_count())
            .field("pending", &self.pending_count())
            .field("completed", &self.completed_count())
            .finish()
    }
}
