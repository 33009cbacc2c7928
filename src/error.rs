use std::io;
use thiserror::Error;

/// Error type for pool, future and group operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid construction parameters (zero workers, zero queue depth, ...).
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// `start` was called on a pool that has already been started.
    #[error("Thread pool has already been started")]
    AlreadyStarted,

    /// `shutdown` was called on a pool that has already been shut down.
    #[error("Thread pool has already been shut down")]
    AlreadyShutdown,

    /// The pool has not been started yet.
    #[error("Thread pool is not started")]
    NotStarted,

    /// The pool no longer accepts jobs.
    #[error("Thread pool is shut down")]
    ShutDown,

    /// `wait` was called before `shutdown`; it would block forever.
    #[error("Thread pool has not been shut down, waiting would deadlock")]
    NotShutdown,

    /// The job queue is at capacity.
    #[error("Job queue is full")]
    QueueFull,

    /// A bounded wait expired.
    #[error("Timed out")]
    Timeout,

    /// A future was completed more than once.
    #[error("Future has already been completed")]
    AlreadyCompleted,

    /// The job's computation panicked.
    #[error("Job panicked: {0}")]
    JobPanicked(String),

    /// Serialization error.
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// IO error, e.g. a worker thread could not be spawned.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
