#![deny(missing_docs)]

//! A bounded worker pool with single-assignment futures.
//!
//! A [`ThreadPool`] runs a fixed number of worker threads that consume jobs
//! from a bounded queue; submitting to a full queue blocks the caller.
//! Every submitted job yields a [`Future`] that is completed exactly once
//! with the job's result, and batch submissions yield a [`FutureGroup`]
//! that can be polled or waited on as a whole, in submission order.

mod error;
mod future;
mod group;
mod parallel;
/// The worker pool and its lifecycle.
pub mod thread_pool;

pub use error::{Error, Result};
pub use future::Future;
pub use group::FutureGroup;
pub use parallel::{parallel_do, parallel_do_with_limit};
pub use thread_pool::{PoolState, PoolStats, ThreadPool};
