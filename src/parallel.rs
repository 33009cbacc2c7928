use crate::{FutureGroup, Result, ThreadPool};

/// Runs every job on a throwaway pool with one worker per job.
///
/// See [`parallel_do_with_limit`].
pub fn parallel_do<T, F>(jobs: Vec<F>) -> Result<FutureGroup<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let concurrency = jobs.len().max(1);
    parallel_do_with_limit(jobs, concurrency)
}

/// Runs every job on a throwaway pool of `concurrency` workers.
///
/// The queue is sized to hold the whole batch, so submission never blocks.
/// The pool is shut down before returning; queued jobs still run. Call
/// `wait` on the group's [`thread_pool`](FutureGroup::thread_pool) to join
/// the workers.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidConfig`] if `concurrency` is zero, or an
/// IO error if threads cannot be spawned.
pub fn parallel_do_with_limit<T, F>(jobs: Vec<F>, concurrency: usize) -> Result<FutureGroup<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let pool = ThreadPool::new(concurrency, jobs.len().max(1))?;
    pool.start()?;
    let submitted = pool.submit_batch(jobs);
    pool.shutdown()?;
    submitted
}
