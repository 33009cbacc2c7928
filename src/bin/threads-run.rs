use std::process::exit;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use log::{error, info};

use threads::{Result, ThreadPool};

const DEFAULT_JOBS: usize = 100;
const DEFAULT_MAX_SLEEP_MS: u64 = 100;
const DEFAULT_POLL_MS: u64 = 100;

#[derive(Parser)]
#[command(
    name = "threads-run",
    version,
    about = "Run a batch of sleeper jobs on a bounded thread pool"
)]
struct Cli {
    /// Number of worker threads (defaults to the number of CPUs)
    #[arg(long, value_name = "N")]
    workers: Option<usize>,

    /// Capacity of the job queue (defaults to the number of jobs)
    #[arg(long, value_name = "N")]
    queue_depth: Option<usize>,

    /// Number of jobs to submit
    #[arg(long, default_value_t = DEFAULT_JOBS, value_name = "N")]
    jobs: usize,

    /// Upper bound for a single job's sleep, in milliseconds
    #[arg(long, default_value_t = DEFAULT_MAX_SLEEP_MS, value_name = "MS")]
    max_sleep_ms: u64,

    /// Interval between progress reports, in milliseconds
    #[arg(long, default_value_t = DEFAULT_POLL_MS, value_name = "MS")]
    poll_ms: u64,

    /// Print the final pool statistics as JSON on stdout
    #[arg(long)]
    json: bool,
}

fn main() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        error!("{}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let workers = cli.workers.unwrap_or_else(num_cpus::get);
    let queue_depth = cli.queue_depth.unwrap_or(cli.jobs.max(1));
    let max_sleep = cli.max_sleep_ms.max(1);

    info!("threads-run {}", env!("CARGO_PKG_VERSION"));
    info!(
        "{} jobs on {} workers, queue depth {}",
        cli.jobs, workers, queue_depth
    );

    let pool = ThreadPool::new(workers, queue_depth)?;
    pool.start()?;

    let started = Instant::now();
    let jobs = (0..cli.jobs as u64).map(|i| {
        move || {
            let millis = i.wrapping_mul(37) % max_sleep;
            thread::sleep(Duration::from_millis(millis));
            millis
        }
    });
    let group = pool.submit_batch(jobs)?;

    let slept = loop {
        if let Some(result) = group.wait_timeout(Duration::from_millis(cli.poll_ms)) {
            break result?;
        }
        let pool = group.thread_pool();
        info!(
            "ready {}/{}, active {}, pending {}, completed {}",
            group.ready_count(),
            group.count(),
            pool.active_count(),
            pool.pending_count(),
            pool.completed_count()
        );
    };

    pool.shutdown()?;
    pool.wait()?;

    let total: u64 = slept.iter().sum();
    info!(
        "All {} jobs done in {:?} ({} ms of sleep in total)",
        slept.len(),
        started.elapsed(),
        total
    );

    if cli.json {
        println!("{}", pool.stats().to_json()?);
    }

    Ok(())
}
