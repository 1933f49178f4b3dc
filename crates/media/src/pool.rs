//! Bounded worker pool for blocking subprocess jobs.

use rayon::prelude::*;
use reelforge_common::error::{ReelError, ReelResult};

/// Workers to use for `jobs` jobs: available parallelism minus two, at least
/// one, never more than the job count.
pub fn worker_count(jobs: usize) -> usize {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    available.saturating_sub(2).max(1).min(jobs.max(1))
}

fn build_pool(workers: usize) -> ReelResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("reelforge-job-{i}"))
        .build()
        .map_err(|e| ReelError::render(format!("failed to build worker pool: {e}")))
}

/// Run `f` over `jobs` on a dedicated pool of `workers` threads.
///
/// Results come back in job order. The first failure stops the pool from
/// starting further jobs; jobs already running finish before it returns.
pub fn try_run_indexed<T, R, F>(jobs: &[T], workers: usize, f: F) -> ReelResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> ReelResult<R> + Sync + Send,
{
    if jobs.is_empty() {
        return Ok(Vec::new());
    }
    let pool = build_pool(workers.min(jobs.len()))?;
    pool.install(|| jobs.par_iter().map(&f).collect::<ReelResult<Vec<_>>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_results_keep_input_order() {
        let jobs: Vec<u64> = (0..16).collect();
        let values = try_run_indexed(&jobs, 4, |n| {
            std::thread::sleep(Duration::from_millis((16 - n) * 2));
            Ok(n * 10)
        })
        .unwrap();
        assert_eq!(values, (0..16).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn test_failure_stops_new_jobs() {
        let started = AtomicUsize::new(0);
        let jobs: Vec<usize> = (0..200).collect();
        let result = try_run_indexed(&jobs, 1, |n| {
            started.fetch_add(1, Ordering::SeqCst);
            if *n == 3 {
                Err(ReelError::render("boom"))
            } else {
                Ok(*n)
            }
        });
        assert!(matches!(result, Err(ReelError::Render { .. })));
        assert!(started.load(Ordering::SeqCst) < jobs.len());
    }

    #[test]
    fn test_worker_count_bounds() {
        assert_eq!(worker_count(1), 1);
        assert_eq!(worker_count(0), 1);
        assert!(worker_count(1_000) >= 1);
    }

    #[test]
    fn test_empty_job_list() {
        let jobs: Vec<u8> = Vec::new();
        assert!(try_run_indexed(&jobs, 8, |_| Ok(())).unwrap().is_empty());
    }
}
