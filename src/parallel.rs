//! Parallel processing utilities using Rayon.
//!
//! Each filter invocation is independent, so a batch of event lists is
//! processed one file per worker.

use crate::error::{GtiError, Result};
use rayon::prelude::*;

/// Minimum number of jobs before enabling parallelization.
pub const PARALLEL_THRESHOLD: usize = 2;

/// Configure the global thread pool. Must be called before any parallel work.
pub fn configure_threads(threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .map_err(|e| GtiError::Configuration(format!("Failed to initialize thread pool: {}", e)))
}

/// Run `f` on every job, in parallel when worthwhile. Results keep job order.
pub fn process_jobs<J, T, F>(jobs: &[J], f: F) -> Vec<T>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> T + Sync + Send,
{
    if jobs.len() < PARALLEL_THRESHOLD {
        jobs.iter().map(f).collect()
    } else {
        jobs.par_iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_jobs_keeps_order() {
        let jobs: Vec<u64> = (0..100).collect();
        let results = process_jobs(&jobs, |j| j * 2);
        assert_eq!(results, (0..100).map(|j| j * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_process_single_job() {
        assert_eq!(process_jobs(&[3], |j| j + 1), vec![4]);
        assert!(process_jobs(&[] as &[u8], |j| *j).is_empty());
    }
}
