//! Parallel processing strategies

use rayon::prelude::*;
use thiserror::Error;

/// Processing mode for per-item work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// One item at a time on the calling thread
    #[default]
    Sequential,
    /// Rayon's global pool
    Parallel,
    /// Dedicated pool with a fixed number of workers
    ParallelWith(usize),
}

/// Failure to set up a dedicated worker pool
#[derive(Error, Debug)]
#[error("cannot build worker pool with {threads} threads: {reason}")]
pub struct PoolError {
    pub threads: usize,
    pub reason: String,
}

/// Strategy for mapping work over item indices
pub trait ParallelStrategy {
    /// Map `f` over `range`, returning results indexed like the input.
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>, PoolError>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;
}

impl ProcessingMode {
    /// Mode for a requested thread count: `None` → global pool, `Some(1)` → sequential
    pub fn from_threads(threads: Option<usize>) -> Self {
        match threads {
            None => ProcessingMode::Parallel,
            Some(0) | Some(1) => ProcessingMode::Sequential,
            Some(n) => ProcessingMode::ParallelWith(n),
        }
    }

    /// Number of workers this mode will use
    pub fn workers(&self) -> usize {
        match self {
            ProcessingMode::Sequential => 1,
            ProcessingMode::Parallel => num_cpus(),
            ProcessingMode::ParallelWith(threads) => *threads,
        }
    }
}

impl ParallelStrategy for ProcessingMode {
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Result<Vec<T>, PoolError>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        // Indexed parallel iterators collect in index order.
        match self {
            ProcessingMode::Sequential => Ok(range.map(f).collect()),
            ProcessingMode::Parallel => Ok(range.into_par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| PoolError {
                        threads: *threads,
                        reason: e.to_string(),
                    })?;
                Ok(pool.install(|| range.into_par_iter().map(f).collect()))
            }
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_sequential_map() {
        let out = ProcessingMode::Sequential.par_map(0..5, |i| i * 2).unwrap();
        assert_eq!(out, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_parallel_map_keeps_input_order() {
        // Early indices sleep longest so they finish last.
        let out = ProcessingMode::ParallelWith(4)
            .par_map(0..16, |i| {
                std::thread::sleep(Duration::from_millis((16 - i as u64) * 2));
                i
            })
            .unwrap();
        assert_eq!(out, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn test_from_threads() {
        assert_eq!(ProcessingMode::from_threads(Some(1)), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_threads(Some(8)), ProcessingMode::ParallelWith(8));
        assert_eq!(ProcessingMode::from_threads(None), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::ParallelWith(3).workers(), 3);
    }
}
