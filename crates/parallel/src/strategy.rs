//! Parallel processing strategies

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rivulet_core::{Error, Result};
use std::sync::Arc;

/// Processing mode for routing sweeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for a configured thread count (0 = all cores, 1 = sequential)
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => ProcessingMode::Parallel,
            1 => ProcessingMode::Sequential,
            n => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Execute a function over indices
    fn par_for_each<F>(&self, range: std::ops::Range<usize>, f: F)
    where
        F: Fn(usize) + Sync + Send;

    /// Map a function over indices and collect results in index order
    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send;

    /// Map a fallible function over a slice, stopping at the first error
    fn try_map_slice<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> Result<T> + Sync + Send;
}

/// A [`ProcessingMode`] with its thread pool built once.
///
/// Routers run one parallel region per routing layer and per time step, so
/// the pool for `ParallelWith` is created up front and reused.
#[derive(Clone)]
pub struct Executor {
    mode: ProcessingMode,
    pool: Option<Arc<ThreadPool>>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("mode", &self.mode).finish()
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::sequential()
    }
}

impl Executor {
    pub fn new(mode: ProcessingMode) -> Result<Self> {
        let pool = match mode {
            ProcessingMode::ParallelWith(threads) => Some(Arc::new(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| Error::Other(format!("failed to build thread pool: {e}")))?,
            )),
            _ => None,
        };
        Ok(Self { mode, pool })
    }

    pub fn sequential() -> Self {
        Self {
            mode: ProcessingMode::Sequential,
            pool: None,
        }
    }

    pub fn mode(&self) -> ProcessingMode {
        self.mode
    }

    pub(crate) fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl ParallelStrategy for Executor {
    fn par_for_each<F>(&self, range: std::ops::Range<usize>, f: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        match self.mode {
            ProcessingMode::Sequential => range.for_each(f),
            _ => self.install(|| range.into_par_iter().for_each(f)),
        }
    }

    fn par_map<T, F>(&self, range: std::ops::Range<usize>, f: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self.mode {
            ProcessingMode::Sequential => range.map(f).collect(),
            _ => self.install(|| range.into_par_iter().map(f).collect()),
        }
    }

    fn try_map_slice<I, T, F>(&self, items: &[I], f: F) -> Result<Vec<T>>
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> Result<T> + Sync + Send,
    {
        match self.mode {
            ProcessingMode::Sequential => items.iter().map(f).collect(),
            _ => self.install(|| items.par_iter().map(f).collect()),
        }
    }
}

/// Get the number of available CPU cores
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}
