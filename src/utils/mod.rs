//! Utility functions and types

pub mod data_loader;

pub use data_loader::{normalize_column_name, WineDataLoader, RED_FILE, WHITE_FILE};

use std::time::{Duration, Instant};

/// Wall-clock timer for stage logging
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Install a global rayon pool with `n_jobs` threads.
///
/// A pool that is already installed is left as is.
pub fn configure_thread_pool(n_jobs: Option<usize>) {
    if let Some(n) = n_jobs.filter(|&n| n > 0) {
        if rayon::ThreadPoolBuilder::new().num_threads(n).build_global().is_err() {
            tracing::debug!(n_jobs = n, "Global thread pool already initialised");
        }
    }
}
