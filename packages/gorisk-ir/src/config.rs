//! Analysis configuration
//!
//! One validated value constructed by the caller (normally the CLI) and
//! passed read-only through the pipeline.

use crate::errors::{GoriskError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Cooperative cancellation flag shared by every worker.
///
/// On cancellation the pipeline returns partial results flagged
/// `cancelled = true` instead of erroring.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> CancelFlag {
        CancelFlag::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Tunables for one analysis invocation.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Fixpoint pass bound (spec default 3).
    pub max_passes: u32,

    /// Context sensitivity: 0 (insensitive) or 1 (per-call-site).
    pub context_k: u8,

    /// Scanner worker pool size; defaults to the CPU count.
    pub workers: usize,

    /// Concurrent materializations in the upgrade differ.
    pub fetch_pool: usize,

    /// Timeout for any network call.
    pub network_timeout: Duration,

    /// Timeout for any external process invocation.
    pub process_timeout: Duration,

    /// Cooperative cancellation.
    pub cancel: CancelFlag,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            max_passes: 3,
            context_k: 0,
            workers: num_cpus::get(),
            fetch_pool: 4,
            network_timeout: Duration::from_secs(30),
            process_timeout: Duration::from_secs(120),
            cancel: CancelFlag::new(),
        }
    }
}

impl AnalysisConfig {
    /// Validate ranges; called once before the pipeline starts.
    pub fn validate(&self) -> Result<()> {
        if self.max_passes == 0 {
            return Err(GoriskError::config("max_passes must be at least 1"));
        }
        if self.context_k > 1 {
            return Err(GoriskError::config(
                "context sensitivity k must be 0 or 1",
            ));
        }
        if self.workers == 0 {
            return Err(GoriskError::config("worker pool must not be empty"));
        }
        Ok(())
    }

    pub fn with_context_k(mut self, k: u8) -> Self {
        self.context_k = k;
        self
    }

    pub fn with_max_passes(mut self, passes: u32) -> Self {
        self.max_passes = passes;
        self
    }
}
