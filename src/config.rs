//! Monitor configuration.

use crate::error::{ProbeError, Result};
use crate::metrics::data::CpuScope;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the polling monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Milliseconds between samples
    pub interval_ms: u64,
    /// Which threads the CPU reading covers
    pub cpu_scope: CpuScope,
    /// Stop after this many samples; `None` polls until dropped
    pub sample_limit: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: crate::DEFAULT_INTERVAL_MS,
            cpu_scope: CpuScope::AllThreads,
            sample_limit: None,
        }
    }
}

impl MonitorConfig {
    /// Create a configuration with a custom interval.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            ..Default::default()
        }
    }

    /// Set the sampling interval.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the CPU scope.
    pub fn with_cpu_scope(mut self, cpu_scope: CpuScope) -> Self {
        self.cpu_scope = cpu_scope;
        self
    }

    /// Limit the number of samples.
    pub fn with_sample_limit(mut self, limit: Option<usize>) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Get the interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms == 0 {
            return Err(ProbeError::config_error("interval must be at least 1 ms"));
        }
        if self.sample_limit == Some(0) {
            return Err(ProbeError::config_error("sample limit must be at least 1"));
        }
        Ok(())
    }
}
