//! # Resource Probe - Process Telemetry
//!
//! A lightweight, point-in-time resource probe for the running process,
//! meant to be polled by a display or logging pipeline.
//!
//! ## Features
//!
//! - **All-thread CPU**: summed busy percentage of every thread in the process
//! - **Current-thread CPU**: busy percentage of the thread making the call
//! - **Memory**: resident size of the process against host physical memory
//! - **Best effort**: failures degrade to zero and are logged, never raised
//! - **Injectable kernel**: swap the OS layer for a fake via [`KernelInterface`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resource_probe::ResourceProbe;
//!
//! let probe = ResourceProbe::new();
//! let cpu = probe.cpu_usage_all();
//! let memory = probe.memory_usage();
//! println!(
//!     "CPU: {:.2}% on {} cores, RSS {} of {} bytes",
//!     cpu.percent_busy, cpu.active_core_count, memory.resident_bytes, memory.total_physical_bytes
//! );
//! ```

pub mod config;
pub mod error;
pub mod metrics;

// Re-export public API
pub use config::MonitorConfig;
pub use error::{KernStatus, ProbeError, Result};
pub use metrics::{
    data::{CpuSample, CpuScope, MemorySample, ResourceReport, TaskBasicInfo, ThreadBasicInfo},
    data::{TH_FLAGS_IDLE, TH_USAGE_SCALE},
    kernel::NativeKernel,
    monitor::ResourceMonitor,
    probe::ResourceProbe,
    traits::KernelInterface,
};

/// The default sampling interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 500;
