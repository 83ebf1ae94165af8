//! Process telemetry collection and data structures.
//!
//! This module provides the probe that reads CPU utilization across all
//! threads of the process, CPU utilization of the calling thread, and resident
//! memory against host physical memory, plus the kernel bindings it runs on.

pub mod data;
pub(crate) mod handles;
pub mod kernel;
pub mod monitor;
pub mod probe;
pub mod traits;

// Re-export commonly used items
pub use data::{CpuSample, CpuScope, MemorySample, ResourceReport};
pub use monitor::ResourceMonitor;
pub use probe::ResourceProbe;
pub use traits::KernelInterface;
