//! Data structures for probe samples and raw kernel accounting records.

use serde::{Deserialize, Serialize};

/// Scale of [`ThreadBasicInfo::cpu_usage`]: a thread running flat out on one
/// core reports this value.
pub const TH_USAGE_SCALE: i32 = 1000;

/// Scheduling flag marking a thread as idle.
pub const TH_FLAGS_IDLE: i32 = 0x2;

/// A point-in-time CPU utilization reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CpuSample {
    /// Summed busy percentage. Each thread contributes up to 100.0, so this
    /// exceeds 100.0 when several threads run on separate cores.
    pub percent_busy: f64,
    /// Number of cores schedulable at sample time (always at least 1)
    pub active_core_count: usize,
}

/// A point-in-time memory reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    /// Physical memory currently resident for this process, in bytes
    pub resident_bytes: u64,
    /// Total physical memory installed on the host, in bytes
    pub total_physical_bytes: u64,
}

/// Which threads a CPU reading covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuScope {
    /// Every thread owned by the process
    #[default]
    AllThreads,
    /// Only the thread that takes the sample
    CurrentThread,
}

/// A combined CPU and memory reading, as emitted by the monitor stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceReport {
    /// Timestamp when this report was taken (Unix timestamp in milliseconds)
    pub timestamp: u64,
    /// Threads covered by `cpu`
    pub scope: CpuScope,
    /// CPU utilization
    pub cpu: CpuSample,
    /// Memory usage
    pub memory: MemorySample,
}

/// Per-thread scheduling info, as returned by a thread info query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadBasicInfo {
    /// Scheduling flags; see [`TH_FLAGS_IDLE`]
    pub flags: i32,
    /// Recent CPU usage in units of [`TH_USAGE_SCALE`]
    pub cpu_usage: i32,
}

/// Process-level accounting, as returned by a task info query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskBasicInfo {
    /// Resident memory in bytes
    pub resident_size: u64,
}

impl CpuSample {
    /// Create a sample, clamping negative readings to zero and the core count to one.
    pub fn new(percent_busy: f64, active_core_count: usize) -> Self {
        Self {
            percent_busy: percent_busy.max(0.0),
            active_core_count: active_core_count.max(1),
        }
    }

    /// A zero reading, used when the CPU query degrades.
    pub fn idle(active_core_count: usize) -> Self {
        Self::new(0.0, active_core_count)
    }
}

impl MemorySample {
    /// Whether the resident size fits within physical memory.
    ///
    /// A `false` here points at the measurement layer, not the caller.
    pub fn is_consistent(&self) -> bool {
        self.resident_bytes <= self.total_physical_bytes
    }
}

impl ThreadBasicInfo {
    /// Whether the idle flag is set.
    pub fn is_idle(&self) -> bool {
        self.flags & TH_FLAGS_IDLE != 0
    }

    /// Busy percentage of one core, or 0.0 for idle threads.
    pub fn busy_percent(&self) -> f64 {
        if self.is_idle() {
            return 0.0;
        }
        f64::from(self.cpu_usage.max(0)) * 100.0 / f64::from(TH_USAGE_SCALE)
    }
}

impl ResourceReport {
    /// Assemble a report stamped with the current wall-clock time.
    pub fn new(scope: CpuScope, cpu: CpuSample, memory: MemorySample) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis().max(0) as u64,
            scope,
            cpu,
            memory,
        }
    }
}
