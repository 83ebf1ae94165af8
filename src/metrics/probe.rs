//! The resource probe: CPU and memory queries over a [`KernelInterface`].

use crate::error::ProbeError;
use crate::metrics::data::{CpuSample, CpuScope, MemorySample, ResourceReport};
use crate::metrics::handles::{ThreadGuard, ThreadListGuard};
use crate::metrics::kernel::NativeKernel;
use crate::metrics::traits::KernelInterface;
use tracing::{debug, trace, warn};

/// Point-in-time CPU and memory telemetry for the current process.
///
/// The probe holds no state between calls. Every query acquires its own
/// kernel handles and releases them before returning, so `cpu_usage_all` and
/// `memory_usage` may run concurrently from any number of threads.
///
/// No query fails. A kernel error degrades the sample to zero (or to the
/// partial sum gathered so far) and is logged through `tracing`.
#[derive(Debug)]
pub struct ResourceProbe<K: KernelInterface = NativeKernel> {
    kernel: K,
}

impl ResourceProbe<NativeKernel> {
    /// Create a probe bound to the operating system the crate was built for.
    pub fn new() -> Self {
        Self::with_kernel(NativeKernel::new())
    }
}

impl Default for ResourceProbe<NativeKernel> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: KernelInterface> ResourceProbe<K> {
    /// Create a probe over an injected kernel capability.
    pub fn with_kernel(kernel: K) -> Self {
        Self { kernel }
    }

    /// The kernel capability this probe queries.
    pub fn kernel(&self) -> &K {
        &self.kernel
    }

    /// Summed CPU usage across every non-idle thread of the process.
    ///
    /// The sum is not divided by the core count: four saturated threads on a
    /// quad-core host read as 400%.
    pub fn cpu_usage_all(&self) -> CpuSample {
        let cores = self.kernel.active_processor_count();

        let threads = match ThreadListGuard::acquire(&self.kernel) {
            Ok(threads) => threads,
            Err(err) => {
                warn!("CPU sample degraded to zero: {}", err);
                return CpuSample::idle(cores);
            }
        };

        let mut total = 0.0;
        for (index, &thread) in threads.iter().enumerate() {
            match self.kernel.thread_basic_info(thread) {
                Ok(info) => {
                    trace!(
                        "thread {} flags={:#x} usage={}",
                        index,
                        info.flags,
                        info.cpu_usage
                    );
                    total += info.busy_percent();
                }
                Err(status) => {
                    let err = ProbeError::InfoQuery {
                        target: "thread",
                        status,
                    };
                    warn!(
                        "Stopping CPU aggregation after {} of {} threads: {}",
                        index,
                        threads.len(),
                        err
                    );
                    break;
                }
            }
        }

        debug!("{} threads, {:.2}% busy", threads.len(), total);
        CpuSample::new(total, cores)
    }

    /// CPU usage of the thread making this call.
    ///
    /// There is no thread parameter. To measure a particular thread, call this
    /// from that thread.
    pub fn cpu_usage_current_thread(&self) -> CpuSample {
        let cores = self.kernel.active_processor_count();

        let thread = match ThreadGuard::current(&self.kernel) {
            Ok(thread) => thread,
            Err(err) => {
                warn!("Current-thread CPU sample degraded to zero: {}", err);
                return CpuSample::idle(cores);
            }
        };

        match self.kernel.thread_basic_info(thread.thread()) {
            Ok(info) => CpuSample::new(info.busy_percent(), cores),
            Err(status) => {
                let err = ProbeError::InfoQuery {
                    target: "current thread",
                    status,
                };
                warn!("Current-thread CPU sample degraded to zero: {}", err);
                CpuSample::idle(cores)
            }
        }
    }

    /// Resident memory of the process against total physical memory.
    pub fn memory_usage(&self) -> MemorySample {
        let total_physical_bytes = self.kernel.physical_memory();

        let resident_bytes = match self.kernel.task_basic_info() {
            Ok(info) => info.resident_size,
            Err(status) => {
                let err = ProbeError::InfoQuery {
                    target: "task",
                    status,
                };
                warn!("Resident memory degraded to zero: {}", err);
                0
            }
        };

        let sample = MemorySample {
            resident_bytes,
            total_physical_bytes,
        };
        if !sample.is_consistent() {
            warn!(
                "Resident size {} exceeds physical memory {}",
                sample.resident_bytes, sample.total_physical_bytes
            );
        }
        sample
    }

    /// CPU usage for `scope` plus memory usage, stamped with the current time.
    pub fn sample(&self, scope: CpuScope) -> ResourceReport {
        let cpu = match scope {
            CpuScope::AllThreads => self.cpu_usage_all(),
            CpuScope::CurrentThread => self.cpu_usage_current_thread(),
        };
        ResourceReport::new(scope, cpu, self.memory_usage())
    }
}
