//! Binding for targets without thread introspection.
//!
//! Thread queries always fail, so CPU samples read as zero. Resident memory
//! comes from `sysinfo`'s process table.

use crate::error::KernStatus;
use crate::metrics::data::{TaskBasicInfo, ThreadBasicInfo};
use crate::metrics::kernel::{host_physical_memory, schedulable_cores};
use crate::metrics::traits::KernelInterface;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};

/// Kernel binding with memory accounting only.
#[derive(Debug)]
pub struct UnsupportedKernel {
    physical_memory: u64,
}

impl UnsupportedKernel {
    /// Create a binding, reading the host constants once.
    pub fn new() -> Self {
        Self {
            physical_memory: host_physical_memory(),
        }
    }
}

impl Default for UnsupportedKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelInterface for UnsupportedKernel {
    type Thread = u32;
    type ThreadList = Vec<u32>;

    fn task_threads(&self) -> Result<Vec<u32>, KernStatus> {
        Err(KernStatus::FAILURE)
    }

    fn deallocate_thread_list(&self, _list: Vec<u32>) -> Result<(), KernStatus> {
        Ok(())
    }

    fn thread_self(&self) -> Result<u32, KernStatus> {
        Err(KernStatus::FAILURE)
    }

    fn deallocate_thread(&self, _thread: u32) -> Result<(), KernStatus> {
        Ok(())
    }

    fn thread_basic_info(&self, _thread: u32) -> Result<ThreadBasicInfo, KernStatus> {
        Err(KernStatus::FAILURE)
    }

    fn task_basic_info(&self) -> Result<TaskBasicInfo, KernStatus> {
        let pid = sysinfo::get_current_pid().map_err(|_| KernStatus::FAILURE)?;
        let mut system = System::new();
        system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            ProcessRefreshKind::new().with_memory(),
        );
        let process = system.process(pid).ok_or(KernStatus::FAILURE)?;

        Ok(TaskBasicInfo {
            resident_size: process.memory(),
        })
    }

    fn physical_memory(&self) -> u64 {
        self.physical_memory
    }

    fn active_processor_count(&self) -> usize {
        schedulable_cores()
    }
}
