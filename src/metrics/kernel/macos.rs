//! macOS bindings over Mach task and thread introspection.
//!
//! `task_threads` hands back a send right for every thread plus an array
//! allocated in our address space. Both must be given back: the rights with
//! `mach_port_deallocate` and the array with `vm_deallocate`.

// libc flags its Mach bindings as deprecated in favour of a separate crate.
#![allow(deprecated)]

use crate::error::KernStatus;
use crate::metrics::data::{TaskBasicInfo, ThreadBasicInfo};
use crate::metrics::kernel::{host_physical_memory, schedulable_cores};
use crate::metrics::traits::KernelInterface;
use std::{mem, ptr, slice};

/// Kernel binding backed by Mach calls.
#[derive(Debug)]
pub struct MachKernel {
    physical_memory: u64,
}

/// A thread array returned by `task_threads`.
#[derive(Debug)]
pub struct MachThreadList {
    threads: libc::thread_act_array_t,
    count: libc::mach_msg_type_number_t,
}

// SAFETY: the array belongs to this task's address space, not to a thread.
unsafe impl Send for MachThreadList {}

impl AsRef<[libc::thread_act_t]> for MachThreadList {
    fn as_ref(&self) -> &[libc::thread_act_t] {
        if self.threads.is_null() || self.count == 0 {
            return &[];
        }
        // SAFETY: the kernel filled `count` entries and the array stays mapped
        // until `deallocate_thread_list` consumes this value.
        unsafe { slice::from_raw_parts(self.threads, self.count as usize) }
    }
}

impl MachKernel {
    /// Create a binding, reading the host constants once.
    pub fn new() -> Self {
        Self {
            physical_memory: host_physical_memory(),
        }
    }
}

impl Default for MachKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn check(kr: libc::kern_return_t) -> Result<(), KernStatus> {
    if kr == libc::KERN_SUCCESS {
        Ok(())
    } else {
        Err(KernStatus(kr))
    }
}

impl KernelInterface for MachKernel {
    type Thread = libc::thread_act_t;
    type ThreadList = MachThreadList;

    fn task_threads(&self) -> Result<MachThreadList, KernStatus> {
        let mut threads: libc::thread_act_array_t = ptr::null_mut();
        let mut count: libc::mach_msg_type_number_t = 0;

        // SAFETY: both out-pointers are valid for writes.
        let kr = unsafe { libc::task_threads(libc::mach_task_self(), &mut threads, &mut count) };
        check(kr)?;

        Ok(MachThreadList { threads, count })
    }

    fn deallocate_thread_list(&self, list: MachThreadList) -> Result<(), KernStatus> {
        if list.threads.is_null() {
            return Ok(());
        }
        let size = list.count as usize * mem::size_of::<libc::thread_act_t>();

        // SAFETY: the region was allocated by `task_threads` and is released once.
        let kr = unsafe {
            libc::vm_deallocate(
                libc::mach_task_self(),
                list.threads as libc::vm_address_t,
                size as libc::vm_size_t,
            )
        };
        check(kr)
    }

    fn thread_self(&self) -> Result<libc::thread_act_t, KernStatus> {
        // SAFETY: no preconditions; returns a new send right for the caller.
        let thread = unsafe { libc::mach_thread_self() };
        if thread == 0 {
            return Err(KernStatus::FAILURE);
        }
        Ok(thread)
    }

    fn deallocate_thread(&self, thread: libc::thread_act_t) -> Result<(), KernStatus> {
        // SAFETY: `thread` is a send right owned by the calling guard.
        check(unsafe { libc::mach_port_deallocate(libc::mach_task_self(), thread) })
    }

    fn thread_basic_info(&self, thread: libc::thread_act_t) -> Result<ThreadBasicInfo, KernStatus> {
        // SAFETY: all-zero is a valid `thread_basic_info`.
        let mut info: libc::thread_basic_info = unsafe { mem::zeroed() };
        let mut count = libc::THREAD_BASIC_INFO_COUNT;

        // SAFETY: `info` is large enough for `count` integers.
        let kr = unsafe {
            libc::thread_info(
                thread,
                libc::THREAD_BASIC_INFO as libc::thread_flavor_t,
                &mut info as *mut libc::thread_basic_info as libc::thread_info_t,
                &mut count,
            )
        };
        check(kr)?;

        Ok(ThreadBasicInfo {
            flags: info.flags,
            cpu_usage: info.cpu_usage,
        })
    }

    fn task_basic_info(&self) -> Result<TaskBasicInfo, KernStatus> {
        // SAFETY: all-zero is a valid `mach_task_basic_info`.
        let mut info: libc::mach_task_basic_info = unsafe { mem::zeroed() };
        let mut count = libc::MACH_TASK_BASIC_INFO_COUNT;

        // SAFETY: `info` is large enough for `count` integers.
        let kr = unsafe {
            libc::task_info(
                libc::mach_task_self(),
                libc::MACH_TASK_BASIC_INFO as libc::task_flavor_t,
                &mut info as *mut libc::mach_task_basic_info as libc::task_info_t,
                &mut count,
            )
        };
        check(kr)?;

        Ok(TaskBasicInfo {
            resident_size: info.resident_size,
        })
    }

    fn physical_memory(&self) -> u64 {
        self.physical_memory
    }

    fn active_processor_count(&self) -> usize {
        schedulable_cores()
    }
}
