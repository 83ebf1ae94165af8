//! The kernel capability the probe is built on.

use crate::error::KernStatus;
use crate::metrics::data::{TaskBasicInfo, ThreadBasicInfo};
use std::fmt::Debug;

/// Thread enumeration and accounting queries against the OS.
///
/// All introspection the probe performs goes through this trait, so a fake
/// implementation can stand in for the real kernel in tests. Acquiring calls
/// (`task_threads`, `thread_self`) hand out resources the caller must give
/// back through the matching `deallocate_*` call exactly once; the probe does
/// this through scoped guards that release on drop.
pub trait KernelInterface: Debug + Send + Sync + 'static {
    /// Raw handle naming one thread.
    type Thread: Copy + Debug;

    /// An owned list of thread handles for the current process.
    type ThreadList: AsRef<[Self::Thread]>;

    /// List the threads of the current process.
    ///
    /// Every handle in the list is owned by the caller, as is the list itself.
    fn task_threads(&self) -> Result<Self::ThreadList, KernStatus>;

    /// Release the storage backing a thread list.
    ///
    /// This does not release the handles in the list.
    fn deallocate_thread_list(&self, list: Self::ThreadList) -> Result<(), KernStatus>;

    /// Obtain a handle to the calling thread.
    fn thread_self(&self) -> Result<Self::Thread, KernStatus>;

    /// Release one thread handle.
    fn deallocate_thread(&self, thread: Self::Thread) -> Result<(), KernStatus>;

    /// Query scheduling info for a thread.
    fn thread_basic_info(&self, thread: Self::Thread) -> Result<ThreadBasicInfo, KernStatus>;

    /// Query accounting info for the current process.
    fn task_basic_info(&self) -> Result<TaskBasicInfo, KernStatus>;

    /// Total physical memory installed on the host, in bytes.
    fn physical_memory(&self) -> u64;

    /// Number of cores currently schedulable.
    fn active_processor_count(&self) -> usize;
}
