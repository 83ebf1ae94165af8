//! Kernel bindings for each supported operating system.
//!
//! [`NativeKernel`] names the binding for the build target. Total physical
//! memory and the active core count are read the same way everywhere.

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
mod unsupported;

#[cfg(target_os = "linux")]
pub use linux::{ProcfsKernel, ProcfsThread, ProcfsThreadList};
#[cfg(target_os = "macos")]
pub use macos::{MachKernel, MachThreadList};
pub use unsupported::UnsupportedKernel;

/// The kernel binding for the operating system the crate was built for.
#[cfg(target_os = "linux")]
pub type NativeKernel = ProcfsKernel;

/// The kernel binding for the operating system the crate was built for.
#[cfg(target_os = "macos")]
pub type NativeKernel = MachKernel;

/// The kernel binding for the operating system the crate was built for.
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub type NativeKernel = UnsupportedKernel;

/// Total physical memory of the host in bytes, or 0 if the OS won't say.
pub(crate) fn host_physical_memory() -> u64 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    system.total_memory()
}

/// Cores the runtime may schedule on, never less than 1.
pub(crate) fn schedulable_cores() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
