//! Linux bindings over procfs.
//!
//! A thread handle is an open descriptor on `/proc/self/task/<tid>/stat`, so
//! it pins the thread's accounting record between enumeration and query the
//! way a Mach thread port does. Reads:
//! - `/proc/self/task/*/stat` and `/proc/thread-self/stat` for thread times and state.
//! - `/proc/uptime` for thread age, once per enumeration.
//! - `/proc/self/statm` for resident pages.
//!
//! Linux keeps no decayed per-thread usage figure, so `cpu_usage` is the
//! thread's CPU time over its lifetime, clamped to one full core.

use crate::error::KernStatus;
use crate::metrics::data::{TaskBasicInfo, ThreadBasicInfo, TH_FLAGS_IDLE, TH_USAGE_SCALE};
use crate::metrics::kernel::{host_physical_memory, schedulable_cores};
use crate::metrics::traits::KernelInterface;
use std::fs::{self, File};
use std::io;
use std::mem::ManuallyDrop;
use std::os::unix::fs::FileExt;
use std::os::unix::io::{FromRawFd, IntoRawFd, RawFd};
use tracing::trace;

const TASK_DIR: &str = "/proc/self/task";
const THREAD_SELF_STAT: &str = "/proc/thread-self/stat";
const STATM_PATH: &str = "/proc/self/statm";
const UPTIME_PATH: &str = "/proc/uptime";

/// A `stat` line is a few hundred bytes; this leaves generous headroom.
const STAT_READ_LIMIT: usize = 4096;

/// Kernel binding backed by procfs.
#[derive(Debug)]
pub struct ProcfsKernel {
    physical_memory: u64,
    clock_ticks: f64,
    page_size: u64,
}

/// An open `stat` descriptor for one thread.
///
/// `uptime_secs` is the clock reading taken when the handle was acquired, so
/// every thread in one enumeration is aged against the same instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcfsThread {
    fd: RawFd,
    uptime_secs: f64,
}

/// Open `stat` descriptors, one per thread.
#[derive(Debug)]
pub struct ProcfsThreadList {
    threads: Vec<ProcfsThread>,
}

impl AsRef<[ProcfsThread]> for ProcfsThreadList {
    fn as_ref(&self) -> &[ProcfsThread] {
        &self.threads
    }
}

impl ProcfsKernel {
    /// Create a binding, reading the host constants once.
    pub fn new() -> Self {
        Self {
            physical_memory: host_physical_memory(),
            clock_ticks: clock_ticks(),
            page_size: page_size(),
        }
    }
}

impl Default for ProcfsKernel {
    fn default() -> Self {
        Self::new()
    }
}

impl KernelInterface for ProcfsKernel {
    type Thread = ProcfsThread;
    type ThreadList = ProcfsThreadList;

    fn task_threads(&self) -> Result<ProcfsThreadList, KernStatus> {
        let uptime_secs = read_uptime()?;
        let mut threads = Vec::new();

        for entry in fs::read_dir(TASK_DIR)? {
            let Ok(entry) = entry else {
                continue;
            };
            let name = entry.file_name();
            let Some(tid) = name.to_str().and_then(|n| n.parse::<u32>().ok()) else {
                continue;
            };

            // The thread may have exited since the directory was listed.
            match File::open(format!("{TASK_DIR}/{tid}/stat")) {
                Ok(file) => threads.push(ProcfsThread {
                    fd: file.into_raw_fd(),
                    uptime_secs,
                }),
                Err(err) => trace!("Skipping thread {}: {}", tid, err),
            }
        }

        Ok(ProcfsThreadList { threads })
    }

    fn deallocate_thread_list(&self, list: ProcfsThreadList) -> Result<(), KernStatus> {
        // The descriptors were closed one by one; only the heap vector is left.
        drop(list);
        Ok(())
    }

    fn thread_self(&self) -> Result<ProcfsThread, KernStatus> {
        let uptime_secs = read_uptime()?;
        let fd = File::open(THREAD_SELF_STAT)?.into_raw_fd();
        Ok(ProcfsThread { fd, uptime_secs })
    }

    fn deallocate_thread(&self, thread: ProcfsThread) -> Result<(), KernStatus> {
        // SAFETY: `thread.fd` was opened by this binding and is closed exactly
        // once, by the guard that owns it.
        if unsafe { libc::close(thread.fd) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error().into())
        }
    }

    fn thread_basic_info(&self, thread: ProcfsThread) -> Result<ThreadBasicInfo, KernStatus> {
        let stat = read_open_file(thread.fd)?;

        parse_thread_stat(&stat, self.clock_ticks, thread.uptime_secs)
            .ok_or(KernStatus(libc::EINVAL))
    }

    fn task_basic_info(&self) -> Result<TaskBasicInfo, KernStatus> {
        let statm = fs::read_to_string(STATM_PATH)?;
        let resident_pages = parse_statm_resident(&statm).ok_or(KernStatus(libc::EINVAL))?;

        Ok(TaskBasicInfo {
            resident_size: resident_pages.saturating_mul(self.page_size),
        })
    }

    fn physical_memory(&self) -> u64 {
        self.physical_memory
    }

    fn active_processor_count(&self) -> usize {
        schedulable_cores()
    }
}

/// Read a procfs file through a descriptor that stays owned by the caller.
fn read_open_file(fd: RawFd) -> Result<String, KernStatus> {
    // SAFETY: `fd` is an open descriptor owned by a guard for the duration of
    // this call. `ManuallyDrop` keeps the `File` from closing it.
    let file = ManuallyDrop::new(unsafe { File::from_raw_fd(fd) });

    let mut buf = vec![0u8; STAT_READ_LIMIT];
    let len = file.read_at(&mut buf, 0)?;
    buf.truncate(len);

    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn read_uptime() -> Result<f64, KernStatus> {
    let uptime = fs::read_to_string(UPTIME_PATH)?;
    parse_uptime(&uptime).ok_or(KernStatus(libc::EINVAL))
}

fn clock_ticks() -> f64 {
    // SAFETY: `sysconf` is thread-safe for this query and has no side effects.
    let hz = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if hz > 0 {
        hz as f64
    } else {
        100.0
    }
}

fn page_size() -> u64 {
    // SAFETY: `sysconf` is thread-safe for this query and has no side effects.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// Parses `/proc/uptime` (`"12345.67 54321.00"`) into seconds.
fn parse_uptime(content: &str) -> Option<f64> {
    content.split_whitespace().next()?.parse().ok()
}

/// Parses the resident page count (second field) out of `/proc/<pid>/statm`.
fn parse_statm_resident(content: &str) -> Option<u64> {
    content.split_whitespace().nth(1)?.parse().ok()
}

/// Parses a thread `stat` line into scheduling info.
///
/// `comm` may contain spaces and parentheses, so fields are counted from the
/// last `)`. After it, index 0 is the state, 11 and 12 are `utime` and
/// `stime`, and 19 is `starttime`, all in clock ticks.
fn parse_thread_stat(content: &str, clock_ticks: f64, uptime_secs: f64) -> Option<ThreadBasicInfo> {
    let (_, rest) = content.rsplit_once(')')?;
    let fields: Vec<&str> = rest.split_whitespace().collect();

    let state = *fields.first()?;
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    let start_ticks: u64 = fields.get(19)?.parse().ok()?;

    let cpu_secs = utime.saturating_add(stime) as f64 / clock_ticks;
    let age_secs = uptime_secs - start_ticks as f64 / clock_ticks;
    let fraction = if age_secs > 0.0 {
        (cpu_secs / age_secs).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Some(ThreadBasicInfo {
        flags: if state == "I" { TH_FLAGS_IDLE } else { 0 },
        cpu_usage: (fraction * f64::from(TH_USAGE_SCALE)).round() as i32,
    })
}
