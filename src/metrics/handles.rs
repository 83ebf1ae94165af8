//! Scoped guards that give kernel handles back on drop.
//!
//! Every acquiring call on [`KernelInterface`] is wrapped in one of these
//! guards immediately, so each handle is released exactly once on every exit
//! path of a probe operation, including early returns.

use crate::error::ProbeError;
use crate::metrics::traits::KernelInterface;
use std::fmt;
use std::ops::Deref;

/// Owns a thread list and every thread handle in it.
pub(crate) struct ThreadListGuard<'k, K: KernelInterface> {
    kernel: &'k K,
    /// Wrapped in `Option` so `drop()` can move the list back to the kernel.
    list: Option<K::ThreadList>,
}

impl<'k, K: KernelInterface> ThreadListGuard<'k, K> {
    /// Enumerate the threads of the current process.
    pub(crate) fn acquire(kernel: &'k K) -> Result<Self, ProbeError> {
        let list = kernel.task_threads().map_err(ProbeError::Enumeration)?;
        Ok(Self {
            kernel,
            list: Some(list),
        })
    }
}

impl<K: KernelInterface> Deref for ThreadListGuard<'_, K> {
    type Target = [K::Thread];

    fn deref(&self) -> &Self::Target {
        match &self.list {
            Some(list) => list.as_ref(),
            None => &[],
        }
    }
}

impl<K: KernelInterface> Drop for ThreadListGuard<'_, K> {
    fn drop(&mut self) {
        let Some(list) = self.list.take() else {
            return;
        };

        for &thread in list.as_ref() {
            if let Err(status) = self.kernel.deallocate_thread(thread) {
                log_release_failure(ProbeError::ResourceRelease {
                    resource: "thread handle",
                    status,
                });
            }
        }

        if let Err(status) = self.kernel.deallocate_thread_list(list) {
            log_release_failure(ProbeError::ResourceRelease {
                resource: "thread list",
                status,
            });
        }
    }
}

impl<K: KernelInterface> fmt::Debug for ThreadListGuard<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadListGuard")
            .field("threads", &self.len())
            .field("released", &self.list.is_none())
            .finish()
    }
}

/// Owns a handle to the calling thread.
pub(crate) struct ThreadGuard<'k, K: KernelInterface> {
    kernel: &'k K,
    thread: K::Thread,
}

impl<'k, K: KernelInterface> ThreadGuard<'k, K> {
    /// Obtain a handle to the calling thread.
    pub(crate) fn current(kernel: &'k K) -> Result<Self, ProbeError> {
        let thread = kernel
            .thread_self()
            .map_err(|status| ProbeError::InfoQuery {
                target: "current thread",
                status,
            })?;
        Ok(Self { kernel, thread })
    }

    pub(crate) fn thread(&self) -> K::Thread {
        self.thread
    }
}

impl<K: KernelInterface> Drop for ThreadGuard<'_, K> {
    fn drop(&mut self) {
        if let Err(status) = self.kernel.deallocate_thread(self.thread) {
            log_release_failure(ProbeError::ResourceRelease {
                resource: "current thread handle",
                status,
            });
        }
    }
}

impl<K: KernelInterface> fmt::Debug for ThreadGuard<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGuard")
            .field("thread", &self.thread)
            .finish()
    }
}

fn log_release_failure(err: ProbeError) {
    tracing::warn!("{}", err);
}
