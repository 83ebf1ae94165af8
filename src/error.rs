//! Error handling for the resource probe crate.
//!
//! The probe operations never return these errors. They are built at the
//! failure site so that the diagnostic log line carries a uniform message and
//! the raw OS status code. Configuration and CLI paths do return them.

use std::fmt;

/// A specialized `Result` type for configuration and caller-layer operations.
pub type Result<T> = std::result::Result<T, ProbeError>;

/// Raw status code reported by a kernel introspection call.
///
/// On macOS this is a `kern_return_t`; on Linux it is an `errno` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernStatus(pub i32);

impl KernStatus {
    /// Generic failure, used when the OS gives no more specific code.
    /// Matches Mach's `KERN_FAILURE`.
    pub const FAILURE: KernStatus = KernStatus(5);

    /// The numeric status code.
    pub fn code(self) -> i32 {
        self.0
    }
}

impl fmt::Display for KernStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

impl From<std::io::Error> for KernStatus {
    fn from(err: std::io::Error) -> Self {
        err.raw_os_error().map_or(Self::FAILURE, KernStatus)
    }
}

/// The error taxonomy of the probe.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The OS could not produce the list of threads for the process.
    #[error("failed to enumerate process threads: {0}")]
    Enumeration(KernStatus),

    /// A per-thread or per-process info query failed.
    #[error("failed to query {target} info: {status}")]
    InfoQuery {
        target: &'static str,
        status: KernStatus,
    },

    /// Releasing a kernel handle failed.
    #[error("failed to release {resource}: {status}")]
    ResourceRelease {
        resource: &'static str,
        status: KernStatus,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProbeError {
    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The OS status code behind this error, if any.
    pub fn status(&self) -> Option<KernStatus> {
        match self {
            Self::Enumeration(status)
            | Self::InfoQuery { status, .. }
            | Self::ResourceRelease { status, .. } => Some(*status),
            Self::Config(_) => None,
        }
    }
}
