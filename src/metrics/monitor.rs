//! Periodic sampling on top of [`ResourceProbe`].
//!
//! The probe itself is synchronous and stateless; this module is the caller
//! side that decides cadence. Each tick takes one fresh report and keeps
//! nothing from earlier ticks.

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::metrics::data::ResourceReport;
use crate::metrics::kernel::NativeKernel;
use crate::metrics::probe::ResourceProbe;
use crate::metrics::traits::KernelInterface;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::time::{self, MissedTickBehavior};

/// Streams [`ResourceReport`]s at a fixed interval.
///
/// With [`CpuScope::CurrentThread`](crate::CpuScope::CurrentThread) the CPU
/// reading covers whichever thread polls the stream. Poll it from the thread
/// you want measured, e.g. on a current-thread runtime.
#[derive(Debug)]
pub struct ResourceMonitor<K: KernelInterface = NativeKernel> {
    probe: ResourceProbe<K>,
    config: MonitorConfig,
}

impl ResourceMonitor<NativeKernel> {
    /// Create a monitor over the native kernel.
    pub fn new(config: MonitorConfig) -> Result<Self> {
        Self::with_probe(ResourceProbe::new(), config)
    }
}

impl<K: KernelInterface> ResourceMonitor<K> {
    /// Create a monitor over an existing probe.
    pub fn with_probe(probe: ResourceProbe<K>, config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { probe, config })
    }

    /// The active configuration.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Take a single report now.
    pub fn sample_now(&self) -> ResourceReport {
        self.probe.sample(self.config.cpu_scope)
    }

    /// Start sampling. The first report is taken immediately.
    ///
    /// Must be polled inside a tokio runtime.
    pub fn stream(self) -> BoxStream<'static, ResourceReport> {
        let interval = self.config.interval();
        let limit = self.config.sample_limit;
        let scope = self.config.cpu_scope;
        let probe = self.probe;

        tracing::debug!(
            "Sampling every {}ms, scope {:?}, limit {:?}",
            interval.as_millis(),
            scope,
            limit
        );

        let reports = stream::unfold(
            (probe, None::<time::Interval>),
            move |(probe, ticker)| async move {
                let mut ticker = ticker.unwrap_or_else(|| {
                    let mut ticker = time::interval(interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    ticker
                });
                ticker.tick().await;
                let report = probe.sample(scope);
                Some((report, (probe, Some(ticker))))
            },
        );

        match limit {
            Some(limit) => reports.take(limit).boxed(),
            None => reports.boxed(),
        }
    }
}
