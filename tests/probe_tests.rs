use resource_probe::{
    CpuScope, KernStatus, KernelInterface, MemorySample, MonitorConfig, ResourceMonitor,
    ResourceProbe, TaskBasicInfo, ThreadBasicInfo, TH_FLAGS_IDLE,
};
use std::collections::HashMap;
use std::sync::Mutex;

/// Failure injection points for the fake kernel.
#[derive(Debug, Default, Clone, Copy)]
struct Faults {
    enumeration: bool,
    thread_self: bool,
    task_info: bool,
    release: bool,
    /// Fail the info query for this thread id.
    info_for: Option<u32>,
}

/// Fabricated kernel that tracks every outstanding handle.
#[derive(Debug)]
struct FakeKernel {
    threads: Vec<(u32, ThreadBasicInfo)>,
    current: (u32, ThreadBasicInfo),
    resident: u64,
    physical: u64,
    cores: usize,
    faults: Faults,
    ledger: Mutex<Ledger>,
}

#[derive(Debug, Default)]
struct Ledger {
    /// Release count per acquired thread handle.
    threads: HashMap<u32, usize>,
    lists_acquired: usize,
    lists_released: usize,
    info_queries: usize,
    /// Releases of handles that were never acquired.
    strays: usize,
}

fn busy(percent: i32) -> ThreadBasicInfo {
    ThreadBasicInfo {
        flags: 0,
        cpu_usage: percent * 10,
    }
}

fn idle() -> ThreadBasicInfo {
    ThreadBasicInfo {
        flags: TH_FLAGS_IDLE,
        cpu_usage: 0,
    }
}

impl FakeKernel {
    fn new(threads: &[ThreadBasicInfo]) -> Self {
        Self {
            threads: threads
                .iter()
                .enumerate()
                .map(|(i, info)| (i as u32 + 1, *info))
                .collect(),
            current: (100, busy(0)),
            resident: 64 * 1024 * 1024,
            physical: 8 * 1024 * 1024 * 1024,
            cores: 8,
            faults: Faults::default(),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    fn with_faults(mut self, faults: Faults) -> Self {
        self.faults = faults;
        self
    }

    fn with_current(mut self, info: ThreadBasicInfo) -> Self {
        self.current.1 = info;
        self
    }

    /// Panics unless every acquired handle was released exactly once.
    fn assert_balanced(&self) {
        let ledger = self.ledger.lock().unwrap();
        for (thread, releases) in &ledger.threads {
            assert_eq!(*releases, 1, "thread {thread} released {releases} times");
        }
        assert_eq!(ledger.lists_acquired, ledger.lists_released);
        assert_eq!(ledger.strays, 0);
    }

    fn reset_ledger(&self) {
        *self.ledger.lock().unwrap() = Ledger::default();
    }
}

impl KernelInterface for FakeKernel {
    type Thread = u32;
    type ThreadList = Vec<u32>;

    fn task_threads(&self) -> Result<Vec<u32>, KernStatus> {
        if self.faults.enumeration {
            return Err(KernStatus(5));
        }
        let mut ledger = self.ledger.lock().unwrap();
        ledger.lists_acquired += 1;
        for (id, _) in &self.threads {
            ledger.threads.insert(*id, 0);
        }
        Ok(self.threads.iter().map(|(id, _)| *id).collect())
    }

    fn deallocate_thread_list(&self, _list: Vec<u32>) -> Result<(), KernStatus> {
        self.ledger.lock().unwrap().lists_released += 1;
        if self.faults.release {
            return Err(KernStatus(1));
        }
        Ok(())
    }

    fn thread_self(&self) -> Result<u32, KernStatus> {
        if self.faults.thread_self {
            return Err(KernStatus(5));
        }
        self.ledger.lock().unwrap().threads.insert(self.current.0, 0);
        Ok(self.current.0)
    }

    fn deallocate_thread(&self, thread: u32) -> Result<(), KernStatus> {
        let mut ledger = self.ledger.lock().unwrap();
        match ledger.threads.get_mut(&thread) {
            Some(releases) => *releases += 1,
            None => ledger.strays += 1,
        }
        if self.faults.release {
            return Err(KernStatus(15));
        }
        Ok(())
    }

    fn thread_basic_info(&self, thread: u32) -> Result<ThreadBasicInfo, KernStatus> {
        self.ledger.lock().unwrap().info_queries += 1;
        if self.faults.info_for == Some(thread) {
            return Err(KernStatus(4));
        }
        if thread == self.current.0 {
            return Ok(self.current.1);
        }
        self.threads
            .iter()
            .find(|(id, _)| *id == thread)
            .map(|(_, info)| *info)
            .ok_or(KernStatus(4))
    }

    fn task_basic_info(&self) -> Result<TaskBasicInfo, KernStatus> {
        if self.faults.task_info {
            return Err(KernStatus(5));
        }
        Ok(TaskBasicInfo {
            resident_size: self.resident,
        })
    }

    fn physical_memory(&self) -> u64 {
        self.physical
    }

    fn active_processor_count(&self) -> usize {
        self.cores
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn single_idle_thread_reads_zero() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[idle()]));

    let sample = probe.cpu_usage_all();
    assert_eq!(sample.percent_busy, 0.0);
    assert_eq!(sample.active_core_count, 8);
    probe.kernel().assert_balanced();
}

#[test]
fn busy_threads_are_summed_not_averaged() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[busy(30), busy(45)]));

    assert_close(probe.cpu_usage_all().percent_busy, 75.0);
    probe.kernel().assert_balanced();
}

#[test]
fn idle_threads_are_excluded_from_sum() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[busy(10), idle(), busy(20)]));

    let sample = probe.cpu_usage_all();
    assert_close(sample.percent_busy, 30.0);
    assert_eq!(sample.active_core_count, 8);
}

#[test]
fn total_may_exceed_one_hundred_percent() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[
        busy(100),
        busy(100),
        busy(100),
        busy(100),
    ]));

    assert_close(probe.cpu_usage_all().percent_busy, 400.0);
}

#[test]
fn empty_thread_list_reads_zero() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[]));

    assert_eq!(probe.cpu_usage_all().percent_busy, 0.0);
    probe.kernel().assert_balanced();
    assert_eq!(probe.kernel().ledger.lock().unwrap().lists_released, 1);
}

#[test]
fn enumeration_failure_degrades_to_zero() {
    let kernel = FakeKernel::new(&[busy(50)]).with_faults(Faults {
        enumeration: true,
        ..Faults::default()
    });
    let probe = ResourceProbe::with_kernel(kernel);

    let sample = probe.cpu_usage_all();
    assert_eq!(sample.percent_busy, 0.0);
    assert_eq!(sample.active_core_count, 8);
    probe.kernel().assert_balanced();
}

#[test]
fn info_failure_keeps_partial_sum_and_stops() {
    let kernel = FakeKernel::new(&[busy(10), busy(20), busy(40)]).with_faults(Faults {
        info_for: Some(2),
        ..Faults::default()
    });
    let probe = ResourceProbe::with_kernel(kernel);

    assert_close(probe.cpu_usage_all().percent_busy, 10.0);

    let ledger = probe.kernel().ledger.lock().unwrap();
    // Thread 3 is never queried once thread 2 fails.
    assert_eq!(ledger.info_queries, 2);
    // ...but every handle in the list is still released.
    assert_eq!(ledger.threads.len(), 3);
    assert!(ledger.threads.values().all(|&n| n == 1));
    assert_eq!(ledger.lists_released, 1);
}

#[test]
fn release_failures_do_not_corrupt_sample() {
    let kernel = FakeKernel::new(&[busy(25), busy(25)]).with_faults(Faults {
        release: true,
        ..Faults::default()
    });
    let probe = ResourceProbe::with_kernel(kernel);

    assert_close(probe.cpu_usage_all().percent_busy, 50.0);
    assert_close(probe.cpu_usage_current_thread().percent_busy, 0.0);
    probe.kernel().assert_balanced();
}

#[test]
fn current_thread_reads_only_the_caller() {
    let kernel = FakeKernel::new(&[busy(90), busy(90)]).with_current(busy(35));
    let probe = ResourceProbe::with_kernel(kernel);

    let sample = probe.cpu_usage_current_thread();
    assert_close(sample.percent_busy, 35.0);
    assert_eq!(sample.active_core_count, 8);

    let ledger = probe.kernel().ledger.lock().unwrap();
    assert_eq!(ledger.lists_acquired, 0);
    assert_eq!(ledger.threads.get(&100), Some(&1));
}

#[test]
fn current_thread_idle_reads_zero() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[]).with_current(idle()));

    assert_eq!(probe.cpu_usage_current_thread().percent_busy, 0.0);
    probe.kernel().assert_balanced();
}

#[test]
fn current_thread_info_failure_reads_zero() {
    let kernel = FakeKernel::new(&[])
        .with_current(busy(60))
        .with_faults(Faults {
            info_for: Some(100),
            ..Faults::default()
        });
    let probe = ResourceProbe::with_kernel(kernel);

    assert_eq!(probe.cpu_usage_current_thread().percent_busy, 0.0);
    probe.kernel().assert_balanced();
}

#[test]
fn current_thread_handle_failure_reads_zero() {
    let kernel = FakeKernel::new(&[]).with_faults(Faults {
        thread_self: true,
        ..Faults::default()
    });
    let probe = ResourceProbe::with_kernel(kernel);

    let sample = probe.cpu_usage_current_thread();
    assert_eq!(sample.percent_busy, 0.0);
    assert!(sample.active_core_count >= 1);
    probe.kernel().assert_balanced();
}

#[test]
fn zero_cores_reported_as_one() {
    let mut kernel = FakeKernel::new(&[busy(10)]);
    kernel.cores = 0;
    let probe = ResourceProbe::with_kernel(kernel);

    assert_eq!(probe.cpu_usage_all().active_core_count, 1);
    assert_eq!(probe.cpu_usage_current_thread().active_core_count, 1);
}

#[test]
fn memory_reports_resident_and_total() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[]));

    assert_eq!(
        probe.memory_usage(),
        MemorySample {
            resident_bytes: 64 * 1024 * 1024,
            total_physical_bytes: 8 * 1024 * 1024 * 1024,
        }
    );
}

#[test]
fn memory_resident_within_total_across_values() {
    for (resident, physical) in [(0, 1), (1, 1), (4096, 1 << 30), (u64::MAX - 1, u64::MAX)] {
        let mut kernel = FakeKernel::new(&[]);
        kernel.resident = resident;
        kernel.physical = physical;
        let sample = ResourceProbe::with_kernel(kernel).memory_usage();

        assert!(sample.resident_bytes <= sample.total_physical_bytes);
        assert!(sample.is_consistent());
    }
}

#[test]
fn memory_inconsistency_is_tolerated() {
    let mut kernel = FakeKernel::new(&[]);
    kernel.resident = 2048;
    kernel.physical = 1024;
    let sample = ResourceProbe::with_kernel(kernel).memory_usage();

    assert_eq!(sample.resident_bytes, 2048);
    assert!(!sample.is_consistent());
}

#[test]
fn memory_task_info_failure_reads_zero_resident() {
    let kernel = FakeKernel::new(&[]).with_faults(Faults {
        task_info: true,
        ..Faults::default()
    });
    let sample = ResourceProbe::with_kernel(kernel).memory_usage();

    assert_eq!(sample.resident_bytes, 0);
    assert_eq!(sample.total_physical_bytes, 8 * 1024 * 1024 * 1024);
}

#[test]
fn repeated_calls_stay_balanced_and_stable() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[busy(12), idle(), busy(3)]));

    let first = probe.cpu_usage_all();
    probe.kernel().assert_balanced();
    probe.kernel().reset_ledger();

    let second = probe.cpu_usage_all();
    probe.kernel().assert_balanced();

    assert_eq!(first, second);
    assert_eq!(probe.memory_usage(), probe.memory_usage());
}

#[test]
fn probe_is_shareable_across_threads() {
    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[busy(5), busy(5)]));

    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    assert_close(probe.cpu_usage_all().percent_busy, 10.0);
                    assert!(probe.memory_usage().is_consistent());
                }
            });
        }
    });

    let ledger = probe.kernel().ledger.lock().unwrap();
    assert_eq!(ledger.lists_acquired, 100);
    assert_eq!(ledger.lists_released, 100);
}

#[test]
fn sample_combines_scope_cpu_and_memory() {
    let kernel = FakeKernel::new(&[busy(30), busy(45)]).with_current(busy(5));
    let probe = ResourceProbe::with_kernel(kernel);

    let all = probe.sample(CpuScope::AllThreads);
    assert_close(all.cpu.percent_busy, 75.0);
    assert_eq!(all.memory.resident_bytes, 64 * 1024 * 1024);

    let current = probe.sample(CpuScope::CurrentThread);
    assert_close(current.cpu.percent_busy, 5.0);
    assert_eq!(current.scope, CpuScope::CurrentThread);
}

#[tokio::test]
async fn monitor_streams_fake_reports() {
    use futures_util::StreamExt;

    let probe = ResourceProbe::with_kernel(FakeKernel::new(&[busy(20), busy(20)]));
    let config = MonitorConfig::new(5).with_sample_limit(Some(2));
    let monitor = ResourceMonitor::with_probe(probe, config).unwrap();

    let reports: Vec<_> = monitor.stream().collect().await;
    assert_eq!(reports.len(), 2);
    for report in reports {
        assert_close(report.cpu.percent_busy, 40.0);
        assert_eq!(report.cpu.active_core_count, 8);
    }
}

#[test]
fn native_probe_is_stable_between_calls() {
    let probe = ResourceProbe::new();

    let first = probe.memory_usage();
    let second = probe.memory_usage();
    assert_eq!(first.total_physical_bytes, second.total_physical_bytes);
    assert!(first.resident_bytes.abs_diff(second.resident_bytes) < 64 * 1024 * 1024);

    let cpu = probe.cpu_usage_all();
    assert!(cpu.percent_busy >= 0.0);
    assert!(cpu.active_core_count >= 1);
}
