//! Resource Probe - Process Telemetry Binary
//!
//! Polls the probe on a fixed cadence and prints CPU and RAM readings for this
//! process, like a live overlay would.

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use resource_probe::{
    CpuScope, MemorySample, MonitorConfig, ResourceMonitor, ResourceProbe, ResourceReport,
    DEFAULT_INTERVAL_MS,
};
use tokio_stream::StreamExt;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const BYTES_PER_GB: f64 = 1_073_741_824.0;

#[derive(Parser)]
#[command(name = "resource_probe")]
#[command(about = "Process CPU and memory telemetry")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "Samples CPU usage and resident memory of this process on a fixed cadence")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample repeatedly until interrupted (default)
    Watch(WatchArgs),

    /// Take a single sample and exit
    Snapshot(SnapshotArgs),

    /// Show host information
    Info,
}

#[derive(Args)]
struct WatchArgs {
    /// Sampling interval in milliseconds
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_MS)]
    interval: u64,

    /// Threads the CPU reading covers
    #[arg(short, long, value_enum, default_value_t = ScopeArg::All)]
    scope: ScopeArg,

    /// Stop after this many samples
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Threads the CPU reading covers
    #[arg(short, long, value_enum, default_value_t = ScopeArg::All)]
    scope: ScopeArg,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ScopeArg {
    /// Every thread in the process
    All,
    /// The main thread only
    CurrentThread,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

impl From<ScopeArg> for CpuScope {
    fn from(scope: ScopeArg) -> Self {
        match scope {
            ScopeArg::All => CpuScope::AllThreads,
            ScopeArg::CurrentThread => CpuScope::CurrentThread,
        }
    }
}

// A current-thread runtime keeps sampling on the main thread, so
// `--scope current-thread` measures the main thread.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Watch(args)) => watch_command(args).await?,
        Some(Commands::Snapshot(args)) => snapshot_command(args)?,
        Some(Commands::Info) => info_command(),
        None => {
            let args = WatchArgs {
                interval: DEFAULT_INTERVAL_MS,
                scope: ScopeArg::All,
                count: None,
                format: OutputFormat::Pretty,
            };
            watch_command(&args).await?;
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn watch_command(args: &WatchArgs) -> anyhow::Result<()> {
    let config = MonitorConfig::new(args.interval)
        .with_cpu_scope(args.scope.into())
        .with_sample_limit(args.count);
    let monitor = ResourceMonitor::new(config).context("invalid watch settings")?;

    info!(
        "Sampling every {}ms ({:?})",
        monitor.config().interval_ms,
        monitor.config().cpu_scope
    );

    let mut reports = monitor.stream();
    loop {
        tokio::select! {
            report = reports.next() => match report {
                Some(report) => print_report(&report, args.format)?,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    Ok(())
}

fn snapshot_command(args: &SnapshotArgs) -> anyhow::Result<()> {
    let probe = ResourceProbe::new();
    let report = probe.sample(args.scope.into());
    print_report(&report, args.format)
}

fn info_command() {
    let probe = ResourceProbe::new();
    let cpu = probe.cpu_usage_all();
    let memory = probe.memory_usage();

    println!("Resource Probe Host Information");
    println!("===============================");
    println!("  Active cores: {}", cpu.active_core_count);
    println!(
        "  Physical memory: {:.2} GB",
        memory.total_physical_bytes as f64 / BYTES_PER_GB
    );
    println!("  Version: {}", env!("CARGO_PKG_VERSION"));
}

fn print_report(report: &ResourceReport, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
        OutputFormat::Pretty => println!(
            "[{}] {} | {}",
            chrono::DateTime::from_timestamp_millis(report.timestamp as i64)
                .unwrap_or_default()
                .format("%H:%M:%S%.3f"),
            cpu_line(report),
            memory_line(&report.memory)
        ),
    }
    Ok(())
}

fn cpu_line(report: &ResourceReport) -> String {
    match report.scope {
        CpuScope::AllThreads => format!("CPU: {:.2}%", report.cpu.percent_busy),
        CpuScope::CurrentThread => format!("Main CPU: {:.2}%", report.cpu.percent_busy),
    }
}

fn memory_line(memory: &MemorySample) -> String {
    format!(
        "RAM: {:.2} GB / {:.2} GB",
        memory.resident_bytes as f64 / BYTES_PER_GB,
        memory.total_physical_bytes as f64 / BYTES_PER_GB
    )
}
