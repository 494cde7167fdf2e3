//! PCIe DMA Simulator CLI.
//!
//! The main executable for the simulator. It handles command-line argument
//! parsing, device setup and running a workload or benchmark.
//!
//! # Usage
//!
//! The simulator can run in two modes:
//! 1. **Workload Mode**: Replays a traffic pattern from one or more threads
//!    against a device and reports per-kind failures and statistics.
//! 2. **Benchmark Mode**: Times a fixed-size transfer loop after a warm-up.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pcie_sim::common::Direction;
use pcie_sim::config::Config;
use pcie_sim::engine::fault::{ErrorConfig, ErrorScenario};
use pcie_sim::sim::{
    BenchmarkConfig, BenchmarkRunner, DeviceRegistry, Pattern, WorkloadRunner, WorkloadSpec,
};

/// Command-line arguments for the PCIe DMA simulator.
#[derive(Parser, Debug)]
#[command(author, version, about = "PCIe DMA Device Simulator")]
struct Args {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long, default_value_t = 0)]
    device: u32,

    /// small-fast, large-burst, mixed or custom.
    #[arg(short, long)]
    pattern: Option<Pattern>,

    #[arg(short, long)]
    threads: Option<u32>,

    /// Transfers per thread (or timed transfers in benchmark mode).
    #[arg(short = 'n', long)]
    transfers: Option<u64>,

    /// Transfer size for custom patterns and benchmarks.
    #[arg(short, long)]
    size: Option<usize>,

    /// to-device or from-device.
    #[arg(long)]
    direction: Option<Direction>,

    /// none, timeout, corruption or overrun.
    #[arg(short, long)]
    error: Option<ErrorScenario>,

    /// Seed for latency jitter, fault rolls and transfer sizes.
    #[arg(long)]
    seed: Option<u64>,

    /// Emit the report as JSON.
    #[arg(long)]
    json: bool,

    /// Run the fixed-size benchmark instead of the workload.
    #[arg(long)]
    benchmark: bool,
}

/// Applies command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut Config, args: &Args) {
    if let Some(pattern) = args.pattern {
        config.workload.pattern = pattern;
    }
    if let Some(threads) = args.threads {
        config.workload.threads = threads;
    }
    if let Some(transfers) = args.transfers {
        config.workload.transfers = transfers;
    }
    if let Some(size) = args.size {
        config.workload.custom_size = size;
    }
    if let Some(direction) = args.direction {
        config.workload.direction = direction;
    }
    if let Some(scenario) = args.error {
        config.fault.scenario = scenario;
    }
    if args.seed.is_some() {
        config.latency.seed = args.seed;
    }
}

fn print_summary(config: &Config, device: u32) {
    let fault: ErrorConfig = config.fault.to_error_config();
    println!("Global Configuration");
    println!("--------------------");
    println!("Device:");
    println!("  Devices:            {}", config.device.count);
    println!("  Selected:           {}", device);
    println!("  Ring Size:          {}", config.device.ring_size);
    println!("  BAR0 Size:          {:#x}", config.device.bar_size);
    println!("Transfer:");
    println!(
        "  Size Range:         {} - {} bytes",
        config.transfer.min_size, config.transfer.max_size
    );
    println!("  Latency Model:      {:?}", config.latency.model);
    println!("Fault Injection:");
    println!("  Scenario:           {}", fault.scenario);
    println!(
        "  Probability:        {:.2}%",
        f64::from(fault.probability_bp) / 100.0
    );
    println!("  Recovery:           {} ms", fault.recovery_ms);
    println!("Workload:");
    println!("  Pattern:            {}", config.workload.pattern);
    println!("  Threads:            {}", config.workload.threads);
    println!("  Transfers/Thread:   {}", config.workload.transfers);
    println!("  Direction:          {}", config.workload.direction);
    println!("--------------------");
}

/// Main entry point for the PCIe DMA simulator.
///
/// # Behavior
///
/// 1. **Configuration**: Parses arguments, loads the TOML file (or defaults)
///    and applies overrides.
/// 2. **Initialization**: Builds the device registry.
/// 3. **Run**: Executes the workload or benchmark against `--device`.
/// 4. **Report**: Prints statistics, or JSON with `--json`.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    apply_overrides(&mut config, &args);
    config.validate().context("invalid configuration")?;

    if args.device >= config.device.count {
        bail!(
            "device {} out of range (configured devices: {})",
            args.device,
            config.device.count
        );
    }

    if !args.json {
        print_summary(&config, args.device);
    }

    let registry = DeviceRegistry::new(config.clone())?;

    if args.benchmark {
        let bench = BenchmarkConfig {
            transfer_size: args.size.unwrap_or(BenchmarkConfig::default().transfer_size),
            transfers: args.transfers.unwrap_or(BenchmarkConfig::default().transfers),
            direction: config.workload.direction,
            ..BenchmarkConfig::default()
        };
        let handle = registry.open(args.device)?;
        let metrics = BenchmarkRunner::run(&handle, &bench)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        } else {
            println!("[*] Benchmark ({} x {} bytes)", bench.transfers, bench.transfer_size);
            metrics.print();
        }
        handle.close();
        return Ok(());
    }

    let spec = WorkloadSpec::from_config(&config.workload, config.latency.seed);
    let report = WorkloadRunner::run(&registry, args.device, &spec)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print();
        report.stats.print(args.device);
    }
    Ok(())
}
