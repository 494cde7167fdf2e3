//! Workload Generation and Benchmarking.
//!
//! This module drives simulated devices with synthetic traffic. A
//! [`Pattern`] describes the size distribution and pacing of a workload,
//! [`WorkloadRunner`] replays it from several threads against one device
//! (stress mode), and [`BenchmarkRunner`] measures steady-state performance
//! of a fixed transfer size after an optional warm-up.

use super::handle::DeviceHandle;
use super::registry::DeviceRegistry;
use crate::common::{Direction, Result, SimError};
use crate::config::WorkloadConfig;
use crate::engine::rng::Pcg32;
use crate::stats::{PerformanceMetrics, StatsSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;

/// Traffic pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pattern {
    /// 64 B - 1 KiB transfers at 10 kHz.
    #[default]
    SmallFast,
    /// 1 - 4 MiB transfers at 100 Hz in bursts of 10 every 100 ms.
    LargeBurst,
    /// 1 - 64 KiB transfers at 1 kHz in bursts of 5 every 50 ms.
    Mixed,
    /// Fixed size and rate from the configuration.
    Custom,
}

/// Sizes and pacing of a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PatternProfile {
    pub min_size: usize,
    pub max_size: usize,
    pub rate_hz: u32,
    /// Transfers per burst; 1 means no bursts.
    pub burst_count: u32,
    /// Pause after each burst.
    pub burst_interval: Duration,
}

impl PatternProfile {
    /// Gap between consecutive transfers at `rate_hz`.
    pub fn period(&self) -> Duration {
        Duration::from_secs(1) / self.rate_hz.max(1)
    }
}

impl Pattern {
    /// Profile of this pattern. `custom_size` and `custom_rate_hz` only
    /// apply to [`Pattern::Custom`].
    pub fn profile(self, custom_size: usize, custom_rate_hz: u32) -> PatternProfile {
        match self {
            Pattern::SmallFast => PatternProfile {
                min_size: 64,
                max_size: KIB,
                rate_hz: 10_000,
                burst_count: 1,
                burst_interval: Duration::ZERO,
            },
            Pattern::LargeBurst => PatternProfile {
                min_size: MIB,
                max_size: 4 * MIB,
                rate_hz: 100,
                burst_count: 10,
                burst_interval: Duration::from_millis(100),
            },
            Pattern::Mixed => PatternProfile {
                min_size: KIB,
                max_size: 64 * KIB,
                rate_hz: 1_000,
                burst_count: 5,
                burst_interval: Duration::from_millis(50),
            },
            Pattern::Custom => PatternProfile {
                min_size: custom_size,
                max_size: custom_size,
                rate_hz: custom_rate_hz,
                burst_count: 1,
                burst_interval: Duration::ZERO,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pattern::SmallFast => "small-fast",
            Pattern::LargeBurst => "large-burst",
            Pattern::Mixed => "mixed",
            Pattern::Custom => "custom",
        }
    }
}

impl FromStr for Pattern {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "small-fast" | "small_fast" => Ok(Pattern::SmallFast),
            "large-burst" | "large_burst" => Ok(Pattern::LargeBurst),
            "mixed" => Ok(Pattern::Mixed),
            "custom" => Ok(Pattern::Custom),
            other => Err(SimError::InvalidParameter(format!(
                "unknown workload pattern '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully resolved workload.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadSpec {
    pub pattern: Pattern,
    pub profile: PatternProfile,
    pub threads: u32,
    /// Transfers issued by each thread.
    pub transfers: u64,
    pub direction: Direction,
    /// Sleep between transfers to hold the pattern's rate.
    pub paced: bool,
    /// Seed for size selection; each thread gets its own stream.
    pub seed: Option<u64>,
}

impl WorkloadSpec {
    pub fn from_config(config: &WorkloadConfig, seed: Option<u64>) -> Self {
        Self {
            pattern: config.pattern,
            profile: config
                .pattern
                .profile(config.custom_size, config.custom_rate_hz),
            threads: config.threads,
            transfers: config.transfers,
            direction: config.direction,
            paced: config.paced,
            seed,
        }
    }
}

/// Outcome of a workload run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadReport {
    pub device_id: u32,
    pub pattern: Pattern,
    pub threads: u32,
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Failure counts keyed by error kind.
    pub failures: BTreeMap<String, u64>,
    pub elapsed_ms: f64,
    /// Device statistics at the end of the run.
    pub stats: StatsSnapshot,
    pub metrics: PerformanceMetrics,
}

impl WorkloadReport {
    pub fn print(&self) {
        println!("\n==========================================================");
        println!("WORKLOAD REPORT (device {}, {})", self.device_id, self.pattern);
        println!("==========================================================");
        println!("workload.threads         {}", self.threads);
        println!("workload.attempted       {}", self.attempted);
        println!("workload.succeeded       {}", self.succeeded);
        println!("workload.failed          {}", self.failed);
        for (kind, count) in &self.failures {
            println!("  failed.{kind:<20} {count}");
        }
        println!("workload.elapsed         {:.2} ms", self.elapsed_ms);
        println!("----------------------------------------------------------");
        self.metrics.print();
    }
}

#[derive(Default)]
struct WorkerTally {
    succeeded: u64,
    failed: u64,
    failures: BTreeMap<&'static str, u64>,
}

/// Multi-threaded workload driver.
pub struct WorkloadRunner;

impl WorkloadRunner {
    /// Runs `spec` against `device_id`, one handle per thread.
    ///
    /// Transfer sizes are drawn uniformly from the pattern's range, clamped
    /// to the registry's transfer bounds. Transfer failures are tallied, not
    /// returned.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be opened or a worker thread panics.
    pub fn run(
        registry: &DeviceRegistry,
        device_id: u32,
        spec: &WorkloadSpec,
    ) -> Result<WorkloadReport> {
        let bounds = &registry.config().transfer;
        let hi = spec.profile.max_size.clamp(bounds.min_size, bounds.max_size);
        let lo = spec.profile.min_size.clamp(bounds.min_size, hi);

        info!(
            device = device_id,
            pattern = %spec.pattern,
            threads = spec.threads,
            transfers = spec.transfers,
            min_size = lo,
            max_size = hi,
            "workload starting"
        );

        let start = Instant::now();
        let tallies: Vec<Result<WorkerTally>> = thread::scope(|s| {
            let workers: Vec<_> = (0..spec.threads)
                .map(|worker| {
                    s.spawn(move || run_worker(registry, device_id, spec, worker, lo, hi))
                })
                .collect();
            workers
                .into_iter()
                .map(|w| {
                    w.join().unwrap_or_else(|_| {
                        Err(SimError::ResourceExhausted(
                            "workload thread panicked".to_string(),
                        ))
                    })
                })
                .collect()
        });
        let elapsed = start.elapsed();

        let mut succeeded = 0;
        let mut failed = 0;
        let mut failures = BTreeMap::new();
        for tally in tallies {
            let tally = tally?;
            succeeded += tally.succeeded;
            failed += tally.failed;
            for (kind, count) in tally.failures {
                *failures.entry(kind.to_string()).or_insert(0) += count;
            }
        }

        let stats = registry
            .device(device_id)
            .map(|ctx| ctx.snapshot())
            .unwrap_or_default();

        info!(
            device = device_id,
            succeeded,
            failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "workload finished"
        );

        Ok(WorkloadReport {
            device_id,
            pattern: spec.pattern,
            threads: spec.threads,
            attempted: succeeded + failed,
            succeeded,
            failed,
            failures,
            elapsed_ms: elapsed.as_secs_f64() * 1000.0,
            stats,
            metrics: PerformanceMetrics::from_snapshot(&stats, elapsed),
        })
    }
}

fn run_worker(
    registry: &DeviceRegistry,
    device_id: u32,
    spec: &WorkloadSpec,
    worker: u32,
    lo: usize,
    hi: usize,
) -> Result<WorkerTally> {
    let handle = registry.open(device_id)?;
    let stream = 0x100 + u64::from(worker);
    let mut rng = match spec.seed {
        Some(seed) => Pcg32::with_stream(seed, stream),
        None => Pcg32::from_entropy(stream),
    };
    let mut buffer = vec![0u8; hi];
    let mut tally = WorkerTally::default();
    let period = spec.profile.period();
    let burst = u64::from(spec.profile.burst_count.max(1));

    for i in 0..spec.transfers {
        let size = rng.range_inclusive(lo as u64, hi as u64) as usize;
        match handle.transfer(&mut buffer, size, spec.direction) {
            Ok(_) => tally.succeeded += 1,
            Err(err) => {
                debug!(device = device_id, worker, size, "transfer failed: {err}");
                tally.failed += 1;
                *tally.failures.entry(err.kind()).or_insert(0) += 1;
            }
        }

        if spec.paced {
            if burst > 1 && (i + 1) % burst == 0 {
                thread::sleep(spec.profile.burst_interval);
            } else {
                thread::sleep(period);
            }
        }
    }

    handle.close();
    Ok(tally)
}

/// Parameters of a fixed-size benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BenchmarkConfig {
    pub transfer_size: usize,
    pub transfers: u64,
    pub direction: Direction,
    pub warmup: bool,
    pub warmup_transfers: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            transfer_size: 4096,
            transfers: 1000,
            direction: Direction::ToDevice,
            warmup: true,
            warmup_transfers: 100,
        }
    }
}

/// Single-threaded benchmark driver.
pub struct BenchmarkRunner;

impl BenchmarkRunner {
    /// Resets the device's statistics, optionally warms up and resets again,
    /// then times `config.transfers` transfers.
    ///
    /// Failed transfers are counted in the metrics' error rate.
    ///
    /// # Errors
    ///
    /// Fails on errors that reject the request outright (bad size, disabled
    /// device).
    pub fn run(handle: &DeviceHandle, config: &BenchmarkConfig) -> Result<PerformanceMetrics> {
        let mut buffer = vec![0u8; config.transfer_size.max(1)];
        handle.reset_stats()?;

        if config.warmup {
            debug!(
                device = handle.device_id(),
                transfers = config.warmup_transfers,
                "benchmark warm-up"
            );
            Self::issue(handle, &mut buffer, config, config.warmup_transfers)?;
            handle.reset_stats()?;
        }

        let start = Instant::now();
        Self::issue(handle, &mut buffer, config, config.transfers)?;
        let elapsed = start.elapsed();

        let stats = handle.get_stats()?;
        Ok(PerformanceMetrics::from_snapshot(&stats, elapsed))
    }

    fn issue(
        handle: &DeviceHandle,
        buffer: &mut [u8],
        config: &BenchmarkConfig,
        count: u64,
    ) -> Result<()> {
        for _ in 0..count {
            match handle.transfer(buffer, config.transfer_size, config.direction) {
                Ok(_) => {}
                Err(
                    err @ (SimError::InvalidParameter(_)
                    | SimError::DeviceNotFound(_)
                    | SimError::DeviceUnavailable(_)
                    | SimError::Config(_)),
                ) => return Err(err),
                Err(_) => {}
            }
        }
        Ok(())
    }
}
