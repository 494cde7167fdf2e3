//! Transfer statistics collection and reporting.
//!
//! Tracks per-device transfer counters and latency aggregates, and derives
//! throughput and error-rate metrics from them for reports.

use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;

/// Point-in-time copy of a device's transfer statistics.
///
/// `min_latency_ns` is `0` until the first successful transfer after
/// creation or reset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub total_transfers: u64,
    pub total_bytes: u64,
    pub total_errors: u64,
    pub avg_latency_ns: u64,
    pub min_latency_ns: u64,
    pub max_latency_ns: u64,
}

#[derive(Default)]
struct StatsInner {
    total_transfers: u64,
    total_bytes: u64,
    total_errors: u64,
    latency_sum_ns: u128,
    avg_latency_ns: u64,
    min_latency_ns: Option<u64>,
    max_latency_ns: u64,
}

/// Running counters and latency aggregates for one device.
///
/// All operations take `&self`; updates and snapshots are serialized by an
/// internal lock so a snapshot always reflects a whole number of updates.
#[derive(Default)]
pub struct StatsTracker {
    inner: Mutex<StatsInner>,
}

impl StatsTracker {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful transfer of `size` bytes that took `latency_ns`.
    ///
    /// The average is the cumulative mean over all samples since the last
    /// reset, i.e. `(old_avg * (n - 1) + sample) / n`, kept exact through a
    /// running sum. Returns the completed transfer count including this one.
    pub fn record_success(&self, size: u64, latency_ns: u64) -> u64 {
        let mut s = self.inner.lock();
        s.total_transfers += 1;
        s.total_bytes += size;
        s.latency_sum_ns += u128::from(latency_ns);
        s.avg_latency_ns = (s.latency_sum_ns / u128::from(s.total_transfers)) as u64;
        s.min_latency_ns = Some(match s.min_latency_ns {
            Some(min) => min.min(latency_ns),
            None => latency_ns,
        });
        s.max_latency_ns = s.max_latency_ns.max(latency_ns);
        s.total_transfers
    }

    /// Records a failed transfer and returns the completed transfer count.
    pub fn record_failure(&self) -> u64 {
        let mut s = self.inner.lock();
        s.total_errors += 1;
        s.total_transfers
    }

    /// Returns a consistent copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        let s = self.inner.lock();
        StatsSnapshot {
            total_transfers: s.total_transfers,
            total_bytes: s.total_bytes,
            total_errors: s.total_errors,
            avg_latency_ns: s.avg_latency_ns,
            min_latency_ns: s.min_latency_ns.unwrap_or(0),
            max_latency_ns: s.max_latency_ns,
        }
    }

    /// Zeroes every counter and forgets the minimum latency.
    pub fn reset(&self) {
        *self.inner.lock() = StatsInner::default();
    }

    /// Number of successful transfers since the last reset.
    pub fn total_transfers(&self) -> u64 {
        self.inner.lock().total_transfers
    }

    /// Current average latency in nanoseconds.
    pub fn avg_latency_ns(&self) -> u64 {
        self.inner.lock().avg_latency_ns
    }
}

impl StatsSnapshot {
    /// Fraction of attempted transfers that failed, in `[0, 1]`.
    pub fn error_rate(&self) -> f64 {
        let attempts = self.total_transfers + self.total_errors;
        if attempts == 0 {
            0.0
        } else {
            self.total_errors as f64 / attempts as f64
        }
    }

    /// Throughput implied by the average latency, in megabits per second.
    pub fn latency_throughput_mbps(&self) -> f64 {
        if self.total_transfers == 0 || self.avg_latency_ns == 0 {
            return 0.0;
        }
        (self.total_bytes as f64 * 8.0 * 1000.0)
            / (self.avg_latency_ns as f64 * self.total_transfers as f64)
    }

    /// Prints a formatted statistics report for `device_id`.
    pub fn print(&self, device_id: u32) {
        println!("\n==========================================================");
        println!("PCIE SIMULATOR DEVICE {device_id} STATISTICS");
        println!("==========================================================");
        println!("transfers.total          {}", self.total_transfers);
        println!(
            "transfers.bytes          {} ({:.2} KiB)",
            self.total_bytes,
            self.total_bytes as f64 / 1024.0
        );
        println!("transfers.errors         {}", self.total_errors);
        println!("transfers.error_rate     {:.2}%", self.error_rate() * 100.0);
        println!("----------------------------------------------------------");
        println!("LATENCY");
        let us = |ns: u64| ns as f64 / 1000.0;
        println!(
            "  latency.avg            {} ns ({:.2} us)",
            self.avg_latency_ns,
            us(self.avg_latency_ns)
        );
        println!(
            "  latency.min            {} ns ({:.2} us)",
            self.min_latency_ns,
            us(self.min_latency_ns)
        );
        println!(
            "  latency.max            {} ns ({:.2} us)",
            self.max_latency_ns,
            us(self.max_latency_ns)
        );
        println!(
            "  throughput.latency     {:.2} Mbps",
            self.latency_throughput_mbps()
        );
        println!("==========================================================");
    }
}

/// Metrics derived from a snapshot and the wall time of the run that produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub transfers: u64,
    pub bytes: u64,
    pub errors: u64,
    pub throughput_mbps: f64,
    pub latency_avg_us: f64,
    pub latency_min_us: f64,
    pub latency_max_us: f64,
    pub error_rate: f64,
}

impl PerformanceMetrics {
    /// Builds metrics from `snapshot`, measuring throughput over `elapsed`.
    ///
    /// With a zero `elapsed`, throughput falls back to the latency-implied
    /// figure.
    pub fn from_snapshot(snapshot: &StatsSnapshot, elapsed: Duration) -> Self {
        let seconds = elapsed.as_secs_f64();
        let throughput_mbps = if seconds > 0.0 {
            (snapshot.total_bytes as f64 * 8.0) / (seconds * 1e6)
        } else {
            snapshot.latency_throughput_mbps()
        };

        Self {
            transfers: snapshot.total_transfers,
            bytes: snapshot.total_bytes,
            errors: snapshot.total_errors,
            throughput_mbps,
            latency_avg_us: snapshot.avg_latency_ns as f64 / 1000.0,
            latency_min_us: snapshot.min_latency_ns as f64 / 1000.0,
            latency_max_us: snapshot.max_latency_ns as f64 / 1000.0,
            error_rate: snapshot.error_rate(),
        }
    }

    /// Prints the metrics in the compact benchmark format.
    pub fn print(&self) {
        println!("Transfers: {}", self.transfers);
        println!(
            "Bytes: {} ({:.2} MB)",
            self.bytes,
            self.bytes as f64 / 1024.0 / 1024.0
        );
        println!("Throughput: {:.2} Mbps", self.throughput_mbps);
        println!(
            "Latency - Avg: {:.2} us, Min: {:.2} us, Max: {:.2} us",
            self.latency_avg_us, self.latency_min_us, self.latency_max_us
        );
        println!("Error Rate: {:.2}%", self.error_rate * 100.0);
    }
}
