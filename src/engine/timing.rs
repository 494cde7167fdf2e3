//! Transfer Timing Models.
//!
//! This module defines the `LatencyModel` trait and implementations for
//! computing the simulated duration of a DMA transfer. It supports a linear
//! model (fixed setup cost, per-KiB cost and random jitter), a bandwidth
//! model charged per started MiB with slower reads, and an instant model for
//! purely functional simulation.

use super::rng::Pcg32;
use crate::common::Direction;
use crate::config::{LatencyConfig, LatencyModelKind};
use std::time::Duration;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// Trait for transfer latency models.
pub trait LatencyModel: Send {
    /// Calculates the simulated delay for a transfer.
    ///
    /// # Arguments
    ///
    /// * `size` - Transfer size in bytes.
    /// * `direction` - Direction of the transfer.
    ///
    /// # Returns
    ///
    /// The delay the engine blocks for before reporting completion.
    fn transfer_delay(&mut self, size: usize, direction: Direction) -> Duration;

    /// Short model name for reports.
    fn name(&self) -> &'static str;
}

/// Base latency plus a size-dependent term plus uniform jitter.
///
/// With the defaults: 10 µs + 1 µs per KiB + [0, 20) µs.
pub struct LinearLatency {
    base_ns: u64,
    per_kib_ns: u64,
    jitter_ns: u64,
    rng: Pcg32,
}

impl LinearLatency {
    /// Creates a new LinearLatency model.
    ///
    /// # Arguments
    ///
    /// * `base_ns` - Fixed setup cost per transfer.
    /// * `per_kib_ns` - Cost of each whole KiB transferred.
    /// * `jitter_ns` - Exclusive upper bound of the random perturbation.
    /// * `rng` - Generator for the jitter.
    pub fn new(base_ns: u64, per_kib_ns: u64, jitter_ns: u64, rng: Pcg32) -> Self {
        Self {
            base_ns,
            per_kib_ns,
            jitter_ns,
            rng,
        }
    }
}

impl LatencyModel for LinearLatency {
    fn transfer_delay(&mut self, size: usize, _direction: Direction) -> Duration {
        let size_ns = (size as u64 / KIB).saturating_mul(self.per_kib_ns);
        let jitter = self.rng.below_u64(self.jitter_ns);
        Duration::from_nanos(self.base_ns.saturating_add(size_ns).saturating_add(jitter))
    }

    fn name(&self) -> &'static str {
        "linear"
    }
}

/// Fixed cost per started MiB, reads slower by a percentage.
///
/// Delays below one microsecond are not worth sleeping for and are reported
/// as zero.
pub struct BandwidthLatency {
    per_mib_ns: u64,
    read_penalty_pct: u64,
}

impl BandwidthLatency {
    pub fn new(per_mib_ns: u64, read_penalty_pct: u64) -> Self {
        Self {
            per_mib_ns,
            read_penalty_pct,
        }
    }
}

impl LatencyModel for BandwidthLatency {
    fn transfer_delay(&mut self, size: usize, direction: Direction) -> Duration {
        let mibs = (size as u64).div_ceil(MIB).max(1);
        let mut ns = self.per_mib_ns.saturating_mul(mibs);
        if direction == Direction::FromDevice {
            ns = ns.saturating_mul(100 + self.read_penalty_pct) / 100;
        }
        if ns < 1_000 {
            return Duration::ZERO;
        }
        Duration::from_nanos(ns)
    }

    fn name(&self) -> &'static str {
        "bandwidth"
    }
}

/// Zero-latency model.
pub struct InstantLatency;

impl LatencyModel for InstantLatency {
    fn transfer_delay(&mut self, _size: usize, _direction: Direction) -> Duration {
        Duration::ZERO
    }

    fn name(&self) -> &'static str {
        "instant"
    }
}

/// Builds the latency model selected by `config`.
pub fn build_latency_model(config: &LatencyConfig, rng: Pcg32) -> Box<dyn LatencyModel> {
    match config.model {
        LatencyModelKind::Linear => Box::new(LinearLatency::new(
            config.base_ns,
            config.per_kib_ns,
            config.jitter_ns,
            rng,
        )),
        LatencyModelKind::Bandwidth => Box::new(BandwidthLatency::new(
            config.per_mib_ns,
            config.read_penalty_pct,
        )),
        LatencyModelKind::Instant => Box::new(InstantLatency),
    }
}
