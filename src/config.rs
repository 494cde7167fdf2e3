//! Simulator configuration.
//!
//! Configuration is loaded from a TOML file. Every field has a default, so a
//! partial file (or none at all) yields a usable device model.

use crate::common::constants::*;
use crate::common::{Direction, Result, SimError};
use crate::engine::fault::{ErrorConfig, ErrorScenario};
use crate::sim::workload::Pattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_BASE_NS: u64 = 10_000;
const DEFAULT_PER_KIB_NS: u64 = 1_000;
const DEFAULT_JITTER_NS: u64 = 20_000;
const DEFAULT_PER_MIB_NS: u64 = 10_000;
const DEFAULT_READ_PENALTY_PCT: u64 = 20;
const LARGEST_CONFIGURABLE_TRANSFER: usize = 16 * 1024 * 1024;
const MIN_BAR_SIZE: usize = 0x48;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub fault: FaultInjectionConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl Config {
    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| SimError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let d = &self.device;
        if d.count == 0 || d.count > MAX_DEVICE_COUNT {
            return Err(SimError::Config(format!(
                "device.count must be in 1..={MAX_DEVICE_COUNT}, got {}",
                d.count
            )));
        }
        if d.ring_size == 0 {
            return Err(SimError::Config("device.ring_size must be non-zero".into()));
        }
        if d.bar_size < MIN_BAR_SIZE || d.bar_size % 4 != 0 {
            return Err(SimError::Config(format!(
                "device.bar_size must be a multiple of 4 and at least {MIN_BAR_SIZE:#x}, got {:#x}",
                d.bar_size
            )));
        }

        let t = &self.transfer;
        if t.min_size == 0 || t.min_size > t.max_size {
            return Err(SimError::Config(format!(
                "transfer size range [{}, {}] is empty or starts at zero",
                t.min_size, t.max_size
            )));
        }
        if t.max_size > LARGEST_CONFIGURABLE_TRANSFER {
            return Err(SimError::Config(format!(
                "transfer.max_size {} exceeds {LARGEST_CONFIGURABLE_TRANSFER}",
                t.max_size
            )));
        }

        if let Some(p) = self.fault.probability_bp {
            if p > PROBABILITY_SCALE {
                return Err(SimError::Config(format!(
                    "fault.probability_bp must be at most {PROBABILITY_SCALE}, got {p}"
                )));
            }
        }

        let w = &self.workload;
        if w.threads == 0 || w.threads > MAX_WORKLOAD_THREADS {
            return Err(SimError::Config(format!(
                "workload.threads must be in 1..={MAX_WORKLOAD_THREADS}, got {}",
                w.threads
            )));
        }
        if w.pattern == Pattern::Custom {
            if !(64..=4 * 1024 * 1024).contains(&w.custom_size) {
                return Err(SimError::Config(format!(
                    "workload.custom_size must be in 64..=4194304, got {}",
                    w.custom_size
                )));
            }
            if !(1..=10_000).contains(&w.custom_rate_hz) {
                return Err(SimError::Config(format!(
                    "workload.custom_rate_hz must be in 1..=10000, got {}",
                    w.custom_rate_hz
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_count")]
    pub count: u32,

    #[serde(default = "default_ring_size")]
    pub ring_size: usize,

    #[serde(default = "default_bar_size")]
    pub bar_size: usize,

    #[serde(default = "default_device_id_value")]
    pub device_id_value: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            count: default_device_count(),
            ring_size: default_ring_size(),
            bar_size: default_bar_size(),
            device_id_value: default_device_id_value(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_min_size")]
    pub min_size: usize,

    #[serde(default = "default_max_size")]
    pub max_size: usize,

    #[serde(default = "default_fill_pattern")]
    pub fill_pattern: u8,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_size: default_min_size(),
            max_size: default_max_size(),
            fill_pattern: default_fill_pattern(),
        }
    }
}

/// Which latency model a device uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LatencyModelKind {
    /// Base delay plus a per-KiB term plus uniform jitter.
    #[default]
    Linear,
    /// Fixed cost per started MiB, with a read penalty.
    Bandwidth,
    /// No delay at all.
    Instant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    #[serde(default)]
    pub model: LatencyModelKind,

    #[serde(default = "default_base_ns")]
    pub base_ns: u64,

    #[serde(default = "default_per_kib_ns")]
    pub per_kib_ns: u64,

    #[serde(default = "default_jitter_ns")]
    pub jitter_ns: u64,

    #[serde(default = "default_per_mib_ns")]
    pub per_mib_ns: u64,

    #[serde(default = "default_read_penalty_pct")]
    pub read_penalty_pct: u64,

    /// Seed for jitter and fault rolls; derived from the clock when absent.
    pub seed: Option<u64>,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            model: LatencyModelKind::default(),
            base_ns: default_base_ns(),
            per_kib_ns: default_per_kib_ns(),
            jitter_ns: default_jitter_ns(),
            per_mib_ns: default_per_mib_ns(),
            read_penalty_pct: default_read_penalty_pct(),
            seed: None,
        }
    }
}

/// Error injection settings applied to every device at creation.
///
/// `probability_bp` and `recovery_ms` override the scenario's defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FaultInjectionConfig {
    #[serde(default)]
    pub scenario: ErrorScenario,

    pub probability_bp: Option<u32>,

    pub recovery_ms: Option<u64>,
}

impl FaultInjectionConfig {
    /// Resolves the effective error configuration.
    pub fn to_error_config(&self) -> ErrorConfig {
        let mut cfg = ErrorConfig::for_scenario(self.scenario);
        if let Some(p) = self.probability_bp {
            cfg.probability_bp = p;
        }
        if let Some(ms) = self.recovery_ms {
            cfg.recovery_ms = ms;
        }
        cfg
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    #[serde(default)]
    pub pattern: Pattern,

    #[serde(default = "default_threads")]
    pub threads: u32,

    #[serde(default = "default_transfers")]
    pub transfers: u64,

    #[serde(default)]
    pub direction: Direction,

    #[serde(default = "default_custom_size")]
    pub custom_size: usize,

    #[serde(default = "default_custom_rate")]
    pub custom_rate_hz: u32,

    /// Pace transfers at the pattern's rate instead of issuing back to back.
    #[serde(default)]
    pub paced: bool,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            pattern: Pattern::default(),
            threads: default_threads(),
            transfers: default_transfers(),
            direction: Direction::default(),
            custom_size: default_custom_size(),
            custom_rate_hz: default_custom_rate(),
            paced: false,
        }
    }
}

fn default_device_count() -> u32 {
    DEFAULT_DEVICE_COUNT
}

fn default_ring_size() -> usize {
    DEFAULT_RING_SIZE
}

fn default_bar_size() -> usize {
    DEFAULT_BAR_SIZE
}

fn default_device_id_value() -> u32 {
    DEVICE_ID_VALUE
}

fn default_min_size() -> usize {
    MIN_TRANSFER_SIZE
}

fn default_max_size() -> usize {
    MAX_TRANSFER_SIZE
}

fn default_fill_pattern() -> u8 {
    FILL_PATTERN
}

fn default_base_ns() -> u64 {
    DEFAULT_BASE_NS
}

fn default_per_kib_ns() -> u64 {
    DEFAULT_PER_KIB_NS
}

fn default_jitter_ns() -> u64 {
    DEFAULT_JITTER_NS
}

fn default_per_mib_ns() -> u64 {
    DEFAULT_PER_MIB_NS
}

fn default_read_penalty_pct() -> u64 {
    DEFAULT_READ_PENALTY_PCT
}

fn default_threads() -> u32 {
    1
}

fn default_transfers() -> u64 {
    100
}

fn default_custom_size() -> usize {
    4096
}

fn default_custom_rate() -> u32 {
    1000
}
