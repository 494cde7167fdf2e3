//! PCIe DMA Device Simulator Library.
//!
//! This crate models a PCIe device's DMA engine for education and testing:
//! a memory-mapped BAR0 register block, TX / RX descriptor rings, interrupt
//! status, fault injection and per-device transfer statistics, all exposed
//! through a synchronous transfer API.
//!
//! # Architecture
//!
//! * **Device model**: register file, descriptor rings and the per-device
//!   context that owns them.
//! * **Engine**: validation, latency models, fault injection and commit of a
//!   single transfer.
//! * **Front end**: a registry of devices, handles onto them, and workload /
//!   benchmark drivers.
//!
//! # Modules
//!
//! * `common`: Shared types, constants, and error handling.
//! * `config`: Configuration loading and validation.
//! * `engine`: Transfer engine, latency models and fault injection.
//! * `sim`: Device registry, handles, workloads and benchmarks.
//! * `soc`: Register file, descriptor rings and device context.
//! * `stats`: Transfer statistics and derived metrics.

/// Shared types, constants, and error handling.
///
/// Provides the transfer direction, the simulator-wide error type and the
/// default values of the device model.
pub mod common;

/// Configuration for devices, transfers, latency, fault injection and
/// workloads.
///
/// Loads and validates TOML configuration files.
pub mod config;

/// Transfer execution.
///
/// Implements the transfer pipeline, the latency models and error injection.
pub mod engine;

/// Device registry, handles and traffic drivers.
pub mod sim;

/// Simulated device hardware.
///
/// Implements the BAR0 register block, the descriptor rings and the device
/// context that ties them to statistics and the transfer engine.
pub mod soc;

/// Transfer statistics collection and reporting.
///
/// Tracks transfer counts, bytes, errors and latency aggregates per device.
pub mod stats;

pub use common::{Direction, Result, SimError};
pub use config::Config;
pub use sim::{DeviceHandle, DeviceRegistry};
pub use stats::{PerformanceMetrics, StatsSnapshot, StatsTracker};
