//! Simulator-wide constants.
//!
//! Defaults for the device model. Every value here can be overridden through
//! the configuration file except the register layout, which lives in
//! [`crate::soc::regs`].

/// Number of simulated devices a registry exposes by default.
pub const DEFAULT_DEVICE_COUNT: u32 = 1;

/// Upper bound for the configurable device count.
pub const MAX_DEVICE_COUNT: u32 = 8;

/// Descriptors per DMA ring.
pub const DEFAULT_RING_SIZE: usize = 256;

/// Size of the BAR0 register block in bytes.
pub const DEFAULT_BAR_SIZE: usize = 0x1000;

/// Value reported by the DEVICE_ID register.
pub const DEVICE_ID_VALUE: u32 = 0x1234_ABCD;

/// Smallest accepted transfer in bytes.
pub const MIN_TRANSFER_SIZE: usize = 1;

/// Largest accepted transfer in bytes (1 MiB).
pub const MAX_TRANSFER_SIZE: usize = 1024 * 1024;

/// Byte pattern the device "returns" for device-to-host transfers.
pub const FILL_PATTERN: u8 = 0xAA;

/// Value returned for rejected register reads.
pub const MMIO_INVALID_READ: u32 = 0xFFFF_FFFF;

/// Error probabilities are expressed in 0.01 % units; this is 100 %.
pub const PROBABILITY_SCALE: u32 = 10_000;

/// Upper bound for workload worker threads.
pub const MAX_WORKLOAD_THREADS: u32 = 64;
