//! Common utilities and types used throughout the PCIe simulator.
//!
//! This module provides the transfer direction type, shared constants and
//! the error type that every other component of the simulator returns.

/// Common constants used throughout the simulator.
pub mod constants;

/// Transfer direction definitions.
pub mod data;

/// Error types.
pub mod error;

pub use data::Direction;
pub use error::{Result, SimError};
