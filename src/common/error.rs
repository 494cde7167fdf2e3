//! Error types for the PCIe simulator.

use thiserror::Error;

/// Errors returned by device, register and transfer operations.
///
/// Every variant renders a human-readable message through `Display`, which
/// is what logging and the CLI print.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    /// A request argument is out of range or malformed.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The device id is outside the registry's device range.
    #[error("device {0} not found")]
    DeviceNotFound(u32),

    /// The device exists but is disabled.
    #[error("device {0} unavailable (disabled)")]
    DeviceUnavailable(u32),

    /// Allocation failure or descriptor ring overrun.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The transfer did not complete in time.
    #[error("transfer timed out (recovered after {recovery_ms} ms)")]
    Timeout {
        /// Recovery time spent before the failure was reported.
        recovery_ms: u64,
    },

    /// The transferred data was corrupted.
    #[error("data fault: {0}")]
    DataFault(String),

    /// Configuration could not be loaded or is inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SimError {
    /// Numeric status code used by the C-style device protocol.
    ///
    /// `-1` device, `-2` parameter, `-3` memory, `-4` timeout, `-5` system.
    pub fn code(&self) -> i32 {
        match self {
            SimError::DeviceNotFound(_) | SimError::DeviceUnavailable(_) => -1,
            SimError::InvalidParameter(_) | SimError::Config(_) => -2,
            SimError::ResourceExhausted(_) => -3,
            SimError::Timeout { .. } => -4,
            SimError::DataFault(_) => -5,
        }
    }

    /// Stable short name of the error kind, used as a key in workload reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::InvalidParameter(_) => "invalid-parameter",
            SimError::DeviceNotFound(_) => "device-not-found",
            SimError::DeviceUnavailable(_) => "device-unavailable",
            SimError::ResourceExhausted(_) => "resource-exhausted",
            SimError::Timeout { .. } => "timeout",
            SimError::DataFault(_) => "data-fault",
            SimError::Config(_) => "config",
        }
    }
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
