//! Transfer Direction.
//!
//! This module defines the direction of a simulated DMA transfer. The
//! direction selects which descriptor ring a transfer uses, what the data
//! movement step does with the caller's buffer, and which value the
//! DMA_CONTROL register's direction bit carries.

use super::error::{Result, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a DMA transfer, seen from the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Host memory to device (TX ring).
    ///
    /// The device consumes the caller's buffer.
    #[default]
    ToDevice,

    /// Device to host memory (RX ring).
    ///
    /// The device fills the caller's buffer.
    FromDevice,
}

impl Direction {
    /// Raw wire code used by the register interface (0 = to device, 1 = from device).
    pub fn code(self) -> u32 {
        match self {
            Direction::ToDevice => 0,
            Direction::FromDevice => 1,
        }
    }

    /// Decodes a raw direction code.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidParameter`] for any code other than 0 or 1.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Direction::ToDevice),
            1 => Ok(Direction::FromDevice),
            other => Err(SimError::InvalidParameter(format!(
                "invalid transfer direction: {other}"
            ))),
        }
    }

    /// Short name used in logs and CLI arguments.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::ToDevice => "to-device",
            Direction::FromDevice => "from-device",
        }
    }
}

impl TryFrom<u32> for Direction {
    type Error = SimError;

    fn try_from(code: u32) -> Result<Self> {
        Direction::from_code(code)
    }
}

impl FromStr for Direction {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "to-device" | "to" | "write" | "tx" => Ok(Direction::ToDevice),
            "from-device" | "from" | "read" | "rx" => Ok(Direction::FromDevice),
            other => Err(SimError::InvalidParameter(format!(
                "unknown direction '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
