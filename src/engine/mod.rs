//! Transfer engine.
//!
//! Executes simulated DMA transfers against a device context: validation,
//! fault injection, data movement, timing and committing the outcome.

/// In-process DMA engine.
pub mod dma;

/// Error scenarios and fault rolls.
pub mod fault;

/// Seedable random number generator.
pub mod rng;

/// Latency models.
pub mod timing;

pub use dma::SimulatedDma;

use crate::common::{Direction, Result};
use crate::soc::DeviceContext;
use std::time::Duration;

/// A synchronous transfer against a caller-owned buffer.
#[derive(Debug)]
pub struct TransferRequest<'a> {
    pub buffer: &'a mut [u8],
    pub size: usize,
    pub direction: Direction,
}

impl<'a> TransferRequest<'a> {
    pub fn new(buffer: &'a mut [u8], size: usize, direction: Direction) -> Self {
        Self {
            buffer,
            size,
            direction,
        }
    }
}

/// Result of a completed transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Measured wall-clock latency of the whole operation.
    pub latency_ns: u64,
    /// Delay the latency model charged.
    pub modeled_delay: Duration,
    pub size: usize,
    pub direction: Direction,
}

/// Trait for transfer engines.
pub trait TransferEngine: Send + Sync {
    /// Runs one synchronous transfer on `ctx`.
    ///
    /// # Errors
    ///
    /// Validation errors leave statistics untouched; errors after the
    /// transfer started are counted as failures before returning.
    fn execute(&self, ctx: &DeviceContext, request: TransferRequest<'_>) -> Result<TransferOutcome>;

    /// Runs the transfer programmed in the DMA_* registers through the
    /// descriptor ring. The ring must be idle; the descriptor retired is
    /// always the one this call submitted.
    fn execute_programmed(&self, ctx: &DeviceContext) -> Result<TransferOutcome>;
}
