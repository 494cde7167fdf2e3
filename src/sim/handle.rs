//! Device sessions.

use crate::common::{Direction, Result, SimError};
use crate::engine::fault::ErrorConfig;
use crate::engine::{TransferEngine, TransferRequest};
use crate::soc::{Completion, DeviceContext, WriteEffect};
use crate::stats::StatsSnapshot;
use std::sync::Arc;
use tracing::{debug, info};

/// An open session on one simulated device.
///
/// Any number of handles may be open on the same device at once; they share
/// its statistics, registers and rings.
pub struct DeviceHandle {
    ctx: Arc<DeviceContext>,
    engine: Arc<dyn TransferEngine>,
}

impl DeviceHandle {
    pub(crate) fn new(ctx: Arc<DeviceContext>, engine: Arc<dyn TransferEngine>) -> Self {
        Self { ctx, engine }
    }

    pub fn device_id(&self) -> u32 {
        self.ctx.id()
    }

    /// The device this handle is attached to.
    pub fn context(&self) -> &DeviceContext {
        &self.ctx
    }

    /// Closes the session. Device state outlives the handle.
    pub fn close(self) {
        info!(device = self.ctx.id(), "device closed");
    }

    /// Performs a synchronous transfer of `size` bytes from or into `buffer`.
    ///
    /// Returns the measured latency in nanoseconds.
    ///
    /// # Errors
    ///
    /// * [`SimError::InvalidParameter`] - bad size or buffer; nothing recorded.
    /// * [`SimError::DeviceUnavailable`] - the device is disabled.
    /// * [`SimError::Timeout`], [`SimError::DataFault`],
    ///   [`SimError::ResourceExhausted`] - the transfer failed and was counted.
    pub fn transfer(&self, buffer: &mut [u8], size: usize, direction: Direction) -> Result<u64> {
        self.engine
            .execute(&self.ctx, TransferRequest::new(buffer, size, direction))
            .map(|outcome| outcome.latency_ns)
    }

    /// Like [`transfer`](Self::transfer) but takes the raw direction code
    /// (0 to device, 1 from device).
    pub fn transfer_raw(&self, buffer: &mut [u8], size: usize, direction: u32) -> Result<u64> {
        let direction = Direction::from_code(direction)?;
        self.transfer(buffer, size, direction)
    }

    pub fn get_stats(&self) -> Result<StatsSnapshot> {
        Ok(self.ctx.snapshot())
    }

    pub fn reset_stats(&self) -> Result<()> {
        self.ctx.reset_stats();
        Ok(())
    }

    /// Reads a BAR0 register. Out-of-range offsets read as `0xFFFF_FFFF`.
    pub fn read32(&self, offset: u64) -> u32 {
        self.ctx.read32(offset)
    }

    /// Writes a BAR0 register.
    ///
    /// Writing CONTROL.DMA_START runs the programmed transfer before this
    /// returns; its error, if any, is returned here. The transfer is refused
    /// with [`SimError::InvalidParameter`] while DMA_CONTROL.ENABLE is clear
    /// or descriptors are queued on its ring. Out-of-range writes are ignored.
    ///
    /// [`SimError::InvalidParameter`]: crate::SimError::InvalidParameter
    pub fn write32(&self, offset: u64, value: u32) -> Result<()> {
        match self.ctx.write32(offset, value) {
            WriteEffect::DmaStart => {
                let outcome = self.engine.execute_programmed(&self.ctx)?;
                debug!(
                    device = self.ctx.id(),
                    latency_ns = outcome.latency_ns,
                    "register-triggered DMA finished"
                );
                Ok(())
            }
            WriteEffect::None | WriteEffect::Rejected | WriteEffect::FaultInjection(_) => Ok(()),
        }
    }

    /// Queues a descriptor for asynchronous processing.
    pub fn submit_descriptor(
        &self,
        direction: Direction,
        buffer_addr: u64,
        length: u32,
        flags: u32,
    ) -> Result<()> {
        self.ctx.submit_descriptor(direction, buffer_addr, length, flags)
    }

    /// Retires the oldest queued descriptor; `Ok(None)` if none is queued.
    pub fn complete_descriptor(
        &self,
        direction: Direction,
        status: u32,
    ) -> Result<Option<Completion>> {
        self.ctx.complete_descriptor(direction, status)
    }

    pub fn set_error_config(&self, config: ErrorConfig) -> Result<()> {
        if config.probability_bp > crate::common::constants::PROBABILITY_SCALE {
            return Err(SimError::InvalidParameter(format!(
                "error probability {} out of range",
                config.probability_bp
            )));
        }
        self.ctx.set_error_config(config);
        Ok(())
    }

    pub fn error_config(&self) -> ErrorConfig {
        self.ctx.error_config()
    }
}
