//! Simulated DMA Engine.
//!
//! Every transfer follows the same pipeline:
//!
//! 1. **Validate:** size bounds, buffer length and the device enable bit.
//!    Nothing is recorded for requests rejected here.
//! 2. **Start:** take the device's transfer lock, stamp the start time and
//!    mark DMA busy.
//! 3. **Inject:** roll for a fault; a hit waits out the recovery time and
//!    fails the transfer.
//! 4. **Move:** stage host data in a scratch buffer (to-device) or fill the
//!    host buffer with the device pattern (from-device).
//! 5. **Delay:** sleep for the latency model's delay.
//! 6. **Commit:** record the measured latency and update the registers.

use super::{TransferEngine, TransferOutcome, TransferRequest};
use crate::common::{Direction, Result, SimError};
use crate::soc::regs::irq;
use crate::soc::DeviceContext;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Descriptor status written for a successful ring transfer.
pub const DESC_STATUS_OK: u32 = 0;
/// Descriptor status written for a failed ring transfer.
pub const DESC_STATUS_ERROR: u32 = 1;

/// The in-process transfer engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct SimulatedDma;

impl SimulatedDma {
    pub fn new() -> Self {
        Self
    }
}

fn simulate_delay(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

fn elapsed_ns(start: Instant) -> u64 {
    start.elapsed().as_nanos() as u64
}

fn scratch_buffer(len: usize) -> Result<Vec<u8>> {
    let mut scratch = Vec::new();
    scratch.try_reserve_exact(len).map_err(|_| {
        SimError::ResourceExhausted(format!("cannot allocate {len} byte DMA buffer"))
    })?;
    Ok(scratch)
}

/// Stages `data` in an internal buffer the way the device would receive it.
fn stage_to_device(data: &[u8]) -> Result<Vec<u8>> {
    let mut scratch = scratch_buffer(data.len())?;
    scratch.extend_from_slice(data);
    Ok(scratch)
}

/// Fills `out` with device data.
fn fill_from_device(out: &mut [u8], pattern: u8) -> Result<()> {
    let mut scratch = scratch_buffer(out.len())?;
    scratch.resize(out.len(), pattern);
    out.copy_from_slice(&scratch);
    Ok(())
}

impl TransferEngine for SimulatedDma {
    fn execute(&self, ctx: &DeviceContext, request: TransferRequest<'_>) -> Result<TransferOutcome> {
        let TransferRequest {
            buffer,
            size,
            direction,
        } = request;
        let limits = ctx.limits();
        limits.check(size)?;
        if buffer.is_empty() || buffer.len() < size {
            return Err(SimError::InvalidParameter(format!(
                "buffer of {} bytes cannot hold a {size} byte transfer",
                buffer.len()
            )));
        }
        if !ctx.is_enabled() {
            return Err(SimError::DeviceUnavailable(ctx.id()));
        }

        let _serial = ctx.lock_transfers();
        let start = Instant::now();
        ctx.begin_dma();

        if let Some(fault) = ctx.roll_fault() {
            warn!(
                device = ctx.id(),
                size,
                %direction,
                recovery_ms = fault.recovery.as_millis() as u64,
                "injected fault: {}",
                fault.error
            );
            simulate_delay(fault.recovery);
            ctx.commit_failure();
            return Err(fault.error);
        }

        let data = &mut buffer[..size];
        let moved = match direction {
            Direction::ToDevice => stage_to_device(data).map(drop),
            Direction::FromDevice => fill_from_device(data, limits.fill_pattern),
        };
        if let Err(err) = moved {
            ctx.commit_failure();
            return Err(err);
        }

        let delay = ctx.transfer_delay(size, direction);
        simulate_delay(delay);

        let latency_ns = elapsed_ns(start);
        ctx.commit_success(size as u64, latency_ns);
        debug!(
            device = ctx.id(),
            size,
            %direction,
            latency_ns,
            modeled_ns = delay.as_nanos() as u64,
            "transfer complete"
        );

        Ok(TransferOutcome {
            latency_ns,
            modeled_delay: delay,
            size,
            direction,
        })
    }

    fn execute_programmed(&self, ctx: &DeviceContext) -> Result<TransferOutcome> {
        let program = ctx.registers().dma_program();
        let size = program.size as usize;
        if !program.enable {
            return Err(SimError::InvalidParameter(
                "DMA_CONTROL.ENABLE is clear".into(),
            ));
        }
        ctx.limits().check(size)?;
        if !ctx.is_enabled() {
            return Err(SimError::DeviceUnavailable(ctx.id()));
        }

        // Descriptor submit / complete take the same lock, so the ring cannot
        // change under us until this transfer retires its own slot.
        let _serial = ctx.lock_transfers();
        let ring = ctx.ring(program.direction);
        if !ring.is_empty() {
            return Err(SimError::InvalidParameter(format!(
                "{} ring has {} queued descriptors",
                ring.name(),
                ring.len()
            )));
        }

        let start = Instant::now();
        ctx.begin_dma();

        let slot = match ring.submit(program.addr, program.size, program.control) {
            Ok(slot) => slot,
            Err(err) => {
                ctx.registers().raise_interrupt(irq::BUFFER_OVERRUN);
                ctx.commit_failure();
                return Err(err.into());
            }
        };

        if let Some(fault) = ctx.roll_fault() {
            warn!(
                device = ctx.id(),
                addr = format_args!("{:#x}", program.addr),
                size,
                "injected fault on programmed DMA: {}",
                fault.error
            );
            simulate_delay(fault.recovery);
            // Retire the descriptor as failed.
            let _ = ring.complete(DESC_STATUS_ERROR);
            ctx.commit_failure();
            return Err(fault.error);
        }

        let delay = ctx.transfer_delay(size, program.direction);
        simulate_delay(delay);

        match ring.complete(DESC_STATUS_OK) {
            Ok(done) => debug_assert_eq!(done.index, slot),
            Err(err) => {
                ctx.commit_failure();
                return Err(err.into());
            }
        }

        let latency_ns = elapsed_ns(start);
        ctx.commit_success(size as u64, latency_ns);
        debug!(
            device = ctx.id(),
            addr = format_args!("{:#x}", program.addr),
            size,
            direction = %program.direction,
            latency_ns,
            "programmed DMA complete"
        );

        Ok(TransferOutcome {
            latency_ns,
            modeled_delay: delay,
            size,
            direction: program.direction,
        })
    }
}
