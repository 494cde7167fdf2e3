//! Simulated PCIe Device.
//!
//! This module defines `DeviceContext`, which owns all state of one simulated
//! device: statistics, the BAR0 register block, the TX / RX descriptor rings,
//! fault injection and the latency model. It handles construction from the
//! configuration and the bookkeeping shared by every transfer path.

use super::registers::RegisterFile;
use super::regs::irq;
use super::ring::{Completion, RingBuffer};
use super::traits::{MmioDevice, WriteEffect};
use crate::common::{Direction, Result, SimError};
use crate::config::Config;
use crate::engine::fault::{ErrorConfig, FaultInjector, InjectedFault};
use crate::engine::rng::Pcg32;
use crate::engine::timing::{build_latency_model, LatencyModel};
use crate::stats::{StatsSnapshot, StatsTracker};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Size bounds and fill byte applied to every transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferLimits {
    pub min_size: usize,
    pub max_size: usize,
    pub fill_pattern: u8,
}

impl TransferLimits {
    /// Checks `size` against the bounds.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidParameter`] when `size` is out of range.
    pub fn check(&self, size: usize) -> Result<()> {
        if size < self.min_size || size > self.max_size {
            return Err(SimError::InvalidParameter(format!(
                "transfer size {size} outside [{}, {}]",
                self.min_size, self.max_size
            )));
        }
        Ok(())
    }
}

/// State of one simulated PCIe device.
///
/// Every lock here is short-held except `transfer_lock`, which serializes
/// whole transfers including their simulated delay.
pub struct DeviceContext {
    id: u32,
    stats: Arc<StatsTracker>,
    registers: Mutex<RegisterFile>,
    tx_ring: RingBuffer,
    rx_ring: RingBuffer,
    faults: Mutex<FaultInjector>,
    latency: Mutex<Box<dyn LatencyModel>>,
    transfer_lock: Mutex<()>,
    limits: TransferLimits,
}

impl DeviceContext {
    /// Creates device `id` from the configuration.
    ///
    /// When `config.latency.seed` is set the device draws jitter and fault
    /// rolls from streams derived from the seed and `id`, so runs replay.
    pub fn new(id: u32, config: &Config) -> Self {
        let stats = Arc::new(StatsTracker::new());
        let stream = u64::from(id) * 2;
        let (latency_rng, fault_rng) = match config.latency.seed {
            Some(seed) => (
                Pcg32::with_stream(seed, stream),
                Pcg32::with_stream(seed, stream + 1),
            ),
            None => (Pcg32::from_entropy(stream), Pcg32::from_entropy(stream + 1)),
        };

        let registers = RegisterFile::new(
            config.device.bar_size,
            config.device.device_id_value,
            Arc::clone(&stats),
        );
        let model = build_latency_model(&config.latency, latency_rng);
        let fault_config = config.fault.to_error_config();

        info!(
            device = id,
            bar_size = config.device.bar_size,
            ring_size = config.device.ring_size,
            latency_model = model.name(),
            scenario = %fault_config.scenario,
            "device initialized"
        );

        Self {
            id,
            stats,
            registers: Mutex::new(registers),
            tx_ring: RingBuffer::new("tx", config.device.ring_size),
            rx_ring: RingBuffer::new("rx", config.device.ring_size),
            faults: Mutex::new(FaultInjector::new(fault_config, fault_rng)),
            latency: Mutex::new(model),
            transfer_lock: Mutex::new(()),
            limits: TransferLimits {
                min_size: config.transfer.min_size,
                max_size: config.transfer.max_size,
                fill_pattern: config.transfer.fill_pattern,
            },
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn limits(&self) -> TransferLimits {
        self.limits
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
        debug!(device = self.id, "statistics reset");
    }

    /// `true` while CONTROL.DEVICE_ENABLE is set.
    pub fn is_enabled(&self) -> bool {
        self.registers.lock().is_enabled()
    }

    /// Locks the register block.
    pub fn registers(&self) -> MutexGuard<'_, RegisterFile> {
        self.registers.lock()
    }

    /// Descriptor ring serving `direction` (TX for to-device).
    pub fn ring(&self, direction: Direction) -> &RingBuffer {
        match direction {
            Direction::ToDevice => &self.tx_ring,
            Direction::FromDevice => &self.rx_ring,
        }
    }

    /// Serializes whole transfers and descriptor ring updates on this device.
    ///
    /// Not reentrant: callers holding the guard use the rings directly.
    pub fn lock_transfers(&self) -> MutexGuard<'_, ()> {
        self.transfer_lock.lock()
    }

    pub fn read32(&self, offset: u64) -> u32 {
        self.registers.lock().read32(offset)
    }

    /// Writes a register and applies effects that need device state.
    ///
    /// [`WriteEffect::DmaStart`] is returned to the caller, which owns the
    /// transfer engine.
    pub fn write32(&self, offset: u64, value: u32) -> WriteEffect {
        let effect = self.registers.lock().write32(offset, value);
        if let WriteEffect::FaultInjection(rate) = effect {
            self.faults.lock().set_register_rate(rate);
        }
        effect
    }

    pub fn error_config(&self) -> ErrorConfig {
        self.faults.lock().config()
    }

    pub fn set_error_config(&self, config: ErrorConfig) {
        info!(
            device = self.id,
            scenario = %config.scenario,
            probability_bp = config.probability_bp,
            recovery_ms = config.recovery_ms,
            "error injection configured"
        );
        self.faults.lock().set_config(config);
    }

    /// Decides whether the current transfer is hit by an injected fault.
    pub fn roll_fault(&self) -> Option<InjectedFault> {
        self.faults.lock().roll()
    }

    /// Simulated delay for a transfer from the device's latency model.
    pub fn transfer_delay(&self, size: usize, direction: Direction) -> Duration {
        self.latency.lock().transfer_delay(size, direction)
    }

    /// Marks a DMA transfer as in flight.
    pub fn begin_dma(&self) {
        self.registers.lock().begin_dma();
    }

    /// Commits a successful transfer to statistics and registers.
    pub fn commit_success(&self, size: u64, latency_ns: u64) {
        let count = self.stats.record_success(size, latency_ns);
        self.registers
            .lock()
            .update_after_transfer(true, latency_ns, count);
    }

    /// Commits a failed transfer to statistics and registers.
    pub fn commit_failure(&self) {
        let count = self.stats.record_failure();
        self.registers.lock().update_after_transfer(false, 0, count);
    }

    /// Queues a descriptor on the ring for `direction`.
    ///
    /// # Errors
    ///
    /// * [`SimError::InvalidParameter`] - `length` outside the transfer bounds.
    /// * [`SimError::DeviceUnavailable`] - the device is disabled.
    /// * [`SimError::ResourceExhausted`] - the ring is full. The failure is
    ///   counted and BUFFER_OVERRUN is raised.
    pub fn submit_descriptor(
        &self,
        direction: Direction,
        buffer_addr: u64,
        length: u32,
        flags: u32,
    ) -> Result<()> {
        self.limits.check(length as usize)?;
        if !self.is_enabled() {
            return Err(SimError::DeviceUnavailable(self.id));
        }

        let _serial = self.lock_transfers();
        let ring = self.ring(direction);
        if let Err(err) = ring.submit(buffer_addr, length, flags) {
            warn!(device = self.id, ring = ring.name(), "submit rejected: {err}");
            self.stats.record_failure();
            self.registers.lock().raise_interrupt(irq::BUFFER_OVERRUN);
            return Err(err.into());
        }
        Ok(())
    }

    /// Retires the oldest descriptor on the ring for `direction`.
    ///
    /// A zero `status` counts as a successful transfer of the descriptor's
    /// length with its queueing latency; anything else counts as a failure.
    /// Returns `Ok(None)` when the ring is empty, leaving statistics alone.
    pub fn complete_descriptor(
        &self,
        direction: Direction,
        status: u32,
    ) -> Result<Option<Completion>> {
        let _serial = self.lock_transfers();
        let completion = match self.ring(direction).complete(status) {
            Ok(c) => c,
            Err(_) => return Ok(None),
        };

        if status == 0 {
            self.commit_success(u64::from(completion.length), completion.latency_ns);
        } else {
            self.commit_failure();
        }
        Ok(Some(completion))
    }
}
