//! BAR0 Register File.
//!
//! This module simulates the device's control/status register block. The
//! block is an owned little-endian byte buffer; a few offsets have computed
//! reads (live status flags, performance counters mirrored from the
//! statistics tracker) or side effects on write (DMA triggers, write-1-to-clear
//! interrupt status, fault injection).

use super::regs::{self, control, irq, status};
use super::traits::{MmioDevice, WriteEffect};
use crate::common::constants::MMIO_INVALID_READ;
use crate::common::Direction;
use crate::stats::StatsTracker;
use std::sync::Arc;
use tracing::{debug, warn};

/// DMA parameters programmed through the DMA_* registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaProgram {
    pub addr: u64,
    pub size: u32,
    pub direction: Direction,
    /// Raw DMA_CONTROL value.
    pub control: u32,
    /// DMA_CONTROL.ENABLE; DMA_START is refused while clear.
    pub enable: bool,
}

/// Memory-mapped control registers of one device.
pub struct RegisterFile {
    bar: Box<[u8]>,
    stats: Arc<StatsTracker>,
    dma_active: bool,
    irq_pending: bool,
}

impl RegisterFile {
    /// Creates a register block of `size` bytes with reset values.
    ///
    /// # Arguments
    ///
    /// * `size` - Block size in bytes; must hold every register in [`regs`].
    /// * `device_id` - Value reported by the DEVICE_ID register.
    /// * `stats` - Tracker mirrored by the performance registers.
    pub fn new(size: usize, device_id: u32, stats: Arc<StatsTracker>) -> Self {
        let mut file = Self {
            bar: vec![0u8; size].into_boxed_slice(),
            stats,
            dma_active: false,
            irq_pending: false,
        };
        file.store(regs::DEVICE_ID, device_id);
        file.store(regs::STATUS, status::DEVICE_READY);
        file.store(regs::CONTROL, control::DEVICE_ENABLE);
        file.store(regs::DMA_CONTROL, 0);
        file.store(regs::INTERRUPT_ENABLE, irq::DMA_COMPLETE | irq::DMA_ERROR);
        file
    }

    fn in_bounds(&self, offset: u64) -> bool {
        offset % 4 == 0
            && offset
                .checked_add(4)
                .is_some_and(|end| end <= self.bar.len() as u64)
    }

    /// Raw stored value. Caller guarantees bounds.
    fn load(&self, offset: u64) -> u32 {
        let i = offset as usize;
        u32::from_le_bytes([self.bar[i], self.bar[i + 1], self.bar[i + 2], self.bar[i + 3]])
    }

    /// Raw store. Caller guarantees bounds.
    fn store(&mut self, offset: u64, val: u32) {
        let i = offset as usize;
        self.bar[i..i + 4].copy_from_slice(&val.to_le_bytes());
    }

    /// `true` while CONTROL.DEVICE_ENABLE is set.
    pub fn is_enabled(&self) -> bool {
        self.load(regs::CONTROL) & control::DEVICE_ENABLE != 0
    }

    pub fn dma_active(&self) -> bool {
        self.dma_active
    }

    pub fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    /// Marks a DMA transfer as in flight.
    pub fn begin_dma(&mut self) {
        self.dma_active = true;
    }

    /// Raw value of INTERRUPT_STATUS.
    pub fn interrupt_status(&self) -> u32 {
        self.load(regs::INTERRUPT_STATUS)
    }

    /// Sets interrupt status bits and flags an interrupt as pending.
    pub fn raise_interrupt(&mut self, bits: u32) {
        let current = self.load(regs::INTERRUPT_STATUS);
        self.store(regs::INTERRUPT_STATUS, current | bits);
        self.irq_pending = true;
        debug!(bits = format_args!("{bits:#x}"), "interrupt raised");
    }

    /// Reflects a finished transfer into the status, interrupt and
    /// performance registers.
    ///
    /// # Arguments
    ///
    /// * `success` - Whether the transfer completed.
    /// * `latency_ns` - Measured latency; only recorded on success.
    /// * `transfer_count` - Completed transfers so far.
    pub fn update_after_transfer(&mut self, success: bool, latency_ns: u64, transfer_count: u64) {
        self.dma_active = false;

        let mut st = self.load(regs::STATUS) & !status::DMA_BUSY;
        if !success {
            st |= status::ERROR;
        }
        self.store(regs::STATUS, st);

        if success {
            self.store(regs::PERF_LATENCY, (latency_ns / 1000) as u32);
            self.store(regs::PERF_COUNT, transfer_count as u32);
        }

        self.raise_interrupt(if success {
            irq::DMA_COMPLETE
        } else {
            irq::DMA_ERROR
        });
        debug!(success, latency_ns, "dma registers updated");
    }

    /// Decodes the DMA_* registers.
    pub fn dma_program(&self) -> DmaProgram {
        let lo = u64::from(self.load(regs::DMA_ADDR_LO));
        let hi = u64::from(self.load(regs::DMA_ADDR_HI));
        let ctl = self.load(regs::DMA_CONTROL);
        DmaProgram {
            addr: (hi << 32) | lo,
            size: self.load(regs::DMA_SIZE),
            direction: if ctl & regs::dma_control::DIRECTION != 0 {
                Direction::FromDevice
            } else {
                Direction::ToDevice
            },
            control: ctl,
            enable: ctl & regs::dma_control::ENABLE != 0,
        }
    }
}

impl MmioDevice for RegisterFile {
    fn name(&self) -> &str {
        "BAR0"
    }

    fn size(&self) -> u64 {
        self.bar.len() as u64
    }

    fn read32(&self, offset: u64) -> u32 {
        if !self.in_bounds(offset) {
            warn!(offset = format_args!("{offset:#x}"), "invalid MMIO read");
            return MMIO_INVALID_READ;
        }

        let value = match offset {
            regs::STATUS => {
                let mut v = self.load(offset) & !(status::DMA_BUSY | status::INTERRUPT_PENDING);
                if self.dma_active {
                    v |= status::DMA_BUSY;
                }
                if self.irq_pending {
                    v |= status::INTERRUPT_PENDING;
                }
                v
            }
            regs::PERF_LATENCY => (self.stats.avg_latency_ns() / 1000) as u32,
            regs::PERF_COUNT => self.stats.total_transfers() as u32,
            _ => self.load(offset),
        };

        debug!(
            offset = format_args!("{offset:#05x}"),
            value = format_args!("{value:#010x}"),
            "MMIO read"
        );
        value
    }

    fn write32(&mut self, offset: u64, val: u32) -> WriteEffect {
        if !self.in_bounds(offset) {
            warn!(
                offset = format_args!("{offset:#x}"),
                value = format_args!("{val:#x}"),
                "invalid MMIO write"
            );
            return WriteEffect::Rejected;
        }

        debug!(
            offset = format_args!("{offset:#05x}"),
            value = format_args!("{val:#010x}"),
            "MMIO write"
        );

        match offset {
            regs::CONTROL => {
                let mut stored = val;
                if val & control::DMA_RESET != 0 {
                    debug!("DMA reset triggered via MMIO");
                    self.dma_active = false;
                    stored &= !control::DMA_RESET;
                }
                stored &= !control::DMA_START;
                self.store(offset, stored);
                if val & control::DMA_START != 0 {
                    debug!("DMA start triggered via MMIO");
                    return WriteEffect::DmaStart;
                }
                WriteEffect::None
            }
            regs::INTERRUPT_STATUS => {
                let cleared = self.load(offset) & !val;
                self.store(offset, cleared);
                if cleared == 0 {
                    self.irq_pending = false;
                }
                WriteEffect::None
            }
            regs::ERROR_INJECT => {
                self.store(offset, val);
                let rate = val & regs::ERROR_INJECT_RATE_MASK;
                if rate != 0 {
                    debug!(rate, "error injection enabled");
                    WriteEffect::FaultInjection(Some(rate))
                } else {
                    debug!("error injection disabled");
                    WriteEffect::FaultInjection(None)
                }
            }
            _ => {
                self.store(offset, val);
                WriteEffect::None
            }
        }
    }
}
