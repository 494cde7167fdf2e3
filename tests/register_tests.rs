//! BAR0 register file tests.

use pcie_sim::soc::regs::{self, control, irq, status};
use pcie_sim::soc::{MmioDevice, RegisterFile, WriteEffect};
use pcie_sim::stats::StatsTracker;
use std::sync::Arc;

fn new_regs() -> (RegisterFile, Arc<StatsTracker>) {
    let stats = Arc::new(StatsTracker::new());
    (RegisterFile::new(0x1000, 0x1234_ABCD, Arc::clone(&stats)), stats)
}

/// Reset values of the identification and control registers.
#[test]
fn test_register_reset_values() {
    let (bar, _) = new_regs();
    assert_eq!(bar.name(), "BAR0");
    assert_eq!(bar.size(), 0x1000);
    assert_eq!(bar.read32(regs::DEVICE_ID), 0x1234_ABCD);
    assert_eq!(bar.read32(regs::STATUS), status::DEVICE_READY);
    assert_eq!(bar.read32(regs::CONTROL), control::DEVICE_ENABLE);
    assert_eq!(
        bar.read32(regs::INTERRUPT_ENABLE),
        irq::DMA_COMPLETE | irq::DMA_ERROR
    );
    assert_eq!(bar.read32(regs::INTERRUPT_STATUS), 0);
    assert!(bar.is_enabled());
}

/// Out-of-range reads return all ones.
#[test]
fn test_register_out_of_range_read() {
    let (bar, _) = new_regs();
    assert_eq!(bar.read32(0x1000), 0xFFFF_FFFF);
    assert_eq!(bar.read32(0x0FFE), 0xFFFF_FFFF);
    assert_eq!(bar.read32(u64::MAX), 0xFFFF_FFFF);
}

/// Unaligned reads are rejected.
#[test]
fn test_register_unaligned_read() {
    let (bar, _) = new_regs();
    assert_eq!(bar.read32(0x2), 0xFFFF_FFFF);
}

/// Out-of-range writes change nothing.
#[test]
fn test_register_out_of_range_write() {
    let (mut bar, _) = new_regs();
    let before: Vec<u32> = (0..0x1000u64).step_by(4).map(|o| bar.read32(o)).collect();
    assert_eq!(bar.write32(0x1000, 0xDEAD_BEEF), WriteEffect::Rejected);
    assert_eq!(bar.write32(0x0FFD, 0xDEAD_BEEF), WriteEffect::Rejected);
    let after: Vec<u32> = (0..0x1000u64).step_by(4).map(|o| bar.read32(o)).collect();
    assert_eq!(before, after);
}

/// Plain registers store what is written.
#[test]
fn test_register_raw_store() {
    let (mut bar, _) = new_regs();
    bar.write32(regs::DMA_ADDR_LO, 0x8000_0000);
    bar.write32(regs::DMA_ADDR_HI, 0x1);
    bar.write32(regs::DMA_SIZE, 4096);
    bar.write32(regs::ERROR_STATUS, 0x55);
    assert_eq!(bar.read32(regs::DMA_ADDR_LO), 0x8000_0000);
    assert_eq!(bar.read64(regs::DMA_ADDR_LO), 0x1_8000_0000);
    assert_eq!(bar.read32(regs::DMA_SIZE), 4096);
    assert_eq!(bar.read32(regs::ERROR_STATUS), 0x55);
}

/// INTERRUPT_STATUS is write-one-to-clear.
#[test]
fn test_register_interrupt_w1c() {
    let (mut bar, _) = new_regs();
    bar.raise_interrupt(irq::DMA_COMPLETE | irq::DMA_ERROR);
    assert!(bar.irq_pending());

    bar.write32(regs::INTERRUPT_STATUS, 0);
    assert_eq!(
        bar.read32(regs::INTERRUPT_STATUS),
        irq::DMA_COMPLETE | irq::DMA_ERROR
    );
    assert!(bar.irq_pending());

    bar.write32(regs::INTERRUPT_STATUS, irq::DMA_COMPLETE);
    assert_eq!(bar.read32(regs::INTERRUPT_STATUS), irq::DMA_ERROR);
    assert!(bar.irq_pending());

    bar.write32(regs::INTERRUPT_STATUS, irq::DMA_ERROR);
    assert_eq!(bar.read32(regs::INTERRUPT_STATUS), 0);
    assert!(!bar.irq_pending());
    assert_eq!(bar.read32(regs::STATUS) & status::INTERRUPT_PENDING, 0);
}

/// STATUS reflects the live busy and pending flags.
#[test]
fn test_register_status_live_flags() {
    let (mut bar, _) = new_regs();
    bar.begin_dma();
    assert_ne!(bar.read32(regs::STATUS) & status::DMA_BUSY, 0);

    bar.update_after_transfer(true, 25_000, 1);
    let st = bar.read32(regs::STATUS);
    assert_eq!(st & status::DMA_BUSY, 0);
    assert_ne!(st & status::INTERRUPT_PENDING, 0);
    assert_eq!(st & status::ERROR, 0);
    assert_eq!(bar.read32(regs::INTERRUPT_STATUS), irq::DMA_COMPLETE);
}

/// A failed transfer sets STATUS.ERROR and DMA_ERROR.
#[test]
fn test_register_failed_transfer() {
    let (mut bar, _) = new_regs();
    bar.begin_dma();
    bar.update_after_transfer(false, 0, 0);
    assert_ne!(bar.read32(regs::STATUS) & status::ERROR, 0);
    assert_ne!(bar.read32(regs::INTERRUPT_STATUS) & irq::DMA_ERROR, 0);
    assert!(!bar.dma_active());
}

/// Performance registers mirror the statistics tracker.
#[test]
fn test_register_perf_mirror() {
    let (bar, stats) = new_regs();
    stats.record_success(4096, 30_000);
    stats.record_success(4096, 50_000);
    assert_eq!(bar.read32(regs::PERF_COUNT), 2);
    assert_eq!(bar.read32(regs::PERF_LATENCY), 40);
}

/// DMA_START is reported and never stored.
#[test]
fn test_register_dma_start() {
    let (mut bar, _) = new_regs();
    let effect = bar.write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START);
    assert_eq!(effect, WriteEffect::DmaStart);
    assert_eq!(bar.read32(regs::CONTROL), control::DEVICE_ENABLE);
}

/// DMA_RESET clears the busy flag and is not stored.
#[test]
fn test_register_dma_reset() {
    let (mut bar, _) = new_regs();
    bar.begin_dma();
    let effect = bar.write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_RESET);
    assert_eq!(effect, WriteEffect::None);
    assert!(!bar.dma_active());
    assert_eq!(bar.read32(regs::CONTROL), control::DEVICE_ENABLE);
}

/// Clearing DEVICE_ENABLE disables the device.
#[test]
fn test_register_disable() {
    let (mut bar, _) = new_regs();
    bar.write32(regs::CONTROL, 0);
    assert!(!bar.is_enabled());
    bar.write32(regs::CONTROL, control::DEVICE_ENABLE | control::IRQ_ENABLE);
    assert!(bar.is_enabled());
}

/// ERROR_INJECT reports the rate from its low byte.
#[test]
fn test_register_error_inject() {
    let (mut bar, _) = new_regs();
    assert_eq!(
        bar.write32(regs::ERROR_INJECT, 0x0000_0104),
        WriteEffect::FaultInjection(Some(4))
    );
    assert_eq!(bar.read32(regs::ERROR_INJECT), 0x0000_0104);
    assert_eq!(
        bar.write32(regs::ERROR_INJECT, 0x100),
        WriteEffect::FaultInjection(None)
    );
}

/// DMA_CONTROL decodes into a DMA program.
#[test]
fn test_register_dma_program() {
    let (mut bar, _) = new_regs();
    bar.write64(regs::DMA_ADDR_LO, 0x2_0000_1000);
    bar.write32(regs::DMA_SIZE, 2048);
    bar.write32(
        regs::DMA_CONTROL,
        regs::dma_control::DIRECTION | regs::dma_control::ENABLE,
    );
    let p = bar.dma_program();
    assert_eq!(p.addr, 0x2_0000_1000);
    assert_eq!(p.size, 2048);
    assert_eq!(p.direction, pcie_sim::Direction::FromDevice);
    assert!(p.enable);
    assert_eq!(p.control & regs::dma_control::INTERRUPT, 0);
}
