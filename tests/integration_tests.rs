//! Integration tests for the device registry and handles.

use pcie_sim::config::{Config, LatencyModelKind};
use pcie_sim::soc::regs::{self, control, dma_control, irq};
use pcie_sim::{DeviceRegistry, Direction, SimError};

/// Creates a configuration with no simulated delay.
fn fast_config() -> Config {
    let mut config = Config::default();
    config.latency.model = LatencyModelKind::Instant;
    config.latency.seed = Some(11);
    config
}

/// Ten 4 KiB writes through the default device.
#[test]
fn test_end_to_end_basic_transfers() {
    let mut config = Config::default();
    config.latency.seed = Some(3);
    let registry = DeviceRegistry::new(config).unwrap();
    let handle = registry.open(0).unwrap();
    let mut buf = vec![0x11u8; 4096];

    for _ in 0..10 {
        handle.transfer(&mut buf, 4096, Direction::ToDevice).unwrap();
    }

    let stats = handle.get_stats().unwrap();
    assert_eq!(stats.total_transfers, 10);
    assert_eq!(stats.total_bytes, 40_960);
    assert_eq!(stats.total_errors, 0);
    assert!(stats.min_latency_ns > 0);
    assert!(stats.min_latency_ns <= stats.avg_latency_ns);
    assert!(stats.avg_latency_ns <= stats.max_latency_ns);
    assert_eq!(handle.read32(regs::DEVICE_ID), 0x1234_ABCD);
    handle.close();
}

/// Unknown device ids are reported as not found.
#[test]
fn test_open_unknown_device() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    assert_eq!(registry.device_count(), 1);
    assert!(matches!(registry.open(1), Err(SimError::DeviceNotFound(1))));
}

/// Handles on the same device share state.
#[test]
fn test_reopen_shares_context() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let a = registry.open(0).unwrap();
    let b = registry.open(0).unwrap();
    assert_eq!(registry.open_handles(0), 2);

    let mut buf = vec![0u8; 256];
    a.transfer(&mut buf, 256, Direction::ToDevice).unwrap();
    assert_eq!(b.get_stats().unwrap().total_transfers, 1);

    b.reset_stats().unwrap();
    assert_eq!(a.get_stats().unwrap().total_transfers, 0);

    a.close();
    assert_eq!(registry.open_handles(0), 1);
    b.close();
    assert_eq!(registry.open_handles(0), 0);
}

/// Statistics survive closing every handle.
#[test]
fn test_stats_persist_across_close() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    let mut buf = vec![0u8; 100];
    handle.transfer(&mut buf, 100, Direction::FromDevice).unwrap();
    handle.close();

    let again = registry.open(0).unwrap();
    let stats = again.get_stats().unwrap();
    assert_eq!(stats.total_transfers, 1);
    assert_eq!(stats.total_bytes, 100);
}

/// Devices keep independent statistics.
#[test]
fn test_multiple_devices_independent() {
    let mut config = fast_config();
    config.device.count = 3;
    let registry = DeviceRegistry::new(config).unwrap();
    let d0 = registry.open(0).unwrap();
    let d2 = registry.open(2).unwrap();
    let mut buf = vec![0u8; 64];

    d0.transfer(&mut buf, 64, Direction::ToDevice).unwrap();
    d0.transfer(&mut buf, 64, Direction::ToDevice).unwrap();
    d2.transfer(&mut buf, 32, Direction::FromDevice).unwrap();

    assert_eq!(d0.get_stats().unwrap().total_transfers, 2);
    assert_eq!(d2.get_stats().unwrap().total_transfers, 1);
    assert!(registry.device(1).is_none());
    assert_eq!(d2.device_id(), 2);
}

/// Descriptors submitted and completed through a handle update statistics.
#[test]
fn test_descriptor_round_trip() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();

    handle
        .submit_descriptor(Direction::ToDevice, 0x1000, 512, 0)
        .unwrap();
    handle
        .submit_descriptor(Direction::ToDevice, 0x2000, 1024, 1)
        .unwrap();
    handle
        .submit_descriptor(Direction::FromDevice, 0x3000, 2048, 0)
        .unwrap();

    let first = handle
        .complete_descriptor(Direction::ToDevice, 0)
        .unwrap()
        .unwrap();
    assert_eq!(first.length, 512);
    let second = handle
        .complete_descriptor(Direction::ToDevice, 0)
        .unwrap()
        .unwrap();
    assert_eq!(second.buffer_addr, 0x2000);
    let rx = handle
        .complete_descriptor(Direction::FromDevice, 7)
        .unwrap()
        .unwrap();
    assert_eq!(rx.status, 7);

    let stats = handle.get_stats().unwrap();
    assert_eq!(stats.total_transfers, 2);
    assert_eq!(stats.total_bytes, 1536);
    assert_eq!(stats.total_errors, 1);

    let ring = handle.context().ring(Direction::ToDevice).stats();
    assert_eq!(ring.submissions, 2);
    assert_eq!(ring.completions, 2);
}

/// Completing on an empty ring yields nothing and records nothing.
#[test]
fn test_descriptor_complete_empty() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    assert_eq!(
        handle.complete_descriptor(Direction::FromDevice, 0).unwrap(),
        None
    );
    assert_eq!(handle.get_stats().unwrap().total_errors, 0);
}

/// A full ring rejects submissions and raises BUFFER_OVERRUN.
#[test]
fn test_descriptor_overrun() {
    let mut config = fast_config();
    config.device.ring_size = 2;
    let registry = DeviceRegistry::new(config).unwrap();
    let handle = registry.open(0).unwrap();

    handle.submit_descriptor(Direction::ToDevice, 0, 64, 0).unwrap();
    handle.submit_descriptor(Direction::ToDevice, 0, 64, 0).unwrap();
    assert!(matches!(
        handle.submit_descriptor(Direction::ToDevice, 0, 64, 0),
        Err(SimError::ResourceExhausted(_))
    ));

    assert_eq!(handle.get_stats().unwrap().total_errors, 1);
    assert_ne!(
        handle.read32(regs::INTERRUPT_STATUS) & irq::BUFFER_OVERRUN,
        0
    );
    let ring = handle.context().ring(Direction::ToDevice);
    assert_eq!(ring.stats().overruns, 1);
    assert_eq!(ring.len(), 2);
}

/// Descriptor lengths are bounds-checked like transfers.
#[test]
fn test_descriptor_invalid_length() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    assert!(matches!(
        handle.submit_descriptor(Direction::ToDevice, 0, 0, 0),
        Err(SimError::InvalidParameter(_))
    ));
    assert!(handle.context().ring(Direction::ToDevice).is_empty());
}

/// Writing DMA_START runs the programmed transfer through the ring.
#[test]
fn test_register_triggered_dma() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();

    handle.write32(regs::DMA_ADDR_LO, 0x8000_0000).unwrap();
    handle.write32(regs::DMA_ADDR_HI, 0).unwrap();
    handle.write32(regs::DMA_SIZE, 8192).unwrap();
    handle
        .write32(regs::DMA_CONTROL, dma_control::DIRECTION | dma_control::ENABLE)
        .unwrap();
    handle
        .write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START)
        .unwrap();

    let stats = handle.get_stats().unwrap();
    assert_eq!(stats.total_transfers, 1);
    assert_eq!(stats.total_bytes, 8192);

    let rx = handle.context().ring(Direction::FromDevice).stats();
    assert_eq!(rx.submissions, 1);
    assert_eq!(rx.completions, 1);
    assert_eq!(handle.read32(regs::CONTROL), control::DEVICE_ENABLE);
    assert_ne!(
        handle.read32(regs::INTERRUPT_STATUS) & irq::DMA_COMPLETE,
        0
    );
}

/// A DMA_START with an invalid programmed size reports the error.
#[test]
fn test_register_triggered_dma_invalid_size() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    handle.write32(regs::DMA_SIZE, 0).unwrap();
    handle.write32(regs::DMA_CONTROL, dma_control::ENABLE).unwrap();
    assert!(matches!(
        handle.write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START),
        Err(SimError::InvalidParameter(_))
    ));
    assert_eq!(handle.get_stats().unwrap().total_errors, 0);
}

/// DMA_START is refused while DMA_CONTROL.ENABLE is clear.
#[test]
fn test_register_triggered_dma_requires_enable() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    handle.write32(regs::DMA_SIZE, 4096).unwrap();
    handle.write32(regs::DMA_CONTROL, 0).unwrap();
    assert!(matches!(
        handle.write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START),
        Err(SimError::InvalidParameter(_))
    ));

    let stats = handle.get_stats().unwrap();
    assert_eq!(stats.total_transfers, 0);
    assert_eq!(stats.total_errors, 0);
    assert_eq!(handle.context().ring(Direction::ToDevice).stats().submissions, 0);
}

/// A programmed DMA never consumes descriptors queued by the host.
#[test]
fn test_register_triggered_dma_keeps_queued_descriptor() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    handle
        .submit_descriptor(Direction::ToDevice, 0x1000, 100, 0xA)
        .unwrap();

    handle.write32(regs::DMA_ADDR_LO, 0x9000).unwrap();
    handle.write32(regs::DMA_SIZE, 200).unwrap();
    handle.write32(regs::DMA_CONTROL, dma_control::ENABLE).unwrap();
    assert!(matches!(
        handle.write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START),
        Err(SimError::InvalidParameter(_))
    ));
    assert_eq!(handle.context().ring(Direction::ToDevice).len(), 1);
    assert_eq!(handle.get_stats().unwrap().total_errors, 0);

    let done = handle
        .complete_descriptor(Direction::ToDevice, 0)
        .unwrap()
        .unwrap();
    assert_eq!(done.buffer_addr, 0x1000);
    assert_eq!(done.length, 100);
    assert_eq!(done.flags, 0xA);

    // Once the ring drains the programmed transfer goes through.
    handle
        .write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START)
        .unwrap();
    let stats = handle.get_stats().unwrap();
    assert_eq!(stats.total_transfers, 2);
    assert_eq!(stats.total_bytes, 300);
    assert!(handle.context().ring(Direction::ToDevice).is_empty());
    assert_eq!(
        handle.complete_descriptor(Direction::ToDevice, 0).unwrap(),
        None
    );
}

/// A full single-slot ring refuses DMA_START without counting an error.
#[test]
fn test_register_triggered_dma_single_slot_ring() {
    let mut config = fast_config();
    config.device.ring_size = 1;
    let registry = DeviceRegistry::new(config).unwrap();
    let handle = registry.open(0).unwrap();
    handle
        .submit_descriptor(Direction::ToDevice, 0x2000, 64, 0)
        .unwrap();

    handle.write32(regs::DMA_SIZE, 128).unwrap();
    handle.write32(regs::DMA_CONTROL, dma_control::ENABLE).unwrap();
    assert!(matches!(
        handle.write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START),
        Err(SimError::InvalidParameter(_))
    ));
    let stats = handle.get_stats().unwrap();
    assert_eq!(stats.total_errors, 0);
    assert_eq!(handle.context().ring(Direction::ToDevice).stats().overruns, 0);
    assert_eq!(
        handle.read32(regs::INTERRUPT_STATUS) & irq::BUFFER_OVERRUN,
        0
    );
}

/// Descriptors queued in one direction do not block DMA in the other.
#[test]
fn test_register_triggered_dma_other_ring_busy() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    handle
        .submit_descriptor(Direction::ToDevice, 0x3000, 64, 0)
        .unwrap();

    handle.write32(regs::DMA_SIZE, 512).unwrap();
    handle
        .write32(regs::DMA_CONTROL, dma_control::DIRECTION | dma_control::ENABLE)
        .unwrap();
    handle
        .write32(regs::CONTROL, control::DEVICE_ENABLE | control::DMA_START)
        .unwrap();

    assert_eq!(handle.get_stats().unwrap().total_bytes, 512);
    assert_eq!(handle.context().ring(Direction::ToDevice).len(), 1);
    assert_eq!(handle.read32(regs::PERF_COUNT), 1);
}

/// Acknowledging interrupts clears the pending flag.
#[test]
fn test_interrupt_acknowledge() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    let mut buf = vec![0u8; 64];
    handle.transfer(&mut buf, 64, Direction::ToDevice).unwrap();
    assert_ne!(
        handle.read32(regs::STATUS) & regs::status::INTERRUPT_PENDING,
        0
    );

    let pending = handle.read32(regs::INTERRUPT_STATUS);
    handle.write32(regs::INTERRUPT_STATUS, pending).unwrap();
    assert_eq!(handle.read32(regs::INTERRUPT_STATUS), 0);
    assert_eq!(
        handle.read32(regs::STATUS) & regs::status::INTERRUPT_PENDING,
        0
    );
}

/// Out-of-range register accesses through a handle are harmless.
#[test]
fn test_handle_out_of_range_register() {
    let registry = DeviceRegistry::new(fast_config()).unwrap();
    let handle = registry.open(0).unwrap();
    assert_eq!(handle.read32(0x2000), 0xFFFF_FFFF);
    handle.write32(0x2000, 1).unwrap();
    assert_eq!(handle.read32(regs::CONTROL), control::DEVICE_ENABLE);
}
