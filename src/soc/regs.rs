//! BAR0 register map.
//!
//! ```text
//! Offset  Register            Access
//! ──────  ──────────────────  ─────────────────────────────────────────────
//! 0x000   DEVICE_ID           RO  fixed identification value
//! 0x004   STATUS              RW  DMA_BUSY / IRQ_PENDING computed on read
//! 0x008   CONTROL             RW  DMA_START trigger, DMA_RESET self-clearing
//! 0x010   DMA_ADDR_LO         RW
//! 0x014   DMA_ADDR_HI         RW
//! 0x018   DMA_SIZE            RW
//! 0x01C   DMA_CONTROL         RW
//! 0x020   INTERRUPT_STATUS    W1C
//! 0x024   INTERRUPT_ENABLE    RW
//! 0x030   PERF_LATENCY        RO  average latency in microseconds
//! 0x034   PERF_COUNT          RO  completed transfer count
//! 0x040   ERROR_STATUS        RW
//! 0x044   ERROR_INJECT        RW  low byte: fault rate 1/N, 0 disables
//! ```

pub const DEVICE_ID: u64 = 0x000;
pub const STATUS: u64 = 0x004;
pub const CONTROL: u64 = 0x008;
pub const DMA_ADDR_LO: u64 = 0x010;
pub const DMA_ADDR_HI: u64 = 0x014;
pub const DMA_SIZE: u64 = 0x018;
pub const DMA_CONTROL: u64 = 0x01C;
pub const INTERRUPT_STATUS: u64 = 0x020;
pub const INTERRUPT_ENABLE: u64 = 0x024;
pub const PERF_LATENCY: u64 = 0x030;
pub const PERF_COUNT: u64 = 0x034;
pub const ERROR_STATUS: u64 = 0x040;
pub const ERROR_INJECT: u64 = 0x044;

/// STATUS register bits.
pub mod status {
    /// Device ready to accept commands.
    pub const DEVICE_READY: u32 = 1 << 0;
    /// A DMA transfer is in flight.
    pub const DMA_BUSY: u32 = 1 << 1;
    /// The last transfer failed.
    pub const ERROR: u32 = 1 << 2;
    /// An interrupt has been raised and not yet acknowledged.
    pub const INTERRUPT_PENDING: u32 = 1 << 3;
}

/// CONTROL register bits.
pub mod control {
    pub const DEVICE_ENABLE: u32 = 1 << 0;
    /// Write-only trigger; never stored.
    pub const DMA_START: u32 = 1 << 1;
    /// Self-clearing.
    pub const DMA_RESET: u32 = 1 << 2;
    pub const IRQ_ENABLE: u32 = 1 << 3;
}

/// DMA_CONTROL register bits.
pub mod dma_control {
    /// 0 = to device, 1 = from device.
    pub const DIRECTION: u32 = 1 << 0;
    pub const ENABLE: u32 = 1 << 1;
    pub const INTERRUPT: u32 = 1 << 2;
}

/// INTERRUPT_STATUS / INTERRUPT_ENABLE bits.
pub mod irq {
    pub const DMA_COMPLETE: u32 = 1 << 0;
    pub const DMA_ERROR: u32 = 1 << 1;
    pub const BUFFER_OVERRUN: u32 = 1 << 2;
    pub const DEVICE_ERROR: u32 = 1 << 3;
}

/// ERROR_INJECT rate field.
pub const ERROR_INJECT_RATE_MASK: u32 = 0xFF;
