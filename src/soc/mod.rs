//! Device model.
//!
//! The register block, descriptor rings and the per-device context that
//! owns them.

/// Per-device state and transfer bookkeeping.
pub mod device;

/// BAR0 register block.
pub mod registers;

/// BAR0 offsets and bit definitions.
pub mod regs;

/// DMA descriptor rings.
pub mod ring;

/// Memory-mapped region interface.
pub mod traits;

pub use device::{DeviceContext, TransferLimits};
pub use registers::RegisterFile;
pub use ring::{Completion, RingBuffer, RingError};
pub use traits::{MmioDevice, WriteEffect};
