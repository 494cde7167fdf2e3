//! Memory-Mapped Device Traits.
//!
//! This module defines the interface a simulated BAR region exposes to the
//! rest of the device model, so register accesses from the transfer engine,
//! from descriptor processing and from collaborators all go through the same
//! bounds-checked path.

/// Side effect requested by a register write that the register block cannot
/// carry out by itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteEffect {
    /// Plain store (or a side effect fully handled inside the register block).
    None,
    /// The write fell outside the register block and was dropped.
    Rejected,
    /// CONTROL.DMA_START was written: run the transfer programmed in the
    /// DMA_* registers.
    DmaStart,
    /// ERROR_INJECT was written: `Some(rate)` enables one-in-`rate` fault
    /// injection, `None` disables it.
    FaultInjection(Option<u32>),
}

/// Trait for memory-mapped register regions.
///
/// Offsets are byte offsets from the start of the region. Implementations
/// must reject accesses that do not fit inside the region instead of
/// panicking.
pub trait MmioDevice {
    /// Returns the user-friendly name of the region.
    ///
    /// Used for logging.
    fn name(&self) -> &str;

    /// Returns the size of the region in bytes.
    fn size(&self) -> u64;

    /// Reads a 32-bit register at the specified offset.
    fn read32(&self, offset: u64) -> u32;

    /// Writes a 32-bit register at the specified offset.
    fn write32(&mut self, offset: u64, val: u32) -> WriteEffect;

    /// Reads a 64-bit value as two consecutive 32-bit registers (low first).
    fn read64(&self, offset: u64) -> u64 {
        let lo = self.read32(offset);
        let hi = self.read32(offset.saturating_add(4));
        (u64::from(hi) << 32) | u64::from(lo)
    }

    /// Writes a 64-bit value as two consecutive 32-bit registers (low first).
    ///
    /// Returns the first effect other than [`WriteEffect::None`].
    fn write64(&mut self, offset: u64, val: u64) -> WriteEffect {
        let lo = self.write32(offset, val as u32);
        let hi = self.write32(offset.saturating_add(4), (val >> 32) as u32);
        if lo != WriteEffect::None {
            lo
        } else {
            hi
        }
    }
}
