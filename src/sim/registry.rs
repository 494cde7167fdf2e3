//! Device Registry.
//!
//! This module implements the registry that owns every simulated device and
//! hands out handles to them. Devices are created lazily on first open and
//! live as long as the registry, so statistics persist across close / reopen.

use super::handle::DeviceHandle;
use crate::common::{Result, SimError};
use crate::config::Config;
use crate::engine::{SimulatedDma, TransferEngine};
use crate::soc::regs::{self, control};
use crate::soc::DeviceContext;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

/// Owner of all simulated devices.
///
/// Handles opened on the same id share one [`DeviceContext`].
pub struct DeviceRegistry {
    config: Config,
    engine: Arc<dyn TransferEngine>,
    devices: Mutex<Vec<Option<Arc<DeviceContext>>>>,
}

impl DeviceRegistry {
    /// Creates a registry using the in-process DMA engine.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if `config` fails validation.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_engine(config, Arc::new(SimulatedDma::new()))
    }

    /// Creates a registry with a custom transfer engine.
    pub fn with_engine(config: Config, engine: Arc<dyn TransferEngine>) -> Result<Self> {
        config.validate()?;
        let count = config.device.count as usize;
        info!(devices = count, "device registry created");
        Ok(Self {
            config,
            engine,
            devices: Mutex::new(vec![None; count]),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of device ids this registry serves.
    pub fn device_count(&self) -> u32 {
        self.config.device.count
    }

    fn context(&self, device_id: u32) -> Result<Arc<DeviceContext>> {
        let mut devices = self.devices.lock();
        let slot = devices
            .get_mut(device_id as usize)
            .ok_or(SimError::DeviceNotFound(device_id))?;
        let ctx = slot.get_or_insert_with(|| Arc::new(DeviceContext::new(device_id, &self.config)));
        Ok(Arc::clone(ctx))
    }

    /// Opens a session on `device_id`.
    ///
    /// # Errors
    ///
    /// * [`SimError::DeviceNotFound`] - id outside `0..device_count()`.
    /// * [`SimError::DeviceUnavailable`] - the device is disabled.
    pub fn open(&self, device_id: u32) -> Result<DeviceHandle> {
        let ctx = self.context(device_id)?;
        if !ctx.is_enabled() {
            return Err(SimError::DeviceUnavailable(device_id));
        }
        info!(device = device_id, "device opened");
        Ok(DeviceHandle::new(ctx, Arc::clone(&self.engine)))
    }

    /// Shared context of `device_id`, if it has been opened before.
    pub fn device(&self, device_id: u32) -> Option<Arc<DeviceContext>> {
        self.devices
            .lock()
            .get(device_id as usize)
            .and_then(|slot| slot.clone())
    }

    /// Number of live handles on `device_id`.
    pub fn open_handles(&self, device_id: u32) -> usize {
        self.device(device_id)
            .map(|ctx| Arc::strong_count(&ctx).saturating_sub(2))
            .unwrap_or(0)
    }

    /// Sets or clears CONTROL.DEVICE_ENABLE without needing an open handle.
    pub fn set_enabled(&self, device_id: u32, enabled: bool) -> Result<()> {
        let ctx = self.context(device_id)?;
        let current = ctx.read32(regs::CONTROL);
        let value = if enabled {
            current | control::DEVICE_ENABLE
        } else {
            current & !control::DEVICE_ENABLE
        };
        ctx.write32(regs::CONTROL, value);
        info!(device = device_id, enabled, "device enable changed");
        Ok(())
    }
}
