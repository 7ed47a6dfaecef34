use std::sync::Arc;

use radio_session_core::models::error::BackendFault;
use radio_session_core::traits::device_factory::DeviceFactory;
use radio_session_core::traits::device_session::DeviceSession;

use crate::args::{SimConfig, SIM_DEVICE_TYPE};
use crate::sim_device::SimDevice;

/// Factory for simulated devices.
///
/// `find` reports the devices in a fixed inventory; `make` builds a fresh
/// device from any `type=test` args string, whether or not it was found.
pub struct SimFactory {
    inventory: Vec<SimConfig>,
}

impl SimFactory {
    pub fn new() -> Self {
        Self::with_inventory(vec![SimConfig {
            serial: "SIM0001".into(),
            ..SimConfig::default()
        }])
    }

    pub fn with_inventory(inventory: Vec<SimConfig>) -> Self {
        Self { inventory }
    }
}

impl Default for SimFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFactory for SimFactory {
    fn find(&self, args: &str) -> Result<Vec<String>, BackendFault> {
        let filter = SimConfig::parse(args)?;
        if filter.device_type != SIM_DEVICE_TYPE {
            return Ok(Vec::new());
        }
        Ok(self
            .inventory
            .iter()
            .filter(|device| device.matches(&filter, args))
            .map(SimConfig::to_args)
            .collect())
    }

    fn make(&self, args: &str) -> Result<Arc<dyn DeviceSession>, BackendFault> {
        let mut config = SimConfig::parse(args)?;
        if config.fail {
            return Err(BackendFault::io("device unreachable"));
        }
        config.validate()?;
        if config.serial.is_empty() {
            let id = uuid::Uuid::new_v4().simple().to_string();
            config.serial = id[..8].to_uppercase();
        }
        log::debug!("constructing simulated device {}", config.to_args());
        Ok(Arc::new(SimDevice::new(config)))
    }
}
