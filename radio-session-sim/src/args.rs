use radio_session_core::models::error::BackendFault;
use thiserror::Error;

/// Device type served by the simulated backend.
pub const SIM_DEVICE_TYPE: &str = "test";

const MCR_MIN: f64 = 5e6;
const MCR_MAX: f64 = 61.44e6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimArgsError {
    #[error("malformed device argument \"{0}\" (expected key=value)")]
    Malformed(String),

    #[error("invalid value for {key}: \"{value}\"")]
    InvalidValue { key: String, value: String },

    #[error("unsupported device type \"{0}\"")]
    UnsupportedType(String),

    #[error("{0}")]
    Invalid(String),
}

impl From<SimArgsError> for BackendFault {
    fn from(e: SimArgsError) -> Self {
        match e {
            SimArgsError::UnsupportedType(_) => BackendFault::key(e.to_string()),
            _ => BackendFault::value(e.to_string()),
        }
    }
}

/// Settings for one simulated device, parsed from a device-args string
/// such as `type=test,serial=ab12,rx_channels=2`.
///
/// Unknown keys are ignored so that address strings returned by `find`
/// round-trip into `make`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Must be `test` (the default when absent).
    pub device_type: String,

    /// Serial number. Empty means "generate one at construction".
    pub serial: String,

    /// Motherboard name reported by `mboard_name` (default: "sim").
    pub name: String,

    /// Number of motherboards (default: 1).
    pub mboards: usize,

    /// RX frontend channels across the device (default: 2).
    pub rx_channels: usize,

    /// TX frontend channels across the device (default: 2).
    pub tx_channels: usize,

    /// Initial master clock rate in Hz (default: 32 MHz).
    pub master_clock_rate: f64,

    /// Make construction fail as if the device were unreachable.
    pub fail: bool,
}

impl SimConfig {
    pub fn parse(args: &str) -> Result<Self, SimArgsError> {
        let mut config = Self::default();
        for pair in args.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| SimArgsError::Malformed(pair.to_string()))?;
            let (key, value) = (key.trim(), value.trim());
            match key {
                "type" => config.device_type = value.to_string(),
                "serial" => config.serial = value.to_string(),
                "name" => config.name = value.to_string(),
                "mboards" => config.mboards = parse_value(key, value)?,
                "rx_channels" => config.rx_channels = parse_value(key, value)?,
                "tx_channels" => config.tx_channels = parse_value(key, value)?,
                "master_clock_rate" => config.master_clock_rate = parse_value(key, value)?,
                "fail" => config.fail = parse_flag(key, value)?,
                other => log::debug!("ignoring device argument {}", other),
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimArgsError> {
        if self.device_type != SIM_DEVICE_TYPE {
            return Err(SimArgsError::UnsupportedType(self.device_type.clone()));
        }
        if self.mboards == 0 {
            return Err(SimArgsError::Invalid("mboards must be at least 1".into()));
        }
        if self.rx_channels == 0 || self.tx_channels == 0 {
            return Err(SimArgsError::Invalid("rx_channels and tx_channels must be at least 1".into()));
        }
        if !(MCR_MIN..=MCR_MAX).contains(&self.master_clock_rate) {
            return Err(SimArgsError::Invalid(format!(
                "master_clock_rate must be within {} and {} Hz",
                MCR_MIN, MCR_MAX
            )));
        }
        Ok(())
    }

    /// Address string as reported by discovery.
    pub fn to_args(&self) -> String {
        format!("type={},serial={},name={}", self.device_type, self.serial, self.name)
    }

    /// Whether every key present in `filter` matches this device.
    pub(crate) fn matches(&self, filter: &SimConfig, args: &str) -> bool {
        let given = |key: &str| args.split(',').any(|p| p.trim().starts_with(&format!("{}=", key)));
        (!given("type") || filter.device_type == self.device_type)
            && (!given("serial") || filter.serial == self.serial)
            && (!given("name") || filter.name == self.name)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device_type: SIM_DEVICE_TYPE.into(),
            serial: String::new(),
            name: "sim".into(),
            mboards: 1,
            rx_channels: 2,
            tx_channels: 2,
            master_clock_rate: 32e6,
            fail: false,
        }
    }
}

pub(crate) fn master_clock_range() -> (f64, f64) {
    (MCR_MIN, MCR_MAX)
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SimArgsError> {
    value.parse().map_err(|_| SimArgsError::InvalidValue {
        key: key.into(),
        value: value.into(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, SimArgsError> {
    match value {
        "" | "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(SimArgsError::InvalidValue {
            key: key.into(),
            value: value.into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let config = SimConfig::parse("type=test, serial=ab12,rx_channels=4,master_clock_rate=16e6").unwrap();
        assert_eq!(config.serial, "ab12");
        assert_eq!(config.rx_channels, 4);
        assert_eq!(config.tx_channels, 2);
        assert_eq!(config.master_clock_rate, 16e6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_args_give_defaults() {
        assert_eq!(SimConfig::parse("").unwrap(), SimConfig::default());
    }

    #[test]
    fn rejects_malformed_pairs() {
        assert_eq!(
            SimConfig::parse("type=test,bogus"),
            Err(SimArgsError::Malformed("bogus".into()))
        );
        assert!(matches!(
            SimConfig::parse("mboards=two"),
            Err(SimArgsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn validate_rejects_other_device_types() {
        let config = SimConfig::parse("type=b200").unwrap();
        assert_eq!(config.validate(), Err(SimArgsError::UnsupportedType("b200".into())));

        let fault = BackendFault::from(SimArgsError::UnsupportedType("b200".into()));
        assert_eq!(fault.kind, radio_session_core::FaultKind::Key);
    }

    #[test]
    fn validate_rejects_zero_channels() {
        let config = SimConfig {
            rx_channels: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn fail_flag_accepts_bare_key() {
        assert!(SimConfig::parse("fail=").unwrap().fail);
        assert!(!SimConfig::parse("fail=0").unwrap().fail);
    }
}
