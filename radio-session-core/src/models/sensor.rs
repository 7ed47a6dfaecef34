use serde::{Deserialize, Serialize};

/// Typed payload of a sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum SensorReading {
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
}

/// A named sensor value read from an mboard or frontend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorValue {
    pub name: String,
    pub reading: SensorReading,
    pub unit: String,
}

impl SensorValue {
    pub fn boolean(name: &str, value: bool, utrue: &str, ufalse: &str) -> Self {
        Self {
            name: name.into(),
            reading: SensorReading::Boolean(value),
            unit: if value { utrue } else { ufalse }.into(),
        }
    }

    pub fn real(name: &str, value: f64, unit: &str) -> Self {
        Self {
            name: name.into(),
            reading: SensorReading::Real(value),
            unit: unit.into(),
        }
    }

    pub fn integer(name: &str, value: i64, unit: &str) -> Self {
        Self {
            name: name.into(),
            reading: SensorReading::Integer(value),
            unit: unit.into(),
        }
    }

    /// `"name: value unit"`, the pretty form used by driver tooling.
    pub fn to_pp_string(&self) -> String {
        match &self.reading {
            SensorReading::Boolean(_) => format!("{}: {}", self.name, self.unit),
            SensorReading::Integer(v) => format!("{}: {} {}", self.name, v, self.unit),
            SensorReading::Real(v) => format!("{}: {} {}", self.name, v, self.unit),
            SensorReading::String(v) => format!("{}: {} {}", self.name, v, self.unit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_sensor_uses_state_unit() {
        let locked = SensorValue::boolean("lo_locked", true, "locked", "unlocked");
        assert_eq!(locked.to_pp_string(), "lo_locked: locked");

        let rssi = SensorValue::real("rssi", -70.5, "dBm");
        assert_eq!(rssi.to_pp_string(), "rssi: -70.5 dBm");
    }
}
