use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Identification of the board chain behind one RX or TX channel.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub mboard_id: String,
    pub mboard_serial: String,
    pub subdev_id: String,
    pub subdev_name: String,
    pub subdev_spec: String,
    pub serial: String,
    pub antenna: String,
}

/// Key/value contents of an mboard or daughterboard EEPROM.
pub type EepromMap = BTreeMap<String, String>;
