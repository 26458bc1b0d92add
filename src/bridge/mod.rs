use std::time::Duration;

use serde::Deserialize;

use crate::mac::MacAddress;

pub mod connector;
pub(crate) mod device;

/// Data gathered for one ventilation unit, delivered over the
/// `<prefix>/+/connect` topic.
#[derive(Clone, Debug, Deserialize)]
pub struct ConfigEntry {
    pub name: String,
    pub host: String,

    #[serde(default = "default_modbus_port")]
    pub port: u16,

    #[serde(default = "default_modbus_unit", alias = "slave")]
    pub unit: crate::modbus::UnitId,

    pub mac: MacAddress,

    /// Overrides every entity's own polling cadence when set.
    #[serde(default, with = "humantime_serde::option", alias = "period")]
    pub poll_interval: Option<Duration>,
}

pub(crate) fn default_modbus_port() -> u16 {
    502
}

// The EasyControls firmware answers on unit 180.
pub(crate) fn default_modbus_unit() -> crate::modbus::UnitId {
    180
}
