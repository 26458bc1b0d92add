use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Hardware address of a ventilation unit. The bridge keys its device
/// registry on this, so two config entries with the same MAC share one
/// controller.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Separator-free lowercase hex form, safe for MQTT topics and
    /// Home Assistant object ids.
    pub fn topic_id(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(|c| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(Error::InvalidMacAddress(s.to_owned()));
        }

        let mut bytes = [0u8; 6];
        for (byte, part) in bytes.iter_mut().zip(&parts) {
            *byte = u8::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidMacAddress(s.to_owned()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddress({self})")
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_colon_and_dash_forms() {
        let colons: MacAddress = "00:1A:2b:3C:4d:5E".parse().unwrap();
        let dashes: MacAddress = "00-1a-2b-3c-4d-5e".parse().unwrap();
        assert_eq!(colons, dashes);
        assert_eq!(colons.to_string(), "00:1a:2b:3c:4d:5e");
        assert_eq!(colons.topic_id(), "001a2b3c4d5e");
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!("00:1a:2b:3c:4d".parse::<MacAddress>().is_err());
        assert!("00:1a:2b:3c:4d:zz".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }

    #[test]
    fn deserializes_from_json_string() {
        let mac: MacAddress = serde_json::from_value(serde_json::json!("de:ad:be:ef:00:01")).unwrap();
        assert_eq!(mac.to_string(), "de:ad:be:ef:00:01");
        assert!(serde_json::from_value::<MacAddress>(serde_json::json!("nope")).is_err());
    }
}
