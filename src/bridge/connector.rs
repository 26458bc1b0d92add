use std::collections::HashMap;

use tokio::select;
use tracing::{debug, error, info, warn};

use super::{device, ConfigEntry};
use crate::mac::MacAddress;
use crate::mqtt::{self, Payload};
use crate::shutdown::Shutdown;

/// The topic filter under the prefix to look for config entries.
const TOPIC: &str = "+/connect";

/// Watches MQTT for config entries and owns the device registry: one running
/// device task (and therefore one controller) per MAC address.
pub struct Connector {
    mqtt: mqtt::Handle,
    shutdown: Shutdown,
    devices: HashMap<MacAddress, device::Handle>,
}

pub(crate) fn new(mqtt: mqtt::Handle, shutdown: Shutdown) -> Connector {
    Connector {
        mqtt,
        shutdown,
        devices: HashMap::new(),
    }
}

impl Connector {
    pub async fn run(&mut self) -> crate::Result<()> {
        let mut entries = self.mqtt.subscribe(TOPIC).await?;

        loop {
            select! {
                Some(Payload { bytes, topic }) = entries.recv() => {
                    // The filter guarantees at least two segments.
                    let entry_id = topic.rsplit('/').nth_back(1).unwrap_or_default().to_owned();

                    debug!(?entry_id, ?topic, "received config entry");

                    if let Err(error) = self.setup_entry(&entry_id, &bytes).await {
                        error!(?entry_id, ?error, "config entry setup failed");
                    }
                },

                _ = self.shutdown.recv() => {
                    info!("shutting down connector");
                    break;
                },
            }
        }

        for (_, handle) in self.devices.drain() {
            handle.abort();
        }

        Ok(())
    }

    async fn setup_entry(&mut self, entry_id: &str, bytes: &[u8]) -> crate::Result<()> {
        let entry: ConfigEntry = match serde_json::from_slice(bytes) {
            Ok(entry) => entry,
            Err(error) => {
                warn!(entry_id, %error, "invalid config entry");
                self.mqtt.scoped(entry_id).publish("state", "invalid").await?;
                return Ok(());
            }
        };

        if self.devices.contains_key(&entry.mac) {
            debug!(mac = %entry.mac, "controller already registered for this unit");
            return Ok(());
        }

        let handle = device::spawn(entry.clone(), self.mqtt.clone(), self.shutdown.clone());
        self.devices.insert(entry.mac, handle);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::broadcast;

    type Guards = (
        tokio::sync::mpsc::Receiver<crate::mqtt::Request>,
        broadcast::Sender<()>,
    );

    // The receiver and sender are returned so the MQTT channel and the
    // shutdown channel stay open for the duration of a test.
    fn connector() -> (Connector, Guards) {
        let (handle, rx) = mqtt::test_handle("easycontrols");
        let (notify, _) = broadcast::channel(1);
        let connector = new(handle, Shutdown::new(notify.subscribe()));
        (connector, (rx, notify))
    }

    const ENTRY: &str = r#"{"name":"ventilation","host":"192.0.2.10","mac":"00:1a:2b:3c:4d:5e"}"#;

    #[tokio::test]
    async fn at_most_one_device_per_mac() {
        let (mut connector, _guards) = connector();

        connector.setup_entry("attic", ENTRY.as_bytes()).await.unwrap();
        connector.setup_entry("attic", ENTRY.as_bytes()).await.unwrap();
        connector
            .setup_entry(
                "attic-renamed",
                r#"{"name":"other name","host":"192.0.2.99","mac":"00:1a:2b:3c:4d:5e"}"#.as_bytes(),
            )
            .await
            .unwrap();

        assert_eq!(connector.devices.len(), 1);
    }

    #[tokio::test]
    async fn distinct_macs_get_distinct_devices() {
        let (mut connector, _guards) = connector();

        connector.setup_entry("attic", ENTRY.as_bytes()).await.unwrap();
        connector
            .setup_entry(
                "basement",
                r#"{"name":"basement","host":"192.0.2.11","mac":"00:1a:2b:3c:4d:5f"}"#.as_bytes(),
            )
            .await
            .unwrap();

        assert_eq!(connector.devices.len(), 2);
    }

    #[tokio::test]
    async fn invalid_entries_are_skipped() {
        let (mut connector, _guards) = connector();

        connector.setup_entry("attic", b"{not json").await.unwrap();

        assert_eq!(connector.devices.len(), 0);
    }
}
