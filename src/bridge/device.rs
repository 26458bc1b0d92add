use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use serde::Serialize;
use tokio::select;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::ConfigEntry;
use crate::entity::{self, Entity};
use crate::homeassistant;
use crate::modbus::controller::Controller;
use crate::mqtt;
use crate::shutdown::Shutdown;

const RETRY_DELAY: Duration = Duration::from_secs(30);

pub(crate) struct Handle {
    task: JoinHandle<()>,
}

impl Handle {
    pub(crate) fn abort(&self) {
        self.task.abort();
    }
}

pub(crate) fn spawn(entry: ConfigEntry, mqtt: mqtt::Handle, shutdown: Shutdown) -> Handle {
    let task = tokio::spawn(async move {
        if let Err(error) = run(entry, mqtt, shutdown).await {
            error!(?error, "device task failed");
        }
    });

    Handle { task }
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum DeviceState {
    Connected,
    Unreachable,
}

#[derive(Serialize)]
struct DeviceStatus<'a> {
    status: DeviceState,

    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    serial_number: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<&'a str>,
}

impl<'a> DeviceStatus<'a> {
    fn unreachable() -> Self {
        Self {
            status: DeviceState::Unreachable,
            model: None,
            serial_number: None,
            version: None,
        }
    }

    fn connected(controller: &'a Controller) -> Self {
        Self {
            status: DeviceState::Connected,
            model: Some(controller.model()),
            serial_number: Some(controller.serial_number()),
            version: Some(controller.version()),
        }
    }
}

#[tracing::instrument(skip_all, fields(device = %entry.name, mac = %entry.mac))]
async fn run(entry: ConfigEntry, mqtt: mqtt::Handle, mut shutdown: Shutdown) -> crate::Result<()> {
    let mqtt = mqtt.scoped(entry.mac.topic_id());

    // Setup failure is not fatal to the bridge: report it and try again
    // later, the unit may simply be rebooting.
    let controller = loop {
        match Controller::connect(&entry).await {
            Ok(controller) => break Arc::new(controller),
            Err(error) => {
                warn!(%error, host = %entry.host, "ventilation unit unreachable");
                mqtt.publish_retained("status", serde_json::to_vec(&DeviceStatus::unreachable())?)
                    .await?;

                select! {
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                    _ = shutdown.recv() => return Ok(()),
                }
            }
        }
    };

    info!(
        model = %controller.model(),
        serial_number = %controller.serial_number(),
        version = %controller.version(),
        "connected to ventilation unit"
    );
    mqtt.publish_retained(
        "status",
        serde_json::to_vec(&DeviceStatus::connected(&controller))?,
    )
    .await?;

    let mut entities: Vec<Box<dyn Entity>> = Vec::new();
    entities.extend(entity::binary_sensor::entities(&controller));
    entities.extend(entity::sensor::entities(&controller));
    entities.extend(entity::fan::entities(&controller));

    homeassistant::announce(&mqtt, &controller, &entities).await?;

    for (period, entities) in poll_groups(&entry, entities) {
        let mqtt = mqtt.clone();
        let shutdown = shutdown.clone();

        tokio::spawn(async move {
            if let Err(error) = poll(period, entities, mqtt, shutdown).await {
                error!(?error, "poll loop failed");
            }
        });
    }

    shutdown.recv().await;
    Ok(())
}

fn interval_for(entry: &ConfigEntry, entity: &dyn Entity) -> Duration {
    entry.poll_interval.unwrap_or(entity.description().interval)
}

/// One poll loop per distinct cadence. `chunk_by` only merges adjacent
/// entities, so they are ordered by cadence first.
fn poll_groups(
    entry: &ConfigEntry,
    mut entities: Vec<Box<dyn Entity>>,
) -> Vec<(Duration, Vec<Box<dyn Entity>>)> {
    entities.sort_by_key(|entity| interval_for(entry, entity.as_ref()));
    let chunks = entities
        .into_iter()
        .chunk_by(|entity| interval_for(entry, entity.as_ref()));

    let mut groups = Vec::new();
    for (period, group) in &chunks {
        groups.push((period, group.collect()));
    }
    groups
}

async fn poll(
    period: Duration,
    mut entities: Vec<Box<dyn Entity>>,
    mqtt: mqtt::Handle,
    mut shutdown: Shutdown,
) -> crate::Result<()> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        select! {
            _ = ticker.tick() => {
                for entity in &mut entities {
                    entity.update().await;

                    let scoped = mqtt.scoped(entity.description().key);
                    let availability = if entity.available() { "online" } else { "offline" };
                    scoped.publish("availability", availability).await?;

                    for (suffix, payload) in entity.states() {
                        debug!(key = entity.description().key, suffix, %payload, "publishing state");
                        scoped.publish(suffix, payload).await?;
                    }
                }
            }
            _ = shutdown.recv() => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityDescription;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn status_payloads_have_the_expected_shape() {
        let status = serde_json::to_value(DeviceStatus::unreachable()).unwrap();
        assert_eq!(status, json!({"status": "unreachable"}));
    }

    struct Ticker(EntityDescription);

    #[async_trait]
    impl Entity for Ticker {
        fn component(&self) -> &'static str {
            "sensor"
        }

        fn description(&self) -> &EntityDescription {
            &self.0
        }

        fn unique_id(&self) -> String {
            self.0.key.to_owned()
        }

        async fn update(&mut self) {}

        fn available(&self) -> bool {
            false
        }

        fn states(&self) -> Vec<(&'static str, String)> {
            vec![]
        }
    }

    fn ticker(key: &'static str, interval: Duration) -> Box<dyn Entity> {
        Box::new(Ticker(
            EntityDescription::new(key, "ventilation", key).interval(interval),
        ))
    }

    fn entry(poll_interval: Option<&str>) -> ConfigEntry {
        let mut entry = json!({
            "name": "ventilation",
            "host": "10.10.10.12",
            "mac": "00:1a:2b:3c:4d:5e"
        });
        if let Some(period) = poll_interval {
            entry["poll_interval"] = json!(period);
        }
        serde_json::from_value(entry).unwrap()
    }

    fn keys(entities: &[Box<dyn Entity>]) -> Vec<String> {
        entities.iter().map(|entity| entity.unique_id()).collect()
    }

    #[test]
    fn entry_poll_interval_overrides_the_entity_cadence() {
        let entity = ticker("bypass", Duration::from_secs(30));

        assert_eq!(
            interval_for(&entry(None), entity.as_ref()),
            Duration::from_secs(30)
        );
        assert_eq!(
            interval_for(&entry(Some("10s")), entity.as_ref()),
            Duration::from_secs(10)
        );
    }

    #[test]
    fn one_poll_loop_per_distinct_cadence() {
        // Deliberately interleaved so grouping has to reorder them.
        let entities = vec![
            ticker("outside_temperature", Duration::from_secs(60)),
            ticker("fan", Duration::from_secs(15)),
            ticker("supply_temperature", Duration::from_secs(60)),
            ticker("bypass", Duration::from_secs(30)),
        ];

        let groups = poll_groups(&entry(None), entities);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].0, Duration::from_secs(15));
        assert_eq!(keys(&groups[0].1), vec!["fan"]);
        assert_eq!(groups[1].0, Duration::from_secs(30));
        assert_eq!(keys(&groups[1].1), vec!["bypass"]);
        assert_eq!(groups[2].0, Duration::from_secs(60));
        assert_eq!(
            keys(&groups[2].1),
            vec!["outside_temperature", "supply_temperature"]
        );
    }

    #[test]
    fn override_collapses_everything_into_one_loop() {
        let entities = vec![
            ticker("fan", Duration::from_secs(15)),
            ticker("bypass", Duration::from_secs(30)),
            ticker("outside_temperature", Duration::from_secs(60)),
        ];

        let groups = poll_groups(&entry(Some("5s")), entities);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, Duration::from_secs(5));
        assert_eq!(groups[0].1.len(), 3);
    }
}
