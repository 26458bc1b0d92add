use serde::Serialize;

use crate::entity::Entity;
use crate::modbus::controller::Controller;
use crate::mqtt;

/// Device block shared by all of a unit's entity discovery payloads, built
/// from the identity the controller cached at connect time.
#[derive(Clone, Debug, Serialize)]
pub struct DeviceInfo {
    connections: Vec<(&'static str, String)>,
    identifiers: Vec<String>,
    name: String,
    manufacturer: &'static str,
    model: String,
    sw_version: String,
    configuration_url: String,
}

impl DeviceInfo {
    pub fn new(controller: &Controller) -> Self {
        Self {
            connections: vec![("mac", controller.mac().to_string())],
            identifiers: vec![controller.serial_number().to_owned()],
            name: controller.device_name().to_owned(),
            manufacturer: "Helios",
            model: controller.model().to_owned(),
            sw_version: controller.version().to_owned(),
            configuration_url: format!("http://{}", controller.host()),
        }
    }
}

#[derive(Debug, Serialize)]
struct EntityConfig<'a> {
    name: &'a str,
    unique_id: String,
    state_topic: String,
    availability_topic: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    device_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    entity_category: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unit_of_measurement: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<&'static str>,

    // Fans report their speed on a separate topic. The command topic is
    // required by Home Assistant's schema; the bridge does not act on it.
    #[serde(skip_serializing_if = "Option::is_none")]
    percentage_state_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    command_topic: Option<String>,

    device: DeviceInfo,
}

fn entity_config<'a>(
    device_mqtt: &mqtt::Handle,
    device: DeviceInfo,
    entity: &'a dyn Entity,
) -> EntityConfig<'a> {
    let description = entity.description();
    let scoped = device_mqtt.scoped(description.key);
    let is_fan = entity.component() == "fan";

    EntityConfig {
        name: &description.name,
        unique_id: entity.unique_id(),
        state_topic: scoped.topic("state"),
        availability_topic: scoped.topic("availability"),
        device_class: description.device_class,
        entity_category: description.entity_category,
        unit_of_measurement: description.unit_of_measurement,
        icon: description.icon,
        percentage_state_topic: is_fan.then(|| scoped.topic("percentage")),
        command_topic: is_fan.then(|| scoped.topic("command")),
        device,
    }
}

/// Describes the unit's entities to Home Assistant, retained so they survive
/// a Home Assistant restart.
pub(crate) async fn announce(
    device_mqtt: &mqtt::Handle,
    controller: &Controller,
    entities: &[Box<dyn Entity>],
) -> crate::Result<()> {
    let root = device_mqtt.root();
    let device = DeviceInfo::new(controller);

    for entity in entities {
        let config = entity_config(device_mqtt, device.clone(), entity.as_ref());
        let topic = format!(
            "homeassistant/{}/{}/config",
            entity.component(),
            entity.unique_id()
        );
        root.publish_retained(topic, serde_json::to_vec(&config)?).await?;
    }

    Ok(())
}
