use std::sync::Arc;

use async_trait::async_trait;

use super::{Entity, EntityDescription};
use crate::modbus::controller::Controller;
use crate::modbus::variable::ModbusVariable;
use crate::modbus::variables;

/// Represents a boolean Modbus variable as a binary sensor.
pub struct BinarySensor {
    controller: Arc<Controller>,
    variable: ModbusVariable,
    description: EntityDescription,
    is_on: Option<bool>,
}

impl BinarySensor {
    pub fn new(
        controller: Arc<Controller>,
        variable: ModbusVariable,
        description: EntityDescription,
    ) -> Self {
        Self {
            controller,
            variable,
            description,
            is_on: None,
        }
    }
}

#[async_trait]
impl Entity for BinarySensor {
    fn component(&self) -> &'static str {
        "binary_sensor"
    }

    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn unique_id(&self) -> String {
        format!("{}_{}", self.controller.mac().topic_id(), self.description.key)
    }

    async fn update(&mut self) {
        self.is_on = self
            .controller
            .get_variable(&self.variable)
            .await
            .and_then(|value| value.as_bool());
    }

    fn available(&self) -> bool {
        self.is_on.is_some()
    }

    fn states(&self) -> Vec<(&'static str, String)> {
        match self.is_on {
            Some(on) => vec![("state", if on { "ON" } else { "OFF" }.to_owned())],
            None => vec![],
        }
    }
}

pub(crate) fn entities(controller: &Arc<Controller>) -> Vec<Box<dyn Entity>> {
    let device_name = controller.device_name();

    vec![
        Box::new(BinarySensor::new(
            controller.clone(),
            variables::BYPASS,
            EntityDescription::new("bypass", device_name, "bypass")
                .icon("mdi:delta")
                .device_class("opening")
                .diagnostic(),
        )),
        Box::new(BinarySensor::new(
            controller.clone(),
            variables::FILTER_CHANGE,
            EntityDescription::new("filter_change", device_name, "filter change")
                .icon("mdi:air-filter")
                .device_class("problem")
                .diagnostic(),
        )),
        Box::new(BinarySensor::new(
            controller.clone(),
            variables::PARTY_MODE,
            EntityDescription::new("party_mode", device_name, "party mode")
                .icon("mdi:party-popper"),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::controller::testing::{controller, FakeUnit};
    use crate::modbus::variable::Value;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn reflects_the_register_state() {
        let unit = FakeUnit::with_identity();
        unit.load(&variables::BYPASS, &Value::Bool(true));
        let controller = Arc::new(controller(unit).await);

        let mut sensor = BinarySensor::new(
            controller.clone(),
            variables::BYPASS,
            EntityDescription::new("bypass", controller.device_name(), "bypass"),
        );
        sensor.update().await;

        assert!(sensor.available());
        assert_eq!(sensor.states(), vec![("state", "ON".to_owned())]);

        controller
            .set_variable(&variables::BYPASS, &Value::Bool(false))
            .await
            .unwrap();
        sensor.update().await;

        assert_eq!(sensor.states(), vec![("state", "OFF".to_owned())]);
    }

    #[tokio::test]
    async fn failed_poll_marks_the_sensor_unavailable() {
        // The bypass register is never loaded, so every poll fails.
        let controller = Arc::new(controller(FakeUnit::with_identity()).await);

        let mut sensor = BinarySensor::new(
            controller.clone(),
            variables::BYPASS,
            EntityDescription::new("bypass", controller.device_name(), "bypass"),
        );
        sensor.update().await;

        assert!(!sensor.available());
        assert_eq!(sensor.states(), vec![]);
    }

    #[tokio::test]
    async fn unique_ids_are_scoped_by_mac() {
        let controller = Arc::new(controller(FakeUnit::with_identity()).await);
        let entities = entities(&controller);

        assert_eq!(entities[0].unique_id(), "001a2b3c4d5e_bypass");
        assert_eq!(entities[1].unique_id(), "001a2b3c4d5e_filter_change");
    }
}
