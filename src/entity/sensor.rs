use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Entity, EntityDescription};
use crate::modbus::controller::Controller;
use crate::modbus::variable::{ModbusVariable, Value};
use crate::modbus::variables;

/// Represents a numeric or string Modbus variable as a sensor.
pub struct Sensor {
    controller: Arc<Controller>,
    variable: ModbusVariable,
    description: EntityDescription,
    value: Option<Value>,
}

impl Sensor {
    pub fn new(
        controller: Arc<Controller>,
        variable: ModbusVariable,
        description: EntityDescription,
    ) -> Self {
        Self {
            controller,
            variable,
            description,
            value: None,
        }
    }
}

#[async_trait]
impl Entity for Sensor {
    fn component(&self) -> &'static str {
        "sensor"
    }

    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn unique_id(&self) -> String {
        format!("{}_{}", self.controller.mac().topic_id(), self.description.key)
    }

    async fn update(&mut self) {
        self.value = self.controller.get_variable(&self.variable).await;
    }

    fn available(&self) -> bool {
        self.value.is_some()
    }

    fn states(&self) -> Vec<(&'static str, String)> {
        match &self.value {
            Some(value) => vec![("state", render(value))],
            None => vec![],
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::Bool(on) => if *on { "ON" } else { "OFF" }.to_owned(),
        Value::Numeric(decimal) => decimal.normalize().to_string(),
        Value::String(text) => text.clone(),
    }
}

pub(crate) fn entities(controller: &Arc<Controller>) -> Vec<Box<dyn Entity>> {
    let device_name = controller.device_name();

    let temperatures = [
        ("outside_air_temperature", "outside air temperature", variables::OUTSIDE_AIR_TEMPERATURE),
        ("supply_air_temperature", "supply air temperature", variables::SUPPLY_AIR_TEMPERATURE),
        ("extract_air_temperature", "extract air temperature", variables::EXTRACT_AIR_TEMPERATURE),
        ("exhaust_air_temperature", "exhaust air temperature", variables::EXHAUST_AIR_TEMPERATURE),
    ];

    temperatures
        .into_iter()
        .map(|(key, label, variable)| {
            Box::new(Sensor::new(
                controller.clone(),
                variable,
                EntityDescription::new(key, device_name, label)
                    .device_class("temperature")
                    .unit("°C")
                    .interval(Duration::from_secs(60)),
            )) as Box<dyn Entity>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::controller::testing::{controller, FakeUnit};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn renders_scaled_temperatures() {
        let unit = FakeUnit::with_identity();
        unit.load(
            &variables::OUTSIDE_AIR_TEMPERATURE,
            &Value::Numeric(Decimal::new(-54, 1)),
        );
        let controller = Arc::new(controller(unit).await);

        let mut sensor = Sensor::new(
            controller.clone(),
            variables::OUTSIDE_AIR_TEMPERATURE,
            EntityDescription::new("outside_air_temperature", controller.device_name(), "outside air temperature"),
        );
        sensor.update().await;

        assert!(sensor.available());
        assert_eq!(sensor.states(), vec![("state", "-5.4".to_owned())]);
    }

    #[tokio::test]
    async fn missed_poll_leaves_the_sensor_unavailable() {
        let controller = Arc::new(controller(FakeUnit::with_identity()).await);

        let mut sensor = Sensor::new(
            controller.clone(),
            variables::SUPPLY_AIR_TEMPERATURE,
            EntityDescription::new("supply_air_temperature", controller.device_name(), "supply air temperature"),
        );
        sensor.update().await;

        assert!(!sensor.available());
        assert_eq!(sensor.states(), vec![]);
    }
}
