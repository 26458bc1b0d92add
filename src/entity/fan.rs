use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;

use super::{Entity, EntityDescription};
use crate::modbus::controller::Controller;
use crate::modbus::variables::{self, MAX_FAN_STAGE};

/// Surfaces the ventilation fan's running state and speed. Speed control is
/// left to the unit's own automatic programs; the bridge only reports.
pub struct Fan {
    controller: Arc<Controller>,
    description: EntityDescription,
    stage: Option<u8>,
}

impl Fan {
    pub fn new(controller: Arc<Controller>, description: EntityDescription) -> Self {
        Self {
            controller,
            description,
            stage: None,
        }
    }
}

/// Maps a fan stage onto the 0-100 percentage scale Home Assistant expects.
fn percentage(stage: u8) -> u8 {
    let stage = stage.min(MAX_FAN_STAGE);
    (u16::from(stage) * 100 / u16::from(MAX_FAN_STAGE)) as u8
}

#[async_trait]
impl Entity for Fan {
    fn component(&self) -> &'static str {
        "fan"
    }

    fn description(&self) -> &EntityDescription {
        &self.description
    }

    fn unique_id(&self) -> String {
        format!("{}_{}", self.controller.mac().topic_id(), self.description.key)
    }

    async fn update(&mut self) {
        self.stage = self
            .controller
            .get_variable(&variables::FAN_STAGE)
            .await
            .and_then(|value| value.as_decimal())
            .and_then(|decimal| decimal.to_u8());
    }

    fn available(&self) -> bool {
        self.stage.is_some()
    }

    fn states(&self) -> Vec<(&'static str, String)> {
        match self.stage {
            Some(stage) => vec![
                ("state", if stage > 0 { "ON" } else { "OFF" }.to_owned()),
                ("percentage", percentage(stage).to_string()),
            ],
            None => vec![],
        }
    }
}

pub(crate) fn entities(controller: &Arc<Controller>) -> Vec<Box<dyn Entity>> {
    let device_name = controller.device_name();

    vec![Box::new(Fan::new(
        controller.clone(),
        EntityDescription::new("fan", device_name, "fan")
            .icon("mdi:fan")
            .interval(Duration::from_secs(15)),
    ))]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modbus::controller::testing::{controller, FakeUnit};
    use crate::modbus::variable::Value;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    #[test]
    fn stages_map_onto_percentage_steps() {
        assert_eq!(percentage(0), 0);
        assert_eq!(percentage(1), 25);
        assert_eq!(percentage(2), 50);
        assert_eq!(percentage(4), 100);
        // Stages past the known maximum clamp rather than overflow.
        assert_eq!(percentage(9), 100);
    }

    #[tokio::test]
    async fn reports_running_state_and_speed() {
        let unit = FakeUnit::with_identity();
        unit.load(&variables::FAN_STAGE, &Value::Numeric(Decimal::TWO));
        let controller = Arc::new(controller(unit).await);

        let mut fan = Fan::new(
            controller.clone(),
            EntityDescription::new("fan", controller.device_name(), "fan"),
        );
        fan.update().await;

        assert!(fan.available());
        assert_eq!(
            fan.states(),
            vec![
                ("state", "ON".to_owned()),
                ("percentage", "50".to_owned())
            ]
        );
    }

    #[tokio::test]
    async fn stage_zero_is_off() {
        let unit = FakeUnit::with_identity();
        unit.load(&variables::FAN_STAGE, &Value::Numeric(Decimal::ZERO));
        let controller = Arc::new(controller(unit).await);

        let mut fan = Fan::new(
            controller.clone(),
            EntityDescription::new("fan", controller.device_name(), "fan"),
        );
        fan.update().await;

        assert_eq!(
            fan.states(),
            vec![
                ("state", "OFF".to_owned()),
                ("percentage", "0".to_owned())
            ]
        );
    }
}
