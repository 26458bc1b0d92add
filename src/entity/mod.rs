use std::time::Duration;

use async_trait::async_trait;

pub mod binary_sensor;
pub mod fan;
pub mod sensor;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Presentation metadata for one entity, mirrored into the Home Assistant
/// discovery payload.
#[derive(Clone, Debug)]
pub struct EntityDescription {
    pub key: &'static str,
    pub name: String,
    pub icon: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub entity_category: Option<&'static str>,
    pub unit_of_measurement: Option<&'static str>,
    pub interval: Duration,
}

impl EntityDescription {
    pub fn new(key: &'static str, device_name: &str, label: &str) -> Self {
        Self {
            key,
            name: format!("{device_name} {label}"),
            icon: None,
            device_class: None,
            entity_category: None,
            unit_of_measurement: None,
            interval: DEFAULT_INTERVAL,
        }
    }

    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn device_class(mut self, device_class: &'static str) -> Self {
        self.device_class = Some(device_class);
        self
    }

    pub fn diagnostic(mut self) -> Self {
        self.entity_category = Some("diagnostic");
        self
    }

    pub fn unit(mut self, unit_of_measurement: &'static str) -> Self {
        self.unit_of_measurement = Some(unit_of_measurement);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// The update/value contract the bridge needs from an entity. Adapters poll
/// their controller once per tick and expose whatever they last saw; a failed
/// poll simply leaves them unavailable until the next cycle.
#[async_trait]
pub trait Entity: Send + Sync {
    /// Home Assistant component this entity belongs to ("sensor", ...).
    fn component(&self) -> &'static str;

    fn description(&self) -> &EntityDescription;

    fn unique_id(&self) -> String;

    /// Refresh state from the controller.
    async fn update(&mut self);

    fn available(&self) -> bool;

    /// Topic-suffix / payload pairs to publish after an update. Empty while
    /// the entity is unavailable.
    fn states(&self) -> Vec<(&'static str, String)>;
}
