use std::future::Future;

use rumqttc::{LastWill, MqttOptions, QoS};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::bridge::connector;
use crate::mqtt;

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum BridgeStatus {
    Running,
    Stopped,
}

pub async fn run<P: Into<String>>(
    prefix: P,
    mut mqtt_options: MqttOptions,
    shutdown: impl Future,
) -> crate::Result<()> {
    let prefix = prefix.into();

    mqtt_options.set_last_will(LastWill {
        topic: format!("{}/status", prefix),
        message: serde_json::to_vec(&json!({
            "status": BridgeStatus::Stopped,
        }))?
        .into(),
        qos: QoS::AtMostOnce,
        retain: false,
    });

    let (notify_shutdown, _) = broadcast::channel(1);
    let mut mqtt_connection = mqtt::new(mqtt_options, notify_shutdown.subscribe().into()).await;

    let handle = mqtt_connection.handle().scoped(&prefix);
    handle
        .publish(
            "status",
            serde_json::to_vec(&json!({
                "status": BridgeStatus::Running,
            }))?,
        )
        .await?;

    let mut connector = connector::new(handle, notify_shutdown.subscribe().into());
    let connector_task = tokio::spawn(async move {
        if let Err(error) = connector.run().await {
            error!(?error, "connector failed");
        }
    });

    let mut ret = Ok(());

    tokio::select! {
        res = mqtt_connection.run() => {
            if let Err(err) = res {
                error!(cause = %err, "MQTT connection error");
                ret = Err(err)
            } else {
                info!("MQTT connection closed")
            }
        }

        _ = shutdown => {
            info!("shutting down");
        }
    }

    drop(notify_shutdown);
    let _ = connector_task.await;

    ret
}
