use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use rumqttc::{
    mqttbytes::matches as matches_topic, AsyncClient, Event, EventLoop, Incoming, MqttOptions,
    Publish, QoS,
};
use tokio::{
    select,
    sync::mpsc::{channel, Receiver, Sender},
};
use tracing::{debug, info, warn};

use crate::shutdown::Shutdown;
use crate::Error;

/// A message received on a subscribed topic.
#[derive(Debug)]
pub struct Payload {
    pub topic: String,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub(crate) enum Request {
    Publish {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    Subscribe {
        filter: String,
        tx: Sender<Payload>,
    },
}

pub(crate) async fn new(options: MqttOptions, shutdown: Shutdown) -> Connection {
    let (client, event_loop) = AsyncClient::new(options, 32);
    let (tx, rx) = channel(32);

    Connection {
        subscriptions: HashMap::new(),
        tx,
        rx,
        client,
        event_loop,
        shutdown,
    }
}

// Maintain internal subscriptions as well as MQTT subscriptions. Relay all received messages on
// MQTT subscribed topics to internal components who have a matching topic filter.
pub(crate) struct Connection {
    subscriptions: HashMap<String, Vec<Sender<Payload>>>,
    tx: Sender<Request>,
    rx: Receiver<Request>,
    client: AsyncClient,
    event_loop: EventLoop,
    shutdown: Shutdown,
}

impl Connection {
    pub fn handle(&self) -> Handle {
        Handle {
            prefix: String::new(),
            tx: self.tx.clone(),
        }
    }

    pub async fn run(&mut self) -> crate::Result<()> {
        loop {
            select! {
                event = self.event_loop.poll() => {
                    match event {
                        Ok(event) => self.handle_event(event).await?,
                        Err(error) => {
                            // rumqttc reconnects on the next poll; back off so a dead broker
                            // doesn't spin this loop.
                            warn!(%error, "MQTT connection lost");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
                request = self.rx.recv() => {
                    match request {
                        None => return Ok(()),
                        Some(request) => self.handle_request(request).await?,
                    }
                }
                _ = self.shutdown.recv() => return Ok(()),
            }
        }
    }

    async fn handle_event(&mut self, event: Event) -> crate::Result<()> {
        match event {
            Event::Incoming(Incoming::ConnAck(_)) => {
                info!("Connected to MQTT broker");

                // The broker forgets our subscriptions across reconnects.
                for filter in self.subscriptions.keys() {
                    self.client.subscribe(filter.clone(), QoS::AtLeastOnce).await?;
                }
            }
            Event::Incoming(Incoming::Publish(Publish { topic, payload, .. })) => {
                debug!(%topic, ?payload, "publish");
                self.handle_data(topic, payload).await?;
            }
            _ => {}
        }

        Ok(())
    }

    async fn handle_data(&mut self, topic: String, payload: Bytes) -> crate::Result<()> {
        let mut targets = vec![];

        // Remove subscriptions whose channels are closed, adding matching channels to `targets`.
        self.subscriptions.retain(|filter, channels| {
            if matches_topic(&topic, filter) {
                channels.retain(|channel| {
                    if channel.is_closed() {
                        false
                    } else {
                        targets.push(channel.clone());
                        true
                    }
                });
                !channels.is_empty()
            } else {
                true
            }
        });

        for target in targets {
            let payload = Payload {
                topic: topic.clone(),
                bytes: payload.clone(),
            };
            if target.send(payload).await.is_err() {
                // Closed channels are pruned on the next matching publish.
            }
        }
        Ok(())
    }

    async fn handle_request(&mut self, request: Request) -> crate::Result<()> {
        match request {
            Request::Publish {
                topic,
                payload,
                retain,
            } => {
                self.client
                    .publish(topic, QoS::AtLeastOnce, retain, payload)
                    .await?
            }
            Request::Subscribe { filter, tx } => {
                self.subscriptions.entry(filter.clone()).or_default().push(tx);
                self.client.subscribe(filter, QoS::AtLeastOnce).await?
            }
        }
        Ok(())
    }
}

/// Cheap cloneable handle for publishing and subscribing under a topic
/// prefix. `scoped` derives narrower handles, e.g. per device or per entity.
#[derive(Clone, Debug)]
pub struct Handle {
    prefix: String,
    tx: Sender<Request>,
}

impl Handle {
    pub fn scoped(&self, part: impl AsRef<str>) -> Handle {
        Handle {
            prefix: self.topic(part.as_ref()),
            tx: self.tx.clone(),
        }
    }

    /// Handle without any prefix, for topics owned by other parties
    /// (e.g. the Home Assistant discovery namespace).
    pub fn root(&self) -> Handle {
        Handle {
            prefix: String::new(),
            tx: self.tx.clone(),
        }
    }

    /// The full topic for a suffix under this handle's prefix.
    pub fn topic(&self, suffix: &str) -> String {
        if self.prefix.is_empty() {
            suffix.to_owned()
        } else {
            format!("{}/{}", self.prefix, suffix)
        }
    }

    pub async fn publish(
        &self,
        topic: impl AsRef<str>,
        payload: impl Into<Vec<u8>>,
    ) -> crate::Result<()> {
        self.send(Request::Publish {
            topic: self.topic(topic.as_ref()),
            payload: payload.into(),
            retain: false,
        })
        .await
    }

    pub async fn publish_retained(
        &self,
        topic: impl AsRef<str>,
        payload: impl Into<Vec<u8>>,
    ) -> crate::Result<()> {
        self.send(Request::Publish {
            topic: self.topic(topic.as_ref()),
            payload: payload.into(),
            retain: true,
        })
        .await
    }

    pub async fn subscribe(&self, filter: &str) -> crate::Result<Receiver<Payload>> {
        let (tx, rx) = channel(32);
        self.send(Request::Subscribe {
            filter: self.topic(filter),
            tx,
        })
        .await?;
        Ok(rx)
    }

    async fn send(&self, request: Request) -> crate::Result<()> {
        self.tx.send(request).await.map_err(|_| Error::SendError)
    }
}

#[cfg(test)]
pub(crate) fn test_handle(prefix: &str) -> (Handle, Receiver<Request>) {
    let (tx, rx) = channel(32);
    (
        Handle {
            prefix: prefix.to_owned(),
            tx,
        },
        rx,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn scoped_handles_nest_prefixes() {
        let (handle, _rx) = test_handle("easycontrols");
        let device = handle.scoped("001a2b3c4d5e");
        let entity = device.scoped("bypass");

        assert_eq!(entity.topic("state"), "easycontrols/001a2b3c4d5e/bypass/state");
        assert_eq!(device.root().topic("homeassistant/x"), "homeassistant/x");
    }

    #[tokio::test]
    async fn publish_carries_full_topic_and_retain_flag() {
        let (handle, mut rx) = test_handle("easycontrols");

        handle.publish_retained("status", "online").await.unwrap();

        match rx.recv().await.unwrap() {
            Request::Publish {
                topic,
                payload,
                retain,
            } => {
                assert_eq!(topic, "easycontrols/status");
                assert_eq!(payload, b"online".to_vec());
                assert!(retain);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }
}
