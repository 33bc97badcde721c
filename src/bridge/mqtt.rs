//! MQTT publisher backed by `rumqttc`.

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, MqttOptions, Outgoing, Packet};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Publisher, QoS};
use crate::errors::{EvnexError, EvnexResult};
use crate::transport::TransportError;

/// Capacity of the request channel between the client and its event loop.
const CHANNEL_CAPACITY: usize = 32;

/// How long [`MqttPublisher::disconnect`] waits for queued messages to go out.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Publishes to an MQTT broker.
///
/// The connection's event loop runs on a background task until
/// [`MqttPublisher::disconnect`] is called. Publishing only queues the
/// message; the event loop delivers it once connected.
pub struct MqttPublisher {
    client: AsyncClient,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl MqttPublisher {
    /// Connects to `host:port` as `client_id`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(host: &str, port: u16, client_id: &str) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut event_loop) = AsyncClient::new(options, CHANNEL_CAPACITY);
        let broker = format!("{}:{}", host, port);

        let event_loop = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!(broker = %broker, "Connected to MQTT broker");
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!(broker = %broker, "Disconnected from MQTT broker");
                        break;
                    }
                    Ok(event) => debug!(?event, "MQTT event"),
                    Err(err) => {
                        warn!(broker = %broker, error = %err, "MQTT connection error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self {
            client,
            event_loop: Mutex::new(Some(event_loop)),
        }
    }

    /// Flushes queued messages, disconnects and stops the event loop.
    ///
    /// Gives up after a few seconds if the broker is unreachable.
    pub async fn disconnect(&self) {
        if let Err(err) = self.client.disconnect().await {
            debug!(error = %err, "MQTT disconnect failed");
        }
        let handle = self.event_loop.lock().take();
        if let Some(mut handle) = handle {
            if tokio::time::timeout(FLUSH_TIMEOUT, &mut handle).await.is_err() {
                warn!("MQTT broker did not acknowledge disconnect, dropping queued messages");
                handle.abort();
            }
        }
    }
}

fn to_rumqttc(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> EvnexResult<()> {
        self.client
            .publish(topic, to_rumqttc(qos), false, payload)
            .await
            .map_err(|err| {
                EvnexError::Transport(TransportError::Connection {
                    message: format!("MQTT publish to {} failed: {}", topic, err),
                })
            })
    }
}

impl std::fmt::Debug for MqttPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttPublisher").finish_non_exhaustive()
    }
}
