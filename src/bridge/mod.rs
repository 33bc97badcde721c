//! Message-bus bridge.
//!
//! Polls the account's first charge point and republishes its connector
//! status fields to `{main_topic}/chargepoint-{n}/{field}`. Topic naming
//! lives here; the client only returns data.

#[cfg(feature = "mqtt")]
mod mqtt;

#[cfg(feature = "mqtt")]
pub use mqtt::MqttPublisher;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::client::EvnexClient;
use crate::errors::{EvnexError, EvnexResult};

/// Index of the charge point the bridge publishes under. Only the first
/// charge point of the default organisation is polled.
pub const CHARGE_POINT_INDEX: usize = 0;

/// Delivery guarantee requested for a published message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce,
    /// Acknowledged delivery.
    AtLeastOnce,
    /// Assured single delivery.
    ExactlyOnce,
}

/// Destination for bridged payloads.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes `payload` on `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> EvnexResult<()>;
}

/// Publisher that writes `topic payload` lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutPublisher;

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, _qos: QoS) -> EvnexResult<()> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{} {}", topic, String::from_utf8_lossy(&payload)).map_err(|err| {
            EvnexError::Transport(crate::transport::TransportError::Connection {
                message: err.to_string(),
            })
        })
    }
}

/// Console output selection. Levels are ordered and each one prints
/// everything the levels below it print.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum DebugSelection {
    /// No console output.
    #[default]
    None,
    /// Connector status fields.
    Status,
    /// Charge point activity.
    Activity,
    /// Everything.
    All,
}

impl DebugSelection {
    /// Returns true if connector status is printed.
    pub fn shows_status(self) -> bool {
        self >= Self::Status
    }

    /// Returns true if activity is printed.
    pub fn shows_activity(self) -> bool {
        self >= Self::Activity
    }
}

/// Converts a fetched value into a message payload. Strings are sent
/// without JSON quoting.
pub fn payload_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::String(s) => s.clone().into_bytes(),
        other => other.to_string().into_bytes(),
    }
}

/// Runs `fetch` and publishes its result on `topic`.
///
/// A failed fetch or publish is logged and skipped, so a poll cycle can
/// carry on; returns whether a message went out.
pub async fn fetch_and_publish<P, F, T>(publisher: &P, topic: &str, fetch: F) -> bool
where
    P: Publisher + ?Sized,
    F: Future<Output = EvnexResult<T>>,
    T: Serialize,
{
    let value = match fetch.await.and_then(|v| Ok(serde_json::to_value(v)?)) {
        Ok(value) => value,
        Err(err) => {
            warn!(topic, error = %err, "Fetch failed, skipping publish");
            return false;
        }
    };

    match publisher
        .publish(topic, payload_bytes(&value), QoS::AtMostOnce)
        .await
    {
        Ok(()) => true,
        Err(err) => {
            warn!(topic, error = %err, "Publish failed");
            false
        }
    }
}

/// Polls charge point state and republishes it.
pub struct ChargePointBridge {
    client: Arc<EvnexClient>,
    publisher: Arc<dyn Publisher>,
    main_topic: String,
    debug: DebugSelection,
    publish_status: bool,
    publish_activity: bool,
}

impl ChargePointBridge {
    /// Creates a bridge that publishes status under `main_topic`.
    pub fn new(
        client: Arc<EvnexClient>,
        publisher: Arc<dyn Publisher>,
        main_topic: impl Into<String>,
    ) -> Self {
        Self {
            client,
            publisher,
            main_topic: main_topic.into().trim_end_matches('/').to_string(),
            debug: DebugSelection::None,
            publish_status: true,
            publish_activity: false,
        }
    }

    /// Sets the console output selection.
    pub fn with_debug(mut self, debug: DebugSelection) -> Self {
        self.debug = debug;
        self
    }

    /// Enables or disables publishing connector status.
    pub fn publish_status(mut self, enabled: bool) -> Self {
        self.publish_status = enabled;
        self
    }

    /// Enables or disables publishing charge point transactions.
    pub fn publish_activity(mut self, enabled: bool) -> Self {
        self.publish_activity = enabled;
        self
    }

    /// Topic for one field of the charge point at `index`.
    pub fn topic(&self, index: usize, field: &str) -> String {
        format!("{}/chargepoint-{}/{}", self.main_topic, index, field)
    }

    /// Runs one poll cycle and returns the number of messages published.
    ///
    /// Fails if any lookup on the way to the charge point fails; the
    /// caller should treat that as transient and poll again later.
    #[instrument(skip(self), fields(topic = %self.main_topic))]
    pub async fn poll_once(&self) -> EvnexResult<usize> {
        let user = self.client.users().current().await?;
        let org_id = user.default_organisation_id().ok_or_else(|| {
            warn!("User has no default organisation");
            EvnexError::NoData
        })?;

        let organisation = self.client.organisations().get(&org_id).await?;
        let organisation_name = organisation
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        debug!(org_id = %org_id, name = organisation_name, "Polling organisation");

        let charge_points = self.client.organisations().charge_points(&org_id).await?;
        let charge_point_id = charge_points
            .first()
            .and_then(|cp| cp.id().map(str::to_string))
            .ok_or_else(|| {
                warn!(org_id = %org_id, "Organisation has no charge points");
                EvnexError::NoData
            })?;

        let detail = self.client.charge_points().get(&charge_point_id).await?;
        let mut published = 0;

        for connector in detail.connectors() {
            for (field, value) in connector.fields() {
                let Some(value) = value else {
                    debug!(field, "Connector field missing");
                    continue;
                };
                if self.debug.shows_status() {
                    println!("{}", value);
                }
                if self.publish_status {
                    let topic = self.topic(CHARGE_POINT_INDEX, field);
                    self.publisher
                        .publish(&topic, value.as_bytes().to_vec(), QoS::AtMostOnce)
                        .await?;
                    published += 1;
                }
            }
        }

        if self.publish_activity {
            let topic = self.topic(CHARGE_POINT_INDEX, "transactions");
            let fetch = async {
                let transactions = self
                    .client
                    .charge_points()
                    .transactions(&charge_point_id)
                    .await?;
                if self.debug.shows_activity() {
                    println!("{}", transactions);
                }
                Ok::<_, EvnexError>(transactions)
            };
            if fetch_and_publish(self.publisher.as_ref(), &topic, fetch).await {
                published += 1;
            }
        }

        info!(charge_point_id = %charge_point_id, published, "Poll cycle complete");
        Ok(published)
    }
}

impl std::fmt::Debug for ChargePointBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargePointBridge")
            .field("main_topic", &self.main_topic)
            .field("debug", &self.debug)
            .field("publish_status", &self.publish_status)
            .field("publish_activity", &self.publish_activity)
            .finish()
    }
}
