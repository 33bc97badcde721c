//! EVNEX Client Library
//!
//! An async Rust client for the EVNEX electric-vehicle charge point cloud,
//! plus a bridge that republishes charge point status to a message bus.
//!
//! # Features
//!
//! - **Cognito SRP login**: the password never leaves the process
//! - **Session caching**: one login shared by every call, single-flight under concurrency
//! - **Envelope handling**: HTTP, business and transport failures kept apart
//! - **Observability**: structured logging with redaction, request metrics
//! - **MQTT bridge**: optional `mqtt` feature backed by `rumqttc`
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use evnex_client::{ChargeSchedule, EvnexClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EvnexClient::builder()
//!         .credentials("owner@example.com", "password")
//!         .build()?;
//!
//!     let user = client.users().current().await?;
//!     let org_id = user.default_organisation_id().unwrap_or_default();
//!
//!     let charge_points = client.organisations().charge_points(&org_id).await?;
//!     for charge_point in charge_points.items() {
//!         let id = charge_point.id().unwrap_or_default();
//!         let detail = client.charge_points().get(id).await?;
//!         println!("{} {:?}", id, detail.connectors());
//!
//!         let schedule = ChargeSchedule::two_period(true, 0, 32, 82_800, 0);
//!         client.charge_points().set_charge_schedule(id, &schedule).await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Failures
//!
//! Every operation returns [`EvnexResult`]. A populated `error` field in a
//! 2xx envelope is reported as [`EvnexError::Business`], never as success.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod bridge;
pub mod client;
pub mod config;
pub mod errors;
pub mod mocks;
pub mod observability;
pub mod services;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{EvnexClient, EvnexClientBuilder, RequestDescriptor};
pub use config::EvnexConfig;
pub use errors::{EvnexError, EvnexResult};

// Type re-exports
pub use types::{
    ApiResponse, ChargePoint, ChargePointList, ChargeSchedule, ChargingProfilePeriod,
    CommandOutcome, ConnectorStatus, OrganisationRef, User,
};
