//! Charge points service.

use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use super::require_data;
use crate::client::{RequestDescriptor, RequestPipeline};
use crate::errors::EvnexResult;
use crate::types::{ChargePoint, ChargeSchedule, CommandOutcome};

/// Charge points service.
pub struct ChargePointsService {
    pipeline: Arc<RequestPipeline>,
}

impl ChargePointsService {
    /// Creates a new charge points service.
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Gets a charge point with its connectors.
    #[instrument(skip(self))]
    pub async fn get(&self, charge_point_id: &str) -> EvnexResult<ChargePoint> {
        let path = format!("/v2/apps/charge-points/{}", charge_point_id);
        let response = self
            .pipeline
            .execute(RequestDescriptor::get("get_charge_point_detail", path))
            .await?;
        require_data(response).map(ChargePoint::from)
    }

    /// Lists the transactions of a charge point.
    #[instrument(skip(self))]
    pub async fn transactions(&self, charge_point_id: &str) -> EvnexResult<Value> {
        let path = format!("/v2/apps/charge-points/{}/transactions", charge_point_id);
        let response = self
            .pipeline
            .execute(RequestDescriptor::get("get_charge_point_transactions", path))
            .await?;
        require_data(response)
    }

    /// Replaces the charge point's daily charge schedule.
    #[instrument(skip(self, schedule), fields(enabled = schedule.enabled))]
    pub async fn set_charge_schedule(
        &self,
        charge_point_id: &str,
        schedule: &ChargeSchedule,
    ) -> EvnexResult<CommandOutcome> {
        let path = format!("/v2/apps/charge-points/{}/charge-schedule", charge_point_id);
        let descriptor = RequestDescriptor::put("set_charge_point_schedule", path, schedule)?;
        let response = self.pipeline.execute(descriptor).await?;
        Ok(CommandOutcome::from(response))
    }
}

impl std::fmt::Debug for ChargePointsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChargePointsService").finish()
    }
}
