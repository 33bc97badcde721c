//! Organisations service.

use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use super::require_data;
use crate::client::{RequestDescriptor, RequestPipeline};
use crate::errors::EvnexResult;
use crate::types::{ChargePointList, CommandOutcome, StopTransactionRequest};

/// Organisations service: organisation details, their charge points and
/// organisation-scoped commands.
pub struct OrganisationsService {
    pipeline: Arc<RequestPipeline>,
}

impl OrganisationsService {
    /// Creates a new organisations service.
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Gets an organisation.
    #[instrument(skip(self))]
    pub async fn get(&self, org_id: &str) -> EvnexResult<Value> {
        let path = format!("/v2/apps/organisations/{}", org_id);
        let response = self
            .pipeline
            .execute(RequestDescriptor::get("get_organisation", path))
            .await?;
        require_data(response)
    }

    /// Lists the charge points of an organisation.
    #[instrument(skip(self))]
    pub async fn charge_points(&self, org_id: &str) -> EvnexResult<ChargePointList> {
        let path = format!("/v2/apps/organisations/{}/charge-points", org_id);
        let response = self
            .pipeline
            .execute(RequestDescriptor::get("get_org_charge_points", path))
            .await?;
        require_data(response).map(ChargePointList::from)
    }

    /// Gets the organisation's usage summary over the last `days` days.
    #[instrument(skip(self))]
    pub async fn insights(&self, org_id: &str, days: u32) -> EvnexResult<Value> {
        let path = format!(
            "/v2/apps/organisations/{}/summary/insights?days={}",
            org_id, days
        );
        let response = self
            .pipeline
            .execute(RequestDescriptor::get("get_org_insight", path))
            .await?;
        require_data(response)
    }

    /// Stops the transaction running on a connector.
    ///
    /// Success carries the command status (normally `Accepted`) and no data.
    #[instrument(skip(self))]
    pub async fn stop_transaction(
        &self,
        org_id: &str,
        charge_point_id: &str,
        connector_id: u32,
    ) -> EvnexResult<CommandOutcome> {
        let path = format!(
            "/v2/apps/organisations/{}/charge-points/{}/commands/remote-stop-transaction",
            org_id, charge_point_id
        );
        let descriptor = RequestDescriptor::post(
            "stop_charge_point",
            path,
            &StopTransactionRequest { connector_id },
        )?;
        let response = self.pipeline.execute(descriptor).await?;
        Ok(CommandOutcome::from(response))
    }
}

impl std::fmt::Debug for OrganisationsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrganisationsService").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EvnexError;
    use crate::mocks::{fixtures, MockResponse};
    use crate::services::test_support::pipeline;
    use crate::transport::HttpMethod;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_organisation() {
        let (pipeline, transport) =
            pipeline(vec![MockResponse::data(json!({"id": "o1", "name": "Home"}))]);
        let service = OrganisationsService::new(pipeline);

        let org = service.get("o1").await.unwrap();

        assert_eq!(org, json!({"id": "o1", "name": "Home"}));
        assert_eq!(
            transport.last_request().unwrap().url,
            "https://client-api.evnex.io/v2/apps/organisations/o1"
        );
    }

    #[tokio::test]
    async fn test_charge_points() {
        let (pipeline, transport) = pipeline(vec![MockResponse::data(fixtures::charge_points())]);
        let service = OrganisationsService::new(pipeline);

        let list = service.charge_points("o1").await.unwrap();

        assert_eq!(list.first().and_then(|cp| cp.id().map(str::to_string)).as_deref(), Some("cp1"));
        assert_eq!(
            transport.last_request().unwrap().url,
            "https://client-api.evnex.io/v2/apps/organisations/o1/charge-points"
        );
    }

    #[tokio::test]
    async fn test_insights_query() {
        let (pipeline, transport) = pipeline(vec![MockResponse::data(json!([]))]);
        let service = OrganisationsService::new(pipeline);

        service.insights("o1", 7).await.unwrap();

        assert_eq!(
            transport.last_request().unwrap().url,
            "https://client-api.evnex.io/v2/apps/organisations/o1/summary/insights?days=7"
        );
    }

    #[tokio::test]
    async fn test_stop_transaction_accepted() {
        let (pipeline, transport) = pipeline(vec![MockResponse::json(&json!({
            "data": null,
            "error": null,
            "response": {"status": "Accepted"}
        }))]);
        let service = OrganisationsService::new(pipeline);

        let outcome = service.stop_transaction("o1", "cp1", 1).await.unwrap();

        assert!(outcome.is_accepted());
        assert!(outcome.data.is_none());
        let request = transport.last_request().unwrap();
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.url,
            concat!(
                "https://client-api.evnex.io/v2/apps/organisations/o1",
                "/charge-points/cp1/commands/remote-stop-transaction"
            )
        );
        assert_eq!(request.json_body(), Some(json!({"connectorId": 1})));
    }

    #[tokio::test]
    async fn test_stop_transaction_business_error() {
        let (pipeline, _) =
            pipeline(vec![MockResponse::business_error(json!("Charge point offline"))]);
        let service = OrganisationsService::new(pipeline);

        let err = service.stop_transaction("o1", "cp1", 1).await.unwrap_err();
        assert!(matches!(err, EvnexError::Business { .. }));
    }
}
