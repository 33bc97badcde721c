//! Locations service.

use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use super::require_data;
use crate::client::{RequestDescriptor, RequestPipeline};
use crate::errors::EvnexResult;

/// Locations service.
pub struct LocationsService {
    pipeline: Arc<RequestPipeline>,
}

impl LocationsService {
    /// Creates a new locations service.
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Gets a location.
    ///
    /// The request is built as an absolute URL and sent verbatim.
    #[instrument(skip(self))]
    pub async fn get(&self, location_id: &str) -> EvnexResult<Value> {
        let url = format!(
            "{}/v2/apps/locations/{}",
            self.pipeline.config().base_url,
            location_id
        );
        let response = self
            .pipeline
            .execute(RequestDescriptor::get("get_location_detail", url))
            .await?;
        require_data(response)
    }
}

impl std::fmt::Debug for LocationsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationsService").finish()
    }
}
