//! Users service.

use std::sync::Arc;
use tracing::instrument;

use super::require_data;
use crate::client::{RequestDescriptor, RequestPipeline};
use crate::errors::EvnexResult;
use crate::types::User;

/// Path of the signed-in user's profile.
const USER_PATH: &str = "/v2/apps/user";

/// Users service for the signed-in account.
pub struct UsersService {
    pipeline: Arc<RequestPipeline>,
}

impl UsersService {
    /// Creates a new users service.
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Gets the signed-in user, including their organisations.
    #[instrument(skip(self))]
    pub async fn current(&self) -> EvnexResult<User> {
        let response = self
            .pipeline
            .execute(RequestDescriptor::get("get_user", USER_PATH))
            .await?;
        require_data(response).map(User::from)
    }
}

impl std::fmt::Debug for UsersService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UsersService").finish()
    }
}
