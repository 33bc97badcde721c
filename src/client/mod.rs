//! EVNEX API client.
//!
//! Provides the main client interface for the EVNEX charge-point cloud.

mod descriptor;
mod pipeline;

pub use descriptor::RequestDescriptor;
pub use pipeline::{classify_response, Outcome, RequestPipeline, ACCEPT};

use secrecy::ExposeSecret;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthSession, CognitoIdentityProvider, ExpiryPolicy, IdentityProvider};
use crate::config::{EvnexConfig, EvnexConfigBuilder};
use crate::errors::EvnexResult;
use crate::observability::{DefaultMetricsCollector, MetricsCollector};
use crate::services::{
    ChargePointsService, LocationsService, OrganisationsService, UsersService,
};
use crate::transport::{HttpTransport, ReqwestTransport};

/// The main EVNEX client.
///
/// Logs in lazily on the first call and reuses the session afterwards.
///
/// # Example
///
/// ```rust,no_run
/// use evnex_client::EvnexClient;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = EvnexClient::builder()
///         .credentials("owner@example.com", "password")
///         .build()?;
///
///     let user = client.users().current().await?;
///     if let Some(org_id) = user.default_organisation_id() {
///         let charge_points = client.organisations().charge_points(&org_id).await?;
///         println!("{:?}", charge_points.first().and_then(|cp| cp.id().map(str::to_string)));
///     }
///     Ok(())
/// }
/// ```
pub struct EvnexClient {
    config: Arc<EvnexConfig>,
    pipeline: Arc<RequestPipeline>,
    session: Arc<AuthSession>,
    metrics: Arc<dyn MetricsCollector>,
    cancel: CancellationToken,
    users_service: UsersService,
    organisations_service: OrganisationsService,
    charge_points_service: ChargePointsService,
    locations_service: LocationsService,
}

impl EvnexClient {
    /// Creates a new client builder.
    pub fn builder() -> EvnexClientBuilder {
        EvnexClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `EVNEX_USERNAME` and `EVNEX_PASSWORD`, plus the optional
    /// overrides documented on [`EvnexConfig::from_env`].
    pub fn from_env() -> EvnexResult<Self> {
        let config = EvnexConfig::from_env()?;
        EvnexClientBuilder::from_config(&config).build()
    }

    /// Returns the users service.
    pub fn users(&self) -> &UsersService {
        &self.users_service
    }

    /// Returns the organisations service.
    pub fn organisations(&self) -> &OrganisationsService {
        &self.organisations_service
    }

    /// Returns the charge points service.
    pub fn charge_points(&self) -> &ChargePointsService {
        &self.charge_points_service
    }

    /// Returns the locations service.
    pub fn locations(&self) -> &LocationsService {
        &self.locations_service
    }

    /// Runs an arbitrary request through the authenticated pipeline.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Outcome {
        self.pipeline.execute(descriptor).await
    }

    /// Makes sure a session is established, logging in if needed.
    ///
    /// Returns `false` if the login failed; the failure is logged.
    pub async fn ensure_authenticated(&self) -> bool {
        self.pipeline.ensure_authenticated().await
    }

    /// Returns the authentication session.
    pub fn session(&self) -> &Arc<AuthSession> {
        &self.session
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EvnexConfig {
        &self.config
    }

    /// Returns the token that cancels in-flight calls.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl std::fmt::Debug for EvnexClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvnexClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

/// Builder for the EVNEX client.
pub struct EvnexClientBuilder {
    config_builder: EvnexConfigBuilder,
    transport: Option<Arc<dyn HttpTransport>>,
    http_client: Option<reqwest::Client>,
    identity_provider: Option<Arc<dyn IdentityProvider>>,
    metrics: Option<Arc<dyn MetricsCollector>>,
    cancel: Option<CancellationToken>,
    cognito_endpoint: Option<String>,
}

impl EvnexClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self {
            config_builder: EvnexConfigBuilder::new(),
            transport: None,
            http_client: None,
            identity_provider: None,
            metrics: None,
            cancel: None,
            cognito_endpoint: None,
        }
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: &EvnexConfig) -> Self {
        Self {
            config_builder: EvnexConfigBuilder::new()
                .credentials(config.username(), config.password.expose_secret().as_str())
                .base_url(&config.base_url)
                .user_pool_id(&config.user_pool_id)
                .client_id(&config.client_id)
                .timeout(config.timeout)
                .user_agent(&config.user_agent)
                .reauthenticate_on_expiry(config.reauthenticate_on_expiry)
                .expiry_margin(config.expiry_margin),
            ..Self::new()
        }
    }

    /// Sets the account username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.credentials(username, password);
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config_builder = self.config_builder.base_url(base_url);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config_builder = self.config_builder.timeout(timeout);
        self
    }

    /// Enables re-authentication once the session has expired.
    pub fn reauthenticate_on_expiry(mut self, enabled: bool) -> Self {
        self.config_builder = self.config_builder.reauthenticate_on_expiry(enabled);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses a preconfigured reqwest client instead of the shared one.
    ///
    /// Ignored when a custom [`transport`](Self::transport) is also set.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets a custom identity provider.
    pub fn identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Sets a custom metrics collector.
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Sets the token that cancels in-flight calls.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Overrides the Cognito endpoint used by the default identity provider.
    pub fn cognito_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.cognito_endpoint = Some(endpoint.into());
        self
    }

    /// Builds the client.
    pub fn build(self) -> EvnexResult<EvnexClient> {
        let config = Arc::new(self.config_builder.build()?);

        let transport: Arc<dyn HttpTransport> = match (self.transport, self.http_client) {
            (Some(t), _) => t,
            (None, Some(client)) => Arc::new(ReqwestTransport::with_client(client, config.timeout)),
            (None, None) => Arc::new(ReqwestTransport::new(config.timeout)?),
        };

        let identity_provider: Arc<dyn IdentityProvider> = match self.identity_provider {
            Some(p) => p,
            None => {
                let cognito = CognitoIdentityProvider::new(&config, Arc::clone(&transport));
                Arc::new(match self.cognito_endpoint {
                    Some(endpoint) => cognito.with_endpoint(endpoint),
                    None => cognito,
                })
            }
        };

        let metrics: Arc<dyn MetricsCollector> = self
            .metrics
            .unwrap_or_else(|| Arc::new(DefaultMetricsCollector::new()));

        let policy = ExpiryPolicy {
            reauthenticate: config.reauthenticate_on_expiry,
            margin: config.expiry_margin,
        };
        let session = Arc::new(
            AuthSession::with_policy(config.credentials(), identity_provider, policy)
                .with_metrics(Arc::clone(&metrics)),
        );

        let cancel = self.cancel.unwrap_or_default();
        let pipeline = Arc::new(RequestPipeline::new(
            Arc::clone(&config),
            transport,
            Arc::clone(&session),
            Arc::clone(&metrics),
            cancel.clone(),
        ));

        Ok(EvnexClient {
            users_service: UsersService::new(Arc::clone(&pipeline)),
            organisations_service: OrganisationsService::new(Arc::clone(&pipeline)),
            charge_points_service: ChargePointsService::new(Arc::clone(&pipeline)),
            locations_service: LocationsService::new(Arc::clone(&pipeline)),
            config,
            pipeline,
            session,
            metrics,
            cancel,
        })
    }
}

impl Default for EvnexClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockIdentityProvider, MockResponse, MockTransport};
    use serde_json::json;

    #[test]
    fn test_builder_requires_credentials() {
        let result = EvnexClientBuilder::new().build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_with_mock_transport() {
        let client = EvnexClient::builder()
            .credentials("owner@example.com", "pw")
            .transport(Arc::new(MockTransport::new()))
            .build()
            .unwrap();

        assert_eq!(client.config().base_url, crate::config::DEFAULT_BASE_URL);
        assert!(!format!("{:?}", client).contains("pw\""));
    }

    #[test]
    fn test_from_config_keeps_settings() {
        let config = EvnexConfig::builder()
            .credentials("owner@example.com", "pw")
            .base_url("https://staging.example.com")
            .timeout_secs(5)
            .reauthenticate_on_expiry(true)
            .build()
            .unwrap();

        let client = EvnexClientBuilder::from_config(&config)
            .transport(Arc::new(MockTransport::new()))
            .build()
            .unwrap();

        assert_eq!(client.config().base_url, "https://staging.example.com");
        assert_eq!(client.config().timeout, Duration::from_secs(5));
        assert!(client.config().reauthenticate_on_expiry);
    }

    #[tokio::test]
    async fn test_session_shared_across_services() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::data(json!({"id": "u1"})),
            MockResponse::data(json!({"id": "cp1"})),
        ]));
        let provider = Arc::new(MockIdentityProvider::succeeding());
        let client = EvnexClient::builder()
            .credentials("owner@example.com", "pw")
            .transport(transport.clone())
            .identity_provider(provider.clone())
            .build()
            .unwrap();

        client.users().current().await.unwrap();
        client.charge_points().get("cp1").await.unwrap();

        assert_eq!(provider.authenticate_count(), 1);
        assert_eq!(client.session().exchange_count(), 1);
        assert_eq!(client.metrics().snapshot().total_requests, 2);
    }
}
