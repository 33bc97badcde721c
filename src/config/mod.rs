//! Configuration module for the EVNEX client.
//!
//! Holds the account credentials, the API origin and the identity-provider
//! identifiers that scope the login exchange to the EVNEX app.

use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::auth::Credentials;
use crate::errors::{EvnexError, EvnexResult};
use crate::observability::Redacted;

/// Default base URL for the EVNEX client API.
pub const DEFAULT_BASE_URL: &str = "https://client-api.evnex.io";

/// Cognito user pool the EVNEX app authenticates against.
pub const DEFAULT_USER_POOL_ID: &str = "ap-southeast-2_zWnqo6ASv";

/// Cognito app client id of the EVNEX app.
pub const DEFAULT_CLIENT_ID: &str = "rol3lsv2vg41783550i18r7vi";

/// Default request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default margin before token expiry at which a session counts as expired.
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Configuration for the EVNEX client.
#[derive(Clone)]
pub struct EvnexConfig {
    /// Account username (email address).
    pub(crate) username: String,
    /// Account password (stored securely).
    pub(crate) password: SecretString,
    /// Base URL relative API paths are joined to.
    pub base_url: String,
    /// Cognito user pool id, `<region>_<pool name>`.
    pub user_pool_id: String,
    /// Cognito app client id.
    pub client_id: String,
    /// Request timeout, applied to API calls and the login exchange.
    pub timeout: Duration,
    /// `User-Agent` sent with every API request.
    pub user_agent: String,
    /// Re-establish the session once the access token has expired.
    ///
    /// Off by default: a session, once obtained, is used for the lifetime
    /// of the client.
    pub reauthenticate_on_expiry: bool,
    /// How long before the recorded expiry a session counts as expired.
    pub expiry_margin: Duration,
}

impl EvnexConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> EvnexConfigBuilder {
        EvnexConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `EVNEX_USERNAME` (required): account username
    /// - `EVNEX_PASSWORD` (required): account password
    /// - `EVNEX_BASE_URL` (optional): custom API origin
    /// - `EVNEX_USER_POOL_ID` (optional): Cognito user pool id
    /// - `EVNEX_CLIENT_ID` (optional): Cognito app client id
    /// - `EVNEX_TIMEOUT` (optional): request timeout in seconds
    /// - `EVNEX_REAUTHENTICATE` (optional): `true`/`1` to re-login on expiry
    pub fn from_env() -> EvnexResult<Self> {
        let username = std::env::var("EVNEX_USERNAME").map_err(|_| {
            EvnexError::configuration("EVNEX_USERNAME environment variable not set")
        })?;
        let password = std::env::var("EVNEX_PASSWORD").map_err(|_| {
            EvnexError::configuration("EVNEX_PASSWORD environment variable not set")
        })?;

        let mut builder = EvnexConfigBuilder::new().credentials(username, password);

        if let Ok(base_url) = std::env::var("EVNEX_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(pool_id) = std::env::var("EVNEX_USER_POOL_ID") {
            builder = builder.user_pool_id(pool_id);
        }

        if let Ok(client_id) = std::env::var("EVNEX_CLIENT_ID") {
            builder = builder.client_id(client_id);
        }

        if let Ok(timeout_str) = std::env::var("EVNEX_TIMEOUT") {
            if let Ok(timeout_secs) = timeout_str.parse::<u64>() {
                builder = builder.timeout(Duration::from_secs(timeout_secs));
            }
        }

        if let Ok(flag) = std::env::var("EVNEX_REAUTHENTICATE") {
            builder = builder.reauthenticate_on_expiry(matches!(
                flag.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            ));
        }

        builder.build()
    }

    /// Returns the account username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the credential pair the session logs in with.
    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            self.username.clone(),
            SecretString::new(self.password.expose_secret().clone()),
        )
    }

    /// Identity-provider region, the user pool id's prefix.
    pub fn region(&self) -> &str {
        self.user_pool_id
            .split_once('_')
            .map_or(self.user_pool_id.as_str(), |(region, _)| region)
    }

    /// Pool name, the user pool id's suffix.
    pub fn pool_name(&self) -> &str {
        self.user_pool_id
            .split_once('_')
            .map_or("", |(_, name)| name)
    }

    /// Returns the full URL for an API path.
    ///
    /// Paths that already carry an `http`/`https` scheme are returned as-is.
    pub fn endpoint_url(&self, path: &str) -> String {
        if path
            .get(..4)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
        {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }
}

impl std::fmt::Debug for EvnexConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvnexConfig")
            .field("username", &self.username)
            .field("password", &Redacted::new(&self.password))
            .field("base_url", &self.base_url)
            .field("user_pool_id", &self.user_pool_id)
            .field("client_id", &self.client_id)
            .field("timeout", &self.timeout)
            .field("user_agent", &self.user_agent)
            .field("reauthenticate_on_expiry", &self.reauthenticate_on_expiry)
            .finish()
    }
}

/// Builder for `EvnexConfig`.
#[derive(Default)]
pub struct EvnexConfigBuilder {
    username: Option<String>,
    password: Option<String>,
    base_url: Option<String>,
    user_pool_id: Option<String>,
    client_id: Option<String>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    reauthenticate_on_expiry: bool,
    expiry_margin: Option<Duration>,
}

impl EvnexConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the username and password.
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the Cognito user pool id.
    pub fn user_pool_id(mut self, user_pool_id: impl Into<String>) -> Self {
        self.user_pool_id = Some(user_pool_id.into());
        self
    }

    /// Sets the Cognito app client id.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the timeout in seconds.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Sets the `User-Agent` header value.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Enables re-authentication once the session has expired.
    pub fn reauthenticate_on_expiry(mut self, enabled: bool) -> Self {
        self.reauthenticate_on_expiry = enabled;
        self
    }

    /// Sets the expiry margin.
    pub fn expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = Some(margin);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> EvnexResult<EvnexConfig> {
        let username = self
            .username
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| EvnexError::configuration("Username is required"))?;

        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| EvnexError::configuration("Password is required"))?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let parsed = url::Url::parse(&base_url)?;
        match parsed.scheme() {
            "https" => {}
            "http" => tracing::warn!(base_url = %base_url, "Base URL does not use HTTPS"),
            other => {
                return Err(EvnexError::configuration(format!(
                    "Unsupported base URL scheme: {}",
                    other
                )))
            }
        }

        let user_pool_id = self
            .user_pool_id
            .unwrap_or_else(|| DEFAULT_USER_POOL_ID.to_string());
        if !user_pool_id.contains('_') {
            return Err(EvnexError::configuration(
                "User pool id must have the form <region>_<pool name>",
            ));
        }

        Ok(EvnexConfig {
            username,
            password: SecretString::new(password),
            base_url,
            user_pool_id,
            client_id: self
                .client_id
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            user_agent: self
                .user_agent
                .unwrap_or_else(|| format!("evnex-client/{}", env!("CARGO_PKG_VERSION"))),
            reauthenticate_on_expiry: self.reauthenticate_on_expiry,
            expiry_margin: self.expiry_margin.unwrap_or(DEFAULT_EXPIRY_MARGIN),
        })
    }
}
