//! Authentication for the EVNEX client.
//!
//! [`AuthSession`] owns the account credentials and the cached session
//! tokens. The token triple is obtained from an [`IdentityProvider`] the
//! first time a request needs it and reused afterwards; concurrent first
//! callers share a single identity-provider exchange.

pub mod cognito;
pub mod srp;

pub use cognito::CognitoIdentityProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::errors::{EvnexError, EvnexResult};
use crate::observability::{redact_token, MetricsCollector, Redacted};

/// Account username and password.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: SecretString,
}

impl Credentials {
    /// Creates a credential pair.
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Returns the username.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the password (exposing the secret).
    pub(crate) fn password(&self) -> &str {
        self.password.expose_secret()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &Redacted::new(&self.password))
            .finish()
    }
}

/// The id/access/refresh token triple from a successful login.
///
/// The three tokens only ever exist together.
#[derive(Clone)]
pub struct SessionTokens {
    id_token: SecretString,
    access_token: SecretString,
    refresh_token: SecretString,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionTokens {
    /// Creates a token triple.
    pub fn new(
        id_token: impl Into<String>,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            id_token: SecretString::new(id_token.into()),
            access_token: SecretString::new(access_token.into()),
            refresh_token: SecretString::new(refresh_token.into()),
            expires_at: None,
        }
    }

    /// Sets the access token expiry.
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Sets the expiry from a lifetime in seconds, counted from now.
    pub fn expiring_in(self, seconds: i64) -> Self {
        self.with_expiry(Utc::now() + chrono::Duration::seconds(seconds))
    }

    /// Returns the id token.
    pub fn id_token(&self) -> &SecretString {
        &self.id_token
    }

    /// Returns the access token.
    pub fn access_token(&self) -> &SecretString {
        &self.access_token
    }

    /// Returns the refresh token.
    pub fn refresh_token(&self) -> &SecretString {
        &self.refresh_token
    }

    /// Returns a short prefix of the access token for log correlation.
    pub fn access_token_hint(&self) -> String {
        redact_token(self.access_token.expose_secret())
    }

    /// Returns the access token expiry, if known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Returns true if the tokens expire within `margin` from now.
    ///
    /// Tokens without a recorded expiry never expire.
    pub fn is_expired(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let margin = chrono::Duration::from_std(margin)
                    .unwrap_or_else(|_| chrono::Duration::zero());
                Utc::now() + margin >= expires_at
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionTokens")
            .field("id_token", &Redacted::new(&self.id_token))
            .field("access_token", &Redacted::new(&self.access_token))
            .field("refresh_token", &Redacted::new(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges credentials for session tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Performs a full login.
    async fn authenticate(&self, credentials: &Credentials) -> EvnexResult<SessionTokens>;

    /// Exchanges a refresh token for a new token triple.
    ///
    /// Default implementation reports refresh as unsupported.
    async fn refresh(
        &self,
        credentials: &Credentials,
        refresh_token: &SecretString,
    ) -> EvnexResult<SessionTokens> {
        let _ = (credentials, refresh_token);
        Err(EvnexError::authentication(format!(
            "{} does not support token refresh",
            self.name()
        )))
    }

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Expiry handling for a cached session.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    /// Re-establish the session once it has expired.
    pub reauthenticate: bool,
    /// How early a session counts as expired.
    pub margin: Duration,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            reauthenticate: false,
            margin: crate::config::DEFAULT_EXPIRY_MARGIN,
        }
    }
}

/// Authenticated session for one account.
pub struct AuthSession {
    credentials: Credentials,
    provider: Arc<dyn IdentityProvider>,
    tokens: RwLock<Option<SessionTokens>>,
    login_gate: Mutex<()>,
    policy: ExpiryPolicy,
    exchanges: AtomicUsize,
    metrics: Option<Arc<dyn MetricsCollector>>,
}

impl AuthSession {
    /// Creates a session that has not logged in yet.
    pub fn new(credentials: Credentials, provider: Arc<dyn IdentityProvider>) -> Self {
        Self::with_policy(credentials, provider, ExpiryPolicy::default())
    }

    /// Creates a session with an explicit expiry policy.
    pub fn with_policy(
        credentials: Credentials,
        provider: Arc<dyn IdentityProvider>,
        policy: ExpiryPolicy,
    ) -> Self {
        Self {
            credentials,
            provider,
            tokens: RwLock::new(None),
            login_gate: Mutex::new(()),
            policy,
            exchanges: AtomicUsize::new(0),
            metrics: None,
        }
    }

    /// Records login outcomes on `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Makes sure a usable token triple is cached.
    ///
    /// Returns `true` straight away when tokens are cached; otherwise runs
    /// at most one login and reports whether it succeeded. Failures are
    /// logged and leave the session unauthenticated.
    pub async fn ensure_authenticated(&self) -> bool {
        self.access_token().await.is_ok()
    }

    /// Returns the access token, logging in first if needed.
    pub async fn access_token(&self) -> EvnexResult<SecretString> {
        if let Some(token) = self.cached_access_token().await {
            return Ok(token);
        }

        let _gate = self.login_gate.lock().await;

        // Another caller may have finished logging in while we waited.
        if let Some(token) = self.cached_access_token().await {
            return Ok(token);
        }

        let stale = self.tokens.read().await.clone();
        let result = match stale {
            Some(stale) => self.renew(&stale).await,
            None => self.login().await,
        };

        let mut slot = self.tokens.write().await;
        match result {
            Ok(tokens) => {
                let access = tokens.access_token().clone();
                *slot = Some(tokens);
                Ok(access)
            }
            Err(err) => {
                *slot = None;
                Err(err)
            }
        }
    }

    /// Forces a refresh-token exchange for the cached session.
    pub async fn refresh(&self) -> EvnexResult<()> {
        let _gate = self.login_gate.lock().await;

        let current = self
            .tokens
            .read()
            .await
            .clone()
            .ok_or_else(|| EvnexError::authentication("No session to refresh"))?;

        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let tokens = self
            .provider
            .refresh(&self.credentials, current.refresh_token())
            .await
            .map_err(|err| {
                warn!(provider = self.provider.name(), error = %err, "Token refresh failed");
                err
            })?;

        debug!(
            provider = self.provider.name(),
            access_token = %tokens.access_token_hint(),
            "Token refresh succeeded"
        );
        *self.tokens.write().await = Some(tokens);
        Ok(())
    }

    /// Drops the cached tokens; the next request logs in again.
    pub async fn invalidate(&self) {
        *self.tokens.write().await = None;
    }

    /// Returns true if a token triple is cached.
    pub async fn is_authenticated(&self) -> bool {
        self.tokens.read().await.is_some()
    }

    /// Number of identity-provider exchanges performed so far.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    /// Returns the username this session logs in as.
    pub fn username(&self) -> &str {
        self.credentials.username()
    }

    async fn cached_access_token(&self) -> Option<SecretString> {
        let tokens = self.tokens.read().await;
        tokens
            .as_ref()
            .filter(|t| !(self.policy.reauthenticate && t.is_expired(self.policy.margin)))
            .map(|t| t.access_token().clone())
    }

    async fn login(&self) -> EvnexResult<SessionTokens> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let result = self.provider.authenticate(&self.credentials).await;
        if let Some(metrics) = &self.metrics {
            metrics.record_login(result.is_ok());
        }
        match result {
            Ok(tokens) => {
                info!(provider = self.provider.name(), "Login succeeded");
                debug!(access_token = %tokens.access_token_hint(), "Session established");
                Ok(tokens)
            }
            Err(err) => {
                error!(provider = self.provider.name(), error = %err, "Login failed");
                Err(err)
            }
        }
    }

    /// Renews an expired session, falling back to a full login.
    async fn renew(&self, stale: &SessionTokens) -> EvnexResult<SessionTokens> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        match self
            .provider
            .refresh(&self.credentials, stale.refresh_token())
            .await
        {
            Ok(tokens) => {
                info!(provider = self.provider.name(), "Session refreshed");
                debug!(access_token = %tokens.access_token_hint(), "Session renewed");
                Ok(tokens)
            }
            Err(err) => {
                debug!(error = %err, "Refresh rejected, logging in again");
                self.login().await
            }
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("credentials", &self.credentials)
            .field("provider", &self.provider.name())
            .field("policy", &self.policy)
            .finish()
    }
}
