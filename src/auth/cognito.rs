//! Cognito identity provider.
//!
//! Implements the `USER_SRP_AUTH` login and the `REFRESH_TOKEN_AUTH`
//! renewal against the Cognito Identity Provider JSON API.

use async_trait::async_trait;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

use super::srp::{SrpClient, VerifierChallenge};
use super::{Credentials, IdentityProvider, SessionTokens};
use crate::config::EvnexConfig;
use crate::errors::{EvnexError, EvnexResult};
use crate::transport::{HttpRequest, HttpTransport};

const AMZ_JSON: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const PASSWORD_VERIFIER: &str = "PASSWORD_VERIFIER";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a> {
    auth_flow: &'a str,
    client_id: &'a str,
    auth_parameters: HashMap<&'a str, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RespondToAuthChallengeRequest<'a> {
    challenge_name: &'a str,
    client_id: &'a str,
    challenge_responses: HashMap<&'a str, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthResponse {
    challenge_name: Option<String>,
    #[serde(default)]
    challenge_parameters: HashMap<String, String>,
    session: Option<String>,
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type")]
    error_type: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
}

/// Identity provider backed by an AWS Cognito user pool.
pub struct CognitoIdentityProvider {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    pool_name: String,
    client_id: String,
    timeout: Duration,
}

impl CognitoIdentityProvider {
    /// Creates a provider for the pool and app client in `config`.
    pub fn new(config: &EvnexConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            endpoint: format!("https://cognito-idp.{}.amazonaws.com/", config.region()),
            pool_name: config.pool_name().to_string(),
            client_id: config.client_id.clone(),
            timeout: config.timeout,
        }
    }

    /// Overrides the Cognito endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Returns the Cognito endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        action: &str,
        body: &B,
    ) -> EvnexResult<T> {
        let request = HttpRequest::post(&self.endpoint)
            .with_header("Content-Type", AMZ_JSON)
            .with_header("X-Amz-Target", format!("{}.{}", TARGET_PREFIX, action))
            .with_body(serde_json::to_vec(body)?)
            .with_timeout(self.timeout);

        let response = self.transport.send(request).await.map_err(|e| {
            EvnexError::authentication(format!("{} request failed: {}", action, e))
        })?;

        if !response.is_success() {
            let detail: ErrorBody = response.json().unwrap_or(ErrorBody {
                error_type: None,
                message: None,
            });
            let code = detail
                .error_type
                .map(|t| t.rsplit('#').next().unwrap_or_default().to_string());
            return Err(EvnexError::Authentication {
                message: detail
                    .message
                    .unwrap_or_else(|| format!("{} returned HTTP {}", action, response.status)),
                code,
            });
        }

        response.json().map_err(|e| {
            EvnexError::authentication(format!("Unreadable {} response: {}", action, e))
        })
    }
}

fn take_param(params: &mut HashMap<String, String>, name: &str) -> EvnexResult<String> {
    params
        .remove(name)
        .ok_or_else(|| EvnexError::authentication(format!("Challenge is missing {}", name)))
}

fn into_tokens(
    result: Option<AuthenticationResult>,
    previous_refresh: Option<&SecretString>,
) -> EvnexResult<SessionTokens> {
    let result = result
        .ok_or_else(|| EvnexError::authentication("No authentication result returned"))?;

    let refresh_token = match (result.refresh_token, previous_refresh) {
        (Some(token), _) => token,
        (None, Some(previous)) => previous.expose_secret().clone(),
        (None, None) => return Err(EvnexError::authentication("No refresh token returned")),
    };

    let tokens = SessionTokens::new(result.id_token, result.access_token, refresh_token);
    Ok(match result.expires_in {
        Some(seconds) => tokens.expiring_in(seconds),
        None => tokens,
    })
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    #[instrument(skip(self, credentials), fields(username = %credentials.username()))]
    async fn authenticate(&self, credentials: &Credentials) -> EvnexResult<SessionTokens> {
        let srp = SrpClient::new()?;

        let mut parameters = HashMap::new();
        parameters.insert("USERNAME", credentials.username().to_string());
        parameters.insert("SRP_A", srp.public_key_hex());

        let initiated: AuthResponse = self
            .call(
                "InitiateAuth",
                &InitiateAuthRequest {
                    auth_flow: "USER_SRP_AUTH",
                    client_id: &self.client_id,
                    auth_parameters: parameters,
                },
            )
            .await?;

        match initiated.challenge_name.as_deref() {
            Some(PASSWORD_VERIFIER) => {}
            other => {
                return Err(EvnexError::authentication(format!(
                    "Unsupported challenge: {}",
                    other.unwrap_or("none")
                )))
            }
        }

        let mut params = initiated.challenge_parameters;
        let challenge = VerifierChallenge {
            user_id: take_param(&mut params, "USER_ID_FOR_SRP")?,
            salt: take_param(&mut params, "SALT")?,
            srp_b: take_param(&mut params, "SRP_B")?,
            secret_block: take_param(&mut params, "SECRET_BLOCK")?,
        };
        debug!(user_id = %challenge.user_id, "Answering password verifier challenge");

        let claim = srp.password_claim(
            &self.pool_name,
            credentials.password(),
            &challenge,
            Utc::now(),
        )?;

        let mut responses = HashMap::new();
        responses.insert("USERNAME", challenge.user_id.clone());
        responses.insert("PASSWORD_CLAIM_SECRET_BLOCK", claim.secret_block);
        responses.insert("TIMESTAMP", claim.timestamp);
        responses.insert("PASSWORD_CLAIM_SIGNATURE", claim.signature);

        let answered: AuthResponse = self
            .call(
                "RespondToAuthChallenge",
                &RespondToAuthChallengeRequest {
                    challenge_name: PASSWORD_VERIFIER,
                    client_id: &self.client_id,
                    challenge_responses: responses,
                    session: initiated.session,
                },
            )
            .await?;

        if let Some(next) = answered.challenge_name {
            return Err(EvnexError::authentication(format!(
                "Unsupported follow-up challenge: {}",
                next
            )));
        }

        into_tokens(answered.authentication_result, None)
    }

    #[instrument(
        skip(self, credentials, refresh_token),
        fields(username = %credentials.username())
    )]
    async fn refresh(
        &self,
        credentials: &Credentials,
        refresh_token: &SecretString,
    ) -> EvnexResult<SessionTokens> {
        let mut parameters = HashMap::new();
        parameters.insert("REFRESH_TOKEN", refresh_token.expose_secret().clone());

        let refreshed: AuthResponse = self
            .call(
                "InitiateAuth",
                &InitiateAuthRequest {
                    auth_flow: "REFRESH_TOKEN_AUTH",
                    client_id: &self.client_id,
                    auth_parameters: parameters,
                },
            )
            .await?;

        into_tokens(refreshed.authentication_result, Some(refresh_token))
    }

    fn name(&self) -> &'static str {
        "cognito"
    }
}

impl std::fmt::Debug for CognitoIdentityProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CognitoIdentityProvider")
            .field("endpoint", &self.endpoint)
            .field("pool_name", &self.pool_name)
            .field("client_id", &self.client_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{fixtures, MockResponse, MockTransport};
    use serde_json::{json, Value};

    fn provider(transport: Arc<MockTransport>) -> CognitoIdentityProvider {
        let config = EvnexConfig::builder()
            .credentials("owner@example.com", "pw")
            .build()
            .unwrap();
        CognitoIdentityProvider::new(&config, transport)
    }

    fn credentials() -> Credentials {
        Credentials::new("owner@example.com", SecretString::new("pw".to_string()))
    }

    #[test]
    fn test_endpoint_uses_pool_region() {
        let provider = provider(Arc::new(MockTransport::new()));
        assert_eq!(
            provider.endpoint(),
            "https://cognito-idp.ap-southeast-2.amazonaws.com/"
        );
    }

    #[tokio::test]
    async fn test_srp_login_flow() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::json(&fixtures::password_verifier_challenge()));
        transport.queue(MockResponse::json(&fixtures::authentication_result()));

        let tokens = provider(transport.clone())
            .authenticate(&credentials())
            .await
            .unwrap();

        assert_eq!(tokens.access_token().expose_secret(), "access-token");
        assert_eq!(tokens.refresh_token().expose_secret(), "refresh-token");
        assert!(tokens.expires_at().is_some());

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].headers.get("X-Amz-Target").map(String::as_str),
            Some("AWSCognitoIdentityProviderService.InitiateAuth")
        );

        let initiate: Value = serde_json::from_slice(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(initiate["AuthFlow"], "USER_SRP_AUTH");
        assert_eq!(initiate["AuthParameters"]["USERNAME"], "owner@example.com");
        assert!(initiate["AuthParameters"]["SRP_A"].as_str().unwrap().len() > 700);

        let respond: Value = serde_json::from_slice(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(respond["ChallengeName"], "PASSWORD_VERIFIER");
        assert_eq!(respond["ChallengeResponses"]["USERNAME"], "user-id-for-srp");
        assert!(respond["ChallengeResponses"]["PASSWORD_CLAIM_SIGNATURE"].is_string());
        assert!(respond["ChallengeResponses"]["TIMESTAMP"]
            .as_str()
            .unwrap()
            .contains(" UTC "));
    }

    #[tokio::test]
    async fn test_rejected_password_maps_to_authentication_error() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::json(&fixtures::password_verifier_challenge()));
        transport.queue(
            MockResponse::json(&json!({
                "__type": "NotAuthorizedException",
                "message": "Incorrect username or password."
            }))
            .with_status(400),
        );

        let err = provider(transport).authenticate(&credentials()).await.unwrap_err();

        match err {
            EvnexError::Authentication { message, code } => {
                assert_eq!(message, "Incorrect username or password.");
                assert_eq!(code.as_deref(), Some("NotAuthorizedException"));
            }
            other => panic!("Expected Authentication error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_challenge_is_rejected() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::json(&json!({
            "ChallengeName": "SMS_MFA",
            "ChallengeParameters": {}
        })));

        let err = provider(transport.clone())
            .authenticate(&credentials())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SMS_MFA"));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token() {
        let transport = Arc::new(MockTransport::new());
        transport.queue(MockResponse::json(&json!({
            "AuthenticationResult": {
                "IdToken": "id-2",
                "AccessToken": "access-2",
                "ExpiresIn": 3600,
                "TokenType": "Bearer"
            }
        })));

        let previous = SecretString::new("refresh-token".to_string());
        let tokens = provider(transport.clone())
            .refresh(&credentials(), &previous)
            .await
            .unwrap();

        assert_eq!(tokens.access_token().expose_secret(), "access-2");
        assert_eq!(tokens.refresh_token().expose_secret(), "refresh-token");

        let request = transport.last_request().unwrap();
        let body: Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["AuthFlow"], "REFRESH_TOKEN_AUTH");
        assert_eq!(body["AuthParameters"]["REFRESH_TOKEN"], "refresh-token");
    }
}
