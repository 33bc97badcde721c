//! Mock implementations for testing.
//!
//! Provides a scripted HTTP transport, a counting identity provider and a
//! recording publisher so the client and the bridge can be exercised
//! without network access.

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::SecretString;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::auth::{Credentials, IdentityProvider, SessionTokens};
use crate::bridge::{Publisher, QoS};
use crate::errors::{EvnexError, EvnexResult};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Resolved URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    /// Parses the body as JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    pub reason: String,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl MockResponse {
    /// Creates a 200 response with a JSON body.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status: 200,
            reason: "OK".to_string(),
            headers,
            body: serde_json::to_vec(value).unwrap_or_default(),
        }
    }

    /// Creates a 200 envelope response carrying `data`.
    pub fn data(data: serde_json::Value) -> Self {
        Self::json(&serde_json::json!({"data": data, "error": null}))
    }

    /// Creates a 200 envelope response carrying a business `error`.
    pub fn business_error(error: serde_json::Value) -> Self {
        Self::json(&serde_json::json!({"data": null, "error": error}))
    }

    /// Creates an empty response with the given status.
    pub fn status(status: u16, reason: &str) -> Self {
        Self {
            status,
            reason: reason.to_string(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Creates a response with a raw body.
    pub fn raw(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::status(status, "OK")
        }
    }

    /// Overrides the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

/// Mock HTTP transport serving queued responses in order.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<MockResponse, TransportError>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    /// Creates a transport with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport with the given responses queued.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        let transport = Self::new();
        for response in responses {
            transport.queue(response);
        }
        transport
    }

    /// Delays every response.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues a response.
    pub fn queue(&self, response: MockResponse) {
        self.responses.lock().push_back(Ok(response));
    }

    /// Queues a transport failure.
    pub fn queue_failure(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    /// All recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// The last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Number of requests sent.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Asserts the number of requests sent.
    pub fn verify_request_count(&self, expected: usize) {
        assert_eq!(
            self.request_count(),
            expected,
            "expected {} requests, got {}",
            expected,
            self.request_count()
        );
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(RecordedRequest {
            method: request.method,
            url: request.url,
            headers: request.headers,
            body: request.body,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.responses.lock().pop_front();
        let response = next
            .unwrap_or_else(|| Ok(MockResponse::status(500, "No mock response configured")))?;
        Ok(HttpResponse {
            status: response.status,
            reason: response.reason,
            headers: response.headers,
            body: response.body,
        })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued", &self.responses.lock().len())
            .field("requests", &self.request_count())
            .finish()
    }
}

/// Identity provider that counts exchanges and never touches the network.
#[derive(Debug)]
pub struct MockIdentityProvider {
    failure: Option<String>,
    expires_in: Option<i64>,
    delay: Option<Duration>,
    authenticate_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
}

impl MockIdentityProvider {
    /// A provider whose logins succeed.
    pub fn succeeding() -> Self {
        Self {
            failure: None,
            expires_in: None,
            delay: None,
            authenticate_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
        }
    }

    /// A provider whose logins fail with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::succeeding()
        }
    }

    /// Issues tokens expiring `seconds` from now.
    pub fn with_expires_in(mut self, seconds: i64) -> Self {
        self.expires_in = Some(seconds);
        self
    }

    /// Delays every exchange.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of full logins performed.
    pub fn authenticate_count(&self) -> usize {
        self.authenticate_calls.load(Ordering::SeqCst)
    }

    /// Number of refresh exchanges performed.
    pub fn refresh_count(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn issue(&self, generation: usize) -> EvnexResult<SessionTokens> {
        if let Some(message) = &self.failure {
            return Err(EvnexError::Authentication {
                message: message.clone(),
                code: Some("NotAuthorizedException".to_string()),
            });
        }
        let tokens = SessionTokens::new(
            format!("id-token-{}", generation),
            format!("access-token-{}", generation),
            "refresh-token",
        );
        Ok(match self.expires_in {
            Some(seconds) => tokens.expiring_in(seconds),
            None => tokens,
        })
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn authenticate(&self, _credentials: &Credentials) -> EvnexResult<SessionTokens> {
        let generation = self.authenticate_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.issue(generation)
    }

    async fn refresh(
        &self,
        _credentials: &Credentials,
        _refresh_token: &SecretString,
    ) -> EvnexResult<SessionTokens> {
        let generation = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 100;
        self.issue(generation)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A message captured by [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Topic.
    pub topic: String,
    /// Payload as text.
    pub payload: String,
    /// Quality of service.
    pub qos: QoS,
}

/// Publisher that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
}

impl RecordingPublisher {
    /// Creates an empty publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// All published messages, in order.
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().clone()
    }

    /// Payload last published on `topic`.
    pub fn payload(&self, topic: &str) -> Option<String> {
        self.messages
            .lock()
            .iter()
            .rev()
            .find(|m| m.topic == topic)
            .map(|m| m.payload.clone())
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> EvnexResult<()> {
        self.messages.lock().push(PublishedMessage {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(&payload).into_owned(),
            qos,
        });
        Ok(())
    }
}

/// Canned payloads.
pub mod fixtures {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde_json::{json, Value};

    /// `InitiateAuth` reply carrying a password verifier challenge.
    pub fn password_verifier_challenge() -> Value {
        json!({
            "ChallengeName": "PASSWORD_VERIFIER",
            "ChallengeParameters": {
                "USER_ID_FOR_SRP": "user-id-for-srp",
                "USERNAME": "user-id-for-srp",
                "SALT": "8d2c6e5a1f3b9074",
                "SRP_B": "4f1a9c3b7e2d8f60a5c4b3d2e1f0a9b8c7d6e5f4a3b2c1d0e9f8a7b6c5d4e3f2",
                "SECRET_BLOCK": STANDARD.encode(b"opaque-secret-block")
            }
        })
    }

    /// `RespondToAuthChallenge` reply carrying tokens.
    pub fn authentication_result() -> Value {
        json!({
            "AuthenticationResult": {
                "IdToken": "id-token",
                "AccessToken": "access-token",
                "RefreshToken": "refresh-token",
                "ExpiresIn": 3600,
                "TokenType": "Bearer"
            },
            "ChallengeParameters": {}
        })
    }

    /// `GET /v2/apps/user` data.
    pub fn user() -> Value {
        json!({
            "id": "u1",
            "email": "owner@example.com",
            "organisations": [{"id": "o1", "name": "Home", "isDefault": true}]
        })
    }

    /// `GET /v2/apps/organisations/{orgId}/charge-points` data.
    pub fn charge_points() -> Value {
        json!({
            "items": [{
                "id": "cp1",
                "name": "Garage",
                "connectors": [{"connectorId": "1"}],
                "location": {"id": "loc1"}
            }]
        })
    }

    /// `GET /v2/apps/charge-points/{id}` data.
    pub fn charge_point() -> Value {
        json!({
            "id": "cp1",
            "name": "Garage",
            "networkStatus": "ONLINE",
            "location": {"id": "loc1"},
            "connectors": [{
                "connectorId": "1",
                "status": "CHARGING",
                "ocppCode": "NoError",
                "ocppStatus": "CHARGING"
            }]
        })
    }
}
