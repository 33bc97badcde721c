//! The authenticated request pipeline.
//!
//! Every API operation goes through [`RequestPipeline::execute`]:
//! authenticate, resolve the URL, attach the standard headers, send, then
//! classify the reply. A populated envelope `error` wins over a 2xx status.

use secrecy::ExposeSecret;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, trace, warn};

use super::RequestDescriptor;
use crate::auth::AuthSession;
use crate::config::EvnexConfig;
use crate::errors::{EvnexError, EvnexResult};
use crate::observability::{redact_url, MetricsCollector};
use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::types::{ApiResponse, ResponseEnvelope};

/// Outcome of one API call.
pub type Outcome = EvnexResult<ApiResponse>;

/// `Accept` header sent with every API request.
pub const ACCEPT: &str = "application/json, text/plain, */*";

/// Sends authenticated requests and classifies their outcome.
pub struct RequestPipeline {
    config: Arc<EvnexConfig>,
    transport: Arc<dyn HttpTransport>,
    session: Arc<AuthSession>,
    metrics: Arc<dyn MetricsCollector>,
    cancel: CancellationToken,
}

impl RequestPipeline {
    /// Creates a pipeline.
    pub fn new(
        config: Arc<EvnexConfig>,
        transport: Arc<dyn HttpTransport>,
        session: Arc<AuthSession>,
        metrics: Arc<dyn MetricsCollector>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            transport,
            session,
            metrics,
            cancel,
        }
    }

    /// Runs one API call.
    ///
    /// Returns [`EvnexError::Authentication`] without touching the network
    /// if no session can be established, and [`EvnexError::Cancelled`] if
    /// the client's cancellation token fires first.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Outcome {
        let started = Instant::now();
        let operation = descriptor.operation;

        let outcome = tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(EvnexError::Cancelled),
            outcome = self.run(descriptor) => outcome,
        };

        self.metrics
            .record_request(operation, outcome.is_ok(), started.elapsed());
        if let Err(err) = &outcome {
            self.metrics.record_error(err.kind());
        }
        outcome
    }

    /// Returns the configuration requests are resolved against.
    pub fn config(&self) -> &EvnexConfig {
        &self.config
    }

    /// Makes sure a session is cached, honouring cancellation.
    pub async fn ensure_authenticated(&self) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            authenticated = self.session.ensure_authenticated() => authenticated,
        }
    }

    /// Builds the outbound request for a descriptor.
    pub fn build_request(
        &self,
        descriptor: &RequestDescriptor,
        access_token: &str,
    ) -> HttpRequest {
        let url = self.config.endpoint_url(&descriptor.path);
        let mut request = HttpRequest::new(descriptor.method, url)
            .with_header("Authorization", access_token)
            .with_header("Accept", ACCEPT)
            .with_header("User-Agent", self.config.user_agent.as_str())
            .with_timeout(self.config.timeout);

        if descriptor.method.has_body() {
            request = request
                .with_header("Content-Type", "application/json")
                .with_body(descriptor.body.clone().unwrap_or_default().into_bytes());
        }
        request
    }

    #[instrument(
        skip(self, descriptor),
        fields(operation = descriptor.operation, method = %descriptor.method)
    )]
    async fn run(&self, descriptor: RequestDescriptor) -> Outcome {
        let token = self.session.access_token().await?;

        let request = self.build_request(&descriptor, token.expose_secret());
        let url = redact_url(&request.url);
        let method = request.method;

        let response = self.transport.send(request).await.map_err(|err| {
            error!(error = %err, "{} {} failed", method, url);
            EvnexError::Transport(err)
        })?;

        classify_response(method, &url, &response)
    }
}

/// Classifies a received response.
///
/// - non-2xx: [`EvnexError::Http`]
/// - 2xx whose body is not a JSON object: [`EvnexError::Serialization`]
/// - 2xx with a non-null `error`: [`EvnexError::Business`]
/// - 2xx otherwise: the envelope's `data` and `response`, untouched
pub fn classify_response(method: HttpMethod, url: &str, response: &HttpResponse) -> Outcome {
    let body = response.text();
    trace!(status = response.status, body = %body, "{} {} raw response", method, url);

    if !response.is_success() {
        info!(
            status = response.status,
            reason = %response.reason,
            "{} {} response {} {}",
            method,
            url,
            response.status,
            response.reason
        );
        return Err(EvnexError::Http {
            status: response.status,
            reason: response.reason.clone(),
            body: (!body.is_empty()).then_some(body),
        });
    }

    let envelope = if body.trim().is_empty() {
        ResponseEnvelope::default()
    } else {
        parse_envelope(&body).map_err(|err| {
            warn!(error = %err, "{} {} returned a body that is not an envelope", method, url);
            err
        })?
    };

    if let Some(business_error) = envelope.business_error() {
        info!(error = %business_error, "{} {} response {}", method, url, business_error);
        return Err(EvnexError::Business {
            error: business_error.clone(),
        });
    }

    info!("{} {} succeeded", method, url);
    if let Some(status) = envelope.response_status() {
        info!(status, "{} {} command status", method, url);
    }

    Ok(ApiResponse::from(envelope))
}

fn parse_envelope(body: &str) -> EvnexResult<ResponseEnvelope> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(EvnexError::Serialization {
            message: format!("expected a JSON object envelope, got {}", json_kind(&value)),
        });
    }
    Ok(serde_json::from_value(value)?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl std::fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("base_url", &self.config.base_url)
            .field("session", &self.session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockIdentityProvider, MockResponse, MockTransport};
    use crate::observability::DefaultMetricsCollector;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            reason: "Reason".to_string(),
            headers: HashMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn pipeline(transport: Arc<MockTransport>, provider: MockIdentityProvider) -> RequestPipeline {
        let config = Arc::new(
            EvnexConfig::builder()
                .credentials("owner@example.com", "pw")
                .user_agent("evnex-test/1.0")
                .build()
                .unwrap(),
        );
        let session = Arc::new(AuthSession::new(config.credentials(), Arc::new(provider)));
        RequestPipeline::new(
            config,
            transport,
            session,
            Arc::new(DefaultMetricsCollector::new()),
            CancellationToken::new(),
        )
    }

    #[test]
    fn test_classify_http_error() {
        let err = classify_response(HttpMethod::Get, "u", &response(401, "")).unwrap_err();
        match err {
            EvnexError::Http { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, None);
            }
            other => panic!("Expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_business_error_on_success_status() {
        let err = classify_response(HttpMethod::Get, "u", &response(200, r#"{"error":"X"}"#))
            .unwrap_err();
        match err {
            EvnexError::Business { error } => assert_eq!(error, json!("X")),
            other => panic!("Expected Business error, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_data_passthrough() {
        let data = json!({"id": "u1", "nested": {"list": [1, 2.5, null, "x"]}});
        let body = json!({"data": data, "error": null}).to_string();
        let outcome = classify_response(HttpMethod::Get, "u", &response(200, &body)).unwrap();
        assert_eq!(outcome.data, Some(data));
    }

    #[test]
    fn test_classify_empty_and_invalid_bodies() {
        let outcome = classify_response(HttpMethod::Post, "u", &response(204, "")).unwrap();
        assert_eq!(outcome, ApiResponse::default());

        let err = classify_response(HttpMethod::Get, "u", &response(200, "<html>")).unwrap_err();
        assert_eq!(err.kind(), "serialization");
    }

    #[test]
    fn test_classify_non_object_body_is_serialization_error() {
        for body in [r#"[{"id":"cp1"}]"#, r#"[null,"boom"]"#, "42", r#""ok""#, "null"] {
            let err = classify_response(HttpMethod::Get, "u", &response(200, body)).unwrap_err();
            assert_eq!(err.kind(), "serialization", "body {body}");
        }
    }

    #[tokio::test]
    async fn test_headers_attached() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::data(
            json!({}),
        )]));
        let pipeline = pipeline(transport.clone(), MockIdentityProvider::succeeding());
        let descriptor =
            RequestDescriptor::post("stop", "/v2/apps/x", &json!({"connectorId": 1})).unwrap();

        pipeline.execute(descriptor).await.unwrap();

        let request = transport.last_request().unwrap();
        assert_eq!(request.url, "https://client-api.evnex.io/v2/apps/x");
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("access-token-1")
        );
        assert_eq!(request.headers.get("Accept").map(String::as_str), Some(ACCEPT));
        assert_eq!(request.headers.get("User-Agent").map(String::as_str), Some("evnex-test/1.0"));
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(request.json_body(), Some(json!({"connectorId": 1})));
    }

    #[tokio::test]
    async fn test_get_has_no_body_or_content_type() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::data(
            json!({}),
        )]));
        let pipeline = pipeline(transport.clone(), MockIdentityProvider::succeeding());

        pipeline
            .execute(RequestDescriptor::get("user", "/v2/apps/user"))
            .await
            .unwrap();

        let request = transport.last_request().unwrap();
        assert!(request.body.is_none());
        assert!(!request.headers.contains_key("Content-Type"));
    }

    #[tokio::test]
    async fn test_auth_failure_skips_network() {
        let transport = Arc::new(MockTransport::new());
        let pipeline = pipeline(transport.clone(), MockIdentityProvider::failing("nope"));

        let err = pipeline
            .execute(RequestDescriptor::get("user", "/v2/apps/user"))
            .await
            .unwrap_err();

        assert!(err.is_auth_failure());
        transport.verify_request_count(0);
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let transport = Arc::new(MockTransport::new());
        let pipeline = pipeline(transport.clone(), MockIdentityProvider::succeeding());
        pipeline.cancel.cancel();

        let err = pipeline
            .execute(RequestDescriptor::get("user", "/v2/apps/user"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "cancelled");
        transport.verify_request_count(0);
        assert!(!pipeline.ensure_authenticated().await);
    }
}
