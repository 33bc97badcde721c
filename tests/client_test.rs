//! Integration tests for EvnexClient against mock transports.

use evnex_client::mocks::{fixtures, MockIdentityProvider, MockResponse, MockTransport};
use evnex_client::transport::{HttpMethod, TransportError};
use evnex_client::{EvnexClient, EvnexError, RequestDescriptor};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn create_test_client(
    transport: Arc<MockTransport>,
    provider: Arc<MockIdentityProvider>,
) -> EvnexClient {
    EvnexClient::builder()
        .credentials("owner@example.com", "correct horse battery staple")
        .transport(transport)
        .identity_provider(provider)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_get_user_end_to_end() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::json(&json!({
        "data": {"id": "u1", "organisations": [{"id": "o1", "isDefault": true}]},
        "error": null
    }))]));
    let provider = Arc::new(MockIdentityProvider::succeeding());
    let client = create_test_client(transport.clone(), provider);

    let user = client.users().current().await.unwrap();

    assert_eq!(
        user.as_value(),
        &json!({"id": "u1", "organisations": [{"id": "o1", "isDefault": true}]})
    );
    let request = transport.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Get);
    assert_eq!(request.url, "https://client-api.evnex.io/v2/apps/user");
    assert_eq!(request.headers.get("Authorization").map(String::as_str), Some("access-token-1"));
}

#[tokio::test]
async fn test_failed_login_makes_no_api_call() {
    let transport = Arc::new(MockTransport::new());
    let provider = Arc::new(MockIdentityProvider::failing("Incorrect username or password."));
    let client = create_test_client(transport.clone(), provider.clone());

    let err = client.users().current().await.unwrap_err();

    assert!(err.is_auth_failure());
    assert_eq!(err.kind(), "auth_failed");
    transport.verify_request_count(0);
    assert!(!client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_failed_login_is_retried_on_next_call() {
    let transport = Arc::new(MockTransport::new());
    let provider = Arc::new(MockIdentityProvider::failing("down"));
    let client = create_test_client(transport.clone(), provider.clone());

    assert!(!client.ensure_authenticated().await);
    assert!(!client.ensure_authenticated().await);

    assert_eq!(provider.authenticate_count(), 2);
    transport.verify_request_count(0);
}

#[tokio::test]
async fn test_business_error_on_http_200() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::raw(
        200,
        r#"{"error":"X"}"#,
    )]));
    let client = create_test_client(transport, Arc::new(MockIdentityProvider::succeeding()));

    let err = client.organisations().get("o1").await.unwrap_err();

    match err {
        EvnexError::Business { error } => assert_eq!(error, json!("X")),
        other => panic!("Expected Business error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_data_passed_through_unchanged() {
    let data = json!({
        "id": "o1",
        "tiers": [{"rate": 0.25, "from": "00:00"}, {"rate": null}],
        "flags": {"beta": true},
        "count": 12
    });
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::data(data.clone())]));
    let client = create_test_client(transport, Arc::new(MockIdentityProvider::succeeding()));

    let result = client.organisations().get("o1").await.unwrap();

    assert_eq!(result, data);
}

#[tokio::test]
async fn test_http_401_reports_status() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::status(
        401,
        "Unauthorized",
    )]));
    let client = create_test_client(transport, Arc::new(MockIdentityProvider::succeeding()));

    let err = client.charge_points().get("cp1").await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "HTTP 401 Unauthorized");
    // The cached session is kept; a 401 does not trigger a new login.
    assert!(client.session().is_authenticated().await);
}

#[tokio::test]
async fn test_transport_failure() {
    let transport = Arc::new(MockTransport::new());
    transport.queue_failure(TransportError::Connection {
        message: "connection refused".to_string(),
    });
    let client = create_test_client(transport, Arc::new(MockIdentityProvider::succeeding()));

    let err = client.charge_points().transactions("cp1").await.unwrap_err();

    assert!(matches!(err, EvnexError::Transport(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_session_cached_across_calls() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::data(fixtures::user()),
        MockResponse::data(fixtures::charge_points()),
        MockResponse::data(fixtures::charge_point()),
    ]));
    let provider = Arc::new(MockIdentityProvider::succeeding());
    let client = create_test_client(transport.clone(), provider.clone());

    assert_ok!(client.users().current().await);
    assert_ok!(client.organisations().charge_points("o1").await);
    assert_ok!(client.charge_points().get("cp1").await);

    assert_eq!(provider.authenticate_count(), 1);
    assert_eq!(client.session().exchange_count(), 1);
    assert!(transport
        .requests()
        .iter()
        .all(|r| r.headers.get("Authorization").map(String::as_str) == Some("access-token-1")));
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_login() {
    let transport = Arc::new(MockTransport::with_responses(
        (0..8).map(|_| MockResponse::data(json!({}))).collect(),
    ));
    let provider =
        Arc::new(MockIdentityProvider::succeeding().with_delay(Duration::from_millis(50)));
    let client = create_test_client(transport.clone(), provider.clone());

    let calls = (0..8).map(|i| client.locations().get(if i % 2 == 0 { "loc1" } else { "loc2" }));
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(provider.authenticate_count(), 1);
    transport.verify_request_count(8);
}

#[tokio::test]
async fn test_relative_and_absolute_urls() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::data(json!({})),
        MockResponse::data(json!({})),
    ]));
    let provider = Arc::new(MockIdentityProvider::succeeding());
    let client = create_test_client(transport.clone(), provider);

    assert_ok!(client.execute(RequestDescriptor::get("relative", "/v2/apps/user")).await);
    assert_ok!(
        client
            .execute(RequestDescriptor::get(
                "absolute",
                "https://other.example.com/v2/apps/locations/loc1"
            ))
            .await
    );

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://client-api.evnex.io/v2/apps/user".to_string(),
            "https://other.example.com/v2/apps/locations/loc1".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_stop_transaction_accepted_without_data() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::json(&json!({
        "data": null,
        "error": null,
        "response": {"status": "Accepted"}
    }))]));
    let provider = Arc::new(MockIdentityProvider::succeeding());
    let client = create_test_client(transport.clone(), provider);

    let outcome = client
        .organisations()
        .stop_transaction("o1", "cp1", 1)
        .await
        .unwrap();

    assert_eq!(outcome.status.as_deref(), Some("Accepted"));
    assert!(outcome.data.is_none());
    let request = transport.last_request().unwrap();
    assert_eq!(request.method, HttpMethod::Post);
    assert_eq!(request.json_body(), Some(json!({"connectorId": 1})));
}

#[tokio::test]
async fn test_expired_session_kept_by_default() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::data(json!({})),
        MockResponse::data(json!({})),
    ]));
    let provider = Arc::new(MockIdentityProvider::succeeding().with_expires_in(-10));
    let client = create_test_client(transport, provider.clone());

    assert_ok!(client.locations().get("loc1").await);
    assert_ok!(client.locations().get("loc1").await);

    assert_eq!(provider.authenticate_count(), 1);
    assert_eq!(provider.refresh_count(), 0);
}

#[tokio::test]
async fn test_cancelled_client_fails_fast() {
    let transport = Arc::new(MockTransport::new().with_delay(Duration::from_secs(30)));
    let client = create_test_client(transport, Arc::new(MockIdentityProvider::succeeding()));
    let token = client.cancellation_token();

    let call = client.users().current();
    tokio::pin!(call);
    tokio::select! {
        _ = &mut call => panic!("call should still be pending"),
        () = tokio::time::sleep(Duration::from_millis(20)) => token.cancel(),
    }

    let err = assert_err!(call.await);
    assert!(matches!(err, EvnexError::Cancelled));
    assert_eq!(client.metrics().snapshot().errors.get("cancelled"), Some(&1));
}
