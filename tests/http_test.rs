//! End-to-end tests over real HTTP: Cognito login and API calls served by
//! a local mock server.

use evnex_client::mocks::fixtures;
use evnex_client::{ChargeSchedule, EvnexClient, EvnexError};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{
    body_json, body_partial_json, header, headers, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TARGET: &str = "x-amz-target";
const INITIATE_AUTH: &str = "AWSCognitoIdentityProviderService.InitiateAuth";
const RESPOND_TO_CHALLENGE: &str = "AWSCognitoIdentityProviderService.RespondToAuthChallenge";

async fn mount_cognito(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/cognito/"))
        .and(header(TARGET, INITIATE_AUTH))
        .and(body_partial_json(json!({
            "AuthFlow": "USER_SRP_AUTH",
            "AuthParameters": {"USERNAME": "owner@example.com"}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(fixtures::password_verifier_challenge()),
        )
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/cognito/"))
        .and(header(TARGET, RESPOND_TO_CHALLENGE))
        .and(body_partial_json(json!({
            "ChallengeName": "PASSWORD_VERIFIER",
            "ChallengeResponses": {"USERNAME": "user-id-for-srp"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::authentication_result()))
        .expect(1)
        .mount(server)
        .await;
}

fn create_test_client(server: &MockServer) -> EvnexClient {
    EvnexClient::builder()
        .credentials("owner@example.com", "correct horse battery staple")
        .base_url(server.uri())
        .cognito_endpoint(format!("{}/cognito/", server.uri()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_login_then_get_user() {
    let server = MockServer::start().await;
    mount_cognito(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/user"))
        .and(header("authorization", "access-token"))
        .and(headers("accept", vec!["application/json", "text/plain", "*/*"]))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": fixtures::user(),
            "error": null
        })))
        .expect(2)
        .mount(&server)
        .await;
    let client = create_test_client(&server);

    let first = client.users().current().await.unwrap();
    let second = client.users().current().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.default_organisation_id().as_deref(), Some("o1"));
    assert_eq!(client.session().exchange_count(), 1);
}

#[tokio::test]
async fn test_rejected_password() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header(TARGET, INITIATE_AUTH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazonaws.cognito#NotAuthorizedException",
            "message": "Incorrect username or password."
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let client = create_test_client(&server);

    let err = client.users().current().await.unwrap_err();

    match err {
        EvnexError::Authentication { message, code } => {
            assert_eq!(message, "Incorrect username or password.");
            assert_eq!(code.as_deref(), Some("NotAuthorizedException"));
        }
        other => panic!("Expected Authentication error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_insights_and_schedule_over_http() {
    let server = MockServer::start().await;
    mount_cognito(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/organisations/o1/summary/insights"))
        .and(query_param("days", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"date": "2026-10-01", "powerUsage": 12.5}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v2/apps/charge-points/cp1/charge-schedule"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "chargingProfilePeriods": [{"start": 0, "limit": 32}, {"start": 82800, "limit": 0}],
            "duration": 86400,
            "enabled": true,
            "units": "A"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "error": null,
            "response": {"status": "Accepted"}
        })))
        .mount(&server)
        .await;
    let client = create_test_client(&server);

    let insights = client.organisations().insights("o1", 7).await.unwrap();
    let outcome = client
        .charge_points()
        .set_charge_schedule("cp1", &ChargeSchedule::two_period(true, 0, 32, 82_800, 0))
        .await
        .unwrap();

    assert_eq!(insights[0]["powerUsage"], json!(12.5));
    assert!(outcome.is_accepted());
}

#[tokio::test]
async fn test_server_error_over_http() {
    let server = MockServer::start().await;
    mount_cognito(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/charge-points/cp1"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    let client = create_test_client(&server);

    let err = client.charge_points().get("cp1").await.unwrap_err();

    match err {
        EvnexError::Http { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body.as_deref(), Some("maintenance"));
        }
        other => panic!("Expected Http error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_custom_http_client_is_used() {
    let server = MockServer::start().await;
    mount_cognito(&server).await;
    Mock::given(method("GET"))
        .and(path("/v2/apps/user"))
        .and(header("x-evnex-test", "custom-client"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": fixtures::user(),
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;
    let mut default_headers = reqwest::header::HeaderMap::new();
    default_headers.insert(
        "x-evnex-test",
        reqwest::header::HeaderValue::from_static("custom-client"),
    );
    let http_client = reqwest::Client::builder()
        .default_headers(default_headers)
        .build()
        .unwrap();
    let client = EvnexClient::builder()
        .credentials("owner@example.com", "correct horse battery staple")
        .base_url(server.uri())
        .cognito_endpoint(format!("{}/cognito/", server.uri()))
        .http_client(http_client)
        .build()
        .unwrap();

    let user = client.users().current().await.unwrap();

    assert_eq!(user.default_organisation_id().as_deref(), Some("o1"));
}
