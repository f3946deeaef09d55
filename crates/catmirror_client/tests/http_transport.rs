//! HTTP transport tests against a local mock server.

use catmirror_client::{
    CatalogTransport, ClientConfig, ClientError, HttpTransport, LoginRequest, SessionToken,
};
use catmirror_model::{HierarchyLevel, RemoteId, RemoteRecordSet, Scope};
use std::time::Duration;
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn credentials() -> LoginRequest {
    LoginRequest {
        username: "svc".into(),
        password: "secret".into(),
    }
}

fn token() -> SessionToken {
    SessionToken {
        token: "t-123".into(),
        expires_at: None,
    }
}

async fn transport(server: &MockServer) -> HttpTransport {
    HttpTransport::new(server.uri(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn login_returns_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "t-123" })),
        )
        .mount(&server)
        .await;

    let response = transport(&server).await.login(&credentials()).await.unwrap();
    assert_eq!(response.token, "t-123");
    assert_eq!(response.expires_at, None);
}

#[tokio::test]
async fn rejected_login_is_authentication_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let result = transport(&server).await.login(&credentials()).await;
    assert!(matches!(result, Err(ClientError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn unauthorized_data_call_is_tagged_expired() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/directories"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = transport(&server)
        .await
        .list(&token(), HierarchyLevel::Directory)
        .await;
    assert!(matches!(result, Err(ClientError::AuthExpired)));
}

#[tokio::test]
async fn overload_status_is_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let result = transport(&server)
        .await
        .list(&token(), HierarchyLevel::Project)
        .await;
    match result {
        Err(err @ ClientError::Status { code: 503, .. }) => assert!(err.is_retryable()),
        other => panic!("expected 503 status error, got {other:?}"),
    }
}

#[tokio::test]
async fn not_found_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/select/nope"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = transport(&server)
        .await
        .select(&token(), &Scope::Directory(RemoteId::new("nope")))
        .await;
    match result {
        Err(err @ ClientError::Status { code: 404, .. }) => assert!(!err.is_retryable()),
        other => panic!("expected 404 status error, got {other:?}"),
    }
}

#[tokio::test]
async fn select_then_list_carries_bearer_and_parses_records() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/select/d1"))
        .and(bearer_token("t-123"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects"))
        .and(bearer_token("t-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": "p1", "name": "Atrium", "status": "open",
              "changed_at": "2026-03-01T08:00:00Z" },
            { "id": "p2", "name": "Lobby" }
        ])))
        .mount(&server)
        .await;

    let transport = transport(&server).await;
    transport
        .select(&token(), &Scope::Directory(RemoteId::new("d1")))
        .await
        .unwrap();
    let records = transport
        .list(&token(), HierarchyLevel::Project)
        .await
        .unwrap();

    match records {
        RemoteRecordSet::Projects(projects) => {
            assert_eq!(projects.len(), 2);
            assert_eq!(projects[0].id, RemoteId::new("p1"));
            assert!(projects[0].changed_at.is_some());
            // Missing fields fall back to defaults.
            assert_eq!(projects[1].status, "");
            assert!(projects[1].changed_at.is_none());
        }
        other => panic!("expected projects, got {other:?}"),
    }
}

#[tokio::test]
async fn configured_request_timeout_bounds_each_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "token": "t-123" }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let config = ClientConfig::new(server.uri(), "svc", "secret")
        .with_request_timeout(Duration::from_millis(50));
    let transport = HttpTransport::from_config(&config).unwrap();
    let result = transport.login(&credentials()).await;
    assert!(matches!(result, Err(ClientError::Timeout)));
}

#[tokio::test]
async fn malformed_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/phases"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let result = transport(&server)
        .await
        .list(&token(), HierarchyLevel::Phase)
        .await;
    assert!(matches!(result, Err(ClientError::InvalidResponse(_))));
}
