use std::time::{Duration, Instant};

use crate::common::{
    BeginMode, MockSsoServer, TEST_ORIGIN, TEST_RP_ID, closed_port_url, init_test_tracing,
    registrar_for, registrar_with_config,
};
use axum::http::StatusCode;
use sso_passkey::{
    CeremonyError, CeremonyErrorKind, HttpRegistrationServer, PasskeyRegistrar, ServerConfig,
    SoftwareAuthenticator,
};

#[tokio::test]
async fn test_begin_rejection_is_passed_through() {
    let server = MockSsoServer::start(TEST_ORIGIN, TEST_RP_ID).await;
    server.state.set_begin_mode(BeginMode::Reject {
        code: 1,
        message: "rate limited".to_string(),
    });
    let registrar = registrar_for(&server.base_url);

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::ServerRejected);
    assert_eq!(err.to_string(), "rate limited");
    assert!(err.is_retryable());
    assert!(
        registrar
            .authenticator()
            .issued_credential_ids()
            .await
            .is_empty()
    );
}

#[tokio::test]
async fn test_begin_http_failure_is_transport_error() {
    let server = MockSsoServer::start(TEST_ORIGIN, TEST_RP_ID).await;
    server
        .state
        .set_begin_mode(BeginMode::HttpFailure(StatusCode::SERVICE_UNAVAILABLE));
    let registrar = registrar_for(&server.base_url);

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::Transport);
    assert!(err.to_string().contains("503"));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_begin_non_envelope_is_malformed_challenge() {
    let server = MockSsoServer::start(TEST_ORIGIN, TEST_RP_ID).await;
    server.state.set_begin_mode(BeginMode::Garbage);
    let registrar = registrar_for(&server.base_url);

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::MalformedChallenge);
}

#[tokio::test]
async fn test_configured_timeout_reaches_http_client() {
    let server = MockSsoServer::start(TEST_ORIGIN, TEST_RP_ID).await;
    server
        .state
        .set_begin_mode(BeginMode::Slow(Duration::from_secs(5)));
    let config = ServerConfig::new(&server.base_url)
        .unwrap()
        .with_timeout(Duration::from_millis(200));
    let registrar = registrar_with_config(config);

    let started = Instant::now();
    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::Transport);
    assert!(started.elapsed() < Duration::from_secs(4));
    assert!(server.state.finish_requests().is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_transport_error() {
    let registrar = registrar_for(&closed_port_url().await);

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::Transport);
}

#[tokio::test]
async fn test_finish_rejection_carries_code() {
    let server = MockSsoServer::start(TEST_ORIGIN, TEST_RP_ID).await;
    server.state.reject_finish(40002, "attestation verification failed");
    let registrar = registrar_for(&server.base_url);

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    match err {
        CeremonyError::ServerRejected { code, message } => {
            assert_eq!(code, 40002);
            assert_eq!(message, "attestation verification failed");
        }
        other => panic!("Expected ServerRejected, got {other:?}"),
    }
    assert!(server.state.credentials_for("user-42").is_empty());
}

#[tokio::test]
async fn test_origin_mismatch_is_rejected_by_server() {
    // The authenticator's origin is fine for itself, but not the one the server expects.
    let server = MockSsoServer::start("https://sso.example.com", TEST_RP_ID).await;
    let registrar = registrar_for(&server.base_url);

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::ServerRejected);
    assert!(err.to_string().contains("unexpected origin"));
}

#[tokio::test]
async fn test_foreign_rp_id_is_security_violation() {
    let server = MockSsoServer::start(TEST_ORIGIN, "sso.example.com").await;
    let registrar = registrar_for(&server.base_url);

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::SecurityViolation);
    assert!(!err.is_retryable());
    assert!(server.state.finish_requests().is_empty());
}

#[tokio::test]
async fn test_unavailable_authenticator_makes_no_requests() {
    init_test_tracing();
    let server = MockSsoServer::start(TEST_ORIGIN, TEST_RP_ID).await;
    let http = HttpRegistrationServer::new(ServerConfig::new(&server.base_url).unwrap()).unwrap();
    let registrar = PasskeyRegistrar::new(
        http,
        SoftwareAuthenticator::new(TEST_ORIGIN).with_availability(false),
    );

    let err = registrar
        .begin_registration("user-42", "alice", "Alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), CeremonyErrorKind::UnsupportedPlatform);
    assert_eq!(server.state.begin_calls(), 0);
}
