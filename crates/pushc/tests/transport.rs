mod common;

use common::*;
use push_common::auth::basic_credential;
use pushc::config::TransportConfig;
use pushc::request::ClientIdentity;
use pushc::trust::{seal, PinnedTrustContext};
use pushc::{ErrorKind, PushError, PushServiceClient};

#[test]
fn create_account_posts_to_sms_path_by_default() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let client = test_client(&server);

    client.create_account(false).unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v1/accounts/sms/+15551234567");
}

#[test]
fn create_account_with_voice_uses_voice_path() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let client = test_client(&server);

    client.create_account(true).unwrap();

    let requests = server.requests();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path, "/v1/accounts/voice/+15551234567");
}

#[test]
fn service_requests_carry_basic_auth_and_json_content_type() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let client = test_client(&server);

    client.verify_account("123456").unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path, "/v1/accounts/code/123456");
    assert_eq!(
        request.header("authorization"),
        Some(basic_credential(NUMBER, PASSWORD).as_str())
    );
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert!(request.body.is_empty());
}

#[test]
fn empty_secret_sends_no_authorization() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let config = TransportConfig::new(server.url()).without_pinning();
    let client = PushServiceClient::new(&config, ClientIdentity::new(NUMBER, ""), None).unwrap();

    client.create_account(false).unwrap();

    assert!(server.requests()[0].header("authorization").is_none());
}

#[test]
fn register_token_puts_registration_id() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let client = test_client(&server);

    client.register_token("device-token-1").unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path, "/v1/accounts/gcm/");
    assert_eq!(
        request.json(),
        serde_json::json!({ "gcmRegistrationId": "device-token-1" })
    );
}

#[test]
fn unregister_token_deletes_without_body() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let client = test_client(&server);

    client.unregister_token().unwrap();

    let request = &server.requests()[0];
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.path, "/v1/accounts/gcm/");
    assert!(request.body.is_empty());
}

#[test]
fn status_413_is_rate_limited_regardless_of_body() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::json(413, r#"{"success":[],"failure":[]}"#)]);
    let client = test_client(&server);

    let err = client.register_token("t").unwrap_err();
    assert!(matches!(err, PushError::RateLimited { status: 413 }));
    assert_eq!(err.kind(), ErrorKind::RateLimited);
}

#[test]
fn other_statuses_are_transport_failures_with_reason() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::status(403)]);
    let client = test_client(&server);

    match client.verify_account("000000").unwrap_err() {
        PushError::Transport { status, reason } => {
            assert_eq!(status, 403);
            assert_eq!(reason, "Forbidden");
        }
        other => panic!("expected Transport, got {other:?}"),
    }
}

#[test]
fn non_200_success_codes_still_fail() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::status(204)]);
    let client = test_client(&server);

    let err = client.unregister_token().unwrap_err();
    assert!(matches!(err, PushError::Transport { status: 204, .. }));
}

#[test]
fn unreachable_service_is_a_transport_failure() {
    let client = client_for(&dead_url());
    let err = client.create_account(false).unwrap_err();
    assert!(matches!(err, PushError::Connection(_)));
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn path_arguments_cannot_escape_their_segment() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let client = test_client(&server);

    let err = client.verify_account("12/../gcm").unwrap_err();
    assert!(matches!(err, PushError::InvalidPath(_)));
    assert!(server.requests().is_empty());
}

#[test]
fn dot_segment_codes_never_reach_the_wire() {
    let mut server = MockServer::bind();
    server.serve(vec![MockResponse::ok()]);
    let client = test_client(&server);

    for code in ["..", ".", "%2e%2e", "a b"] {
        let err = client.verify_account(code).unwrap_err();
        assert!(matches!(err, PushError::InvalidPath(_)), "{code:?}: {err:?}");
    }
    assert!(server.requests().is_empty());
}

#[test]
fn client_is_reusable_across_sequential_calls() {
    let mut server = MockServer::bind();
    server.serve(vec![
        MockResponse::ok(),
        MockResponse::status(500),
        MockResponse::ok(),
    ]);
    let client = test_client(&server);

    client.create_account(false).unwrap();
    assert!(client.verify_account("1").is_err());
    client.unregister_token().unwrap();
    assert_eq!(server.requests().len(), 3);
}

#[test]
fn pinned_client_builds_from_sealed_trust_store() {
    let ca = rcgen::generate_simple_self_signed(vec!["push.example.org".to_string()]).unwrap();
    let sealed = seal(ca.cert.pem().as_bytes(), "pass").unwrap();
    let trust = PinnedTrustContext::load(&sealed, "pass").unwrap();
    assert_eq!(trust.anchor_count(), 1);

    let config = TransportConfig::new("https://push.example.org");
    let client = PushServiceClient::new(&config, ClientIdentity::new(NUMBER, PASSWORD), Some(trust));
    assert!(client.is_ok());
}

#[test]
fn pinned_client_without_trust_is_fatal() {
    let config = TransportConfig::new("https://push.example.org");
    let err = PushServiceClient::new(&config, ClientIdentity::new(NUMBER, PASSWORD), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);
}
