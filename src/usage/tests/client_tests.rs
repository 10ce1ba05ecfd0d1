//! Tests for the session auth client.

use super::*;
use crate::usage::credentials::MemoryCredentialStore;
use crate::usage::error::{TransportError, TransportErrorKind};
use crate::usage::transport::fake::FakeTransport;

const BASE: &str = "https://claude.test/api";

const ORGS_BODY: &str = r#"[{"uuid": "org-123", "name": "Personal"}, {"uuid": "org-456", "name": "Team"}]"#;

const USAGE_BODY: &str = r#"{
    "five_hour": {"utilization": 42.0, "resets_at": "2025-06-01T17:00:00.123456+00:00"},
    "seven_day": {"utilization": 12.5, "resets_at": "2025-06-05T09:00:00Z"},
    "seven_day_opus": null,
    "seven_day_sonnet": {"utilization": 3.0, "resets_at": null}
}"#;

fn identity() -> ClientIdentity {
    ClientIdentity {
        device_id: "0b4e7c1a-2f3d-4c5e-8a9b-1c2d3e4f5a6b".to_string(),
        anonymous_id: "claudeai.v1.9f8e7d6c-5b4a-4c3d-9e2f-1a0b9c8d7e6f".to_string(),
    }
}

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-06-01T12:34:56Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn client_with(
    transport: Arc<FakeTransport>,
    credentials: Arc<MemoryCredentialStore>,
) -> SessionAuthClient {
    SessionAuthClient::new(transport, credentials, identity(), BASE)
}

fn logged_in() -> Arc<MemoryCredentialStore> {
    Arc::new(MemoryCredentialStore::with_session_key("sk-test"))
}

#[test]
fn test_missing_credential_issues_no_request() {
    let transport = Arc::new(FakeTransport::new());
    let mut client = client_with(transport.clone(), Arc::new(MemoryCredentialStore::new()));

    let err = client.fetch_usage_at(now()).unwrap_err();

    assert!(matches!(err, UsageError::NoCredential));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_empty_credential_is_treated_as_absent() {
    let transport = Arc::new(FakeTransport::new());
    let credentials = Arc::new(MemoryCredentialStore::new());
    credentials.set_full_cookies(Some("")).unwrap();
    let mut client = client_with(transport.clone(), credentials);

    assert!(matches!(
        client.fetch_usage_at(now()),
        Err(UsageError::NoCredential)
    ));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_discovers_first_organization_then_fetches_usage() {
    let transport = Arc::new(FakeTransport::new());
    transport
        .push_response(200, ORGS_BODY)
        .push_response(200, USAGE_BODY);
    let credentials = logged_in();
    let mut client = client_with(transport.clone(), credentials.clone());

    let report = client.fetch_usage_at(now()).unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].url, "https://claude.test/api/organizations");
    assert_eq!(
        requests[1].url,
        "https://claude.test/api/organizations/org-123/usage"
    );
    assert_eq!(client.organization_id(), Some("org-123"));
    assert_eq!(credentials.organization_id(), Some("org-123".to_string()));

    assert_eq!(report.session.utilization, 42.0);
    assert_eq!(
        report.session.resets_at.unwrap().to_rfc3339(),
        "2025-06-01T17:00:00.123456+00:00"
    );
    assert_eq!(report.weekly.utilization, 12.5);
    assert_eq!(
        report.weekly.resets_at.unwrap().to_rfc3339(),
        "2025-06-05T09:00:00+00:00"
    );
    let sonnet = report.sonnet.unwrap();
    assert_eq!(sonnet.utilization, 3.0);
    assert_eq!(sonnet.resets_at, None);
    assert!(report.opus.is_none());
    assert_eq!(report.fetched_at, now());
}

#[test]
fn test_cached_organization_skips_discovery() {
    let transport = Arc::new(FakeTransport::new());
    transport
        .push_response(200, ORGS_BODY)
        .push_response(200, USAGE_BODY)
        .push_response(200, USAGE_BODY);
    let mut client = client_with(transport.clone(), logged_in());

    client.fetch_usage_at(now()).unwrap();
    client.fetch_usage_at(now()).unwrap();

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(urls.len(), 3);
    assert!(urls[2].ends_with("/organizations/org-123/usage"));
}

#[test]
fn test_persisted_organization_override_is_used() {
    let transport = Arc::new(FakeTransport::new());
    transport.push_response(200, USAGE_BODY);
    let credentials = logged_in();
    credentials.set_organization_id(Some("org-override")).unwrap();
    let mut client = client_with(transport.clone(), credentials);

    client.fetch_usage_at(now()).unwrap();

    assert_eq!(transport.request_count(), 1);
    assert!(transport.requests()[0]
        .url
        .ends_with("/organizations/org-override/usage"));
}

#[test]
fn test_empty_organization_list() {
    let transport = Arc::new(FakeTransport::new());
    transport.push_response(200, "[]");
    let mut client = client_with(transport.clone(), logged_in());

    assert!(matches!(
        client.fetch_usage_at(now()),
        Err(UsageError::NoOrganization)
    ));
    assert_eq!(client.organization_id(), None);
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_unauthorized_clears_organization_cache() {
    for status in [401u16, 403] {
        let transport = Arc::new(FakeTransport::new());
        transport.push_response(status, "{}");
        let credentials = logged_in();
        credentials.set_organization_id(Some("org-123")).unwrap();
        let mut client = client_with(transport.clone(), credentials.clone());
        assert_eq!(client.organization_id(), Some("org-123"));

        let err = client.fetch_usage_at(now()).unwrap_err();

        assert!(matches!(err, UsageError::Unauthorized), "status {}", status);
        assert_eq!(client.organization_id(), None);
        assert_eq!(credentials.organization_id(), None);
    }
}

#[test]
fn test_unauthorized_forces_rediscovery_on_next_call() {
    let transport = Arc::new(FakeTransport::new());
    transport
        .push_response(401, "")
        .push_response(200, r#"[{"uuid": "org-new", "name": "New"}]"#)
        .push_response(200, USAGE_BODY);
    let credentials = logged_in();
    credentials.set_organization_id(Some("org-stale")).unwrap();
    let mut client = client_with(transport.clone(), credentials);

    assert!(client.fetch_usage_at(now()).is_err());
    client.fetch_usage_at(now()).unwrap();

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert!(urls[0].ends_with("/organizations/org-stale/usage"));
    assert!(urls[1].ends_with("/organizations"));
    assert!(urls[2].ends_with("/organizations/org-new/usage"));
}

#[test]
fn test_non_success_status_is_invalid_response() {
    let transport = Arc::new(FakeTransport::new());
    transport.push_response(500, "oops");
    let credentials = logged_in();
    credentials.set_organization_id(Some("org-123")).unwrap();
    let mut client = client_with(transport, credentials);

    let err = client.fetch_usage_at(now()).unwrap_err();

    assert!(matches!(err, UsageError::InvalidResponse { status: 500 }));
    assert_eq!(client.organization_id(), Some("org-123"));
}

#[test]
fn test_transport_failure_is_network_error() {
    let transport = Arc::new(FakeTransport::new());
    transport.push_error(TransportError::new(
        TransportErrorKind::Timeout,
        "deadline elapsed",
    ));
    let mut client = client_with(transport, logged_in());

    match client.fetch_usage_at(now()) {
        Err(UsageError::Network(e)) => assert_eq!(e.kind, TransportErrorKind::Timeout),
        other => panic!("expected network error, got {:?}", other),
    }
}

#[test]
fn test_challenge_marker_takes_precedence_over_decoding() {
    let bodies = [
        "<html><title>Just a moment...</title></html>",
        r#"{"five_hour": "Just a moment"}"#,
        "not json but cf_clearance is mentioned",
        "<!DOCTYPE html><html><body>nope</body></html>",
        "  <!doctype html><p>blocked</p>",
    ];
    for body in bodies {
        let transport = Arc::new(FakeTransport::new());
        transport.push_response(200, body);
        let credentials = logged_in();
        credentials.set_organization_id(Some("org-123")).unwrap();
        let mut client = client_with(transport, credentials);

        let err = client.fetch_usage_at(now()).unwrap_err();
        assert!(
            matches!(err, UsageError::ChallengeBlocked),
            "body {:?} gave {:?}",
            body,
            err
        );
    }
}

#[test]
fn test_challenge_on_discovery_is_reported() {
    let transport = Arc::new(FakeTransport::new());
    transport.push_response(200, "<!DOCTYPE html><title>Just a moment...</title>");
    let mut client = client_with(transport, logged_in());

    assert!(matches!(
        client.fetch_usage_at(now()),
        Err(UsageError::ChallengeBlocked)
    ));
}

#[test]
fn test_schema_mismatch_is_decoding_error() {
    let transport = Arc::new(FakeTransport::new());
    transport.push_response(200, r#"{"five_hour": {"utilization": "lots"}}"#);
    let credentials = logged_in();
    credentials.set_organization_id(Some("org-123")).unwrap();
    let mut client = client_with(transport, credentials);

    assert!(matches!(
        client.fetch_usage_at(now()),
        Err(UsageError::Decoding(_))
    ));
}

#[test]
fn test_embedded_html_without_marker_is_decoding_error() {
    let transport = Arc::new(FakeTransport::new());
    transport
        .push_response(200, "error page <html><body>503</body></html>")
        .push_response(200, r#"{"five_hour": {"utilization": "<html> lots"}}"#);
    let credentials = logged_in();
    credentials.set_organization_id(Some("org-123")).unwrap();
    let mut client = client_with(transport, credentials);

    assert!(matches!(
        client.fetch_usage_at(now()),
        Err(UsageError::Decoding(_))
    ));
    assert!(matches!(
        client.fetch_usage_at(now()),
        Err(UsageError::Decoding(_))
    ));
}

#[test]
fn test_request_carries_cookie_and_client_headers() {
    let transport = Arc::new(FakeTransport::new());
    transport.push_response(200, USAGE_BODY);
    let credentials = logged_in();
    credentials.set_full_cookies(Some("cf_clearance=abc")).unwrap();
    credentials.set_organization_id(Some("org-123")).unwrap();
    let mut client = client_with(transport.clone(), credentials);

    client.fetch_usage_at(now()).unwrap();

    let request = &transport.requests()[0];
    assert_eq!(
        request.header("cookie"),
        Some("sessionKey=sk-test; cf_clearance=abc")
    );
    assert_eq!(
        request.header("anthropic-device-id"),
        Some("0b4e7c1a-2f3d-4c5e-8a9b-1c2d3e4f5a6b")
    );
    assert_eq!(
        request.header("anthropic-anonymous-id"),
        Some("claudeai.v1.9f8e7d6c-5b4a-4c3d-9e2f-1a0b9c8d7e6f")
    );
    assert_eq!(request.header("anthropic-client-platform"), Some("web_claude_ai"));
    assert_eq!(request.header("origin"), Some("https://claude.ai"));
}

#[test]
fn test_missing_windows_default_to_zero_resetting_now() {
    let report = map_usage_response(&UsageResponse::default(), now());
    assert_eq!(report.session.utilization, 0.0);
    assert_eq!(report.session.resets_at, Some(now()));
    assert_eq!(report.weekly.resets_at, Some(now()));
    assert!(report.sonnet.is_none());

    let snapshot = report.to_snapshot();
    assert_eq!(snapshot.timestamp, now());
    assert_eq!(snapshot.sonnet_usage, None);
    assert_eq!(snapshot.session_resets_at, Some(now()));
}

#[test]
fn test_parse_reset_time_formats() {
    let fractional = parse_reset_time("2025-06-01T17:00:00.5Z", now());
    assert_eq!(fractional.timestamp_subsec_millis(), 500);

    let whole = parse_reset_time("2025-06-01T17:00:00+02:00", now());
    assert_eq!(whole.to_rfc3339(), "2025-06-01T15:00:00+00:00");

    let compact_offset = parse_reset_time("2025-06-01T17:00:00+0000", now());
    assert_eq!(compact_offset.to_rfc3339(), "2025-06-01T17:00:00+00:00");

    assert_eq!(parse_reset_time("tomorrow", now()), now());
}

#[test]
fn test_is_challenge_page() {
    assert!(is_challenge_page("Just a moment..."));
    assert!(is_challenge_page("set cf_clearance cookie"));
    assert!(is_challenge_page("\n<!DOCTYPE HTML>"));
    assert!(!is_challenge_page(r#"{"five_hour": null}"#));
    assert!(!is_challenge_page(""));
}
