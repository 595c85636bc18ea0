#![allow(clippy::unwrap_used)]
// Integration tests for `XiaoTuClient` using wiremock.

use std::time::Duration;

use chrono::{TimeDelta, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use xiaotu_api::response_log::REDACTED;
use xiaotu_api::transport::MINI_PROGRAM_REFERER;
use xiaotu_api::{
    Credentials, Error, ErrorKind, QuotaRetry, ResponseBody, SessionSnapshot, TransportConfig,
    XiaoTuClient,
};

// ── Helpers ─────────────────────────────────────────────────────────

const LOGIN: &str = "/userClient/clientV2/loginByOpenId";
const GET_DOOR: &str = "/wap/door/getDoor";

fn credentials() -> Credentials {
    Credentials::new("wx-openid", "client-secret".to_string().into())
}

fn fast_retry() -> QuotaRetry {
    QuotaRetry {
        max_retries: 3,
        unit: Duration::from_millis(1),
    }
}

async fn setup() -> (MockServer, XiaoTuClient) {
    let server = MockServer::start().await;
    let client = XiaoTuClient::with_client(
        reqwest::Client::new(),
        Url::parse(&server.uri()).unwrap(),
        credentials(),
    )
    .with_quota_retry(fast_retry());
    (server, client)
}

/// A client whose cache already holds a fresh `T1` session.
async fn setup_logged_in() -> (MockServer, XiaoTuClient) {
    let (server, client) = setup().await;
    let client = client.with_session(SessionSnapshot {
        token_id: "T1".into(),
        fetched_at: Utc::now(),
    });
    (server, client)
}

fn login_ok(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 200,
        "result": { "tokenId": token }
    }))
}

fn doors_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "code": 200,
        "result": [
            { "id": "D1", "type": "gate", "doorType": "door", "status": "0", "name": "North Gate" }
        ]
    }))
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_repeated_calls_share_one_login() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string_contains("openid=wx-openid"))
        .and(body_string_contains("clientId=client-secret"))
        .and(body_string_contains("version=2"))
        .respond_with(login_ok("T1"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .and(query_param("tokenId", "T1"))
        .and(header("tokenId", "T1"))
        .respond_with(doors_ok())
        .expect(3)
        .mount(&server)
        .await;

    for _ in 0..3 {
        let doors = client.list_doors().await.unwrap();
        assert_eq!(doors.len(), 1);
    }
}

#[tokio::test]
async fn test_expired_session_logs_in_once() {
    let (server, client) = setup().await;
    let stale = Utc::now() - TimeDelta::hours(7);
    let client = client.with_session(SessionSnapshot {
        token_id: "OLD".into(),
        fetched_at: stale,
    });

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string_contains("tokenId=OLD"))
        .respond_with(login_ok("T2"))
        .expect(1)
        .mount(&server)
        .await;

    client.session().await.unwrap();
    client.session().await.unwrap();

    let snapshot = client.session_snapshot().unwrap();
    assert_eq!(snapshot.token_id, "T2");
    assert!(snapshot.fetched_at > stale);
}

#[tokio::test]
async fn test_valid_seeded_session_skips_login() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(login_ok("NEW"))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .and(header("tokenId", "T1"))
        .respond_with(doors_ok())
        .mount(&server)
        .await;

    client.list_doors().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_callers_share_one_login() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(login_ok("T1").set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;

    let (a, b) = tokio::join!(client.session(), client.session());
    assert_eq!(a.unwrap().snapshot().token_id, "T1");
    assert_eq!(b.unwrap().snapshot().token_id, "T1");
}

#[tokio::test]
async fn test_login_accepts_access_token_field() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "200",
            "result": { "access_token": "AT" }
        })))
        .mount(&server)
        .await;

    let session = client.session().await.unwrap();
    assert_eq!(session.snapshot().token_id, "AT");
}

#[tokio::test]
async fn test_login_without_token_is_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": {}
        })))
        .mount(&server)
        .await;

    let result = client.session().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
    assert!(client.session_snapshot().is_none());
}

#[tokio::test]
async fn test_rejected_token_is_cleared_and_next_call_logs_in() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .and(body_string_contains("tokenId=&"))
        .respond_with(login_ok("T1"))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 301,
            "desc": "token expired"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(doors_ok())
        .mount(&server)
        .await;

    let first = client.list_doors().await;
    assert!(
        matches!(first, Err(Error::Authentication { ref message }) if message == "token expired"),
        "expected Authentication error, got: {first:?}"
    );
    assert!(client.session_snapshot().is_none());

    let doors = client.list_doors().await.unwrap();
    assert_eq!(doors.len(), 1);
}

#[tokio::test]
async fn test_late_rejection_keeps_newer_session() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path("/wap/door/openDoor"))
        .and(header("tokenId", "T1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "code": 301, "msg": "token expired" }))
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .and(header("tokenId", "T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 301 })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .and(header("tokenId", "T2"))
        .respond_with(doors_ok())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(login_ok("T2"))
        .expect(1)
        .mount(&server)
        .await;

    // The slow unlock still carries T1 when the listing has already
    // swapped it for T2.
    let (opened, listed) = tokio::join!(client.open_door("D1"), async {
        let rejected = client.list_doors().await.unwrap_err();
        assert_eq!(rejected.kind(), ErrorKind::Auth);
        client.list_doors().await
    });

    assert_eq!(opened.unwrap_err().kind(), ErrorKind::Auth);
    assert_eq!(listed.unwrap().len(), 1);
    assert_eq!(client.session_snapshot().unwrap().token_id, "T2");
}

// ── Classification tests ────────────────────────────────────────────

#[tokio::test]
async fn test_quota_retries_then_propagates() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(429).set_body_string("5"))
        .expect(4)
        .mount(&server)
        .await;

    let result = client.list_doors().await;
    assert!(
        matches!(
            result,
            Err(Error::Quota {
                retry_after_secs: 5,
                ..
            })
        ),
        "expected Quota error, got: {result:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_quota_backoff_doubles_retry_after() {
    let server = MockServer::start().await;
    // No timeout and no idle pool, so the only timers are the backoff sleeps.
    let http = reqwest::Client::builder()
        .pool_idle_timeout(None)
        .pool_max_idle_per_host(0)
        .build()
        .unwrap();
    let client = XiaoTuClient::with_client(http, Url::parse(&server.uri()).unwrap(), credentials())
        .with_session(SessionSnapshot {
            token_id: "T1".into(),
            fetched_at: Utc::now(),
        });

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(429).set_body_string("5"))
        .expect(4)
        .mount(&server)
        .await;

    let started = tokio::time::Instant::now();
    let result = client.list_doors().await;
    let waited = started.elapsed();

    assert!(matches!(result, Err(Error::Quota { .. })), "got: {result:?}");
    // Three retries, each sleeping 2 x 5 s.
    assert!(waited >= Duration::from_secs(30), "waited {waited:?}");
    assert!(waited < Duration::from_secs(31), "waited {waited:?}");
}

#[tokio::test]
async fn test_quota_recovers_within_retry_budget() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(403).set_body_string("Quota exceeded, wait 1s"))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(doors_ok())
        .expect(1)
        .mount(&server)
        .await;

    let doors = client.list_doors().await.unwrap();
    assert_eq!(doors[0].id().as_deref(), Some("D1"));
}

#[tokio::test]
async fn test_http_unauthorized_clears_session() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let err = client.list_doors().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(client.session_snapshot().is_none());
}

#[tokio::test]
async fn test_envelope_failure_is_api_error() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 500,
            "desc": "system busy"
        })))
        .mount(&server)
        .await;

    let result = client.list_doors().await;
    assert!(
        matches!(result, Err(Error::Api { ref message, code: Some(500), .. }) if message == "system busy"),
        "expected Api error, got: {result:?}"
    );
    assert!(client.session_snapshot().is_some());
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let result = client.list_doors().await;
    assert!(
        matches!(result, Err(Error::Api { status: Some(500), .. })),
        "expected Api error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    drop(server);

    let client = XiaoTuClient::with_client(reqwest::Client::new(), base_url, credentials());
    let err = client.session().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_null_door_result_is_empty() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .mount(&server)
        .await;

    assert!(client.list_doors().await.unwrap().is_empty());
}

// ── Endpoint tests ──────────────────────────────────────────────────

#[tokio::test]
async fn test_requests_carry_mini_program_headers() {
    let server = MockServer::start().await;
    let http = TransportConfig::default().build_client().unwrap();
    let client = XiaoTuClient::with_client(http, Url::parse(&server.uri()).unwrap(), credentials())
        .with_session(SessionSnapshot {
            token_id: "T1".into(),
            fetched_at: Utc::now(),
        });

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .and(header("xweb_xhr", "1"))
        .and(header("referer", MINI_PROGRAM_REFERER))
        .respond_with(doors_ok())
        .expect(1)
        .mount(&server)
        .await;

    client.list_doors().await.unwrap();
}

#[tokio::test]
async fn test_open_door_sends_door_and_client() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("GET"))
        .and(path("/wap/door/openDoor"))
        .and(query_param("clientId", "client-secret"))
        .and(query_param("doorId", "D1"))
        .and(query_param("longitude", ""))
        .and(query_param("latitude", ""))
        .and(header("tokenId", "T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": 200 })))
        .expect(1)
        .mount(&server)
        .await;

    client.open_door("D1").await.unwrap();
}

#[tokio::test]
async fn test_user_info_decodes_mobile() {
    let (server, client) = setup_logged_in().await;

    Mock::given(method("POST"))
        .and(path("/userClient/cuserV2/getUserInfoV2"))
        .and(body_string_contains("tokenId=T1"))
        .and(body_string_contains("os=4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 200,
            "result": {
                "userId": 77,
                "name": "Resident",
                "mobile": "MTM4MDAwMDAwMDA=",
                "villageId": "V9",
                "villageName": "Sunrise Gardens",
                "building": "3"
            }
        })))
        .mount(&server)
        .await;

    let user = client.get_user_info().await.unwrap();
    assert_eq!(user.user_id.as_deref(), Some("77"));
    assert_eq!(user.mobile.as_deref(), Some("13800000000"));
    assert_eq!(user.village_name.as_deref(), Some("Sunrise Gardens"));
}

// ── Response log tests ──────────────────────────────────────────────

#[tokio::test]
async fn test_response_log_captures_redacted_bodies() {
    let (server, client) = setup().await;
    client.response_log().set_enabled(true);

    Mock::given(method("POST"))
        .and(path(LOGIN))
        .respond_with(login_ok("T1"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(GET_DOOR))
        .respond_with(doors_ok())
        .mount(&server)
        .await;

    client.list_doors().await.unwrap();

    let entries = client.response_log().entries();
    let labels: Vec<&str> = entries.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "xiaotuuserClient_clientV2_loginByOpenId.json",
            "xiaotuwap_door_getDoor.json"
        ]
    );
    assert_eq!(
        entries[0].body,
        ResponseBody::Json(json!({ "code": 200, "result": { "tokenId": REDACTED } }))
    );
}
