//! Gateway Integration Tests
//!
//! Each test starts its own gateway on an ephemeral port with an in-memory
//! session store, the fixture users and a channel-fed notification queue.
//! No external services are needed.
//!
//! Run with: cargo test -p integration-tests --test gateway_tests

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gatehouse_common::ServiceRoute;
use integration_tests::{
    assert_json, assert_status, fixtures::*, EchoResponse, TestBackend, TestServer, WsClient,
};
use reqwest::{header, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};

/// Next text frame, or an error if none arrives in time
async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return text;
        }
    }
}

/// Assert nothing arrives within a short window
async fn assert_silent(ws: &mut WsClient) {
    let frame = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(frame.is_err(), "unexpected frame: {frame:?}");
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.expect("Request failed");

    let body: serde_json::Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_cors() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/health").await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(response.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS], "Authorization");
}

#[tokio::test]
async fn test_preflight_short_circuits() {
    let server = TestServer::start().await.unwrap();
    let response = server
        .client
        .request(reqwest::Method::OPTIONS, format!("{}/v1/users", server.base_url()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
}

// ============================================================================
// Session Tests
// ============================================================================

#[tokio::test]
async fn test_login() {
    let server = TestServer::start().await.unwrap();

    let response = server.post("/v1/sessions", &ADA.login()).await.unwrap();
    let token = response
        .headers()
        .get(header::AUTHORIZATION)
        .expect("token header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(token.starts_with("Bearer "));

    let user: UserResponse = assert_json(response, StatusCode::CREATED).await.unwrap();
    assert_eq!(user.id, ADA.id);
    assert_eq!(user.user_name, ADA.user_name);
    assert_eq!(user.email, ADA.email);
}

#[tokio::test]
async fn test_login_wrong_password_and_unknown_email_look_the_same() {
    let server = TestServer::start().await.unwrap();

    let wrong = server.post("/v1/sessions", &ADA.wrong_login()).await.unwrap();
    let wrong: ErrorBody = assert_json(wrong, StatusCode::UNAUTHORIZED).await.unwrap();

    let unknown = LoginRequest {
        email: "nobody@example.com".to_string(),
        password: "whatever".to_string(),
    };
    let unknown = server.post("/v1/sessions", &unknown).await.unwrap();
    let unknown: ErrorBody = assert_json(unknown, StatusCode::UNAUTHORIZED).await.unwrap();

    assert_eq!(wrong.error.code, unknown.error.code);
    assert_eq!(wrong.error.message, unknown.error.message);
}

#[tokio::test]
async fn test_login_requires_json() {
    let server = TestServer::start().await.unwrap();
    let response = server
        .client
        .post(format!("{}/v1/sessions", server.base_url()))
        .body("email=ada@example.com")
        .send()
        .await
        .unwrap();
    assert_status(response, StatusCode::UNSUPPORTED_MEDIA_TYPE).await.unwrap();
}

#[tokio::test]
async fn test_login_lockout_after_repeated_failures() {
    let server = TestServer::start().await.unwrap();
    let max = server.state.config().session.max_login_failures;

    for _ in 1..max {
        let response = server.post("/v1/sessions", &ALAN.wrong_login()).await.unwrap();
        assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
    }

    let response = server.post("/v1/sessions", &ALAN.wrong_login()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    // The right password is refused while the lockout lasts.
    let response = server.post("/v1/sessions", &ALAN.login()).await.unwrap();
    assert_status(response, StatusCode::TOO_MANY_REQUESTS).await.unwrap();
}

#[tokio::test]
async fn test_successful_login_resets_failures() {
    let server = TestServer::start().await.unwrap();
    let max = server.state.config().session.max_login_failures;

    for _ in 1..max {
        server.post("/v1/sessions", &GRACE.wrong_login()).await.unwrap();
    }
    server.login(&GRACE).await.unwrap();

    // The counter starts over, so another failure is a plain 401.
    let response = server.post("/v1/sessions", &GRACE.wrong_login()).await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_logout_revokes_session() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&ADA).await.unwrap();

    let response = server.get_auth("/v1/users?q=a", &token).await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server.delete_auth("/v1/sessions/mine", &token).await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server.get_auth("/v1/users?q=a", &token).await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_logout_of_other_session_forbidden() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&ADA).await.unwrap();

    let response = server.delete_auth("/v1/sessions/42", &token).await.unwrap();
    assert_status(response, StatusCode::FORBIDDEN).await.unwrap();

    // The session is untouched.
    let response = server.get_auth("/v1/users?q=a", &token).await.unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();
}

#[tokio::test]
async fn test_logout_without_token() {
    let server = TestServer::start().await.unwrap();
    let response = server
        .client
        .delete(format!("{}/v1/sessions/mine", server.base_url()))
        .send()
        .await
        .unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

#[tokio::test]
async fn test_tampered_token_rejected() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&ADA).await.unwrap();
    let tampered = format!("{}x", token);

    let response = server.get_auth("/v1/users?q=a", &tampered).await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(body.error.code, "INVALID_TOKEN");
}

#[tokio::test]
async fn test_wrong_auth_scheme_rejected() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&ADA).await.unwrap();
    let basic = token.replacen("Bearer ", "Basic ", 1);

    let response = server.get_auth("/v1/users?q=a", &basic).await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();
}

// ============================================================================
// Search Tests
// ============================================================================

#[tokio::test]
async fn test_search_by_prefix() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&GRACE).await.unwrap();

    let response = server.get_auth("/v1/users?q=A", &token).await.unwrap();
    let users: Vec<UserResponse> = assert_json(response, StatusCode::OK).await.unwrap();
    let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    assert_eq!(ids, vec![ADA.id, ALAN.id]);

    let response = server.get_auth("/v1/users?q=tur", &token).await.unwrap();
    let users: Vec<UserResponse> = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_name, "turing");

    let response = server.get_auth("/v1/users?q=zz", &token).await.unwrap();
    let users: Vec<UserResponse> = assert_json(response, StatusCode::OK).await.unwrap();
    assert!(users.is_empty());
}

#[tokio::test]
async fn test_search_requires_query_and_session() {
    let server = TestServer::start().await.unwrap();

    let response = server.get("/v1/users?q=a").await.unwrap();
    assert_status(response, StatusCode::UNAUTHORIZED).await.unwrap();

    let token = server.login(&ADA).await.unwrap();
    let response = server.get_auth("/v1/users", &token).await.unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

#[tokio::test]
async fn test_token_accepted_from_query() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&ADA).await.unwrap();
    let raw = token.trim_start_matches("Bearer ").replace('=', "%3D");

    let response = server.get(&format!("/v1/users?q=g&auth={raw}")).await.unwrap();
    let users: Vec<UserResponse> = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(users[0].id, GRACE.id);
}

// ============================================================================
// Proxy Tests
// ============================================================================

#[tokio::test]
async fn test_proxy_injects_user_header() {
    let backend = TestBackend::start("notes-1").await.unwrap();
    let route = ServiceRoute::new("/v1/notes", &backend.address()).unwrap();
    let server = TestServer::start_with_services(vec![route]).await.unwrap();
    let token = server.login(&ADA).await.unwrap();

    let response = server
        .client
        .post(format!("{}/v1/notes/7?draft=true", server.base_url()))
        .header(header::AUTHORIZATION, &token)
        .header("x-user", r#"{"id":999}"#)
        .body("hello")
        .send()
        .await
        .unwrap();
    let echo: EchoResponse = assert_json(response, StatusCode::OK).await.unwrap();

    assert_eq!(echo.backend, "notes-1");
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.path, "/v1/notes/7");
    assert_eq!(echo.query.as_deref(), Some("draft=true"));
    assert_eq!(echo.body, "hello");

    let user: serde_json::Value = serde_json::from_str(echo.x_user.as_deref().unwrap()).unwrap();
    assert_eq!(user["id"], ADA.id);
    assert_eq!(user["userName"], ADA.user_name);
}

#[tokio::test]
async fn test_proxy_anonymous_request_has_no_user() {
    let backend = TestBackend::start("notes-1").await.unwrap();
    let route = ServiceRoute::new("/v1/notes", &backend.address()).unwrap();
    let server = TestServer::start_with_services(vec![route]).await.unwrap();

    let response = server
        .client
        .get(format!("{}/v1/notes", server.base_url()))
        .header("x-user", r#"{"id":999}"#)
        .send()
        .await
        .unwrap();
    let echo: EchoResponse = assert_json(response, StatusCode::OK).await.unwrap();

    assert_eq!(echo.path, "/v1/notes");
    assert!(echo.x_user.is_none());
}

#[tokio::test]
async fn test_proxy_round_robin() {
    let first = TestBackend::start("first").await.unwrap();
    let second = TestBackend::start("second").await.unwrap();
    let addrs = format!("{},{}", first.address(), second.address());
    let route = ServiceRoute::new("/v1/notes", &addrs).unwrap();
    let server = TestServer::start_with_services(vec![route]).await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..4 {
        let response = server.get("/v1/notes/list").await.unwrap();
        let echo: EchoResponse = assert_json(response, StatusCode::OK).await.unwrap();
        seen.push(echo.backend);
    }
    assert_eq!(seen, vec!["first", "second", "first", "second"]);
}

#[tokio::test]
async fn test_proxy_unreachable_backend() {
    let route = ServiceRoute::new("/v1/notes", "127.0.0.1:1").unwrap();
    let server = TestServer::start_with_services(vec![route]).await.unwrap();

    let response = server.get("/v1/notes").await.unwrap();
    let body: ErrorBody = assert_json(response, StatusCode::BAD_GATEWAY).await.unwrap();
    assert_eq!(body.error.code, "BAD_GATEWAY");
}

#[tokio::test]
async fn test_unrouted_path_is_not_found() {
    let server = TestServer::start().await.unwrap();
    let response = server.get("/v1/unknown").await.unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();
}

// ============================================================================
// WebSocket Tests
// ============================================================================

#[tokio::test]
async fn test_ws_requires_session() {
    let server = TestServer::start().await.unwrap();

    match tokio_tungstenite::connect_async(server.ws_url()).await {
        Err(tungstenite::Error::Http(response)) => {
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        Err(e) => panic!("expected HTTP 401, got {e}"),
        Ok(_) => panic!("upgrade succeeded without a session"),
    }
}

#[tokio::test]
async fn test_ws_targeted_and_broadcast_delivery() {
    let server = TestServer::start().await.unwrap();
    let ada_token = server.login(&ADA).await.unwrap();
    let alan_token = server.login(&ALAN).await.unwrap();

    let mut ada = server.connect_ws(&ada_token).await.unwrap();
    let mut alan = server.connect_ws(&alan_token).await.unwrap();
    server.wait_for_connections(2).await.unwrap();

    let direct = notification("mention", &[ALAN.id]);
    server.publisher.publish(direct.clone()).unwrap();
    assert_eq!(next_text(&mut alan).await, direct);
    assert_silent(&mut ada).await;

    let everyone = notification("maintenance", &[]);
    server.publisher.publish(everyone.clone()).unwrap();
    assert_eq!(next_text(&mut ada).await, everyone);
    assert_eq!(next_text(&mut alan).await, everyone);

    let acked = server.wait_for_acks(2).await.unwrap();
    assert_eq!(acked, vec!["1-0".to_string(), "2-0".to_string()]);
}

#[tokio::test]
async fn test_ws_multiple_connections_per_user() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&GRACE).await.unwrap();

    let mut first = server.connect_ws(&token).await.unwrap();
    let mut second = server.connect_ws(&token).await.unwrap();
    server.wait_for_connections(2).await.unwrap();
    assert_eq!(server.state.notifier().connections_for(GRACE.id), 2);

    let payload = notification("reminder", &[GRACE.id]);
    server.publisher.publish(payload.clone()).unwrap();
    assert_eq!(next_text(&mut first).await, payload);
    assert_eq!(next_text(&mut second).await, payload);
}

#[tokio::test]
async fn test_ws_close_deregisters() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&ADA).await.unwrap();

    let mut ws = server.connect_ws(&token).await.unwrap();
    server.wait_for_connections(1).await.unwrap();

    // Client frames are ignored.
    ws.send(Message::Text("hello".into())).await.unwrap();
    ws.close(None).await.unwrap();

    server.wait_for_connections(0).await.unwrap();
    assert_eq!(server.state.notifier().user_count(), 0);
}

#[tokio::test]
async fn test_ws_malformed_notification_is_acked() {
    let server = TestServer::start().await.unwrap();
    let token = server.login(&ADA).await.unwrap();
    let mut ws = server.connect_ws(&token).await.unwrap();
    server.wait_for_connections(1).await.unwrap();

    server.publisher.publish("not json").unwrap();
    let payload = notification("after", &[]);
    server.publisher.publish(payload.clone()).unwrap();

    assert_eq!(next_text(&mut ws).await, payload);
    let acked = server.wait_for_acks(2).await.unwrap();
    assert_eq!(acked.len(), 2);
}
