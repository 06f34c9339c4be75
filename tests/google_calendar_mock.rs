use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use calendar_relay::components::google_calendar::Credentials;
use calendar_relay::config::Config;
use calendar_relay::startup::{build_router, AppState};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, body_string_contains, header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Relay wired to a mock server that plays both the token endpoint and the Calendar API
async fn relay_with_mock() -> (Router, AppState, MockServer) {
    let server = MockServer::start().await;

    let mut config = Config::new(
        "test_client_id",
        "test_client_secret",
        "http://localhost:3000/oauth2callback",
    );
    config.token_url = format!("{}/token", server.uri());
    config.calendar_api_base = server.uri();

    let state = AppState::from_config(&config).unwrap();
    (build_router(state.clone()), state, server)
}

async fn mount_token_exchange(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=valid"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3599,
            "scope": "https://www.googleapis.com/auth/calendar",
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=invalid"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Malformed auth code."
        })))
        .mount(server)
        .await;
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post(app: &Router, uri: &str, content_type: &str, body: String) -> (StatusCode, Option<String>, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Option<String>, String) {
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .map(|value| value.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, location, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn sign_in(app: &Router) {
    let (status, location, _) = get(app, "/oauth2callback?code=valid").await;
    assert_eq!(status, StatusCode::FOUND);
    assert_eq!(location.as_deref(), Some("http://localhost:5173"));
}

#[tokio::test]
async fn calendar_routes_fail_before_sign_in() {
    let (app, _state, server) = relay_with_mock().await;
    // Nothing may reach the Calendar API without credentials
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": "leak" }] })))
        .expect(0)
        .mount(&server)
        .await;

    let (status, _, body) = get(&app, "/events").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to fetch events");

    let (status, _, body) = get(&app, "/calendarList").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to fetch calendar list");

    let (status, _, body) = post(
        &app,
        "/addEvent",
        "application/json",
        json!({ "summary": "S" }).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to create event");
}

#[tokio::test]
async fn auth_redirects_to_consent_page() {
    let (app, _state, _server) = relay_with_mock().await;

    let (status, location, _) = get(&app, "/auth").await;
    assert_eq!(status, StatusCode::FOUND);

    let location = url::Url::parse(&location.unwrap()).unwrap();
    let pairs: std::collections::HashMap<String, String> =
        location.query_pairs().into_owned().collect();
    assert_eq!(location.host_str(), Some("accounts.google.com"));
    assert_eq!(pairs["access_type"], "offline");
    assert!(pairs["scope"].contains("https://www.googleapis.com/auth/calendar"));
    assert!(pairs["scope"].contains("https://www.googleapis.com/auth/calendar.events"));
}

#[tokio::test]
async fn sign_in_then_list_events() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(header_matcher("Authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                { "id": "e1", "summary": "Standup" },
                { "id": "e2", "summary": "Lunch" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    sign_in(&app).await;

    let (status, _, body) = get(&app, "/events").await;
    assert_eq!(status, StatusCode::OK);
    let events: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        events,
        json!([
            { "id": "e1", "summary": "Standup" },
            { "id": "e2", "summary": "Lunch" }
        ])
    );
}

#[tokio::test]
async fn invalid_code_leaves_credentials_unchanged() {
    let (app, state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;

    let (status, _, body) = get(&app, "/oauth2callback?code=invalid").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Authentication failed");
    assert_eq!(state.credentials.current().await.unwrap(), None);

    sign_in(&app).await;
    let before = state.credentials.current().await.unwrap();

    let (status, _, body) = get(&app, "/oauth2callback?code=invalid").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Authentication failed");
    assert_eq!(state.credentials.current().await.unwrap(), before);
}

#[tokio::test]
async fn callback_without_code_fails() {
    let (app, _state, _server) = relay_with_mock().await;

    let (status, _, body) = get(&app, "/oauth2callback?error=access_denied").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Authentication failed");
}

#[tokio::test]
async fn repeated_code_fails_authentication() {
    let (app, state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;

    let (status, _, body) = get(&app, "/oauth2callback?code=valid&code=other").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Authentication failed");
    assert_eq!(state.credentials.current().await.unwrap(), None);
}

#[tokio::test]
async fn add_event_forwards_non_string_fields() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(body_json(json!({
            "summary": 42,
            "start": {
                "dateTime": { "dateTime": "2024-01-01T10:00:00+09:00" },
                "timeZone": "Asia/Seoul"
            },
            "end": { "timeZone": "Asia/Seoul" }
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "Invalid start time." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    sign_in(&app).await;

    let (status, _, body) = post(
        &app,
        "/addEvent",
        "application/json",
        json!({
            "summary": 42,
            "start": { "dateTime": "2024-01-01T10:00:00+09:00" }
        })
        .to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to create event");
}

#[tokio::test]
async fn add_event_without_content_type_forwards_empty_event() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(body_json(json!({
            "start": { "timeZone": "Asia/Seoul" },
            "end": { "timeZone": "Asia/Seoul" }
        })))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "Missing end time." }
        })))
        .expect(1)
        .mount(&server)
        .await;

    sign_in(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/addEvent")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let (status, _, body) = read(response).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to create event");
}

#[tokio::test]
async fn malformed_json_body_fails_like_a_create_error() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "never" })))
        .expect(0)
        .mount(&server)
        .await;

    sign_in(&app).await;

    let (status, _, body) = post(&app, "/addEvent", "application/json", "{not json".to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to create event");
}

#[tokio::test]
async fn add_event_returns_created_event_verbatim() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;

    let created = json!({
        "kind": "calendar#event",
        "id": "abc123",
        "status": "confirmed",
        "summary": "S",
        "start": { "dateTime": "2024-01-01T10:00:00+09:00", "timeZone": "Asia/Seoul" },
        "end": { "dateTime": "2024-01-01T11:00:00+09:00", "timeZone": "Asia/Seoul" }
    });
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(body_json(json!({
            "summary": "S",
            "start": { "dateTime": "2024-01-01T10:00:00", "timeZone": "Asia/Seoul" },
            "end": { "dateTime": "2024-01-01T11:00:00", "timeZone": "Asia/Seoul" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(created.clone()))
        .expect(1)
        .mount(&server)
        .await;

    sign_in(&app).await;

    let (status, _, body) = post(
        &app,
        "/addEvent",
        "application/json",
        json!({
            "summary": "S",
            "start": "2024-01-01T10:00:00",
            "end": "2024-01-01T11:00:00"
        })
        .to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), created);
}

#[tokio::test]
async fn add_event_accepts_form_bodies() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(body_json(json!({
            "summary": "Lunch",
            "location": "Cafeteria",
            "start": { "dateTime": "2024-01-01T12:00:00", "timeZone": "Asia/Seoul" },
            "end": { "dateTime": "2024-01-01T13:00:00", "timeZone": "Asia/Seoul" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "form-event" })))
        .expect(1)
        .mount(&server)
        .await;

    sign_in(&app).await;

    let (status, _, body) = post(
        &app,
        "/addEvent",
        "application/x-www-form-urlencoded",
        "summary=Lunch&location=Cafeteria&start=2024-01-01T12%3A00%3A00&end=2024-01-01T13%3A00%3A00"
            .to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({ "id": "form-event" }));
}

#[tokio::test]
async fn empty_event_list_is_plain_text() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    sign_in(&app).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|value| value.to_str().unwrap().to_string());
    let (status, _, body) = read(response).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "No upcoming events found.");
    assert!(content_type.unwrap().starts_with("text/plain"));
}

#[tokio::test]
async fn calendar_list_is_returned_as_array() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "calendar#calendarList",
            "items": [{ "id": "primary", "summary": "me@example.com" }]
        })))
        .mount(&server)
        .await;

    sign_in(&app).await;

    let (status, _, body) = get(&app, "/calendarList").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!([{ "id": "primary", "summary": "me@example.com" }])
    );
}

#[tokio::test]
async fn remote_failure_maps_to_fixed_message() {
    let (app, _state, server) = relay_with_mock().await;
    mount_token_exchange(&server).await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(403).set_body_string("rateLimitExceeded"))
        .mount(&server)
        .await;

    sign_in(&app).await;

    let (status, _, body) = get(&app, "/events").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to fetch events");
}

#[tokio::test]
async fn expired_token_is_refreshed_before_calling_calendar() {
    let (app, state, server) = relay_with_mock().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-2",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(header_matcher("Authorization", "Bearer access-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [{ "id": "primary" }] })))
        .expect(2)
        .mount(&server)
        .await;

    state
        .credentials
        .install(Credentials {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expiry: Some(Utc::now() - Duration::minutes(1)),
        })
        .await
        .unwrap();

    // The second call reuses the refreshed token
    for _ in 0..2 {
        let (status, _, _) = get(&app, "/calendarList").await;
        assert_eq!(status, StatusCode::OK);
    }

    let stored = state.credentials.current().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-2");
    assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
}
