// ============================================================================
// REST API tests
// ============================================================================
//
// Drive the full router in-process against an in-memory database:
// - POST /register, POST /login
// - /messages routes and their sender/recipient checks
// - /users routes and the same-user check
//
// ============================================================================

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use messagely_server::{app, config::Config, db, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn spawn_app() -> Router {
    spawn_app_with(Config::for_tests()).await
}

async fn spawn_app_with(config: Config) -> Router {
    let pool = db::init_db(&config.database_url).await.unwrap();
    app(AppState {
        pool,
        config: Arc::new(config),
    })
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn register(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/register",
        None,
        Some(json!({
            "username": username,
            "password": password,
            "first_name": format!("{username} first"),
            "last_name": format!("{username} last"),
            "phone": "+15550100",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "register {username}: {body}");
    body["token"].as_str().unwrap().to_string()
}

async fn post_message(app: &Router, token: &str, to: &str, text: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/messages",
        Some(token),
        Some(json!({ "to_username": to, "body": text })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["message"]["id"].as_i64().unwrap()
}

// ============================================================================
// Auth
// ============================================================================

#[tokio::test]
async fn register_and_login_flow() {
    let app = spawn_app().await;
    let token = register(&app, "alice", "secret1").await;
    assert!(!token.is_empty());

    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid credentials");
}

#[tokio::test]
async fn login_unknown_user_looks_like_wrong_password() {
    let app = spawn_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "nobody", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid credentials");
}

#[tokio::test]
async fn login_missing_fields() {
    let app = spawn_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing inputs");
}

#[tokio::test]
async fn register_missing_fields() {
    let app = spawn_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({ "username": "alice", "password": "secret1", "first_name": "A" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing inputs");
}

#[tokio::test]
async fn register_duplicate_username() {
    let app = spawn_app().await;
    register(&app, "alice", "secret1").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({
            "username": "alice",
            "password": "other",
            "first_name": "A",
            "last_name": "B",
            "phone": "1",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "user already exists: alice");

    // Original password still works
    let (status, _) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn wrong_field_type_is_a_json_400() {
    let app = spawn_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": 123 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "{body}");
}

#[tokio::test]
async fn body_without_content_type_is_a_json_400() {
    let app = spawn_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .body(Body::from(
            json!({ "username": "alice", "password": "secret1" }).to_string(),
        ))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_json_is_a_json_400() {
    let app = spawn_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"username\": "))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn whitespace_password_is_accepted() {
    let app = spawn_app().await;
    register(&app, "alice", "   ").await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_user_login_costs_a_bcrypt_round() {
    let mut config = Config::for_tests();
    config.bcrypt_cost = 10;
    let app = spawn_app_with(config).await;
    register(&app, "alice", "secret1").await;

    let login = |username: &'static str| {
        let app = app.clone();
        async move {
            let started = std::time::Instant::now();
            let (status, _) = send(
                &app,
                Method::POST,
                "/login",
                None,
                Some(json!({ "username": username, "password": "wrong" })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            started.elapsed()
        }
    };

    let wrong_password = login("alice").await;
    let unknown_user = login("nobody").await;
    assert!(
        unknown_user * 4 >= wrong_password,
        "unknown user {unknown_user:?} vs wrong password {wrong_password:?}"
    );
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = spawn_app().await;

    let (status, _) = send(&app, Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::GET, "/users", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(
        &app,
        Method::POST,
        "/messages",
        None,
        Some(json!({ "to_username": "bob", "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// ============================================================================
// Messages
// ============================================================================

#[tokio::test]
async fn message_visible_to_participants_only() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;
    let bob = register(&app, "bob", "secret2").await;
    let carol = register(&app, "carol", "secret3").await;

    let id = post_message(&app, &alice, "bob", "hello bob").await;
    let uri = format!("/messages/{id}");

    let (status, body) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"]["id"], id);
    assert_eq!(body["message"]["body"], "hello bob");
    assert_eq!(body["message"]["from_user"]["username"], "alice");
    assert_eq!(body["message"]["to_user"]["username"], "bob");
    assert!(body["message"]["read_at"].is_null());

    let (status, _) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, &uri, Some(&carol), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn sender_comes_from_token_not_body() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;
    register(&app, "bob", "secret2").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/messages",
        Some(&alice),
        Some(json!({ "from_username": "bob", "to_username": "bob", "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["from_username"], "alice");
    assert_eq!(body["message"]["to_username"], "bob");
    assert!(body["message"]["sent_at"].is_string());
    assert!(body["message"].get("read_at").is_none());
}

#[tokio::test]
async fn send_message_validation() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/messages",
        Some(&alice),
        Some(json!({ "to_username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing inputs");

    let (status, body) = send(
        &app,
        Method::POST,
        "/messages",
        Some(&alice),
        Some(json!({ "to_username": "ghost", "body": "anyone?" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "No such user: ghost");
}

#[tokio::test]
async fn missing_message_is_not_found() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;

    let (status, _) = send(&app, Method::GET, "/messages/404", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_recipient_marks_read() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;
    let bob = register(&app, "bob", "secret2").await;

    let id = post_message(&app, &alice, "bob", "read me").await;
    let uri = format!("/messages/{id}/read");

    let (status, _) = send(&app, Method::POST, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, Method::POST, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["id"], id);
    let first_read = body["message"]["read_at"].clone();
    assert!(first_read.is_string());

    let (status, body) = send(&app, Method::POST, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["read_at"], first_read);

    let (_, body) = send(&app, Method::GET, &format!("/messages/{id}"), Some(&bob), None).await;
    assert_eq!(body["message"]["read_at"], first_read);
}

// ============================================================================
// Users
// ============================================================================

#[tokio::test]
async fn list_users_shows_public_fields() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;
    register(&app, "bob", "secret2").await;

    let (status, body) = send(&app, Method::GET, "/users", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);

    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    for user in users {
        assert!(user.get("password").is_none());
        assert!(user.get("join_at").is_none());
        assert!(user["phone"].is_string());
    }
}

#[tokio::test]
async fn profile_only_for_its_owner() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;
    let bob = register(&app, "bob", "secret2").await;

    let (status, body) = send(&app, Method::GET, "/users/alice", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["first_name"], "alice first");
    assert!(body["user"]["join_at"].is_string());
    assert!(body["user"]["last_login_at"].is_string());
    assert!(body["user"].get("password").is_none());

    for uri in ["/users/alice", "/users/alice/to", "/users/alice/from"] {
        let (status, _) = send(&app, Method::GET, uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn directional_message_lists() {
    let app = spawn_app().await;
    let alice = register(&app, "alice", "secret1").await;
    let bob = register(&app, "bob", "secret2").await;

    let first = post_message(&app, &alice, "bob", "one").await;
    let second = post_message(&app, &alice, "bob", "two").await;

    let (status, body) = send(&app, Method::GET, "/users/alice/from", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let sent = body["messages"].as_array().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["id"], first);
    assert_eq!(sent[1]["id"], second);
    assert_eq!(sent[0]["to_user"]["username"], "bob");

    let (status, body) = send(&app, Method::GET, "/users/bob/to", Some(&bob), None).await;
    assert_eq!(status, StatusCode::OK);
    let received = body["messages"].as_array().unwrap();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0]["body"], "one");
    assert_eq!(received[0]["from_user"]["username"], "alice");

    let (_, body) = send(&app, Method::GET, "/users/bob/from", Some(&bob), None).await;
    assert!(body["messages"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn login_updates_last_login() {
    let app = spawn_app().await;
    let token = register(&app, "alice", "secret1").await;

    let (_, before) = send(&app, Method::GET, "/users/alice", Some(&token), None).await;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/login",
        None,
        Some(json!({ "username": "alice", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = send(&app, Method::GET, "/users/alice", Some(&token), None).await;
    let before: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(before["user"]["last_login_at"].clone()).unwrap();
    let after: chrono::DateTime<chrono::Utc> =
        serde_json::from_value(after["user"]["last_login_at"].clone()).unwrap();
    assert!(after > before);
}
