#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Integration tests for the gatehouse kernel.
//!
//! Every request goes through the full pipeline: recovery, CORS, logging,
//! timeout, rate limiting and, on protected routes, the token check.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::json;

mod common;
use common::{TestApp, response_json, test_config};

fn ping() -> Request<Body> {
    Request::get("/ping").body(Body::empty()).unwrap()
}

// ---------------------------------------------------------------------------
// Registration and login
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_then_duplicate_username() {
    let app = TestApp::new();

    let body = app.register("alice", "secret123", "a@x.com").await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "registration successful");
    assert!(body["data"]["user_id"].as_i64().unwrap() > 0);
    assert_eq!(body["data"]["username"], "alice");

    let body = app.register("alice", "secret123", "other@x.com").await;
    assert_eq!(body["code"], 11003);
    assert_eq!(body["message"], "username already exists");

    assert_eq!(app.users.row_count(), 1);
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = TestApp::new();
    app.register("alice", "secret123", "a@x.com").await;

    let body = app.register("bob", "secret123", "a@x.com").await;
    assert_eq!(body["code"], 11004);
    assert_eq!(app.users.row_count(), 1);
}

#[tokio::test]
async fn register_validates_input() {
    let app = TestApp::new();

    let body = app.register("al", "secret123", "a@x.com").await;
    assert_eq!(body["code"], 14001);

    let body = app.register("alice", "short", "a@x.com").await;
    assert_eq!(body["code"], 14001);

    let body = app.register("alice", "secret123", "not-an-email").await;
    assert_eq!(body["code"], 14001);

    assert_eq!(app.users.row_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_a_param_error() {
    let app = TestApp::new();

    let request = Request::post("/api/v1/auth/register")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = app.call(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 14001);
}

#[tokio::test]
async fn login_returns_token_and_profile() {
    let app = TestApp::new();
    app.register("alice", "secret123", "a@x.com").await;

    let (status, body) = app
        .post(
            "/api/v1/auth/login",
            json!({ "username": "alice", "password": "secret123" }),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert!(!body["data"]["token"].as_str().unwrap().is_empty());
    assert_eq!(body["data"]["user_info"]["username"], "alice");
    assert!(body["data"]["user_info"].get("password").is_none());
}

#[tokio::test]
async fn wrong_password_is_rejected_without_side_effects() {
    let app = TestApp::new();
    app.register("alice", "secret123", "a@x.com").await;

    let (status, body) = app
        .post(
            "/api/v1/auth/login",
            json!({ "username": "alice", "password": "wrong-password" }),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 11006);
    assert!(body.get("data").is_none());

    let (_, body) = app
        .post(
            "/api/v1/auth/login",
            json!({ "username": "nobody", "password": "secret123" }),
            None,
        )
        .await;
    assert_eq!(body["code"], 11006);

    assert_eq!(app.users.row_count(), 1);
    app.login("alice", "secret123").await;
}

#[tokio::test]
async fn disabled_account_cannot_log_in() {
    let app = TestApp::new();
    let body = app.register("alice", "secret123", "a@x.com").await;
    let id = body["data"]["user_id"].as_i64().unwrap();

    assert!(app.users.set_status(id, 0));

    let (_, body) = app
        .post(
            "/api/v1/auth/login",
            json!({ "username": "alice", "password": "secret123" }),
            None,
        )
        .await;
    assert_eq!(body["code"], 11008);
}

// ---------------------------------------------------------------------------
// Token handling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn protected_route_requires_a_token() {
    let app = TestApp::new();

    let (status, body) = app.get("/api/v1/users/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 10003);
}

#[tokio::test]
async fn bearer_and_dedicated_header_both_work() {
    let app = TestApp::new();
    let token = app.signed_in("alice").await;

    let (_, body) = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["username"], "alice");

    let request = Request::get("/api/v1/users/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = app.call(request).await;
    assert_eq!(body["code"], 200);
}

#[tokio::test]
async fn dedicated_header_takes_precedence_over_bearer() {
    let app = TestApp::new();
    let token = app.signed_in("alice").await;

    let request = Request::get("/api/v1/users/me")
        .header("x-token", "garbage")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = app.call(request).await;

    assert_eq!(body["code"], 10004);
}

#[tokio::test]
async fn expired_and_tampered_tokens_are_distinguished() {
    let app = TestApp::new();
    app.signed_in("alice").await;

    let stale = app
        .state
        .tokens()
        .issue_at(1, "alice", Utc::now() - ChronoDuration::hours(2))
        .unwrap();
    let (_, body) = app.get("/api/v1/users/me", Some(&stale)).await;
    assert_eq!(body["code"], 10006);

    let token = app.state.tokens().issue(1, "alice").unwrap();
    let sig_start = token.rfind('.').unwrap() + 1;
    let flipped = if token[sig_start..].starts_with('A') { "B" } else { "A" };
    let mut tampered = token.clone();
    tampered.replace_range(sig_start..=sig_start, flipped);
    let (_, body) = app.get("/api/v1/users/me", Some(&tampered)).await;
    assert_eq!(body["code"], 10004);
}

#[tokio::test]
async fn refresh_keeps_a_fresh_token() {
    let app = TestApp::new();
    let token = app.signed_in("alice").await;

    let (_, body) = app.post("/api/v1/auth/refresh", json!({}), Some(&token)).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["token"], token);

    let (_, body) = app.post("/api/v1/auth/logout", json!({}), Some(&token)).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "logout successful");
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[tokio::test]
async fn user_lookup_and_listing() {
    let app = TestApp::new();
    let token = app.signed_in("alice").await;
    app.signed_in("bob").await;

    let (_, body) = app.get("/api/v1/users?page=1&page_size=1", Some(&token)).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["list"].as_array().unwrap().len(), 1);

    let (_, body) = app.get("/api/v1/users/abc", Some(&token)).await;
    assert_eq!(body["code"], 14001);

    let (_, body) = app.get("/api/v1/users/999", Some(&token)).await;
    assert_eq!(body["code"], 11002);
}

#[tokio::test]
async fn update_profile() {
    let app = TestApp::new();
    let token = app.signed_in("alice").await;
    app.signed_in("bob").await;

    let (_, body) = app.post("/api/v1/users/update", json!({}), Some(&token)).await;
    assert_eq!(body["code"], 14001);

    let (_, body) = app
        .post(
            "/api/v1/users/update",
            json!({ "email": "bob@example.com" }),
            Some(&token),
        )
        .await;
    assert_eq!(body["code"], 11004);

    let (_, body) = app
        .post("/api/v1/users/update", json!({ "phone": "555-0100" }), Some(&token))
        .await;
    assert_eq!(body["code"], 200);

    let (_, body) = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(body["data"]["phone"], "555-0100");
}

#[tokio::test]
async fn users_cannot_delete_themselves() {
    let app = TestApp::new();
    let token = app.signed_in("alice").await;
    let (_, me) = app.get("/api/v1/users/me", Some(&token)).await;
    let my_id = me["data"]["id"].as_i64().unwrap();

    let (_, body) = app
        .post(&format!("/api/v1/users/{my_id}/delete"), json!({}), Some(&token))
        .await;
    assert_eq!(body["code"], 11010);

    let bob = app.register("bob", "secret123", "bob@x.com").await;
    let bob_id = bob["data"]["user_id"].as_i64().unwrap();
    let (_, body) = app
        .post(&format!("/api/v1/users/{bob_id}/delete"), json!({}), Some(&token))
        .await;
    assert_eq!(body["code"], 200);

    let (_, body) = app.get(&format!("/api/v1/users/{bob_id}"), Some(&token)).await;
    assert_eq!(body["code"], 11002);
}

// ---------------------------------------------------------------------------
// Articles
// ---------------------------------------------------------------------------

#[tokio::test]
async fn article_creation_without_document_store() {
    let app = TestApp::without_documents();
    let token = app.signed_in("alice").await;

    let (status, body) = app
        .post(
            "/api/v1/articles",
            json!({ "title": "Hello", "content": "World" }),
            Some(&token),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 10002);

    let (_, body) = app.get("/api/v1/articles", None).await;
    assert_eq!(body["code"], 10002);
}

#[tokio::test]
async fn article_lifecycle() {
    let app = TestApp::new();
    let alice = app.signed_in("alice").await;
    let bob = app.signed_in("bob").await;

    let (_, body) = app
        .post(
            "/api/v1/articles",
            json!({ "title": "Hello", "content": "World", "tags": ["rust", "web"] }),
            Some(&alice),
        )
        .await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], 1);
    assert_eq!(body["data"]["author"], "alice");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = app.get(&format!("/api/v1/articles/{id}"), None).await;
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["title"], "Hello");

    let (_, body) = app
        .post(
            &format!("/api/v1/articles/{id}/update"),
            json!({ "title": "Hijacked" }),
            Some(&bob),
        )
        .await;
    assert_eq!(body["code"], 12001);

    let (_, body) = app
        .post(
            &format!("/api/v1/articles/{id}/update"),
            json!({ "title": "Hello again" }),
            Some(&alice),
        )
        .await;
    assert_eq!(body["code"], 200);

    let (_, body) = app.get("/api/v1/articles?tags=web,go&keyword=WORLD", None).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["list"][0]["title"], "Hello again");

    let (_, body) = app.get("/api/v1/articles?author=bob", None).await;
    assert_eq!(body["data"]["total"], 0);

    let (_, body) = app
        .post(&format!("/api/v1/articles/{id}/delete"), json!({}), Some(&alice))
        .await;
    assert_eq!(body["code"], 200);

    let (_, body) = app.get(&format!("/api/v1/articles/{id}"), None).await;
    assert_eq!(body["code"], 12001);
}

#[tokio::test]
async fn liking_twice_counts_twice() {
    let app = TestApp::new();
    let token = app.signed_in("alice").await;

    let (_, body) = app
        .post(
            "/api/v1/articles",
            json!({ "title": "Hello", "content": "World" }),
            Some(&token),
        )
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (_, body) = app
            .post(&format!("/api/v1/articles/{id}/like"), json!({}), Some(&token))
            .await;
        assert_eq!(body["code"], 200);
    }

    let (_, body) = app.get(&format!("/api/v1/articles/{id}"), None).await;
    assert_eq!(body["data"]["likes"], 2);
}

#[tokio::test]
async fn article_ids_are_validated() {
    let app = TestApp::new();

    let (_, body) = app.get("/api/v1/articles/not-a-uuid", None).await;
    assert_eq!(body["code"], 14001);
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_all_healthy() {
    let app = TestApp::new();

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["services"]["postgres"]["status"], "healthy");
    assert!(body["data"]["timestamp"].as_i64().is_some());
    assert!(body["data"]["version"].is_string());
}

#[tokio::test]
async fn optional_outage_degrades_but_stays_ready() {
    let app = TestApp::new();
    app.documents.set(Some(false));

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["services"]["documents"]["status"], "unhealthy");

    let (status, body) = app.get("/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ready"], true);
}

#[tokio::test]
async fn unconfigured_documents_report_unknown() {
    let app = TestApp::without_documents();

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "degraded");
    assert_eq!(body["data"]["services"]["documents"]["status"], "unknown");
}

#[tokio::test]
async fn mandatory_outage_is_unhealthy_and_not_ready() {
    let app = TestApp::new();
    app.redis.set(Some(false));

    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 10002);
    assert_eq!(body["data"]["status"], "unhealthy");

    let (status, body) = app.get("/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["data"]["ready"], false);
    assert_eq!(body["data"]["services"]["redis"], "unhealthy");
    assert!(body["data"]["services"].get("documents").is_none());
}

#[tokio::test]
async fn liveness_and_ping_skip_dependencies() {
    let app = TestApp::new();
    app.postgres.set(Some(false));
    app.redis.set(Some(false));

    let (status, body) = app.get("/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "alive");

    let (status, body) = app.get("/ping", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["message"], "pong");
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rate_limit_is_per_client() {
    let app = TestApp::with_rate_limit(2);

    for _ in 0..2 {
        let response = app.request_from("192.0.2.1:40000", ping()).await;
        assert_eq!(response_json(response).await["code"], 200);
    }

    let response = app.request_from("192.0.2.1:40001", ping()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["code"], 10001);
    assert_eq!(body["message"], "too many requests");

    let response = app.request_from("192.0.2.2:40000", ping()).await;
    assert_eq!(response_json(response).await["code"], 200);
}

#[tokio::test]
async fn forwarded_for_from_untrusted_peer_gets_no_fresh_budget() {
    let app = TestApp::with_rate_limit(2);

    let mut allowed = 0;
    for i in 0..50 {
        let request = Request::get("/ping")
            .header("x-forwarded-for", format!("10.1.0.{i}"))
            .header("x-real-ip", format!("10.2.0.{i}"))
            .body(Body::empty())
            .unwrap();
        let response = app.request_from("198.51.100.7:5555", request).await;
        if response_json(response).await["code"] == 200 {
            allowed += 1;
        }
    }
    assert_eq!(allowed, 2);
}

#[tokio::test]
async fn trusted_proxy_forwards_the_client_address() {
    let mut config = test_config(1);
    config.trusted_proxies = vec!["10.0.0.1".parse().unwrap()];
    let app = TestApp::with_config(config, true);

    let via_proxy = |client: &str| {
        Request::get("/ping")
            .header("x-forwarded-for", client)
            .body(Body::empty())
            .unwrap()
    };

    let response = app.request_from("10.0.0.1:443", via_proxy("203.0.113.5")).await;
    assert_eq!(response_json(response).await["code"], 200);
    let response = app.request_from("10.0.0.1:443", via_proxy("203.0.113.5")).await;
    assert_eq!(response_json(response).await["code"], 10001);

    // Same proxy, different client behind it.
    let response = app.request_from("10.0.0.1:443", via_proxy("203.0.113.6")).await;
    assert_eq!(response_json(response).await["code"], 200);
}

#[tokio::test]
async fn cors_preflight_is_answered() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/v1/articles")
        .header(header::ORIGIN, "https://app.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.request(request).await;

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = TestApp::new();

    let response = app
        .request(Request::get("/nope").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
