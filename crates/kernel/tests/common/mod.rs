#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`TestApp`] drives the real router and pipeline built by
//! `build_router`, backed by in-memory stores and probes whose outcome each
//! test controls.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tower::ServiceExt;

use gatehouse_kernel::build_router;
use gatehouse_kernel::cache::MemoryCache;
use gatehouse_kernel::config::Config;
use gatehouse_kernel::health::{Criticality, HealthAggregator, HealthProbe};
use gatehouse_kernel::state::AppState;
use gatehouse_kernel::store::{ArticleStore, MemoryArticleStore, MemoryUserStore};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";

/// Probe whose answer is set by the test.
pub struct StaticProbe {
    name: &'static str,
    criticality: Criticality,
    /// `None` reports an uninitialized dependency.
    outcome: Mutex<Option<bool>>,
}

impl StaticProbe {
    pub fn new(name: &'static str, criticality: Criticality) -> Arc<Self> {
        Arc::new(Self {
            name,
            criticality,
            outcome: Mutex::new(Some(true)),
        })
    }

    pub fn set(&self, outcome: Option<bool>) {
        *self.outcome.lock() = outcome;
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    fn name(&self) -> &str {
        self.name
    }

    fn criticality(&self) -> Criticality {
        self.criticality
    }

    async fn ping(&self) -> Option<anyhow::Result<()>> {
        let outcome = *self.outcome.lock();
        outcome.map(|up| {
            if up {
                Ok(())
            } else {
                Err(anyhow::anyhow!("connection refused"))
            }
        })
    }
}

pub fn test_config(rate_limit: u32) -> Config {
    Config {
        port: 0,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        document_database_url: None,
        redis_url: "redis://unused".to_string(),
        jwt_secret: SECRET.to_string(),
        jwt_expire_hours: 1,
        jwt_issuer: "gatehouse".to_string(),
        rate_limit_per_second: rate_limit,
        trusted_proxies: Vec::new(),
        cors_allowed_origins: vec!["*".to_string()],
        request_timeout: Duration::from_secs(30),
        shutdown_grace: Duration::from_secs(5),
    }
}

/// Test application wrapper around the real router.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub users: Arc<MemoryUserStore>,
    pub postgres: Arc<StaticProbe>,
    pub redis: Arc<StaticProbe>,
    pub documents: Arc<StaticProbe>,
}

impl TestApp {
    /// App with a document store and a generous rate limit.
    pub fn new() -> Self {
        Self::build(true, 10_000)
    }

    /// App whose document store was never configured.
    pub fn without_documents() -> Self {
        Self::build(false, 10_000)
    }

    pub fn with_rate_limit(rate: u32) -> Self {
        Self::build(true, rate)
    }

    fn build(documents: bool, rate_limit: u32) -> Self {
        Self::with_config(test_config(rate_limit), documents)
    }

    /// App over a caller-built configuration.
    pub fn with_config(config: Config, documents: bool) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let articles: Option<Arc<dyn ArticleStore>> = if documents {
            Some(Arc::new(MemoryArticleStore::new()))
        } else {
            None
        };

        let postgres = StaticProbe::new("postgres", Criticality::Mandatory);
        let redis = StaticProbe::new("redis", Criticality::Mandatory);
        let document_probe = StaticProbe::new("documents", Criticality::Optional);
        if !documents {
            document_probe.set(None);
        }

        let probes: Vec<Arc<dyn HealthProbe>> = vec![
            postgres.clone(),
            redis.clone(),
            document_probe.clone(),
        ];

        let state = AppState::from_parts(
            config,
            users.clone(),
            articles,
            Arc::new(MemoryCache::new()),
            HealthAggregator::new(probes),
        )
        .expect("Failed to build state");

        Self {
            router: build_router(state.clone()),
            state,
            users,
            postgres,
            redis,
            documents: document_probe,
        }
    }

    /// Send a request to the test application.
    pub async fn request(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request as if it arrived over a connection from `peer`.
    pub async fn request_from(&self, peer: &str, mut request: Request<Body>) -> Response {
        let addr: SocketAddr = peer.parse().expect("Invalid peer address");
        request.extensions_mut().insert(ConnectInfo(addr));
        self.request(request).await
    }

    /// Send a request and decode the envelope.
    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.request(request).await;
        let status = response.status();
        (status, response_json(response).await)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::get(path);
        if let Some(token) = token {
            builder = builder.header("x-token", token);
        }
        self.call(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post(&self, path: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::post(path).header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("x-token", token);
        }
        self.call(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    /// Register a user and return the envelope.
    pub async fn register(&self, username: &str, password: &str, email: &str) -> Value {
        let (_, body) = self
            .post(
                "/api/v1/auth/register",
                json!({ "username": username, "password": password, "email": email }),
                None,
            )
            .await;
        body
    }

    /// Log in and return the issued token.
    ///
    /// # Panics
    ///
    /// Panics if the login envelope is not a success.
    pub async fn login(&self, username: &str, password: &str) -> String {
        let (_, body) = self
            .post(
                "/api/v1/auth/login",
                json!({ "username": username, "password": password }),
                None,
            )
            .await;
        assert_eq!(body["code"], 200, "login failed: {body}");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Register and log in a fresh user.
    pub async fn signed_in(&self, username: &str) -> String {
        let email = format!("{username}@example.com");
        let body = self.register(username, "secret123", &email).await;
        assert_eq!(body["code"], 200, "register failed: {body}");
        self.login(username, "secret123").await
    }
}

pub async fn response_json(response: Response) -> Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap_or(Value::Null)
}
