//! Application state shared across all handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use redis::Client as RedisClient;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::cache::{Cache, RedisCache};
use crate::config::Config;
use crate::db;
use crate::health::{Criticality, HealthAggregator, HealthProbe, PostgresProbe, RedisProbe};
use crate::middleware::{RateLimiter, TrustedProxies};
use crate::services::{ArticleService, TokenAuthenticator, UserService};
use crate::store::{ArticleStore, PgArticleStore, PgUserStore, UserStore};

/// Application state shared across all request handlers.
///
/// Cloning is cheap; everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Token issuing and validation.
    tokens: TokenAuthenticator,

    /// Per-client request budget.
    rate_limiter: RateLimiter,

    /// Peers whose forwarding headers identify the client.
    trusted_proxies: TrustedProxies,

    users: UserService,

    /// Article operations. Reports unavailable when the document store is absent.
    articles: ArticleService,

    health: HealthAggregator,
}

impl AppState {
    /// Connect every backing store and build the services.
    ///
    /// PostgreSQL and Redis are required. The document store is optional:
    /// a missing URL or a failed connection leaves articles unavailable.
    pub async fn new(config: &Config) -> Result<Self> {
        let db = db::create_pool(&config.database_url, config.database_max_connections)
            .await
            .context("failed to create database pool")?;

        db::bootstrap_users(&db)
            .await
            .context("failed to prepare users schema")?;

        let redis = RedisClient::open(config.redis_url.as_str())
            .context("failed to create Redis client")?;

        let mut conn = redis
            .get_multiplexed_async_connection()
            .await
            .context("failed to connect to Redis")?;

        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .context("Redis PING failed")?;

        let documents = match &config.document_database_url {
            Some(url) => open_documents(url, config.database_max_connections).await,
            None => {
                info!("no document store configured; article endpoints disabled");
                None
            }
        };

        let probes: Vec<Arc<dyn HealthProbe>> = vec![
            Arc::new(PostgresProbe::new(
                "postgres",
                Criticality::Mandatory,
                Some(db.clone()),
            )),
            Arc::new(RedisProbe::new(Some(conn.clone()))),
            Arc::new(PostgresProbe::new(
                "documents",
                Criticality::Optional,
                documents.clone(),
            )),
        ];

        let users: Arc<dyn UserStore> = Arc::new(PgUserStore::new(db));
        let articles: Option<Arc<dyn ArticleStore>> = documents
            .map(|pool| Arc::new(PgArticleStore::new(pool)) as Arc<dyn ArticleStore>);
        let cache: Arc<dyn Cache> = Arc::new(RedisCache::new(conn));

        let state = Self::from_parts(
            config.clone(),
            users,
            articles,
            cache,
            HealthAggregator::new(probes),
        )?;

        info!(
            rate_limit = config.rate_limit_per_second,
            trusted_proxies = config.trusted_proxies.len(),
            articles = state.articles().is_available(),
            "application state ready"
        );

        Ok(state)
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        config: Config,
        users: Arc<dyn UserStore>,
        articles: Option<Arc<dyn ArticleStore>>,
        cache: Arc<dyn Cache>,
        health: HealthAggregator,
    ) -> Result<Self> {
        let tokens = TokenAuthenticator::new(
            config.jwt_secret.as_bytes(),
            config.jwt_issuer.clone(),
            config.jwt_ttl()?,
        );
        let rate_limiter = RateLimiter::new(config.rate_limit_per_second);
        let trusted_proxies = TrustedProxies::new(config.trusted_proxies.iter().copied());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                users: UserService::new(users, cache, tokens.clone()),
                articles: ArticleService::new(articles),
                tokens,
                rate_limiter,
                trusted_proxies,
                health,
                config,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the token authenticator.
    pub fn tokens(&self) -> &TokenAuthenticator {
        &self.inner.tokens
    }

    /// Get the rate limiter.
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.rate_limiter
    }

    pub fn trusted_proxies(&self) -> &TrustedProxies {
        &self.inner.trusted_proxies
    }

    /// Get the user service.
    pub fn users(&self) -> &UserService {
        &self.inner.users
    }

    /// Get the article service.
    pub fn articles(&self) -> &ArticleService {
        &self.inner.articles
    }

    pub fn health(&self) -> &HealthAggregator {
        &self.inner.health
    }
}

async fn open_documents(url: &str, max_connections: u32) -> Option<PgPool> {
    let pool = match db::create_pool(url, max_connections).await {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "document store unreachable; article endpoints disabled");
            return None;
        }
    };

    if let Err(e) = db::bootstrap_articles(&pool).await {
        warn!(error = %format!("{e:#}"), "document schema unavailable; article endpoints disabled");
        return None;
    }

    Some(pool)
}
