//! Configuration loaded from environment variables.

use std::env;
use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;

/// Minimum accepted length for the token signing secret.
const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted token lifetime (one year).
const MAX_JWT_EXPIRE_HOURS: i64 = 24 * 365;

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// HTTP server port (default: 3000).
    pub port: u16,

    /// PostgreSQL connection URL for the relational (user) store.
    pub database_url: String,

    /// Maximum database connections in each pool (default: 10).
    pub database_max_connections: u32,

    /// PostgreSQL connection URL for the document (article) store.
    ///
    /// Optional: when unset, article endpoints answer with
    /// `ServiceUnavailable` and health reports the store as `unknown`.
    pub document_database_url: Option<String>,

    /// Redis connection URL.
    pub redis_url: String,

    /// HMAC secret used to sign identity tokens.
    pub jwt_secret: String,

    /// Token lifetime in hours (default: 24).
    pub jwt_expire_hours: i64,

    /// Token issuer claim (default: "gatehouse").
    pub jwt_issuer: String,

    /// Requests allowed per client per one-second window (default: 100).
    pub rate_limit_per_second: u32,

    /// Peers allowed to set `X-Forwarded-For`/`X-Real-IP` (comma-separated, default: none).
    pub trusted_proxies: Vec<IpAddr>,

    /// CORS allowed origins (comma-separated, default: "*").
    pub cors_allowed_origins: Vec<String>,

    /// Per-request timeout (default: 30 seconds).
    pub request_timeout: Duration,

    /// How long in-flight requests may drain after a shutdown signal (default: 5 seconds).
    pub shutdown_grace: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let port = var("PORT", "3000")
            .parse()
            .context("PORT must be a valid u16")?;

        let database_url =
            get("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let database_max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse()
            .context("DATABASE_MAX_CONNECTIONS must be a valid u32")?;

        let document_database_url = get("DOCUMENT_DATABASE_URL").filter(|v| !v.trim().is_empty());

        let redis_url = var("REDIS_URL", "redis://127.0.0.1:6379");

        let jwt_secret =
            get("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            bail!("JWT_SECRET must be at least {MIN_JWT_SECRET_LEN} bytes");
        }

        let jwt_expire_hours: i64 = var("JWT_EXPIRE_HOURS", "24")
            .parse()
            .context("JWT_EXPIRE_HOURS must be a valid integer")?;
        if !(1..=MAX_JWT_EXPIRE_HOURS).contains(&jwt_expire_hours) {
            bail!("JWT_EXPIRE_HOURS must be between 1 and {MAX_JWT_EXPIRE_HOURS}");
        }

        let jwt_issuer = var("JWT_ISSUER", "gatehouse");

        let rate_limit_per_second: u32 = var("RATE_LIMIT_PER_SECOND", "100")
            .parse()
            .context("RATE_LIMIT_PER_SECOND must be a valid u32")?;
        if rate_limit_per_second == 0 {
            bail!("RATE_LIMIT_PER_SECOND must be at least 1");
        }

        let trusted_proxies = get("TRUSTED_PROXIES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<IpAddr>()
                            .with_context(|| format!("TRUSTED_PROXIES entry {s:?} is not an IP address"))
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let request_timeout = var("REQUEST_TIMEOUT_SECS", "30")
            .parse()
            .map(Duration::from_secs)
            .context("REQUEST_TIMEOUT_SECS must be a valid u64")?;

        let shutdown_grace = var("SHUTDOWN_GRACE_SECS", "5")
            .parse()
            .map(Duration::from_secs)
            .context("SHUTDOWN_GRACE_SECS must be a valid u64")?;

        Ok(Self {
            port,
            database_url,
            database_max_connections,
            document_database_url,
            redis_url,
            jwt_secret,
            jwt_expire_hours,
            jwt_issuer,
            rate_limit_per_second,
            trusted_proxies,
            cors_allowed_origins,
            request_timeout,
            shutdown_grace,
        })
    }

    /// Token lifetime as a chrono duration.
    pub fn jwt_ttl(&self) -> Result<TimeDelta> {
        TimeDelta::try_hours(self.jwt_expire_hours)
            .filter(|ttl| *ttl > TimeDelta::zero())
            .with_context(|| format!("invalid token lifetime of {} hours", self.jwt_expire_hours))
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("database_max_connections", &self.database_max_connections)
            .field("document_store", &self.document_database_url.is_some())
            .field("jwt_expire_hours", &self.jwt_expire_hours)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("rate_limit_per_second", &self.rate_limit_per_second)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("request_timeout", &self.request_timeout)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish_non_exhaustive()
    }
}
