//! Database connection pools and schema bootstrap.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Create a PostgreSQL connection pool.
pub async fn create_pool(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")?;

    Ok(pool)
}

/// Partial unique index on live usernames.
pub const USERNAME_INDEX: &str = "users_username_live";
/// Partial unique index on live emails.
pub const EMAIL_INDEX: &str = "users_email_live";

const USERS_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id          BIGSERIAL PRIMARY KEY,
        username    VARCHAR(50)  NOT NULL,
        password    VARCHAR(255) NOT NULL,
        email       VARCHAR(100) NOT NULL,
        phone       VARCHAR(20)  NOT NULL DEFAULT '',
        avatar      VARCHAR(255) NOT NULL DEFAULT '',
        status      SMALLINT     NOT NULL DEFAULT 1,
        created_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
        deleted_at  TIMESTAMPTZ
    )
    "#,
    // Uniqueness only among live rows, so soft-deleted names can be reused.
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_live ON users (username) WHERE deleted_at IS NULL",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_live ON users (email) WHERE deleted_at IS NULL",
    "CREATE INDEX IF NOT EXISTS users_deleted_at ON users (deleted_at)",
];

const ARTICLES_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        id          UUID PRIMARY KEY,
        title       VARCHAR(200) NOT NULL,
        content     TEXT         NOT NULL,
        author      VARCHAR(50)  NOT NULL,
        user_id     BIGINT       NOT NULL,
        tags        TEXT[]       NOT NULL DEFAULT '{}',
        views       BIGINT       NOT NULL DEFAULT 0,
        likes       BIGINT       NOT NULL DEFAULT 0,
        status      SMALLINT     NOT NULL DEFAULT 1,
        created_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS articles_user_id ON articles (user_id)",
    "CREATE INDEX IF NOT EXISTS articles_created_at ON articles (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS articles_tags ON articles USING GIN (tags)",
];

async fn apply(pool: &PgPool, statements: &[&str], what: &str) -> Result<()> {
    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("failed to bootstrap {what} schema"))?;
    }
    info!(schema = what, "schema ready");
    Ok(())
}

/// Create the users table and its indexes if missing.
pub async fn bootstrap_users(pool: &PgPool) -> Result<()> {
    apply(pool, USERS_SCHEMA, "users").await
}

/// Create the articles table and its indexes if missing.
pub async fn bootstrap_articles(pool: &PgPool) -> Result<()> {
    apply(pool, ARTICLES_SCHEMA, "articles").await
}
