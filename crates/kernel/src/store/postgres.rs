//! PostgreSQL user store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::{Conflict, UserStore};
use crate::db::{EMAIL_INDEX, USERNAME_INDEX};
use crate::models::{NewUser, PageRequest, User, UserUpdate};

/// Users table backed by a shared pool.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unique violations on the live-user indexes become a [`Conflict`].
fn write_error(err: sqlx::Error, context: &'static str) -> anyhow::Error {
    let conflict = match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
            Some(USERNAME_INDEX) => Some(Conflict::Username),
            Some(EMAIL_INDEX) => Some(Conflict::Email),
            _ => None,
        },
        _ => None,
    };

    match conflict {
        Some(conflict) => anyhow::Error::new(err).context(conflict),
        None => anyhow::Error::new(err).context(context),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password, email)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "failed to create user"))?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch user by id")
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE username = $1 AND deleted_at IS NULL",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch user by username")
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 AND deleted_at IS NULL)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .context("failed to check username")
    }

    async fn exists_by_email(&self, email: &str, excluding: Option<i64>) -> Result<bool> {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE email = $1 AND deleted_at IS NULL AND ($2::BIGINT IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(email)
        .bind(excluding)
        .fetch_one(&self.pool)
        .await
        .context("failed to check email")
    }

    async fn update_fields(&self, id: i64, update: &UserUpdate) -> Result<bool> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

        if let Some(email) = &update.email {
            qb.push(", email = ").push_bind(email);
        }
        if let Some(phone) = &update.phone {
            qb.push(", phone = ").push_bind(phone);
        }
        if let Some(avatar) = &update.avatar {
            qb.push(", avatar = ").push_bind(avatar);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND deleted_at IS NULL");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "failed to update user"))?;

        Ok(result.rows_affected() > 0)
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .context("failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, page: PageRequest) -> Result<(Vec<User>, i64)> {
        let total = self.count().await?;

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE deleted_at IS NULL ORDER BY id LIMIT $1 OFFSET $2",
        )
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .context("failed to list users")?;

        Ok((users, total))
    }

    async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .context("failed to count users")
    }
}
