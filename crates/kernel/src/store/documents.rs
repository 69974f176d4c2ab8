//! Article document store on PostgreSQL.
//!
//! Each article is one row; tags live in a `TEXT[]` column so "any of these
//! tags" is an array overlap.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::ArticleStore;
use crate::models::{Article, ArticleFilter, ArticleUpdate, PageRequest};

#[derive(Clone)]
pub struct PgArticleStore {
    pool: PgPool,
}

impl PgArticleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Append `WHERE ...` for a list filter.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ArticleFilter) {
    qb.push(" WHERE TRUE");

    if let Some(author) = &filter.author {
        qb.push(" AND author = ").push_bind(author.clone());
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if !filter.tags.is_empty() {
        qb.push(" AND tags && ").push_bind(filter.tags.clone());
    }
    if let Some(keyword) = &filter.keyword {
        let pattern = format!("%{}%", escape_like(keyword));
        qb.push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR content ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escape LIKE metacharacters so the keyword matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl ArticleStore for PgArticleStore {
    async fn create(&self, article: &Article) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO articles
                (id, title, content, author, user_id, tags, views, likes, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(article.id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.author)
        .bind(article.user_id)
        .bind(&article.tags)
        .bind(article.views)
        .bind(article.likes)
        .bind(article.status)
        .bind(article.created_at)
        .bind(article.updated_at)
        .execute(&self.pool)
        .await
        .context("failed to insert article")?;

        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Article>> {
        sqlx::query_as::<_, Article>("SELECT * FROM articles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch article")
    }

    async fn list(&self, filter: &ArticleFilter, page: PageRequest) -> Result<(Vec<Article>, i64)> {
        let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM articles");
        push_filter(&mut count, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .context("failed to count articles")?;

        let mut select: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM articles");
        push_filter(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let articles = select
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await
            .context("failed to list articles")?;

        Ok((articles, total))
    }

    async fn update(&self, id: Uuid, owner: i64, update: &ArticleUpdate) -> Result<bool> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE articles SET updated_at = NOW()");

        if let Some(title) = &update.title {
            qb.push(", title = ").push_bind(title.clone());
        }
        if let Some(content) = &update.content {
            qb.push(", content = ").push_bind(content.clone());
        }
        if let Some(tags) = &update.tags {
            qb.push(", tags = ").push_bind(tags.clone());
        }
        if let Some(status) = update.status {
            qb.push(", status = ").push_bind(status);
        }
        qb.push(" WHERE id = ")
            .push_bind(id)
            .push(" AND user_id = ")
            .push_bind(owner);

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .context("failed to update article")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: Uuid, owner: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .context("failed to delete article")?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_views(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET views = views + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to increment views")?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_likes(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE articles SET likes = likes + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("failed to increment likes")?;

        Ok(result.rows_affected() > 0)
    }
}
