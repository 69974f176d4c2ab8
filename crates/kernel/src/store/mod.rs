//! Persistence adapters.
//!
//! Services depend on these traits, never on a concrete backend. Adapter
//! errors are plain `anyhow` errors; services decide which response code
//! they map to. A write rejected by a uniqueness rule carries a
//! [`Conflict`] so callers can tell it apart from a failed write.

pub mod documents;
pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Article, ArticleFilter, ArticleUpdate, NewUser, PageRequest, User, UserUpdate};

pub use documents::PgArticleStore;
pub use memory::{MemoryArticleStore, MemoryUserStore};
pub use postgres::PgUserStore;

/// A live user already holds the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Conflict {
    #[error("username already taken")]
    Username,
    #[error("email already registered")]
    Email,
}

impl Conflict {
    /// The conflict carried by `err`, if any.
    pub fn of(err: &anyhow::Error) -> Option<Self> {
        err.downcast_ref::<Self>().copied()
    }
}

/// Relational user storage with soft delete.
///
/// Soft-deleted users are invisible to every method.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create(&self, user: NewUser) -> Result<User>;

    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn exists_by_username(&self, username: &str) -> Result<bool>;

    /// Whether another live user holds `email`.
    async fn exists_by_email(&self, email: &str, excluding: Option<i64>) -> Result<bool>;

    /// Returns false if no live user has this id.
    async fn update_fields(&self, id: i64, update: &UserUpdate) -> Result<bool>;

    async fn soft_delete(&self, id: i64) -> Result<bool>;

    /// One page ordered by id, plus the total count.
    async fn list(&self, page: PageRequest) -> Result<(Vec<User>, i64)>;

    async fn count(&self) -> Result<i64>;
}

/// Document storage for articles.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn create(&self, article: &Article) -> Result<()>;

    async fn find(&self, id: Uuid) -> Result<Option<Article>>;

    /// One page, newest first, plus the total count of matches.
    async fn list(&self, filter: &ArticleFilter, page: PageRequest) -> Result<(Vec<Article>, i64)>;

    /// Update an article owned by `owner`. Returns false if none matched.
    async fn update(&self, id: Uuid, owner: i64, update: &ArticleUpdate) -> Result<bool>;

    /// Delete an article owned by `owner`. Returns false if none matched.
    async fn delete(&self, id: Uuid, owner: i64) -> Result<bool>;

    /// Atomically add one view.
    async fn increment_views(&self, id: Uuid) -> Result<bool>;

    /// Atomically add one like.
    async fn increment_likes(&self, id: Uuid) -> Result<bool>;
}
