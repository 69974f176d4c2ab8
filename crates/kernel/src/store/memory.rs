//! In-process stores.
//!
//! Same observable behaviour as the PostgreSQL adapters, held in memory.
//! Used by the unit and integration tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use super::{ArticleStore, Conflict, UserStore};
use crate::models::{
    Article, ArticleFilter, ArticleUpdate, NewUser, PageRequest, User, UserUpdate,
};
use crate::models::user::STATUS_ACTIVE;

fn page_of<T: Clone>(items: &[T], page: PageRequest) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(page.limit()).unwrap_or(0);
    items.iter().skip(offset).take(limit).cloned().collect()
}

/// Users keyed by id, soft delete included.
#[derive(Debug)]
pub struct MemoryUserStore {
    users: RwLock<BTreeMap<i64, User>>,
    next_id: AtomicI64,
}

impl Default for MemoryUserStore {
    fn default() -> Self {
        Self {
            users: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change a user's account status.
    pub fn set_status(&self, id: i64, status: i16) -> bool {
        match self.users.write().get_mut(&id) {
            Some(user) => {
                user.status = status;
                true
            }
            None => false,
        }
    }

    /// Rows including soft-deleted ones.
    pub fn row_count(&self) -> usize {
        self.users.read().len()
    }

    fn live(&self) -> Vec<User> {
        self.users
            .read()
            .values()
            .filter(|u| u.deleted_at.is_none())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let mut users = self.users.write();

        // Same uniqueness rules as the partial unique indexes.
        for live in users.values().filter(|u| u.deleted_at.is_none()) {
            if live.username == user.username {
                return Err(Conflict::Username.into());
            }
            if live.email == user.email {
                return Err(Conflict::Email.into());
            }
        }

        let now = Utc::now();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = User {
            id,
            username: user.username,
            password: user.password_hash,
            email: user.email,
            phone: String::new(),
            avatar: String::new(),
            status: STATUS_ACTIVE,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        users.insert(id, record.clone());
        Ok(record)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .get(&id)
            .filter(|u| u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.live().into_iter().find(|u| u.username == username))
    }

    async fn exists_by_username(&self, username: &str) -> Result<bool> {
        Ok(self.live().iter().any(|u| u.username == username))
    }

    async fn exists_by_email(&self, email: &str, excluding: Option<i64>) -> Result<bool> {
        Ok(self
            .live()
            .iter()
            .any(|u| u.email == email && Some(u.id) != excluding))
    }

    async fn update_fields(&self, id: i64, update: &UserUpdate) -> Result<bool> {
        let mut users = self.users.write();
        if let Some(email) = &update.email
            && users
                .values()
                .any(|u| u.id != id && u.deleted_at.is_none() && &u.email == email)
        {
            return Err(Conflict::Email.into());
        }
        let Some(user) = users.get_mut(&id).filter(|u| u.deleted_at.is_none()) else {
            return Ok(false);
        };

        if let Some(email) = &update.email {
            user.email.clone_from(email);
        }
        if let Some(phone) = &update.phone {
            user.phone.clone_from(phone);
        }
        if let Some(avatar) = &update.avatar {
            user.avatar.clone_from(avatar);
        }
        user.updated_at = Utc::now();
        Ok(true)
    }

    async fn soft_delete(&self, id: i64) -> Result<bool> {
        let mut users = self.users.write();
        match users.get_mut(&id).filter(|u| u.deleted_at.is_none()) {
            Some(user) => {
                user.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list(&self, page: PageRequest) -> Result<(Vec<User>, i64)> {
        let live = self.live();
        let total = i64::try_from(live.len())?;
        Ok((page_of(&live, page), total))
    }

    async fn count(&self) -> Result<i64> {
        Ok(i64::try_from(self.live().len())?)
    }
}

/// Articles keyed by id.
#[derive(Debug, Default)]
pub struct MemoryArticleStore {
    articles: RwLock<BTreeMap<Uuid, Article>>,
}

impl MemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticleStore for MemoryArticleStore {
    async fn create(&self, article: &Article) -> Result<()> {
        let mut articles = self.articles.write();
        if articles.contains_key(&article.id) {
            anyhow::bail!("article {} already exists", article.id);
        }
        articles.insert(article.id, article.clone());
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<Option<Article>> {
        Ok(self.articles.read().get(&id).cloned())
    }

    async fn list(&self, filter: &ArticleFilter, page: PageRequest) -> Result<(Vec<Article>, i64)> {
        let mut matched: Vec<Article> = self
            .articles
            .read()
            .values()
            .filter(|a| a.matches(filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = i64::try_from(matched.len())?;
        Ok((page_of(&matched, page), total))
    }

    async fn update(&self, id: Uuid, owner: i64, update: &ArticleUpdate) -> Result<bool> {
        let mut articles = self.articles.write();
        match articles.get_mut(&id).filter(|a| a.user_id == owner) {
            Some(article) => {
                article.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: Uuid, owner: i64) -> Result<bool> {
        let mut articles = self.articles.write();
        if articles.get(&id).is_some_and(|a| a.user_id == owner) {
            articles.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn increment_views(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .articles
            .write()
            .get_mut(&id)
            .map(|a| a.views += 1)
            .is_some())
    }

    async fn increment_likes(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .articles
            .write()
            .get_mut(&id)
            .map(|a| a.likes += 1)
            .is_some())
    }
}
