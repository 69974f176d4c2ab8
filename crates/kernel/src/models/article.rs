//! Article documents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STATUS_PUBLISHED: i16 = 1;
pub const STATUS_DRAFT: i16 = 0;

/// Article document. The id is opaque to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: String,
    pub user_id: i64,
    pub tags: Vec<String>,
    pub views: i64,
    pub likes: i64,
    pub status: i16,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    /// A fresh article owned by `user_id`, with zeroed counters.
    pub fn new(input: NewArticle, user_id: i64, author: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: input.title.trim().to_string(),
            content: input.content,
            author: author.to_string(),
            user_id,
            tags: dedup_tags(input.tags),
            views: 0,
            likes: 0,
            status: input.status.unwrap_or(STATUS_PUBLISHED),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this article matches a list filter.
    pub fn matches(&self, filter: &ArticleFilter) -> bool {
        if let Some(author) = &filter.author
            && &self.author != author
        {
            return false;
        }
        if let Some(status) = filter.status
            && self.status != status
        {
            return false;
        }
        if !filter.tags.is_empty() && !self.tags.iter().any(|t| filter.tags.contains(t)) {
            return false;
        }
        if let Some(keyword) = &filter.keyword {
            let keyword = keyword.to_lowercase();
            if !self.title.to_lowercase().contains(&keyword)
                && !self.content.to_lowercase().contains(&keyword)
            {
                return false;
            }
        }
        true
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, update: &ArticleUpdate) {
        if let Some(title) = &update.title {
            self.title.clone_from(title);
        }
        if let Some(content) = &update.content {
            self.content.clone_from(content);
        }
        if let Some(tags) = &update.tags {
            self.tags = dedup_tags(tags.clone());
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = Utc::now();
    }
}

/// Request body for creating an article.
#[derive(Debug, Clone, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Option<i16>,
}

/// Request body for updating an article. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<i16>,
}

impl ArticleUpdate {
    /// Trim the title, dedup tags, and treat empty values as absent.
    pub fn normalized(self) -> Self {
        Self {
            title: self
                .title
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            content: self.content.filter(|s| !s.trim().is_empty()),
            tags: self.tags.map(dedup_tags).filter(|t| !t.is_empty()),
            status: self.status,
        }
    }
}

/// List filter. Empty fields do not constrain.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub author: Option<String>,
    pub status: Option<i16>,
    /// Matches articles carrying any of these tags.
    pub tags: Vec<String>,
    /// Case-insensitive substring of title or content.
    pub keyword: Option<String>,
}

/// Article list query string: `?page=&page_size=&author=&status=&tags=a,b&keyword=`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub author: Option<String>,
    pub status: Option<i16>,
    pub tags: Option<String>,
    pub keyword: Option<String>,
}

impl ArticleQuery {
    pub fn filter(&self) -> ArticleFilter {
        fn non_empty(v: &Option<String>) -> Option<String> {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        }

        ArticleFilter {
            author: non_empty(&self.author),
            status: self.status,
            tags: self
                .tags
                .as_deref()
                .map(|t| {
                    t.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            keyword: non_empty(&self.keyword),
        }
    }
}

fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
