//! Article operations over the optional document store.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Article, ArticleQuery, ArticleUpdate, NewArticle, Page, PageRequest};
use crate::response::ErrorCode;
use crate::store::ArticleStore;
use crate::validation;

/// Article CRUD. Every operation answers `ServiceUnavailable` when no
/// document store was configured.
#[derive(Clone)]
pub struct ArticleService {
    store: Option<Arc<dyn ArticleStore>>,
}

impl ArticleService {
    pub fn new(store: Option<Arc<dyn ArticleStore>>) -> Self {
        Self { store }
    }

    pub fn is_available(&self) -> bool {
        self.store.is_some()
    }

    fn store(&self) -> AppResult<&Arc<dyn ArticleStore>> {
        self.store.as_ref().ok_or_else(|| {
            AppError::with_message(ErrorCode::ServiceUnavailable, "document store unavailable")
        })
    }

    pub async fn create(&self, input: NewArticle, user_id: i64, author: &str) -> AppResult<Article> {
        let store = self.store()?;
        validation::title(&input.title)?;
        validation::required("content", &input.content)?;

        let article = Article::new(input, user_id, author);
        store
            .create(&article)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbInsertFailed, e))?;

        info!(article_id = %article.id, user_id, "article created");
        Ok(article)
    }

    pub async fn list(&self, query: &ArticleQuery) -> AppResult<Page<Article>> {
        let store = self.store()?;
        let page = PageRequest::new(query.page, query.page_size);

        let (articles, total) = store
            .list(&query.filter(), page)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?;

        Ok(Page::new(page, articles, total))
    }

    /// Read one article. The view counter is bumped in the background; the
    /// returned document shows the count as it was before this read.
    pub async fn get(&self, id: &str) -> AppResult<Article> {
        let id = parse_id(id)?;
        let store = self.store()?;

        let article = store
            .find(id)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?
            .ok_or_else(|| AppError::new(ErrorCode::ArticleNotFound))?;

        let store = Arc::clone(store);
        tokio::spawn(async move {
            if let Err(e) = store.increment_views(id).await {
                warn!(article_id = %id, error = %format!("{e:#}"), "failed to record article view");
            }
        });

        Ok(article)
    }

    /// Update an article the caller owns.
    pub async fn update(&self, id: &str, user_id: i64, update: ArticleUpdate) -> AppResult<()> {
        let id = parse_id(id)?;
        let store = self.store()?;

        let update = update.normalized();
        if let Some(title) = &update.title {
            validation::title(title)?;
        }

        let matched = store
            .update(id, user_id, &update)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbUpdateFailed, e))?;
        if !matched {
            return Err(not_found_or_forbidden());
        }

        debug!(article_id = %id, user_id, "article updated");
        Ok(())
    }

    /// Delete an article the caller owns.
    pub async fn delete(&self, id: &str, user_id: i64) -> AppResult<()> {
        let id = parse_id(id)?;
        let store = self.store()?;

        let deleted = store
            .delete(id, user_id)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbDeleteFailed, e))?;
        if !deleted {
            return Err(not_found_or_forbidden());
        }

        info!(article_id = %id, user_id, "article deleted");
        Ok(())
    }

    /// Add a like. Repeated likes all count.
    pub async fn like(&self, id: &str) -> AppResult<()> {
        let id = parse_id(id)?;
        let store = self.store()?;

        let matched = store
            .increment_likes(id)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbUpdateFailed, e))?;
        if !matched {
            return Err(AppError::new(ErrorCode::ArticleNotFound));
        }
        Ok(())
    }
}

fn parse_id(id: &str) -> AppResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| AppError::param("invalid article id"))
}

fn not_found_or_forbidden() -> AppError {
    AppError::with_message(ErrorCode::ArticleNotFound, "article not found or no permission")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::store::MemoryArticleStore;
    use std::time::Duration;

    fn service() -> ArticleService {
        ArticleService::new(Some(Arc::new(MemoryArticleStore::new())))
    }

    fn input(title: &str) -> NewArticle {
        NewArticle {
            title: title.into(),
            content: "body".into(),
            tags: vec!["rust".into()],
            status: None,
        }
    }

    #[tokio::test]
    async fn unavailable_without_store() {
        let service = ArticleService::new(None);
        assert!(!service.is_available());

        let err = service.create(input("t"), 1, "alice").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);

        let err = service.list(&ArticleQuery::default()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }

    #[tokio::test]
    async fn bad_ids_are_param_errors() {
        let err = service().get("not-a-uuid").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParamInvalid);
    }

    #[tokio::test]
    async fn create_validates() {
        let err = service().create(input(""), 1, "alice").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParamInvalid);

        let mut no_body = input("t");
        no_body.content = "  ".into();
        let err = service().create(no_body, 1, "alice").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ParamInvalid);
    }

    #[tokio::test]
    async fn likes_accumulate() {
        let service = service();
        let article = service.create(input("t"), 1, "alice").await.unwrap();
        let id = article.id.to_string();

        service.like(&id).await.unwrap();
        service.like(&id).await.unwrap();

        let read = service.get(&id).await.unwrap();
        assert_eq!(read.likes, 2);

        let err = service.like(&Uuid::now_v7().to_string()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ArticleNotFound);
    }

    #[tokio::test]
    async fn views_increment_after_read() {
        let service = service();
        let article = service.create(input("t"), 1, "alice").await.unwrap();
        let id = article.id.to_string();

        assert_eq!(service.get(&id).await.unwrap().views, 0);

        let mut views = 0;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            views = service.store().unwrap().find(article.id).await.unwrap().unwrap().views;
            if views == 1 {
                break;
            }
        }
        assert_eq!(views, 1);
    }

    #[tokio::test]
    async fn only_owner_may_modify() {
        let service = service();
        let article = service.create(input("t"), 1, "alice").await.unwrap();
        let id = article.id.to_string();

        let err = service
            .update(&id, 2, ArticleUpdate { title: Some("x".into()), ..Default::default() })
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ArticleNotFound);

        let err = service.delete(&id, 2).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ArticleNotFound);

        service.delete(&id, 1).await.unwrap();
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paged() {
        let service = service();
        for i in 0..15 {
            service.create(input(&format!("post {i}")), 1, "alice").await.unwrap();
        }
        let query = ArticleQuery {
            page: Some(2),
            page_size: Some(10),
            ..Default::default()
        };
        let page = service.list(&query).await.unwrap();
        assert_eq!(page.total, 15);
        assert_eq!(page.list.len(), 5);
        assert_eq!(page.list[4].title, "post 0");
    }
}
