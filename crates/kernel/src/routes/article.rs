//! Article routes. Reads are public, writes need a token.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Article, ArticleQuery, ArticleUpdate, NewArticle, Page};
use crate::response::Envelope;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

async fn list_articles(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ArticleQuery>,
) -> AppResult<Envelope<Page<Article>>> {
    let page = state.articles().list(&query).await?;
    Ok(Envelope::success(page))
}

async fn get_article(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Envelope<Article>> {
    let article = state.articles().get(&id).await?;
    Ok(Envelope::success(article))
}

async fn create_article(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(input): ApiJson<NewArticle>,
) -> AppResult<Envelope<Article>> {
    let article = state
        .articles()
        .create(input, user.user_id, &user.username)
        .await?;
    Ok(Envelope::success_with_message(article, "article created"))
}

async fn update_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<ArticleUpdate>,
) -> AppResult<Envelope<()>> {
    state.articles().update(&id, user.user_id, update).await?;
    Ok(Envelope::message("update successful"))
}

async fn delete_article(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Envelope<()>> {
    state.articles().delete(&id, user.user_id).await?;
    Ok(Envelope::message("delete successful"))
}

async fn like_article(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Envelope<()>> {
    state.articles().like(&id).await?;
    Ok(Envelope::message("liked"))
}

/// Anonymous article routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/articles", get(list_articles))
        .route("/articles/{id}", get(get_article))
}

/// Article routes that need a token.
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/articles", post(create_article))
        .route("/articles/{id}/update", post(update_article))
        .route("/articles/{id}/delete", post(delete_article))
        .route("/articles/{id}/like", post(like_article))
}
