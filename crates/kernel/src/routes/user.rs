//! User profile routes. All of them require a token.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::models::{Page, PageQuery, User, UserUpdate};
use crate::response::Envelope;
use crate::routes::extract::{ApiJson, ApiQuery, numeric_id};
use crate::state::AppState;

async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Envelope<Page<User>>> {
    let page = state.users().list(query.into()).await?;
    Ok(Envelope::success(page))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Envelope<User>> {
    let profile = state.users().get(user.user_id).await?;
    Ok(Envelope::success(profile))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Envelope<User>> {
    let id = numeric_id(&id, "user")?;
    let user = state.users().get(id).await?;
    Ok(Envelope::success(user))
}

/// Update the caller's own profile.
async fn update_user(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(update): ApiJson<UserUpdate>,
) -> AppResult<Envelope<()>> {
    state.users().update(user.user_id, update).await?;
    Ok(Envelope::message("update successful"))
}

async fn delete_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Envelope<()>> {
    let id = numeric_id(&id, "user")?;
    state.users().delete(id, user.user_id).await?;
    Ok(Envelope::message("delete successful"))
}

/// Create the user router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(me))
        .route("/users/update", post(update_user))
        .route("/users/{id}", get(get_user))
        .route("/users/{id}/delete", post(delete_user))
}
