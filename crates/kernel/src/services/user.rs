//! User accounts: registration, login, profiles.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::Cache;
use crate::error::{AppError, AppResult};
use crate::models::user::hash_password;
use crate::models::{NewUser, Page, PageRequest, User, UserUpdate};
use crate::response::ErrorCode;
use crate::services::token::TokenAuthenticator;
use crate::store::{Conflict, UserStore};
use crate::validation;

/// How long a cached profile stays valid.
const PROFILE_TTL: Duration = Duration::from_secs(5 * 60);

fn profile_key(id: i64) -> String {
    format!("user:profile:{id}")
}

/// Map a failed write, reporting a uniqueness clash as the matching code.
fn write_failed(code: ErrorCode, err: anyhow::Error) -> AppError {
    match Conflict::of(&err) {
        Some(Conflict::Username) => AppError::new(ErrorCode::UsernameExists),
        Some(Conflict::Email) => AppError::new(ErrorCode::EmailExists),
        None => AppError::store(code, err),
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_info: User,
}

/// User operations over a [`UserStore`], with profile caching.
#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn Cache>,
    tokens: TokenAuthenticator,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<dyn Cache>, tokens: TokenAuthenticator) -> Self {
        Self {
            store,
            cache,
            tokens,
        }
    }

    /// Create an account. Username and email must be unused.
    pub async fn register(&self, req: RegisterRequest) -> AppResult<User> {
        let username = req.username.trim().to_string();
        let email = req.email.trim().to_string();
        validation::username(&username)?;
        validation::password(&req.password)?;
        validation::email(&email)?;

        let taken = self
            .store
            .exists_by_username(&username)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?;
        if taken {
            return Err(AppError::new(ErrorCode::UsernameExists));
        }

        let taken = self
            .store
            .exists_by_email(&email, None)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?;
        if taken {
            return Err(AppError::new(ErrorCode::EmailExists));
        }

        let password = req.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(anyhow::Error::from)??;

        let user = self
            .store
            .create(NewUser {
                username,
                password_hash,
                email,
            })
            .await
            .map_err(|e| write_failed(ErrorCode::DbInsertFailed, e))?;

        info!(user_id = user.id, username = %user.username, "user registered");
        Ok(user)
    }

    /// Check credentials and issue a token.
    ///
    /// Unknown user and wrong password are indistinguishable to the caller.
    /// Nothing is written on failure.
    pub async fn login(&self, req: LoginRequest) -> AppResult<LoginResponse> {
        if req.username.trim().is_empty() || req.password.is_empty() {
            return Err(AppError::param("username and password are required"));
        }

        let user = self
            .store
            .find_by_username(req.username.trim())
            .await
            .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?
            .ok_or_else(|| AppError::new(ErrorCode::InvalidPassword))?;

        let password = req.password;
        let (user, valid) = tokio::task::spawn_blocking(move || {
            let valid = user.verify_password(&password);
            (user, valid)
        })
        .await
        .map_err(anyhow::Error::from)?;

        if !valid {
            return Err(AppError::new(ErrorCode::InvalidPassword));
        }

        if !user.is_active() {
            return Err(AppError::new(ErrorCode::UserDisabled));
        }

        let token = self.tokens.issue(user.id, &user.username)?;
        info!(user_id = user.id, "user logged in");

        Ok(LoginResponse {
            token,
            user_info: user,
        })
    }

    /// Re-issue a token that is about to expire.
    pub fn refresh_token(&self, token: &str) -> AppResult<String> {
        Ok(self.tokens.refresh(token)?)
    }

    /// Fetch a live user by id, through the profile cache.
    pub async fn get(&self, id: i64) -> AppResult<User> {
        let key = profile_key(id);

        match self.cache.get(&key).await {
            Ok(Some(cached)) => match serde_json::from_str::<User>(&cached) {
                Ok(user) => return Ok(user),
                Err(e) => warn!(error = %e, key = %key, "discarding unreadable cached profile"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, key = %key, "profile cache read failed"),
        }

        let user = self
            .store
            .find_by_id(id)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound))?;

        match serde_json::to_string(&user) {
            Ok(json) => {
                if let Err(e) = self.cache.set(&key, &json, Some(PROFILE_TTL)).await {
                    warn!(error = %e, key = %key, "profile cache write failed");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize profile for cache"),
        }

        Ok(user)
    }

    pub async fn list(&self, page: PageRequest) -> AppResult<Page<User>> {
        let (users, total) = self
            .store
            .list(page)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?;

        Ok(Page::new(page, users, total))
    }

    /// Update the caller's own profile.
    pub async fn update(&self, user_id: i64, update: UserUpdate) -> AppResult<()> {
        let update = update.normalized();
        if update.is_empty() {
            return Err(AppError::param("no fields to update"));
        }

        if let Some(email) = &update.email {
            validation::email(email)?;
            let taken = self
                .store
                .exists_by_email(email, Some(user_id))
                .await
                .map_err(|e| AppError::store(ErrorCode::DbQueryFailed, e))?;
            if taken {
                return Err(AppError::new(ErrorCode::EmailExists));
            }
        }

        let updated = self
            .store
            .update_fields(user_id, &update)
            .await
            .map_err(|e| write_failed(ErrorCode::DbUpdateFailed, e))?;
        if !updated {
            return Err(AppError::new(ErrorCode::UserNotFound));
        }

        self.forget(user_id).await;
        Ok(())
    }

    /// Soft-delete another user.
    pub async fn delete(&self, id: i64, current_user_id: i64) -> AppResult<()> {
        if id == current_user_id {
            return Err(AppError::new(ErrorCode::CannotDeleteSelf));
        }

        let deleted = self
            .store
            .soft_delete(id)
            .await
            .map_err(|e| AppError::store(ErrorCode::DbDeleteFailed, e))?;
        if !deleted {
            return Err(AppError::new(ErrorCode::UserNotFound));
        }

        self.forget(id).await;
        info!(user_id = id, deleted_by = current_user_id, "user deleted");
        Ok(())
    }

    async fn forget(&self, id: i64) {
        if let Err(e) = self.cache.delete(&profile_key(id)).await {
            warn!(error = %e, user_id = id, "failed to invalidate cached profile");
        }
    }
}
