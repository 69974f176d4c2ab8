//! Request input validation.
//!
//! Every check returns `AppError` with `ParamInvalid` and a short reason.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{AppError, AppResult};

#[allow(clippy::expect_used)]
static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{3,50}$").expect("username pattern is valid")
});

#[allow(clippy::expect_used)]
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$")
        .expect("email pattern is valid")
});

pub const PASSWORD_MIN: usize = 6;
pub const PASSWORD_MAX: usize = 50;
pub const TITLE_MAX: usize = 200;

pub fn username(value: &str) -> AppResult<()> {
    if USERNAME_RE.is_match(value) {
        Ok(())
    } else {
        Err(AppError::param(
            "username must be 3-50 letters, digits or underscores",
        ))
    }
}

pub fn password(value: &str) -> AppResult<()> {
    let len = value.chars().count();
    if (PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        Ok(())
    } else {
        Err(AppError::param(format!(
            "password must be {PASSWORD_MIN}-{PASSWORD_MAX} characters"
        )))
    }
}

pub fn email(value: &str) -> AppResult<()> {
    if value.len() <= 100 && EMAIL_RE.is_match(value) {
        Ok(())
    } else {
        Err(AppError::param("invalid email address"))
    }
}

pub fn title(value: &str) -> AppResult<()> {
    let len = value.trim().chars().count();
    if (1..=TITLE_MAX).contains(&len) {
        Ok(())
    } else {
        Err(AppError::param(format!(
            "title must be 1-{TITLE_MAX} characters"
        )))
    }
}

pub fn required(field: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        Err(AppError::param(format!("{field} is required")))
    } else {
        Ok(())
    }
}
