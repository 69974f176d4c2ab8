//! Uniform response envelope and the stable error-code taxonomy.
//!
//! Every JSON body produced by the server is an [`Envelope`]:
//!
//! ```json
//! {"code": 200, "message": "success", "data": {...}}
//! ```
//!
//! `code == 200` is the only success code. Business failures travel in the
//! body with HTTP status 200; callers must branch on `code`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize, Serializer};

/// Stable response codes.
///
/// The discriminant is the wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 200,

    // System
    InternalError = 10000,
    TooManyRequests = 10001,
    ServiceUnavailable = 10002,

    // Authentication
    TokenMissing = 10003,
    TokenInvalid = 10004,
    LoginRequired = 10005,
    TokenExpired = 10006,
    TokenGenFailed = 10007,

    // Users
    UserNotFound = 11002,
    UsernameExists = 11003,
    EmailExists = 11004,
    InvalidPassword = 11006,
    UserDisabled = 11008,
    NoPermission = 11009,
    CannotDeleteSelf = 11010,

    // Articles
    ArticleNotFound = 12001,

    // Persistence
    DbQueryFailed = 13001,
    DbInsertFailed = 13002,
    DbUpdateFailed = 13003,
    DbDeleteFailed = 13004,

    // Request input
    ParamInvalid = 14001,
}

impl ErrorCode {
    /// Wire value of this code.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Canonical message for this code.
    pub const fn message(self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::InternalError => "internal server error",
            ErrorCode::TooManyRequests => "too many requests",
            ErrorCode::ServiceUnavailable => "service unavailable",
            ErrorCode::TokenMissing => "token missing",
            ErrorCode::TokenInvalid => "token invalid",
            ErrorCode::LoginRequired => "login required",
            ErrorCode::TokenExpired => "token expired",
            ErrorCode::TokenGenFailed => "failed to generate token",
            ErrorCode::UserNotFound => "user not found",
            ErrorCode::UsernameExists => "username already exists",
            ErrorCode::EmailExists => "email already registered",
            ErrorCode::InvalidPassword => "invalid username or password",
            ErrorCode::UserDisabled => "account disabled",
            ErrorCode::NoPermission => "no permission",
            ErrorCode::CannotDeleteSelf => "cannot delete yourself",
            ErrorCode::ArticleNotFound => "article not found",
            ErrorCode::DbQueryFailed => "database query failed",
            ErrorCode::DbInsertFailed => "database insert failed",
            ErrorCode::DbUpdateFailed => "database update failed",
            ErrorCode::DbDeleteFailed => "database delete failed",
            ErrorCode::ParamInvalid => "invalid parameters",
        }
    }

    /// Whether this is the success sentinel.
    pub const fn is_success(self) -> bool {
        matches!(self, ErrorCode::Success)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

/// The response body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T = serde_json::Value> {
    pub code: i32,
    pub message: String,
    #[serde(default = "none", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn none<T>() -> Option<T> {
    None
}

impl<T> Envelope<T> {
    /// Any code with its canonical message and a payload.
    pub fn with_data(code: ErrorCode, data: T) -> Self {
        Self {
            code: code.code(),
            message: code.message().to_string(),
            data: Some(data),
        }
    }

    /// Success with a payload and the default message.
    pub fn success(data: T) -> Self {
        Self {
            code: ErrorCode::Success.code(),
            message: ErrorCode::Success.message().to_string(),
            data: Some(data),
        }
    }

    /// Success with a payload and an overriding message.
    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Success.code(),
            message: message.into(),
            data: Some(data),
        }
    }

    /// Whether the envelope carries the success code.
    pub fn is_success(&self) -> bool {
        self.code == ErrorCode::Success.code()
    }
}

impl Envelope<()> {
    /// Success without a payload.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            code: ErrorCode::Success.code(),
            message: message.into(),
            data: None,
        }
    }

    /// Failure with the given code; `message` overrides the canonical text.
    pub fn failure(code: ErrorCode, message: Option<String>) -> Self {
        Self {
            code: code.code(),
            message: message.unwrap_or_else(|| code.message().to_string()),
            data: None,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    /// Render with an explicit transport status.
    ///
    /// Only health endpoints and the recovery stage use anything but 200.
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        self.with_status(StatusCode::OK)
    }
}
