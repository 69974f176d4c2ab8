//! Application error types.

use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::response::{Envelope, ErrorCode};
use crate::services::token::TokenError;

/// Application errors.
///
/// Every variant carries its taxonomy code explicitly; callers never have to
/// inspect an error's concrete type to learn which code it maps to.
#[derive(Debug, Error)]
pub enum AppError {
    /// A domain failure with an optional message override.
    #[error("{}", .message.as_deref().unwrap_or(.code.message()))]
    Domain {
        code: ErrorCode,
        message: Option<String>,
    },

    /// A persistence failure, wrapped at the service boundary.
    #[error("{}", .code.message())]
    Store {
        code: ErrorCode,
        #[source]
        source: anyhow::Error,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Domain error with the canonical message.
    pub fn new(code: ErrorCode) -> Self {
        AppError::Domain {
            code,
            message: None,
        }
    }

    /// Domain error with an overriding message.
    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Domain {
            code,
            message: Some(message.into()),
        }
    }

    /// Shorthand for `ParamInvalid` with a reason.
    pub fn param(message: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::ParamInvalid, message)
    }

    /// Wrap a persistence error under a database code.
    pub fn store(code: ErrorCode, source: anyhow::Error) -> Self {
        AppError::Store { code, source }
    }

    /// The taxonomy code this error renders as.
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Domain { code, .. } | AppError::Store { code, .. } => *code,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AppError::new(ErrorCode::TokenExpired),
            TokenError::Invalid(_) => AppError::new(ErrorCode::TokenInvalid),
            TokenError::Signing(e) => AppError::store(ErrorCode::TokenGenFailed, e.into()),
        }
    }
}

/// Non-fatal error text attached to a response for the request logger.
#[derive(Debug, Clone)]
pub struct RecordedError(pub String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();

        // Underlying causes are logged, never sent to the client.
        let (message, detail) = match &self {
            AppError::Domain { message, .. } => (message.clone(), self.to_string()),
            AppError::Store { source, .. } => {
                tracing::error!(code = code.code(), error = %format!("{source:#}"), "store error");
                (None, format!("{self}: {source:#}"))
            }
            AppError::Internal(e) => {
                tracing::error!(error = %format!("{e:#}"), "internal server error");
                (None, format!("{e:#}"))
            }
        };

        let mut response = Envelope::failure(code, message).into_response();
        response.extensions_mut().insert(RecordedError(detail));
        response
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;
