//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Responses are always JSON
//! `{success: false, error}`; server errors are captured to Sentry and show
//! a generic message instead of their cause.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::apify::ScrapeError;
use crate::services::auth::AuthError;
use crate::services::lists::ListError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// A store call failed. `context` is what the client sees.
    #[error("{context}: {source}")]
    Operation {
        context: &'static str,
        source: RepositoryError,
    },

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// The scraping actor failed.
    #[error("Scrape error: {0}")]
    Scrape(#[from] ScrapeError),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Missing user or not the owner.
    #[error("{0}")]
    Forbidden(String),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn is_server_error(&self) -> bool {
        match self {
            Self::Operation { .. } | Self::Scrape(_) | Self::Internal(_) => true,
            Self::Auth(err) => matches!(err, AuthError::Repository(_) | AuthError::PasswordHash),
            _ => false,
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Operation { .. } | Self::Scrape(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn client_message(&self) -> String {
        // Don't expose internal error details to clients
        match self {
            Self::Operation { context, .. } => (*context).to_string(),
            Self::Scrape(_) => "An unexpected error occurred during product search".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = json!({
            "success": false,
            "error": self.client_message(),
        });

        (self.status(), Json(body)).into_response()
    }
}

impl From<ListError> for AppError {
    fn from(err: ListError) -> Self {
        match err {
            ListError::EmailRequired | ListError::NameRequired | ListError::NoUpdateData => {
                Self::BadRequest(err.to_string())
            }
            ListError::UserNotFound | ListError::NotOwner => Self::Forbidden(err.to_string()),
            ListError::ListNotFound => Self::NotFound(err.to_string()),
            ListError::Repository(source) => Self::Operation {
                context: "Internal server error",
                source,
            },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        Self::BadRequest("Invalid request body".to_string())
    }
}

/// Attach the client-facing message for a failed store call.
pub trait Context<T> {
    /// # Errors
    ///
    /// Returns the mapped `AppError` if `self` is an error.
    fn context(self, context: &'static str) -> Result<T>;
}

impl<T> Context<T> for std::result::Result<T, RepositoryError> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|source| AppError::Operation { context, source })
    }
}

impl<T> Context<T> for std::result::Result<T, ListError> {
    fn context(self, context: &'static str) -> Result<T> {
        self.map_err(|err| match err {
            ListError::Repository(source) => AppError::Operation { context, source },
            other => other.into(),
        })
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
