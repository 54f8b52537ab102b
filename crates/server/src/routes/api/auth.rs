//! Credential auth handlers.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use super::JsonBody;
use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::services::auth::AuthService;
use crate::state::AppState;

/// Body of `POST /api/auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Body of `POST /api/auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `{user}` envelope shared by every auth response.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Option<CurrentUser>,
}

async fn sign_in(session: &Session, user: &User) -> Result<CurrentUser> {
    let current = CurrentUser::from(user);
    set_current_user(session, &current).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to set session");
        AppError::Internal(format!("session: {e}"))
    })?;
    Ok(current)
}

/// `POST /api/auth/register`
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = AuthService::new(state.store())
        .register(&body.email, &body.password, body.name)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Registration failed"))?;

    let current = sign_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: Some(current),
        }),
    ))
}

/// `POST /api/auth/login`
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let user = AuthService::new(state.store())
        .login(&body.email, &body.password)
        .await
        .inspect_err(|e| tracing::warn!(error = %e, "Login failed"))?;

    let current = sign_in(&session, &user).await?;
    tracing::info!(user_id = %user.id, "User signed in");

    Ok(Json(SessionResponse {
        user: Some(current),
    }))
}

/// `POST /api/auth/logout`
pub async fn logout(session: Session) -> Result<Json<SessionResponse>> {
    clear_current_user(&session).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to clear session");
        AppError::Internal(format!("session: {e}"))
    })?;

    Ok(Json(SessionResponse { user: None }))
}

/// `GET /api/auth/session`
pub async fn session(OptionalAuth(user): OptionalAuth) -> Json<SessionResponse> {
    Json(SessionResponse { user })
}
