//! Authentication endpoints.

use axum::extract::{Query, State};
use axum::response::Redirect;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use api::auth::TelegramAuthData;
use api::service::RegisterRequest;
use api::AuthResult;

use crate::error::{ApiError, Result};
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Email or username.
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Log out of every device.
    #[serde(default)]
    pub all: bool,
}

/// OAuth callback query parameters.
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code: String,
}

/// One active session, as shown to its owner.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResult>> {
    Ok(Json(state.auth.register(request).await?))
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResult>> {
    let result = state
        .auth
        .login_password(&request.identifier, &request.password)
        .await?;
    Ok(Json(result))
}

pub async fn telegram(
    State(state): State<AppState>,
    Json(data): Json<TelegramAuthData>,
) -> Result<Json<AuthResult>> {
    Ok(Json(state.auth.login_telegram(data).await?))
}

pub async fn github_login(State(state): State<AppState>) -> Result<Redirect> {
    Ok(Redirect::temporary(&state.auth.github_authorize_url()?))
}

pub async fn github_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<AuthResult>> {
    let result = state
        .auth
        .github_callback(&params.state, &params.code)
        .await?;
    Ok(Json(result))
}

pub async fn google_login(State(state): State<AppState>) -> Result<Redirect> {
    Ok(Redirect::temporary(&state.auth.google_authorize_url()?))
}

pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<AuthResult>> {
    let result = state
        .auth
        .google_callback(&params.state, &params.code)
        .await?;
    Ok(Json(result))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<AuthResult>> {
    Ok(Json(state.auth.refresh(&request.refresh_token).await?))
}

pub async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<LogoutRequest>,
) -> Result<Json<serde_json::Value>> {
    if request.all {
        state.auth.logout_all(user.id).await?;
    } else {
        let token = request
            .refresh_token
            .as_deref()
            .ok_or_else(|| ApiError::bad_request("refresh_token or all=true required"))?;
        state.auth.logout(token).await?;
    }
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

pub async fn sessions(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<SessionInfo>>> {
    let sessions = state
        .auth
        .sessions(user.id)
        .await?
        .into_iter()
        .map(|s| SessionInfo {
            id: s.id,
            created_at: s.created_at,
            expires_at: s.expires_at,
        })
        .collect();
    Ok(Json(sessions))
}
