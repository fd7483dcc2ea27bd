//! Profile and account-link endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use api::auth::TelegramAuthData;
use api::service::ProfileUpdate;
use api::{ProviderKind, UserInfo};

use crate::error::{ApiError, Result};
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OAuthLinkRequest {
    pub state: String,
    pub code: String,
}

pub async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<UserInfo>> {
    Ok(Json(state.auth.me(user.id).await?.to_info()))
}

pub async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(changes): Json<ProfileUpdate>,
) -> Result<Json<UserInfo>> {
    let updated = state.auth.update_profile(user.id, changes).await?;
    Ok(Json(updated.to_info()))
}

pub async fn link_github(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<OAuthLinkRequest>,
) -> Result<Json<UserInfo>> {
    let updated = state
        .auth
        .link_github(user.id, &request.state, &request.code)
        .await?;
    Ok(Json(updated.to_info()))
}

pub async fn link_google(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<OAuthLinkRequest>,
) -> Result<Json<UserInfo>> {
    let updated = state
        .auth
        .link_google(user.id, &request.state, &request.code)
        .await?;
    Ok(Json(updated.to_info()))
}

pub async fn link_telegram(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(data): Json<TelegramAuthData>,
) -> Result<Json<UserInfo>> {
    let updated = state.auth.link_telegram(user.id, data).await?;
    Ok(Json(updated.to_info()))
}

pub async fn unlink(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(provider): Path<String>,
) -> Result<Json<UserInfo>> {
    let kind = ProviderKind::parse(&provider)
        .filter(|k| *k != ProviderKind::Password)
        .ok_or_else(|| ApiError::bad_request("unknown provider"))?;
    let updated = state.auth.unlink(user.id, kind).await?;
    Ok(Json(updated.to_info()))
}
