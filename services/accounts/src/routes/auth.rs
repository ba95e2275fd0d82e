//! Authentication endpoints

use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;

use crate::{AppState, error::ApiResult, extract::ApiJson, gate::CurrentUser};

/// Request for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "username")]
    pub username_email: String,
    #[serde(default)]
    pub password: String,
}

/// Request carrying a refresh token
#[derive(Debug, Default, Deserialize)]
pub struct RefreshRequest {
    pub refresh: Option<String>,
}

/// User login endpoint
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let response = state
        .auth
        .login(payload.username_email.trim(), &payload.password)
        .await?;

    Ok(Json(response))
}

/// Logout endpoint. A missing or unreadable body counts as no token.
pub async fn logout(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    payload: Option<ApiJson<RefreshRequest>>,
) -> ApiResult<impl IntoResponse> {
    let payload = payload.map(|ApiJson(payload)| payload).unwrap_or_default();
    state.auth.logout(&user, payload.refresh.as_deref()).await?;

    Ok(Json(json!({ "message": "Logged out successfully" })))
}

/// Refresh token endpoint
pub async fn refresh(
    State(state): State<AppState>,
    payload: Option<ApiJson<RefreshRequest>>,
) -> ApiResult<impl IntoResponse> {
    let payload = payload.map(|ApiJson(payload)| payload).unwrap_or_default();
    let pair = state.auth.refresh(payload.refresh.as_deref()).await?;

    Ok(Json(pair))
}

/// Current user endpoint
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    Json(state.auth.me(&user))
}
