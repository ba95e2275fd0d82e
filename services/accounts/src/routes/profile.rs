//! Student self-service profile endpoints

use axum::{Json, extract::State, response::IntoResponse};

use crate::{
    AppState, error::ApiResult, extract::ApiJson, gate::CurrentUser, models::ProfileUpdate,
};

pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> impl IntoResponse {
    Json(state.profile.view(&user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.profile.update(&user, update).await?))
}
