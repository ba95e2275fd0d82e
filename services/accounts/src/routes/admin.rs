//! User administration endpoints

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiPath},
    gate::CurrentUser,
    models::{UserFilter, UserPayload},
};

/// Query string of the user listing
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub rol: Option<String>,
    pub activo: Option<String>,
}

impl ListParams {
    /// Blank values are ignored; `activo` only counts when it reads true or false
    pub fn into_filter(self) -> ApiResult<UserFilter> {
        let search = self.search.filter(|search| !search.is_empty());

        let role_id = match self.rol.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(rol) => Some(
                rol.parse::<i64>()
                    .map_err(|_| ApiError::bad_request("rol: must be a role id"))?,
            ),
        };

        let active = match self.activo.as_deref().map(str::to_lowercase).as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };

        Ok(UserFilter {
            search,
            role_id,
            active,
        })
    }
}

pub async fn list_users(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    Query(params): Query<ListParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    Ok(Json(state.admin.list(&actor, &filter).await?))
}

pub async fn create_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiJson(payload): ApiJson<UserPayload>,
) -> ApiResult<impl IntoResponse> {
    let user = state.admin.create(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.admin.retrieve(&actor, id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UserPayload>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.admin.update(&actor, id, payload).await?))
}

pub async fn partial_update_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UserPayload>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.admin.partial_update(&actor, id, payload).await?))
}

pub async fn delete_user(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    state.admin.delete(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_active(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.admin.toggle_active(&actor, id).await?))
}

pub async fn list_roles(
    State(state): State<AppState>,
    CurrentUser(actor): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.admin.list_roles(&actor).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(search: &str, rol: &str, activo: &str) -> ListParams {
        ListParams {
            search: Some(search.to_string()),
            rol: Some(rol.to_string()),
            activo: Some(activo.to_string()),
        }
    }

    #[test]
    fn test_blank_params_are_ignored() {
        let filter = params("", "", "").into_filter().unwrap();
        assert_eq!(filter, UserFilter::default());
    }

    #[test]
    fn test_activo_is_case_insensitive_and_lenient() {
        assert_eq!(params("", "", "TRUE").into_filter().unwrap().active, Some(true));
        assert_eq!(params("", "", "False").into_filter().unwrap().active, Some(false));
        assert_eq!(params("", "", "yes").into_filter().unwrap().active, None);
    }

    #[test]
    fn test_rol_must_be_numeric() {
        assert_eq!(params("bob", "2", "").into_filter().unwrap().role_id, Some(2));
        assert!(params("", "admin", "").into_filter().is_err());
    }
}
