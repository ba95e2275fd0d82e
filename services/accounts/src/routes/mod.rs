//! HTTP surface of the account service

use axum::{
    Json, Router,
    http::{HeaderValue, Method, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::{
    AppState,
    gate::{ADMIN_ONLY, AccessGate, STUDENT_OR_ADMIN, protect},
};

pub mod admin;
pub mod auth;
pub mod profile;

/// Create the router for the account service
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    let session_routes = protect(
        Router::new()
            .route("/auth/logout/", post(auth::logout))
            .route("/auth/me/", get(auth::me)),
        &state,
        AccessGate::authenticated(),
    );

    let admin_routes = protect(
        Router::new()
            .route(
                "/admin/usuarios/",
                get(admin::list_users).post(admin::create_user),
            )
            .route("/admin/usuarios/roles/", get(admin::list_roles))
            .route(
                "/admin/usuarios/:id/",
                get(admin::get_user)
                    .put(admin::update_user)
                    .patch(admin::partial_update_user)
                    .delete(admin::delete_user),
            )
            .route(
                "/admin/usuarios/:id/toggle-activo/",
                post(admin::toggle_active),
            ),
        &state,
        AccessGate::roles(ADMIN_ONLY),
    );

    let profile_routes = protect(
        Router::new().route(
            "/estudiantes/perfil/",
            get(profile::get_profile).patch(profile::update_profile),
        ),
        &state,
        AccessGate::roles(STUDENT_OR_ADMIN),
    );

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/login/", post(auth::login))
        .route("/auth/refresh/", post(auth::refresh))
        .merge(session_routes)
        .merge(admin_routes)
        .merge(profile_routes)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "accounts"
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            // Credentialed CORS cannot use a wildcard origin
            if origin.trim() == "*" {
                warn!("Ignoring wildcard CORS origin; list origins explicitly");
                return None;
            }

            match origin.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {}", origin);
                    None
                }
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::blacklist::MemoryBlacklist;
    use crate::jwt::{JwtConfig, TokenService};
    use crate::repositories::MemoryStore;

    fn router(origins: &[&str]) -> Router {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenService::new(
            JwtConfig::with_secret("routes-test-secret"),
            Arc::new(MemoryBlacklist::new()),
        )
        .unwrap();
        let origins: Vec<String> = origins.iter().map(|origin| origin.to_string()).collect();

        create_router(AppState::new(store.clone(), store, tokens), &origins)
    }

    #[tokio::test]
    async fn test_wildcard_origin_is_skipped() {
        let app = router(&["*", "http://localhost:5173"]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://localhost:5173")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("http://localhost:5173"))
        );
    }

    #[tokio::test]
    async fn test_unlisted_origin_gets_no_cors_headers() {
        let app = router(&["*"]);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "http://evil.test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }
}
