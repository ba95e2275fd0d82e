//! Access control gate
//!
//! Every protected route is wrapped in an [`AccessGate`] that runs, in order:
//!
//! 1. authentication: a valid bearer access token for an active user, else 401
//! 2. role presence (role-gated routes only): no role assigned, else 403
//! 3. role membership: the caller's role is one of the allowed roles, else 403
//!    with the required roles and the caller's role in the body
//!
//! The authenticated user is then attached to the request as [`CurrentUser`].

use async_trait::async_trait;
use axum::{
    Router,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::models::{RoleName, User};
use crate::state::AppState;

pub const ADMIN_ONLY: &[RoleName] = &[RoleName::Admin];
pub const STUDENT_OR_ADMIN: &[RoleName] = &[RoleName::Estudiante, RoleName::Admin];

/// What a route demands of its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// Any authenticated user
    Authenticated,
    /// An authenticated user whose role is in the set
    Roles(&'static [RoleName]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessGate {
    requirement: Requirement,
}

impl AccessGate {
    pub const fn authenticated() -> Self {
        Self {
            requirement: Requirement::Authenticated,
        }
    }

    pub const fn roles(allowed: &'static [RoleName]) -> Self {
        Self {
            requirement: Requirement::Roles(allowed),
        }
    }

    /// Decide whether `caller` may reach `resource`. Short-circuits at the
    /// first failure.
    pub fn authorize(&self, caller: Option<&User>, resource: &str) -> ApiResult<()> {
        let Some(user) = caller else {
            warn!("Access denied to {}: unauthenticated", resource);
            return Err(ApiError::unauthenticated(
                "You must be logged in to access this resource",
            ));
        };

        let Requirement::Roles(allowed) = self.requirement else {
            return Ok(());
        };

        let Some(role_name) = user.role_name() else {
            warn!(
                "Access denied to {}: user {} has no role assigned",
                resource, user.username
            );
            return Err(ApiError::forbidden(
                "User has no role assigned. Contact the administrator.",
            ));
        };

        if !allowed.iter().any(|allowed| allowed.matches(role_name)) {
            let required_roles: Vec<String> =
                allowed.iter().map(|role| role.as_str().to_string()).collect();

            warn!(
                "Access denied to {}: user {} with role {} requires one of {:?}",
                resource, user.username, role_name, required_roles
            );
            return Err(ApiError::Forbidden {
                message: "You do not have sufficient permissions to access this resource"
                    .to_string(),
                required_roles: Some(required_roles),
                user_role: Some(role_name.to_string()),
            });
        }

        Ok(())
    }
}

/// The caller that passed the gate
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthenticated("Authentication required"))
    }
}

#[derive(Clone)]
struct GateState {
    app: AppState,
    gate: AccessGate,
}

async fn access_gate(
    State(GateState { app, gate }): State<GateState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = match bearer {
        Some(TypedHeader(Authorization(bearer))) => app.auth.authenticate(bearer.token()).await?,
        None => None,
    };

    gate.authorize(caller.as_ref(), &attempted_resource(&req))?;

    if let Some(user) = caller {
        req.extensions_mut().insert(CurrentUser(user));
    }

    Ok(next.run(req).await)
}

/// Method and path of the request, as named in denial logs
fn attempted_resource(req: &Request) -> String {
    format!("{} {}", req.method(), req.uri().path())
}

/// Put every route of `router` behind `gate`
pub fn protect(router: Router<AppState>, state: &AppState, gate: AccessGate) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(
        GateState {
            app: state.clone(),
            gate,
        },
        access_gate,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use axum::http::StatusCode;
    use chrono::Utc;

    fn user_with_role(role: Option<&str>) -> User {
        User {
            id: 3,
            username: "empresa1".to_string(),
            email: String::new(),
            password_hash: None,
            first_name: String::new(),
            last_name: String::new(),
            phone: None,
            birth_date: None,
            contract_date: None,
            is_active: true,
            is_superuser: false,
            role: role.map(|name| Role {
                id: 1,
                name: name.to_string(),
                description: None,
            }),
            date_joined: Utc::now(),
            last_login: None,
        }
    }

    const ADMIN_GATE: AccessGate = AccessGate::roles(ADMIN_ONLY);
    const RESOURCE: &str = "GET /admin/usuarios/";

    #[test]
    fn test_unauthenticated_is_401() {
        let err = ADMIN_GATE.authorize(None, RESOURCE).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err = AccessGate::authenticated().authorize(None, RESOURCE).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_missing_role_is_plain_403() {
        let user = user_with_role(None);
        let err = ADMIN_GATE.authorize(Some(&user), RESOURCE).unwrap_err();

        assert!(matches!(
            err,
            ApiError::Forbidden {
                required_roles: None,
                ..
            }
        ));
    }

    #[test]
    fn test_role_mismatch_discloses_roles() {
        let user = user_with_role(Some("Empresa"));
        let err = ADMIN_GATE.authorize(Some(&user), RESOURCE).unwrap_err();

        match err {
            ApiError::Forbidden {
                required_roles,
                user_role,
                ..
            } => {
                assert_eq!(required_roles, Some(vec!["Admin".to_string()]));
                assert_eq!(user_role.as_deref(), Some("Empresa"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_allowed_roles_pass() {
        let gate = AccessGate::roles(STUDENT_OR_ADMIN);

        assert!(
            gate.authorize(Some(&user_with_role(Some("Estudiante"))), RESOURCE)
                .is_ok()
        );
        assert!(
            gate.authorize(Some(&user_with_role(Some("Admin"))), RESOURCE)
                .is_ok()
        );
        assert!(
            gate.authorize(Some(&user_with_role(Some("Empresa"))), RESOURCE)
                .is_err()
        );
    }

    #[test]
    fn test_authenticated_requirement_ignores_role() {
        let gate = AccessGate::authenticated();
        assert!(gate.authorize(Some(&user_with_role(None)), RESOURCE).is_ok());
    }

    #[test]
    fn test_denial_is_repeatable() {
        let user = user_with_role(Some("Estudiante"));
        for _ in 0..3 {
            let err = ADMIN_GATE.authorize(Some(&user), RESOURCE).unwrap_err();
            assert_eq!(err.status(), StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn test_attempted_resource_names_method_and_path() {
        let req = axum::http::Request::builder()
            .method("DELETE")
            .uri("/admin/usuarios/7/?force=1")
            .body(axum::body::Body::empty())
            .unwrap();

        assert_eq!(attempted_resource(&req), "DELETE /admin/usuarios/7/");
    }
}
