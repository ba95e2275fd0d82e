//! Authentication flow: login, logout, refresh and "who am I"

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::error::{ApiError, ApiResult};
use crate::jwt::{TokenError, TokenPair, TokenService, TokenType};
use crate::models::{User, UserView};
use crate::password::verify_password;
use crate::repositories::UserRepository;

/// Successful login body
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub access: String,
    pub refresh: String,
    pub user: UserView,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    /// Authenticate with a username or an email address.
    ///
    /// The identifier is tried as a username first; if that does not
    /// authenticate, the account holding that email is tried instead.
    pub async fn login(&self, identifier: &str, password: &str) -> ApiResult<LoginResponse> {
        if identifier.is_empty() || password.is_empty() {
            return Err(ApiError::bad_request(
                "Both username_email and password are required",
            ));
        }

        let mut user = check_password(self.users.find_by_username(identifier).await?, password);

        if user.is_none() {
            user = check_password(self.users.find_by_email(identifier).await?, password);
        }

        let Some(mut user) = user else {
            warn!("Failed login attempt for {}", identifier);
            return Err(ApiError::unauthenticated(
                "Invalid credentials. Check your username/email and password.",
            ));
        };

        if !user.is_active {
            warn!("Login refused for inactive user {}", user.username);
            return Err(ApiError::unauthenticated("User account is inactive"));
        }

        let pair = self.tokens.issue(user.id)?;

        let now = Utc::now();
        self.users.record_login(user.id, now).await?;
        user.last_login = Some(now);

        info!(
            "Login successful: {} ({})",
            user.username,
            user.role_name().unwrap_or("no role")
        );

        Ok(LoginResponse {
            access: pair.access,
            refresh: pair.refresh,
            user: UserView::from(user),
        })
    }

    /// Revoke the caller's refresh token.
    ///
    /// Revoking an already revoked token still succeeds; any other failure
    /// is reported as a bad request.
    pub async fn logout(&self, actor: &User, refresh: Option<&str>) -> ApiResult<()> {
        let Some(refresh) = refresh.filter(|token| !token.is_empty()) else {
            return Err(ApiError::bad_request("Refresh token is required"));
        };

        match self.tokens.revoke(refresh).await {
            Ok(_) => {
                info!("Logout successful: {}", actor.username);
                Ok(())
            }
            Err(e) => {
                error!("Logout failed for {}: {}", actor.username, e);
                Err(ApiError::bad_request("Failed to log out"))
            }
        }
    }

    /// Public projection of the caller's own record
    pub fn me(&self, actor: &User) -> UserView {
        UserView::from(actor)
    }

    /// Rotate a refresh token into a fresh pair
    pub async fn refresh(&self, refresh: Option<&str>) -> ApiResult<TokenPair> {
        let Some(refresh) = refresh.filter(|token| !token.is_empty()) else {
            return Err(ApiError::bad_request("Refresh token is required"));
        };

        let claims = self.tokens.verify(refresh, TokenType::Refresh).await?;

        match self.users.find_by_id(claims.user_id).await? {
            Some(user) if user.is_active => {}
            _ => {
                warn!(
                    "Refresh refused for missing or inactive user {}",
                    claims.user_id
                );
                return Err(ApiError::unauthenticated("User not found or inactive"));
            }
        }

        Ok(self.tokens.rotate(refresh).await?)
    }

    /// Resolve a bearer access token to an active user.
    ///
    /// `None` covers every reason a caller counts as unauthenticated;
    /// only infrastructure failures are errors.
    pub async fn authenticate(&self, access_token: &str) -> ApiResult<Option<User>> {
        let claims = match self.tokens.verify(access_token, TokenType::Access).await {
            Ok(claims) => claims,
            Err(TokenError::Fatal(e)) => {
                error!("Access token verification failed: {}", e);
                return Err(ApiError::InternalServerError);
            }
            Err(e) => {
                debug!("Rejected access token: {}", e);
                return Ok(None);
            }
        };

        let user = self.users.find_by_id(claims.user_id).await?;
        Ok(user.filter(|user| user.is_active))
    }
}

fn check_password(candidate: Option<User>, password: &str) -> Option<User> {
    let user = candidate?;
    let hash = user.password_hash.as_deref()?;

    match verify_password(password, hash) {
        Ok(true) => Some(user),
        Ok(false) => None,
        Err(e) => {
            error!("Stored password hash for {} is unusable: {}", user.username, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blacklist::MemoryBlacklist;
    use crate::jwt::JwtConfig;
    use crate::models::{NewUser, RoleName};
    use crate::password::hash_password;
    use crate::repositories::{MemoryStore, RoleRepository};

    async fn setup() -> (AuthService, MemoryStore) {
        let store = MemoryStore::new();
        let role = store
            .create_role(RoleName::Estudiante.new_role())
            .await
            .unwrap();

        for (username, email, active) in [
            ("bob", "bob@test.com", true),
            ("carol", "carol@test.com", false),
        ] {
            store
                .create(NewUser {
                    username: username.to_string(),
                    email: email.to_string(),
                    password_hash: Some(hash_password("x").unwrap()),
                    first_name: String::new(),
                    last_name: String::new(),
                    phone: None,
                    birth_date: None,
                    contract_date: None,
                    is_active: active,
                    is_superuser: false,
                    role_id: Some(role.id),
                })
                .await
                .unwrap();
        }

        let tokens = TokenService::new(
            JwtConfig::with_secret("test-secret"),
            Arc::new(MemoryBlacklist::new()),
        )
        .unwrap();

        (AuthService::new(Arc::new(store.clone()), tokens), store)
    }

    #[tokio::test]
    async fn test_login_by_username_and_email() {
        let (auth, _) = setup().await;

        let by_username = auth.login("bob", "x").await.unwrap();
        assert_eq!(by_username.user.username, "bob");
        assert!(by_username.user.last_login.is_some());

        let by_email = auth.login("bob@test.com", "x").await.unwrap();
        assert_eq!(by_email.user.username, "bob");

        let caller = auth.authenticate(&by_email.access).await.unwrap().unwrap();
        assert_eq!(caller.username, "bob");
    }

    #[tokio::test]
    async fn test_login_failures() {
        let (auth, _) = setup().await;

        assert!(matches!(
            auth.login("bob", "wrong").await,
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            auth.login("nobody", "x").await,
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            auth.login("carol", "x").await,
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(matches!(
            auth.login("", "x").await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_rotates_once() {
        let (auth, _) = setup().await;
        let login = auth.login("bob", "x").await.unwrap();

        let pair = auth.refresh(Some(&login.refresh)).await.unwrap();
        assert_ne!(pair.refresh, login.refresh);

        assert!(matches!(
            auth.refresh(Some(&login.refresh)).await,
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(auth.refresh(Some(&pair.refresh)).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_refused_after_deactivation() {
        let (auth, store) = setup().await;
        let login = auth.login("bob", "x").await.unwrap();

        let mut bob = store.find_by_username("bob").await.unwrap().unwrap();
        bob.is_active = false;
        store.update(&bob).await.unwrap();

        assert!(matches!(
            auth.refresh(Some(&login.refresh)).await,
            Err(ApiError::Unauthenticated(_))
        ));
        assert!(auth.authenticate(&login.access).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_revokes_refresh_token() {
        let (auth, store) = setup().await;
        let login = auth.login("bob", "x").await.unwrap();
        let bob = store.find_by_username("bob").await.unwrap().unwrap();

        assert!(matches!(
            auth.logout(&bob, None).await,
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            auth.logout(&bob, Some("garbage")).await,
            Err(ApiError::BadRequest(_))
        ));

        auth.logout(&bob, Some(&login.refresh)).await.unwrap();
        auth.logout(&bob, Some(&login.refresh)).await.unwrap();

        assert!(auth.refresh(Some(&login.refresh)).await.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_refresh_tokens() {
        let (auth, _) = setup().await;
        let login = auth.login("bob", "x").await.unwrap();

        assert!(auth.authenticate(&login.refresh).await.unwrap().is_none());
        assert!(auth.authenticate("not-a-token").await.unwrap().is_none());
    }
}
