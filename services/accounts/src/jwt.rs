//! JWT service for token issuing, validation, rotation and revocation
//!
//! Access and refresh tokens share one claim shape: the user id, issue and
//! expiry timestamps, a token-type discriminator and a unique `jti`. Refresh
//! tokens are revoked by `jti` through a [`TokenBlacklist`]; rotation consumes
//! the presented refresh token with a single atomic revoke, so a given
//! refresh token can be rotated at most once.

use anyhow::Result;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::blacklist::TokenBlacklist;

/// Default access token lifetime: 30 minutes
pub const DEFAULT_ACCESS_TOKEN_EXPIRY: u64 = 1800;
/// Default refresh token lifetime: 7 days
pub const DEFAULT_REFRESH_TOKEN_EXPIRY: u64 = 604800;
/// Longest lifetime accepted from the environment: 10 years
pub const MAX_TOKEN_EXPIRY: u64 = 315_360_000;

/// Key material used to sign and verify tokens
#[derive(Debug, Clone)]
pub enum SigningKeys {
    /// Shared secret, HS256
    Secret(String),
    /// PEM key pair, RS256
    Rsa {
        private_key: String,
        public_key: String,
    },
}

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub keys: SigningKeys,
    /// Access token expiration time in seconds
    pub access_token_expiry: u64,
    /// Refresh token expiration time in seconds
    pub refresh_token_expiry: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_PRIVATE_KEY` / `JWT_PUBLIC_KEY`: PEM key pair (inline or path), selects RS256
    /// - `JWT_SECRET`: shared secret, used for HS256 when no key pair is set
    /// - `JWT_ACCESS_TOKEN_EXPIRY`: Access token expiry in seconds (default: 1800)
    /// - `JWT_REFRESH_TOKEN_EXPIRY`: Refresh token expiry in seconds (default: 604800)
    pub fn from_env() -> Result<Self> {
        let keys = match (
            std::env::var("JWT_PRIVATE_KEY"),
            std::env::var("JWT_PUBLIC_KEY"),
        ) {
            (Ok(private_key), Ok(public_key)) => SigningKeys::Rsa {
                private_key: read_pem(&private_key, "private")?,
                public_key: read_pem(&public_key, "public")?,
            },
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                anyhow::bail!("JWT_PRIVATE_KEY and JWT_PUBLIC_KEY must be set together")
            }
            (Err(_), Err(_)) => {
                let secret = std::env::var("JWT_SECRET").map_err(|_| {
                    anyhow::anyhow!("Neither JWT_SECRET nor a JWT key pair is configured")
                })?;
                if secret.is_empty() {
                    anyhow::bail!("JWT_SECRET must not be empty");
                }
                SigningKeys::Secret(secret)
            }
        };

        let access_token_expiry =
            expiry_from_env("JWT_ACCESS_TOKEN_EXPIRY", DEFAULT_ACCESS_TOKEN_EXPIRY);
        let refresh_token_expiry =
            expiry_from_env("JWT_REFRESH_TOKEN_EXPIRY", DEFAULT_REFRESH_TOKEN_EXPIRY);

        Ok(JwtConfig {
            keys,
            access_token_expiry,
            refresh_token_expiry,
        })
    }

    /// HS256 configuration with default lifetimes
    pub fn with_secret(secret: impl Into<String>) -> Self {
        JwtConfig {
            keys: SigningKeys::Secret(secret.into()),
            access_token_expiry: DEFAULT_ACCESS_TOKEN_EXPIRY,
            refresh_token_expiry: DEFAULT_REFRESH_TOKEN_EXPIRY,
        }
    }
}

/// Lifetime in seconds; unparsable values fall back to `default`, oversized
/// ones are capped at [`MAX_TOKEN_EXPIRY`]
fn expiry_from_env(name: &str, default: u64) -> u64 {
    let seconds = std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default);

    if seconds > MAX_TOKEN_EXPIRY {
        warn!(
            "{} of {}s exceeds the maximum, using {}s",
            name, seconds, MAX_TOKEN_EXPIRY
        );
        return MAX_TOKEN_EXPIRY;
    }

    seconds
}

/// Accept either inline PEM text or a path to a PEM file (CWD, then crate root)
fn read_pem(value: &str, kind: &str) -> Result<String> {
    if value.starts_with("-----BEGIN") {
        return Ok(value.to_string());
    }

    std::fs::read_to_string(value)
        .or_else(|_| {
            let mut path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push(value);
            std::fs::read_to_string(path)
        })
        .map(|pem| pem.trim().to_string())
        .map_err(|e| anyhow::anyhow!("Failed to read {} key file: {}", kind, e))
}

/// Token type discriminator
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub user_id: i64,
    pub iat: u64,
    pub exp: u64,
    pub jti: Uuid,
    pub token_type: TokenType,
}

/// Access/refresh token pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Why a token was rejected
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token is malformed or its signature is invalid")]
    Malformed,

    #[error("Token has been revoked")]
    Revoked,

    #[error("Token has the wrong type")]
    WrongType,

    /// Signing or revocation-list failure; never the caller's fault
    #[error("Token service failure: {0}")]
    Fatal(String),
}

/// JWT service
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    validation: Validation,
    access_token_expiry: u64,
    refresh_token_expiry: u64,
    blacklist: Arc<dyn TokenBlacklist>,
}

impl TokenService {
    /// Initialize a new token service. Fails on unusable key material.
    pub fn new(config: JwtConfig, blacklist: Arc<dyn TokenBlacklist>) -> Result<Self> {
        let (encoding_key, decoding_key, algorithm) = match &config.keys {
            SigningKeys::Secret(secret) => (
                EncodingKey::from_secret(secret.as_bytes()),
                DecodingKey::from_secret(secret.as_bytes()),
                Algorithm::HS256,
            ),
            SigningKeys::Rsa {
                private_key,
                public_key,
            } => (
                EncodingKey::from_rsa_pem(private_key.as_bytes())?,
                DecodingKey::from_rsa_pem(public_key.as_bytes())?,
                Algorithm::RS256,
            ),
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_exp = true;
        validation.leeway = 0;

        Ok(TokenService {
            encoding_key,
            decoding_key,
            algorithm,
            validation,
            access_token_expiry: config.access_token_expiry,
            refresh_token_expiry: config.refresh_token_expiry,
            blacklist,
        })
    }

    /// Mint a signed access/refresh pair for a user id
    pub fn issue(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.sign(user_id, TokenType::Access)?,
            refresh: self.sign(user_id, TokenType::Refresh)?,
        })
    }

    /// Check signature, expiry and type; refresh tokens are also checked
    /// against the revocation list.
    pub async fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = self.decode_typed(token, expected)?;

        if expected == TokenType::Refresh && self.is_revoked(&claims.jti).await? {
            return Err(TokenError::Revoked);
        }

        Ok(claims)
    }

    /// Consume a refresh token and mint a fresh pair for the same user.
    ///
    /// The revoke is the check: only the caller whose revoke inserted the
    /// `jti` proceeds, every concurrent or later attempt gets `Revoked`.
    pub async fn rotate(&self, refresh_token: &str) -> Result<TokenPair, TokenError> {
        let claims = self.decode_typed(refresh_token, TokenType::Refresh)?;

        if !self.revoke_claims(&claims).await? {
            warn!(
                "Rejected reuse of rotated refresh token for user {}",
                claims.user_id
            );
            return Err(TokenError::Revoked);
        }

        let pair = self.issue(claims.user_id)?;
        info!("Rotated refresh token for user {}", claims.user_id);
        Ok(pair)
    }

    /// Revoke a refresh token. Idempotent: returns `false` when it was
    /// already revoked.
    pub async fn revoke(&self, refresh_token: &str) -> Result<bool, TokenError> {
        let claims = self.decode_typed(refresh_token, TokenType::Refresh)?;
        self.revoke_claims(&claims).await
    }

    fn sign(&self, user_id: i64, token_type: TokenType) -> Result<String, TokenError> {
        let now = now_secs()?;
        let lifetime = match token_type {
            TokenType::Access => self.access_token_expiry,
            TokenType::Refresh => self.refresh_token_expiry,
        };

        let exp = now.checked_add(lifetime).ok_or_else(|| {
            error!("Token lifetime of {}s overflows the expiry timestamp", lifetime);
            TokenError::Fatal("token lifetime out of range".to_string())
        })?;

        let claims = Claims {
            user_id,
            iat: now,
            exp,
            jti: Uuid::new_v4(),
            token_type,
        };

        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(self.algorithm), claims, &self.encoding_key).map_err(|e| {
            error!("Failed to sign token: {}", e);
            TokenError::Fatal(e.to_string())
        })
    }

    fn decode_typed(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        if claims.token_type != expected {
            return Err(TokenError::WrongType);
        }

        Ok(claims)
    }

    async fn revoke_claims(&self, claims: &Claims) -> Result<bool, TokenError> {
        // Entries outlive the token, never the configured maximum
        let remaining = claims
            .exp
            .saturating_sub(now_secs()?)
            .clamp(1, MAX_TOKEN_EXPIRY);

        self.blacklist
            .revoke(&claims.jti, remaining)
            .await
            .map_err(|e| {
                error!("Failed to write revocation list: {}", e);
                TokenError::Fatal(e.to_string())
            })
    }

    async fn is_revoked(&self, jti: &Uuid) -> Result<bool, TokenError> {
        self.blacklist.is_revoked(jti).await.map_err(|e| {
            error!("Failed to read revocation list: {}", e);
            TokenError::Fatal(e.to_string())
        })
    }
}

fn now_secs() -> Result<u64, TokenError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .map_err(|e| TokenError::Fatal(format!("Failed to get current time: {}", e)))
}
