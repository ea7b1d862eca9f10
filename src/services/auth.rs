//! Authentication and the authorization policy.
//!
//! Token verification is stateless (signature + expiry); there is no
//! revocation list. Deactivating an account takes effect on the next request
//! because [`authenticate`] re-checks `is_active` against the database.
//!
//! Authorization is one pure function, [`authorize`], invoked at the top of
//! every gated handler rather than scattered per-route.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::warn;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::db::repository::{FullRepository, RepositoryError, RepositoryResult};
use crate::models::user::{NewUser, Role, User};

/// Fallback secret for local development only.
const DEV_SECRET: &str = "sams-dev-secret";

/// Errors from the authentication/authorization layer.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing, malformed, expired, or otherwise unverifiable credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),
    /// Valid credentials lacking a required role.
    #[error("Not authorized: requires one of {0:?}")]
    Authorization(Vec<Role>),
    /// Underlying persistence failure while resolving the user.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Token signing configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HMAC secret for HS256 signing.
    pub secret: String,
    /// Token lifetime in minutes.
    pub token_ttl_min: i64,
}

impl AuthConfig {
    /// Read configuration from `AUTH_SECRET` and `AUTH_TOKEN_TTL_MIN`.
    ///
    /// Falls back to a development secret (with a warning) when unset.
    pub fn from_env() -> Self {
        let secret = match std::env::var("AUTH_SECRET") {
            Ok(s) if !s.is_empty() => s,
            _ => {
                warn!("AUTH_SECRET not set; using the development secret");
                DEV_SECRET.to_string()
            }
        };
        let token_ttl_min = std::env::var("AUTH_TOKEN_TTL_MIN")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);
        Self {
            secret,
            token_ttl_min,
        }
    }

    /// Fixed configuration, for tests.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl_min: 60,
        }
    }
}

/// JWT claims carried by an issued token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the acting user.
    pub sub: String,
    /// Role at issuance time. Transport only; authorization re-reads the
    /// database row.
    pub role: Role,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

/// SHA-256 hex digest of a password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn verify_password(password: &str, digest: &str) -> bool {
    hash_password(password) == digest
}

/// Sign a token for a user.
pub fn issue_token(config: &AuthConfig, user: &User) -> Result<String, AuthError> {
    let exp = (Utc::now() + Duration::minutes(config.token_ttl_min)).timestamp();
    let claims = Claims {
        sub: user.username.clone(),
        role: user.role,
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AuthError::Authentication(format!("Failed to sign token: {}", e)))
}

/// Verify a token's signature and expiry, returning its claims.
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::Authentication("Invalid or expired token".to_string()))
}

/// Verify a username/password pair and issue a token.
///
/// # Errors
/// * `Authentication` - unknown user, wrong password, or deactivated account
pub async fn login<R: FullRepository + ?Sized>(
    repo: &R,
    config: &AuthConfig,
    username: &str,
    password: &str,
) -> Result<String, AuthError> {
    let user = repo
        .find_user_by_username(username)
        .await?
        .ok_or_else(|| AuthError::Authentication("Invalid username or password".to_string()))?;

    if !verify_password(password, &user.password_digest) {
        return Err(AuthError::Authentication(
            "Invalid username or password".to_string(),
        ));
    }
    if !user.is_active {
        return Err(AuthError::Authentication(
            "Account is deactivated".to_string(),
        ));
    }

    issue_token(config, &user)
}

/// Resolve a bearer token to its acting user.
///
/// Re-checks `is_active` against the database, so a deactivated account is
/// rejected even while its token is still unexpired.
pub async fn authenticate<R: FullRepository + ?Sized>(
    repo: &R,
    config: &AuthConfig,
    token: &str,
) -> Result<User, AuthError> {
    let claims = verify_token(config, token)?;
    let user = repo
        .find_user_by_username(&claims.sub)
        .await?
        .ok_or_else(|| AuthError::Authentication("Unknown token subject".to_string()))?;
    if !user.is_active {
        return Err(AuthError::Authentication(
            "Account is deactivated".to_string(),
        ));
    }
    Ok(user)
}

/// The authorization policy: the acting user's role must be in the required
/// set. Pure; no I/O.
pub fn authorize(user: &User, required: &[Role]) -> Result<(), AuthError> {
    if required.contains(&user.role) {
        Ok(())
    } else {
        Err(AuthError::Authorization(required.to_vec()))
    }
}

/// Create a staff user account.
///
/// # Errors
/// * `Validation` - empty username or too-short password
/// * `Conflict` - username already taken
pub async fn create_user<R: FullRepository + ?Sized>(
    repo: &R,
    username: &str,
    password: &str,
    role: Role,
) -> RepositoryResult<User> {
    if username.trim().is_empty() {
        return Err(RepositoryError::validation("Username is required"));
    }
    if password.len() < 8 {
        return Err(RepositoryError::validation(
            "Password must be at least 8 characters",
        ));
    }
    repo.insert_user(NewUser {
        username: username.to_string(),
        password_digest: hash_password(password),
        role,
    })
    .await
}

/// Activate or deactivate an account.
///
/// Takes effect on the target's next request; tokens already issued are not
/// revoked.
pub async fn set_user_active<R: FullRepository + ?Sized>(
    repo: &R,
    user_id: crate::api::UserId,
    active: bool,
) -> RepositoryResult<User> {
    let user = repo.set_user_active(user_id, active).await?;
    warn!(
        "User {} ({}) {}",
        user_id,
        user.username,
        if active { "activated" } else { "deactivated" }
    );
    Ok(user)
}
