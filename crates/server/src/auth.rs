// crates/server/src/auth.rs
//! Session core: token mint/verify, server-side session rows, and the
//! request extractors that gate protected routes.
//!
//! Tokens are HS256 JWTs, but validation is not purely stateless: a session
//! row keyed by the hex SHA-256 of the token must also be live. That server
//! side hash is what lets logout and admin invalidation take effect before
//! the token's natural expiry. Raw tokens are never persisted or logged.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::{DateTime, Duration, Utc};
use finone_core::config::JwtConfig;
use finone_core::{Role, SessionRecord, User};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Cost used for every password hash written by this service. The admin
/// surface rejects anything weaker on password changes.
pub const BCRYPT_COST: u32 = 12;
pub const MIN_BCRYPT_COST: u32 = 10;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// Token minting and verification, plus the digest used for session rows.
#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry: Duration,
}

impl AuthService {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            expiry: Duration::hours(config.expiry_hours),
        }
    }

    /// Mint a token for a user. Returns the token and its expiry instant.
    pub fn mint(&self, user: &User) -> Result<(String, DateTime<Utc>), ApiError> {
        let now = Utc::now();
        let expires_at = now + self.expiry;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.as_db_str().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| ApiError::UpstreamFailure(format!("token encoding: {e}")))?;
        Ok((token, expires_at))
    }

    /// Verify signature and expiry. Every failure collapses to
    /// InvalidSession; callers never learn which check tripped.
    pub fn verify(&self, token: &str) -> Result<Claims, ApiError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::InvalidSession)
    }

    /// Hex SHA-256 digest of a token; the only token-derived value that
    /// ever reaches the operational store.
    pub fn token_hash(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Fresh session row for a just-minted token.
    pub fn new_session(
        user: &User,
        token: &str,
        expires_at: DateTime<Utc>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            user_id: user.id,
            token_hash: Self::token_hash(token),
            created_at: Utc::now(),
            expires_at,
            is_active: true,
            ip_address,
            user_agent,
            logged_out_at: None,
        }
    }
}

/// The authenticated caller, resolved from the bearer token and the live
/// session row behind it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Uuid,
    /// Kept so logout can target the exact session without re-reading the
    /// Authorization header.
    pub token_hash: String,
}

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::InvalidSession)
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        state.authenticate(token).await
    }
}

/// Extractor for admin-only routes: a [`CurrentUser`] whose role is ADMIN.
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if current.user.role != Role::Admin {
            return Err(ApiError::Forbidden("admin role required".into()));
        }
        Ok(AdminUser(current))
    }
}

impl AppState {
    /// Full validation pipeline: token signature + expiry, live session row
    /// by hash, then the user checks (active; DEMO unexpired).
    pub async fn authenticate(&self, token: &str) -> Result<CurrentUser, ApiError> {
        let claims = self.auth.verify(token)?;
        let token_hash = AuthService::token_hash(token);
        let now = Utc::now();

        let session = self
            .db
            .find_live_session(&token_hash, now)
            .await?
            .ok_or(ApiError::InvalidSession)?;

        // Claims and session must agree; a mismatch means a forged or
        // recycled token.
        if session.user_id != claims.sub {
            return Err(ApiError::InvalidSession);
        }

        let user = self
            .db
            .get_user(session.user_id)
            .await?
            .ok_or(ApiError::InvalidSession)?;
        if !user.is_active || user.is_expired(now) {
            return Err(ApiError::InvalidSession);
        }

        Ok(CurrentUser {
            user,
            session_id: session.id,
            token_hash,
        })
    }
}

/// Hash a password on the blocking pool; bcrypt at cost 12 takes hundreds of
/// milliseconds and must not stall the runtime.
pub async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, BCRYPT_COST))
        .await
        .map_err(|e| ApiError::UpstreamFailure(format!("hash task: {e}")))?
        .map_err(|e| ApiError::UpstreamFailure(format!("bcrypt: {e}")))
}

/// Constant-time password check on the blocking pool. A malformed stored
/// hash counts as a mismatch.
pub async fn verify_password(password: String, hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| ApiError::UpstreamFailure(format!("verify task: {e}")))
        .map(|result| result.unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finone_core::UserType;

    fn test_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".into(),
            email: "test@example.com".into(),
            password_hash: String::new(),
            user_type: UserType::Permanent,
            role: Role::User,
            expires_at: None,
            is_active: true,
            max_searches_per_day: 500,
            max_exports_per_day: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(secret: &str) -> AuthService {
        AuthService::new(&JwtConfig {
            secret: secret.into(),
            expiry_hours: 24,
        })
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let auth = service("secret-a");
        let user = test_user();
        let (token, expires_at) = auth.mint(&user).unwrap();

        let claims = auth.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.email, user.email);
        assert_eq!(claims.role, "USER");
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn wrong_secret_is_invalid_session() {
        let user = test_user();
        let (token, _) = service("secret-a").mint(&user).unwrap();
        assert!(matches!(
            service("secret-b").verify(&token),
            Err(ApiError::InvalidSession)
        ));
    }

    #[test]
    fn garbage_token_is_invalid_session() {
        assert!(matches!(
            service("secret-a").verify("not.a.jwt"),
            Err(ApiError::InvalidSession)
        ));
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hash = AuthService::token_hash("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        // Distinct tokens, distinct hashes.
        assert_ne!(AuthService::token_hash("abc"), AuthService::token_hash("abd"));
    }

    #[test]
    fn new_session_carries_hash_not_token() {
        let auth = service("secret-a");
        let user = test_user();
        let (token, expires_at) = auth.mint(&user).unwrap();
        let session = AuthService::new_session(&user, &token, expires_at, None, None);
        assert_ne!(session.token_hash, token);
        assert_eq!(session.token_hash, AuthService::token_hash(&token));
        assert!(session.is_active);
        assert!(session.logged_out_at.is_none());
    }

    #[tokio::test]
    async fn password_round_trip() {
        // MIN_BCRYPT_COST for test speed; production hashing uses BCRYPT_COST.
        let hash = tokio::task::spawn_blocking(|| bcrypt::hash("hunter2", MIN_BCRYPT_COST))
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("hunter2".into(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter3".into(), hash).await.unwrap());
        // Malformed stored hash: mismatch, not error.
        assert!(!verify_password("x".into(), "not-a-hash".into()).await.unwrap());
    }

    #[test]
    fn configured_cost_meets_policy() {
        assert!(BCRYPT_COST >= MIN_BCRYPT_COST);
    }
}
