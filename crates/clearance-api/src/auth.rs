//! Passwords, bearer tokens and the authentication extractors
//!
//! Tokens are 32 random bytes, URL-safe base64 encoded. Only the SHA-256 of
//! a token is stored. Session tokens expire, API tokens do not.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, Rng, RngCore};
use sha2::{Digest, Sha256};
use tracing::debug;

use clearance_domain::entities::{AccessToken, Actor, Role, TokenKind, User};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Length of generated passwords
pub const GENERATED_PASSWORD_LENGTH: usize = 20;

pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ApiError::Internal(format!("password hashing failed: {}", e)))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

pub fn check_password_length(password: &str, min_length: usize) -> ApiResult<()> {
    if password.chars().count() < min_length {
        return Err(ApiError::validation(
            "password",
            format!("password must be at least {} characters", min_length),
        ));
    }
    Ok(())
}

pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Create and store a new token for `user_id`; returns the raw token
pub async fn issue_token(
    state: &AppState,
    user_id: i64,
    kind: TokenKind,
) -> ApiResult<String> {
    let token = generate_token();
    let now = Utc::now();
    let expires_at = match kind {
        TokenKind::Session => {
            Some(now + Duration::hours(state.config.auth.session_ttl_hours as i64))
        }
        TokenKind::Api => None,
    };
    state
        .repos
        .tokens
        .insert(AccessToken {
            token_hash: hash_token(&token),
            user_id,
            kind,
            created_at: now,
            expires_at,
        })
        .await?;
    Ok(token)
}

/// Raw credential of an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Compare two secrets without short-circuiting on the first difference
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let a = Sha256::digest(a);
    let b = Sha256::digest(b);
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// A request made with a valid user token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token_hash: String,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::new(self.user.id, self.user.role)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        authenticate(state, token).await
    }
}

async fn authenticate(state: &AppState, token: &str) -> ApiResult<AuthUser> {
    let token_hash = hash_token(token);
    let invalid = || ApiError::Forbidden("Invalid token".to_string());

    let stored = state.repos.tokens.find(&token_hash).await?.ok_or_else(invalid)?;
    if stored.is_expired(Utc::now()) {
        state.repos.tokens.revoke(&token_hash).await?;
        debug!(user_id = stored.user_id, "Rejected expired token");
        return Err(ApiError::Forbidden("Token expired".to_string()));
    }
    let user = state
        .repos
        .users
        .find_by_id(stored.user_id)
        .await?
        .ok_or_else(invalid)?;

    Ok(AuthUser { user, token_hash })
}

/// A request made by an `ADMIN` user
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> ApiResult<Self> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.user.role != Role::Admin {
            return Err(ApiError::Forbidden("Admin role required".to_string()));
        }
        Ok(AdminUser(user))
    }
}

/// State that knows the shared scanner-agent token
pub trait AgentTokenSource {
    fn agent_token(&self) -> &str;
}

/// A request made with the scanner-agent token
#[derive(Debug, Clone, Copy)]
pub struct ScannerAgentAuth;

impl<S> FromRequestParts<S> for ScannerAgentAuth
where
    S: AgentTokenSource + Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> ApiResult<Self> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?;
        if !constant_time_eq(token.as_bytes(), state.agent_token().as_bytes()) {
            return Err(ApiError::Forbidden("Invalid scanner agent token".to_string()));
        }
        Ok(ScannerAgentAuth)
    }
}
