//! Request authentication.
//!
//! `AuthContext` is built once at startup from the auth provider's signing
//! secret and lives in `AppState`. Handlers receive an [`AuthUser`] through
//! the extractor below. Logging out revokes the presented token until it
//! would have expired anyway.

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("token subject is not a user id")]
    InvalidSubject,

    #[error("token has been revoked")]
    Revoked,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
    exp: u64,
    #[serde(default)]
    email: Option<String>,
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    token: String,
    expires_at: u64,
}

pub struct AuthContext {
    decoding_key: DecodingKey,
    validation: Validation,
    /// token → exp (seconds since epoch)
    revoked: RwLock<HashMap<String, u64>>,
}

impl AuthContext {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            revoked: RwLock::new(HashMap::new()),
        }
    }

    pub async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        if self.revoked.read().await.contains_key(token) {
            return Err(AuthError::Revoked);
        }
        let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthError::InvalidSubject)?;
        Ok(AuthUser {
            user_id,
            email: data.claims.email,
            token: token.to_string(),
            expires_at: data.claims.exp,
        })
    }

    /// Revokes the user's current token. Expired entries are pruned here.
    pub async fn invalidate(&self, user: &AuthUser) {
        let now = jsonwebtoken::get_current_timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(user.token.clone(), user.expires_at);
        info!("Revoked session token for user {}", user.user_id);
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::MissingToken)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        Ok(state.auth.authenticate(token).await?)
    }
}

/// POST /api/v1/auth/logout
pub async fn handle_logout(State(state): State<AppState>, user: AuthUser) -> StatusCode {
    state.auth.invalidate(&user).await;
    StatusCode::NO_CONTENT
}
