//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs. A login hands out an access token (1 h) and a
//! refresh token (24 h); only access tokens open the API, only refresh
//! tokens buy a new pair.

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::config::ServerConfig;
use crate::error::AuthError;
use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Access token lifetime in seconds.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Refresh token lifetime in seconds.
pub const REFRESH_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;
pub const REFRESH_TOKEN_HEADER: &str = "X-Refresh-Token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub kind: TokenKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Issues and checks tokens, and knows the one account allowed to log in.
#[derive(Clone)]
pub struct Authenticator {
    enabled: bool,
    username: String,
    password: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("enabled", &self.enabled)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn from_config(config: &ServerConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            enabled: config.enable_auth,
            username: config.auth_username.clone(),
            password: config.auth_password.clone(),
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Whether API routes require a bearer token.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check a username and password against the configured account. No
    /// account configured means nobody can log in.
    pub fn check_credentials(&self, username: &str, password: &str) -> Result<(), AuthError> {
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }
        if self.username.is_empty() || username != self.username || password != self.password {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(())
    }

    pub fn issue_pair(&self, username: &str) -> Result<TokenPair, AuthError> {
        Ok(TokenPair {
            token: self.issue(username, TokenKind::Access, ACCESS_TOKEN_TTL_SECS)?,
            refresh_token: self.issue(username, TokenKind::Refresh, REFRESH_TOKEN_TTL_SECS)?,
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }

    fn issue(&self, username: &str, kind: TokenKind, ttl_secs: i64) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: username.to_string(),
            exp: (now + Duration::seconds(ttl_secs)).timestamp(),
            iat: now.timestamp(),
            kind,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Decode `token` and make sure it is of the `expected` kind.
    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| {
                debug!(error = %err, "token rejected");
                AuthError::InvalidToken
            })?
            .claims;
        if claims.kind != expected {
            return Err(AuthError::WrongTokenKind);
        }
        Ok(claims)
    }
}

/// Reject requests without a valid access token when auth is enabled.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.auth.is_enabled() {
        return Ok(next.run(request).await);
    }

    let token = extract_bearer_token(request.headers())?;
    state.auth.verify(token, TokenKind::Access)?;
    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::MissingToken)
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenPair>> {
    let Json(login) = payload.map_err(|_| AuthError::MissingCredentials)?;
    state.auth.check_credentials(&login.username, &login.password)?;
    let pair = state.auth.issue_pair(&login.username)?;
    info!(username = %login.username, "login succeeded");
    Ok(Json(pair))
}

/// POST /auth/refresh
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<TokenPair>> {
    let token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingCredentials)?;
    let claims = state.auth.verify(token, TokenKind::Refresh)?;
    Ok(Json(state.auth.issue_pair(&claims.sub)?))
}
