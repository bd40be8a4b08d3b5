/*!
 * # Authentication and Site Authorization
 *
 * Users log in with a password and receive an HS256 JWT, delivered both as an
 * `HttpOnly` cookie and in the response body. Every `/api/v1` request is
 * authenticated by [`auth_middleware`], which accepts the cookie or an
 * `Authorization: Bearer` header.
 *
 * Authorization is row level: each user is assigned a set of sites and the
 * [`SiteScope`] guard restricts every query to the intersection of the
 * requested sites and the assigned ones.
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user;
use crate::errors::ServiceError;

mod password;
mod site_guard;

pub use password::{hash_password, verify_password};
pub use site_guard::{SiteParams, SiteScope};

/// Name of the session cookie carrying the JWT.
pub const AUTH_COOKIE: &str = "gespack_token";

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // user id
    pub name: String,    // display name
    pub role: String,
    pub sites: Vec<i32>, // assigned site ids at login time
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub display_name: String,
    pub role: String,
    pub site_ids: Vec<i32>,
    pub token_id: String,
    pub expires_at: i64,
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = claims
            .sub
            .parse::<i32>()
            .map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            user_id,
            display_name: claims.name,
            role: claims.role,
            site_ids: claims.sites,
            token_id: claims.jti,
            expires_at: claims.exp,
        })
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub token_lifetime: Duration,
    pub cookie_secure: bool,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_lifetime: Duration, cookie_secure: bool) -> Self {
        Self {
            jwt_secret,
            jwt_audience: "gespack-api".to_string(),
            jwt_issuer: "gespack-auth".to_string(),
            token_lifetime,
            cookie_secure,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(cfg.jwt_secret.clone(), cfg.jwt_lifetime(), cfg.cookie_secure)
    }
}

/// A freshly issued access token
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Token blacklist entry
#[derive(Clone, Debug)]
struct BlacklistedToken {
    jti: String,
    expiry: i64,
}

/// Authentication service that handles token issuance and validation
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    blacklisted_tokens: Arc<RwLock<Vec<BlacklistedToken>>>,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            blacklisted_tokens: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Generate a JWT token for a user and the sites assigned to them
    pub fn generate_token(
        &self,
        user: &user::Model,
        site_ids: &[i32],
    ) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let lifetime = ChronoDuration::from_std(self.config.token_lifetime)
            .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.user_id.to_string(),
            name: user.display_name.clone(),
            role: user.role.clone(),
            sites: site_ids.to_vec(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + lifetime).timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.token_lifetime.as_secs() as i64,
        })
    }

    /// Validate a JWT token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_token_blacklisted(&claims.jti).await {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Revoke a token id until its natural expiry
    pub async fn revoke(&self, token_id: &str, expires_at: i64) {
        let mut blacklist = self.blacklisted_tokens.write().await;
        blacklist.push(BlacklistedToken {
            jti: token_id.to_string(),
            expiry: expires_at,
        });
        Self::clean_blacklist(&mut blacklist);
        debug!(token_id, "token revoked");
    }

    async fn is_token_blacklisted(&self, token_id: &str) -> bool {
        let blacklist = self.blacklisted_tokens.read().await;
        blacklist.iter().any(|t| t.jti == token_id)
    }

    fn clean_blacklist(blacklist: &mut Vec<BlacklistedToken>) {
        let now = Utc::now().timestamp();
        blacklist.retain(|t| t.expiry > now);
    }

    /// `Set-Cookie` value carrying a freshly issued token
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{AUTH_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}{}",
            self.config.token_lifetime.as_secs(),
            if self.config.cookie_secure { "; Secure" } else { "" }
        )
    }

    /// `Set-Cookie` value that removes the session cookie
    pub fn expired_cookie(&self) -> String {
        format!(
            "{AUTH_COOKIE}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0{}",
            if self.config.cookie_secure { "; Secure" } else { "" }
        )
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Access to the requested site is not allowed")]
    SiteAccessDenied,

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::SiteAccessDenied => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::JwtError(msg),
            AuthError::InternalError(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Reads the token from the session cookie, falling back to a Bearer header
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == AUTH_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// Authentication middleware
///
/// Inserts the [`AuthUser`] into the request extensions on success.
///
/// Site assignments come from the token's `sites` claim. Changes to a user's
/// assignments apply at their next login; a revoked site stays reachable
/// until the current token expires.
pub async fn auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_token(request.headers()) else {
        return AuthError::MissingAuth.into_response();
    };

    let user = match auth_service
        .validate_token(&token)
        .await
        .and_then(AuthUser::try_from)
    {
        Ok(user) => user,
        Err(e) => {
            debug!(error = %e, "request authentication failed");
            return e.into_response();
        }
    };

    request.extensions_mut().insert(user);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::HeaderValue;

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "a-test-secret-that-is-long-enough-for-hs256".into(),
            Duration::from_secs(3600),
            false,
        ))
    }

    fn user() -> user::Model {
        user::Model {
            user_id: 12,
            username: "marie".into(),
            display_name: "Marie Curie".into(),
            password_hash: String::new(),
            role: user::ROLE_USER.into(),
            active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn issued_token_round_trips_claims() {
        let service = service();
        let issued = service.generate_token(&user(), &[7, 9]).unwrap();
        let claims = service.validate_token(&issued.access_token).await.unwrap();

        assert_eq!(claims.sub, "12");
        assert_eq!(claims.name, "Marie Curie");
        assert_eq!(claims.sites, vec![7, 9]);
        assert_eq!(claims.aud, "gespack-api");

        let auth_user = AuthUser::try_from(claims).unwrap();
        assert_eq!(auth_user.user_id, 12);
        assert_eq!(auth_user.role, "user");
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let issued = service().generate_token(&user(), &[1]).unwrap();
        let other = AuthService::new(AuthConfig::new(
            "another-secret-that-is-also-long-enough".into(),
            Duration::from_secs(3600),
            false,
        ));
        assert_matches!(
            other.validate_token(&issued.access_token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn revoked_token_is_rejected() {
        let service = service();
        let issued = service.generate_token(&user(), &[1]).unwrap();
        let claims = service.validate_token(&issued.access_token).await.unwrap();

        service.revoke(&claims.jti, claims.exp).await;

        assert_matches!(
            service.validate_token(&issued.access_token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[test]
    fn token_is_read_from_cookie_then_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("lang=fr; gespack_token=abc.def.ghi"),
        );
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.remove(header::COOKIE);
        assert_eq!(extract_token(&headers).as_deref(), Some("xyz"));

        headers.remove(header::AUTHORIZATION);
        assert_eq!(extract_token(&headers), None);
    }

    #[test]
    fn cookies_carry_security_attributes() {
        let service = service();
        let cookie = service.session_cookie("tok");
        assert!(cookie.starts_with("gespack_token=tok;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
        assert!(!cookie.contains("Secure"));
        assert!(service.expired_cookie().contains("Max-Age=0"));
    }

    #[test]
    fn site_denial_maps_to_forbidden() {
        let err: ServiceError = AuthError::SiteAccessDenied.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
        let err: ServiceError = AuthError::InvalidToken.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);
    }
}
