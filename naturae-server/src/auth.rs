//! Request authentication
//!
//! Access tokens are HS256 JWTs issued by the auth provider and signed with
//! the shared `jwt_secret`. A token is read from `Authorization: Bearer ...`
//! or, for browser requests, from the `naturae-access-token` cookie.

use crate::error::ApiError;
use crate::AppState;
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use naturae_common::db::profiles;
use serde::{Deserialize, Serialize};

const BEARER: &str = "Bearer ";

pub const ACCESS_TOKEN_COOKIE: &str = "naturae-access-token";
pub const REFRESH_TOKEN_COOKIE: &str = "naturae-refresh-token";
pub const CODE_VERIFIER_COOKIE: &str = "naturae-code-verifier";

/// Session cookie lifetime when the provider does not say
const DEFAULT_SESSION_SECS: i64 = 3600;
const REFRESH_COOKIE_SECS: i64 = 60 * 60 * 24 * 30;

/// Claims read from an access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

/// Verify signature and expiry of an access token
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let validation = Validation::new(Algorithm::HS256);

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ApiError::Unauthorized("Access token expired".to_string()),
            _ => ApiError::Unauthorized("Invalid access token".to_string()),
        })
}

/// Value of a cookie from the `Cookie` request headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Access token from the Authorization header, falling back to the cookie
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| cookie_value(headers, ACCESS_TOKEN_COOKIE))
}

/// `Set-Cookie` value for a session cookie
pub fn session_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        name, value, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes a cookie
pub fn clear_cookie(name: &str) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", name)
}

/// Cookies that store a new session
pub fn session_cookies(
    access_token: &str,
    refresh_token: Option<&str>,
    expires_in: Option<i64>,
    secure: bool,
) -> Vec<String> {
    let mut cookies = vec![
        session_cookie(
            ACCESS_TOKEN_COOKIE,
            access_token,
            expires_in.unwrap_or(DEFAULT_SESSION_SECS),
            secure,
        ),
        clear_cookie(CODE_VERIFIER_COOKIE),
    ];
    if let Some(refresh) = refresh_token {
        cookies.push(session_cookie(REFRESH_TOKEN_COOKIE, refresh, REFRESH_COOKIE_SECS, secure));
    }
    cookies
}

/// Authenticated caller; rejects the request with 401 otherwise
///
/// The caller's profile row is created on first use.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Sign in required".to_string()))?;

        let claims = verify_token(&token, &state.settings.jwt_secret)?;
        profiles::ensure_profile(&state.db, &claims.sub, claims.email.as_deref()).await?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

/// Caller who may or may not be signed in
///
/// An invalid or expired token is treated like no token.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl MaybeUser {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|u| u.user_id.as_str())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers) else {
            return Ok(MaybeUser(None));
        };

        match verify_token(&token, &state.settings.jwt_secret) {
            Ok(claims) => Ok(MaybeUser(Some(AuthUser {
                user_id: claims.sub,
                email: claims.email,
            }))),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid access token on public route");
                Ok(MaybeUser(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp: i64) -> String {
        let claims = Claims {
            sub: "user-1".to_string(),
            email: Some("a@example.com".to_string()),
            exp: exp as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_verify_valid_token() {
        let exp = chrono::Utc::now().timestamp() + 600;
        let claims = verify_token(&token("secret", exp), "secret").unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn test_reject_wrong_secret_and_expired() {
        let exp = chrono::Utc::now().timestamp() + 600;
        assert!(verify_token(&token("other", exp), "secret").is_err());

        let expired = chrono::Utc::now().timestamp() - 3600;
        assert!(verify_token(&token("secret", expired), "secret").is_err());
        assert!(verify_token("garbage", "secret").is_err());
    }

    #[test]
    fn test_token_from_header_or_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; naturae-access-token=from-cookie"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-header"));

        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }

    #[test]
    fn test_session_cookies() {
        let cookies = session_cookies("tok", Some("ref"), Some(120), true);
        assert_eq!(
            cookies[0],
            "naturae-access-token=tok; Path=/; HttpOnly; SameSite=Lax; Max-Age=120; Secure"
        );
        assert!(cookies[1].starts_with("naturae-code-verifier=;"));
        assert!(cookies[2].starts_with("naturae-refresh-token=ref;"));
    }
}
