//! Email confirmation landing route
//!
//! Links in sign-up, magic-link and recovery emails point here. The route
//! finishes sign-in with the auth provider, stores the session in cookies
//! and redirects the browser to the next page.

use crate::auth::{cookie_value, session_cookies, CODE_VERIFIER_COOKIE};
use crate::clients::auth_provider::AuthSession;
use crate::clients::ClientError;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use naturae_common::db::profiles;
use reqwest::Url;
use serde::Deserialize;
use tracing::{info, warn};

const DEFAULT_NEXT: &str = "/decks";
const RECOVERY_TYPE: &str = "recovery";

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmParams {
    pub code: Option<String>,
    pub token_hash: Option<String>,
    #[serde(rename = "type")]
    pub otp_type: Option<String>,
    pub next: Option<String>,
    pub error_description: Option<String>,
}

/// `next` if it is a same-site path, otherwise the default
///
/// Rejects `//host` and `/\host`, which browsers treat as another origin.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") => path,
        _ => DEFAULT_NEXT,
    }
}

/// Path with query parameters, encoded
fn with_query(path: &str, params: &[(&str, &str)]) -> String {
    let Ok(mut url) = Url::parse("http://localhost") else {
        return path.to_string();
    };
    url.set_path(path);
    url.query_pairs_mut().extend_pairs(params);
    match url.query() {
        Some(query) if !query.is_empty() => format!("{}?{}", url.path(), query),
        _ => url.path().to_string(),
    }
}

/// Login page location reporting a failed confirmation
pub fn login_error_location(error: &str, message: Option<&str>) -> String {
    match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => with_query("/login", &[("error", error), ("message", message)]),
        None => with_query("/login", &[("error", error)]),
    }
}

fn redirect(state: &AppState, location: &str) -> Redirect {
    Redirect::to(&format!("{}{}", state.settings.public_url, location))
}

fn provider_message(err: &ClientError) -> Option<String> {
    match err {
        ClientError::Api(_, description) if !description.trim().is_empty() => Some(description.clone()),
        _ => None,
    }
}

/// GET /auth/confirm
pub async fn confirm(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ConfirmParams>,
) -> Response {
    if let Some(description) = params.error_description.as_deref() {
        warn!(error = %description, "Auth provider reported a confirmation error");
        return redirect(&state, &login_error_location("confirmation_failed", Some(description))).into_response();
    }

    let result: Result<AuthSession, ClientError> = match (&params.code, &params.token_hash, &params.otp_type) {
        (Some(code), _, _) => {
            let verifier = cookie_value(&headers, CODE_VERIFIER_COOKIE).unwrap_or_default();
            state.clients.auth.exchange_code(code, &verifier).await
        }
        (None, Some(token_hash), Some(otp_type)) => state.clients.auth.verify_otp(token_hash, otp_type).await,
        _ => {
            warn!("Confirmation link without code or token");
            return redirect(&state, &login_error_location("missing_token", None)).into_response();
        }
    };

    let session = match result {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Failed to confirm sign-in");
            let message = provider_message(&e);
            return redirect(&state, &login_error_location("confirmation_failed", message.as_deref()))
                .into_response();
        }
    };

    let profile = match profiles::ensure_profile(&state.db, &session.user.id, session.user.email.as_deref()).await {
        Ok(profile) => profile,
        Err(e) => {
            tracing::error!(user_id = %session.user.id, error = %e, "Failed to create profile after sign-in");
            return redirect(&state, &login_error_location("confirmation_failed", None)).into_response();
        }
    };

    let location = if params.otp_type.as_deref() == Some(RECOVERY_TYPE) {
        with_query("/reset-password", &[("recovery", "true")])
    } else if profile.username.is_none() {
        with_query("/onboarding", &[("confirmed", "true")])
    } else {
        safe_next(params.next.as_deref()).to_string()
    };

    info!(user_id = %session.user.id, location = %location, "Confirmed sign-in");

    let cookies = session_cookies(
        &session.access_token,
        session.refresh_token.as_deref(),
        session.expires_in,
        state.secure_cookies(),
    );
    (
        AppendHeaders(cookies.into_iter().map(|cookie| (SET_COOKIE, cookie))),
        redirect(&state, &location),
    )
        .into_response()
}

/// Build auth routes
pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/confirm", get(confirm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/decks/abc")), "/decks/abc");
        assert_eq!(safe_next(Some("//evil.example.com")), "/decks");
        assert_eq!(safe_next(Some("/\\evil.example.com")), "/decks");
        assert_eq!(safe_next(Some("https://evil.example.com")), "/decks");
        assert_eq!(safe_next(None), "/decks");
    }

    #[test]
    fn test_login_error_location_encodes_message() {
        assert_eq!(login_error_location("missing_token", None), "/login?error=missing_token");
        assert_eq!(
            login_error_location("confirmation_failed", Some("Token has expired")),
            "/login?error=confirmation_failed&message=Token+has+expired"
        );
    }
}
