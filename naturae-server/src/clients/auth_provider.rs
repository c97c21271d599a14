//! Auth provider client
//!
//! Talks to a GoTrue-compatible auth service to finish email sign-in:
//! PKCE code exchange and one-time token verification. Both return a session
//! whose access token is then verified locally like any other request.

use super::{http_client, ClientError};
use serde::{Deserialize, Serialize};

/// Session issued by the auth provider
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: AuthSessionUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
struct PkceRequest<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyRequest<'a> {
    token_hash: &'a str,
    #[serde(rename = "type")]
    otp_type: &'a str,
}

/// Error body of the provider; field names differ between endpoints
#[derive(Debug, Default, Deserialize)]
struct ProviderError {
    error_description: Option<String>,
    msg: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

impl ProviderError {
    fn description(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
            .filter(|d| !d.trim().is_empty())
    }
}

pub struct AuthProviderClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AuthProviderClient {
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ClientError> {
        Ok(Self {
            http_client: http_client(timeout_secs)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Exchange a PKCE authorization code for a session
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<AuthSession, ClientError> {
        let url = format!("{}/token", self.base_url);
        tracing::debug!(url = %url, "Exchanging PKCE code");

        let response = self
            .http_client
            .post(&url)
            .query(&[("grant_type", "pkce")])
            .header("apikey", &self.api_key)
            .json(&PkceRequest {
                auth_code: code,
                code_verifier,
            })
            .send()
            .await?;

        Self::session_from(response).await
    }

    /// Verify a one-time token from an email link
    pub async fn verify_otp(&self, token_hash: &str, otp_type: &str) -> Result<AuthSession, ClientError> {
        let url = format!("{}/verify", self.base_url);
        tracing::debug!(url = %url, otp_type = %otp_type, "Verifying one-time token");

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&VerifyRequest { token_hash, otp_type })
            .send()
            .await?;

        Self::session_from(response).await
    }

    /// Session from a success response; provider error text otherwise
    async fn session_from(response: reqwest::Response) -> Result<AuthSession, ClientError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let description = serde_json::from_str::<ProviderError>(&body)
                .ok()
                .and_then(ProviderError::description)
                .unwrap_or_else(|| format!("Auth provider returned {}", status.as_u16()));
            return Err(ClientError::Api(status.as_u16(), description));
        }

        let session: AuthSession = response.json().await?;
        tracing::info!(user_id = %session.user.id, "Auth provider issued session");
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_error_description_fallbacks() {
        let err: ProviderError = serde_json::from_value(json!({
            "error": "invalid_grant",
            "error_description": "Email link is invalid or has expired"
        }))
        .unwrap();
        assert_eq!(err.description().as_deref(), Some("Email link is invalid or has expired"));

        let err: ProviderError = serde_json::from_value(json!({"code": 403, "msg": "Token has expired"})).unwrap();
        assert_eq!(err.description().as_deref(), Some("Token has expired"));

        assert_eq!(ProviderError::default().description(), None);
    }

    #[test]
    fn test_session_parses_without_optional_fields() {
        let session: AuthSession = serde_json::from_value(json!({
            "access_token": "abc",
            "user": {"id": "b6f1c4d2-0000-4000-8000-000000000001"}
        }))
        .unwrap();
        assert_eq!(session.user.email, None);
        assert_eq!(session.expires_in, None);
    }
}
