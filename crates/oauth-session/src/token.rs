//! OAuth token exchange and refresh
//!
//! Handles the two token endpoint interactions:
//! 1. Authorization code exchange (completing a new authorization)
//! 2. Token refresh (driven by `TokenManager` before expiry)
//!
//! Both operations POST a form to `OAuthSettings::token_url` with different
//! grant types.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::settings::OAuthSettings;

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Endpoints that
/// omit `refresh_token` on refresh expect the previous one to stay in use.
/// Anything else the endpoint returns (e.g. the authorized user) is kept in
/// `extra` and ends up in `Credential::metadata`.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: Secret<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret<String>>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Performs the refresh-token exchange on behalf of `TokenManager`.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenRefresher>`).
pub trait TokenRefresher: Send + Sync {
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>>;
}

/// `TokenRefresher` backed by the configured OAuth token endpoint.
pub struct OAuthRefresher {
    client: reqwest::Client,
    settings: Arc<OAuthSettings>,
}

impl OAuthRefresher {
    pub fn new(client: reqwest::Client, settings: Arc<OAuthSettings>) -> Self {
        Self { client, settings }
    }
}

impl TokenRefresher for OAuthRefresher {
    fn refresh<'a>(
        &'a self,
        refresh: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<TokenResponse>> + Send + 'a>> {
        Box::pin(refresh_token(&self.client, &self.settings, refresh))
    }
}

/// Exchange an authorization code for tokens.
///
/// The user has authorized in their browser and we received the code. The
/// PKCE verifier proves we initiated the flow.
pub async fn exchange_code(
    client: &reqwest::Client,
    settings: &OAuthSettings,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("code", code),
        ("code_verifier", verifier),
        ("client_id", settings.client_id.as_str()),
        ("redirect_uri", settings.redirect_uri.as_str()),
    ];
    if let Some(secret) = &settings.client_secret {
        form.push(("client_secret", secret.expose().as_str()));
    }

    let response = client
        .post(&settings.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
}

/// Refresh an access token using a refresh token.
pub async fn refresh_token(
    client: &reqwest::Client,
    settings: &OAuthSettings,
    refresh: &str,
) -> Result<TokenResponse> {
    let mut form = vec![
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh),
        ("client_id", settings.client_id.as_str()),
        ("redirect_uri", settings.redirect_uri.as_str()),
    ];
    if let Some(secret) = &settings.client_secret {
        form.push(("client_secret", secret.expose().as_str()));
    }

    let response = client
        .post(&settings.token_url)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));

        if is_rejection(status.as_u16(), &body) {
            return Err(Error::InvalidCredentials(format!(
                "refresh token rejected ({status}): {body}"
            )));
        }

        return Err(Error::TokenExchange(format!(
            "token refresh returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
}

/// 401/403, or a 400 carrying `invalid_grant`, means the refresh token is
/// revoked or already rotated.
fn is_rejection(status: u16, body: &str) -> bool {
    match status {
        401 | 403 => true,
        400 => serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned))
            .is_some_and(|code| code == "invalid_grant"),
        _ => false,
    }
}
