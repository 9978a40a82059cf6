//! PKCE (Proof Key for Code Exchange) per RFC 7636 and authorization URLs
//!
//! Generates the code verifier and S256 challenge used to start a new
//! authorization. The verifier stays with the caller and is sent during
//! `token::exchange_code`; the challenge goes into the authorization URL.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::settings::OAuthSettings;

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 without padding (86 chars),
/// inside the 43-128 character range RFC 7636 requires.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque `state` value for CSRF protection.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Build the authorization URL the user opens to grant access.
///
/// Fails with `Error::Config` when `authorize_url` is missing or unparsable.
pub fn build_authorization_url(
    settings: &OAuthSettings,
    state: &str,
    challenge: &str,
) -> Result<String> {
    let base = settings
        .authorize_url
        .as_deref()
        .ok_or_else(|| Error::Config("oauth.authorize_url is not configured".into()))?;

    let mut url = reqwest::Url::parse(base)
        .map_err(|e| Error::Config(format!("invalid authorize_url {base}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &settings.client_id)
        .append_pair("redirect_uri", &settings.redirect_uri)
        .append_pair("response_type", "code")
        .append_pair("state", state)
        .append_pair("code_challenge", challenge)
        .append_pair("code_challenge_method", "S256");

    Ok(url.into())
}
