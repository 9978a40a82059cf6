//! OAuth session management for the request engine
//!
//! Owns the bearer credential used by every outbound API call and keeps it
//! fresh. The crate is usable on its own: the request engine only depends on
//! `TokenManager::get_valid_credential()`.
//!
//! Credential flow:
//! 1. Caller builds an authorization URL via `pkce::build_authorization_url()`
//! 2. User authorizes; caller completes with `token::exchange_code()`
//! 3. The resulting `Credential` is handed to a `TokenManager`
//! 4. `TokenManager::get_valid_credential()` refreshes it before expiry,
//!    coalescing concurrent demand into a single token exchange
//! 5. Registered subscribers (e.g. `CredentialFile`) see every refreshed credential

pub mod constants;
pub mod credentials;
pub mod error;
pub mod manager;
pub mod pkce;
pub mod settings;
pub mod token;

pub use credentials::{Credential, CredentialFile, now_millis};
pub use error::{Error, Result};
pub use manager::{CredentialStatus, RefreshSubscriber, SessionSettings, TokenManager};
pub use pkce::{build_authorization_url, compute_challenge, generate_state, generate_verifier};
pub use settings::OAuthSettings;
pub use token::{OAuthRefresher, TokenRefresher, TokenResponse, exchange_code, refresh_token};
