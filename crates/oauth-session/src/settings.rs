//! OAuth client settings
//!
//! Deserialized from the `[oauth]` table of the engine configuration. The
//! client secret is never read from the TOML: it comes from the
//! `OAUTH_CLIENT_SECRET` env var or from `client_secret_file`.

use std::path::PathBuf;
use std::time::Duration;

use common::Secret;
use serde::Deserialize;

use crate::constants::{
    CLIENT_SECRET_ENV, DEFAULT_EXPIRY_MARGIN_SECS, DEFAULT_REFRESH_TIMEOUT_SECS, OOB_REDIRECT_URI,
};

/// OAuth client registration and refresh tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthSettings {
    /// Token endpoint for code exchange and refresh
    pub token_url: String,
    /// Authorization endpoint; only needed to start a new authorization flow
    #[serde(default)]
    pub authorize_url: Option<String>,
    pub client_id: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default = "default_expiry_margin")]
    pub expiry_margin_secs: u64,
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout_secs: u64,
}

fn default_redirect_uri() -> String {
    OOB_REDIRECT_URI.to_string()
}

fn default_expiry_margin() -> u64 {
    DEFAULT_EXPIRY_MARGIN_SECS
}

fn default_refresh_timeout() -> u64 {
    DEFAULT_REFRESH_TIMEOUT_SECS
}

impl OAuthSettings {
    /// Settings with defaults for everything but the endpoint and client ID.
    pub fn new(token_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            authorize_url: None,
            client_id: client_id.into(),
            redirect_uri: default_redirect_uri(),
            client_secret: None,
            client_secret_file: None,
            expiry_margin_secs: DEFAULT_EXPIRY_MARGIN_SECS,
            refresh_timeout_secs: DEFAULT_REFRESH_TIMEOUT_SECS,
        }
    }

    pub fn expiry_margin(&self) -> Duration {
        Duration::from_secs(self.expiry_margin_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }

    /// Check field values and resolve the client secret.
    ///
    /// Secret resolution order:
    /// 1. `OAUTH_CLIENT_SECRET` env var
    /// 2. `client_secret_file` path
    pub fn finalize(&mut self) -> common::Result<()> {
        if !self.token_url.starts_with("http://") && !self.token_url.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "oauth.token_url must start with http:// or https://, got: {}",
                self.token_url
            )));
        }

        if self.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "oauth.client_id must not be empty".into(),
            ));
        }

        if self.refresh_timeout_secs == 0 {
            return Err(common::Error::Config(
                "oauth.refresh_timeout_secs must be greater than 0".into(),
            ));
        }

        if let Ok(secret) = std::env::var(CLIENT_SECRET_ENV) {
            self.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = self.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                self.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn parse(toml_src: &str) -> OAuthSettings {
        toml::from_str(toml_src).unwrap()
    }

    #[test]
    fn defaults_apply() {
        let settings = parse(
            r#"
token_url = "https://app.example.com/-/oauth_token"
client_id = "12345"
"#,
        );
        assert_eq!(settings.redirect_uri, OOB_REDIRECT_URI);
        assert_eq!(settings.expiry_margin(), Duration::from_secs(60));
        assert_eq!(settings.refresh_timeout(), Duration::from_secs(30));
        assert!(settings.authorize_url.is_none());
        assert!(settings.client_secret.is_none());
    }

    #[test]
    fn client_secret_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env(CLIENT_SECRET_ENV, "from-env") };

        let mut settings = OAuthSettings::new("https://app.example.com/-/oauth_token", "12345");
        settings.finalize().unwrap();
        assert_eq!(settings.client_secret.unwrap().expose(), "from-env");

        unsafe { remove_env(CLIENT_SECRET_ENV) };
    }

    #[test]
    fn client_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        std::fs::write(&path, "  from-file\n").unwrap();

        let mut settings = OAuthSettings::new("https://app.example.com/-/oauth_token", "12345");
        settings.client_secret_file = Some(path);
        settings.finalize().unwrap();
        assert_eq!(settings.client_secret.unwrap().expose(), "from-file");
    }

    #[test]
    fn missing_secret_file_errors() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(CLIENT_SECRET_ENV) };

        let mut settings = OAuthSettings::new("https://app.example.com/-/oauth_token", "12345");
        settings.client_secret_file = Some(PathBuf::from("/nonexistent/secret"));
        let err = settings.finalize().unwrap_err();
        assert!(err.to_string().contains("client_secret_file"), "got: {err}");
    }

    #[test]
    fn rejects_non_http_token_url() {
        let mut settings = OAuthSettings::new("ftp://example.com/token", "12345");
        let err = settings.finalize().unwrap_err();
        assert!(err.to_string().contains("token_url"), "got: {err}");
    }

    #[test]
    fn rejects_zero_refresh_timeout() {
        let mut settings = OAuthSettings::new("https://example.com/token", "12345");
        settings.refresh_timeout_secs = 0;
        let err = settings.finalize().unwrap_err();
        assert!(err.to_string().contains("refresh_timeout_secs"), "got: {err}");
    }
}
