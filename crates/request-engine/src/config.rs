//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client secret is loaded from OAUTH_CLIENT_SECRET or
//! client_secret_file, never stored in the TOML directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use oauth_session::{Credential, OAuthSettings, TokenManager};
use reqwest::Url;
use serde::Deserialize;

use crate::retry::{DEFAULT_MAX_RETRIES, RetryPolicy};

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    /// Absent means a static access token with no refresh
    #[serde(default)]
    pub oauth: Option<OAuthSettings>,
}

/// Remote API settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    /// Bounds one logical call, retry waits included
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Rate-limit retry settings
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check field values and resolve secrets.
    pub fn validate(&mut self) -> common::Result<()> {
        self.base_url()?;

        if self.api.timeout_secs == 0 {
            return Err(common::Error::Config(
                "api.timeout_secs must be greater than 0".into(),
            ));
        }

        if let Some(oauth) = self.oauth.as_mut() {
            oauth.finalize()?;
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("request-engine.toml")
    }

    pub fn base_url(&self) -> common::Result<Url> {
        let base = &self.api.base_url;
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(common::Error::Config(format!(
                "api.base_url must start with http:// or https://, got: {base}"
            )));
        }
        Url::parse(base)
            .map_err(|e| common::Error::Config(format!("invalid api.base_url {base}: {e}")))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.initial_backoff_ms),
        )
    }

    /// Session for `credential`: refreshing when `[oauth]` is configured,
    /// otherwise serving the access token as-is.
    pub fn token_manager(&self, credential: Credential, client: reqwest::Client) -> TokenManager {
        match &self.oauth {
            Some(oauth) => TokenManager::with_oauth(credential, client, Arc::new(oauth.clone())),
            None => TokenManager::from_static(credential.access_token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("request-engine.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    const MINIMAL: &str = r#"
[api]
base_url = "https://app.example.com/api/1.0"
"#;

    const WITH_OAUTH: &str = r#"
[api]
base_url = "https://app.example.com/api/1.0"
timeout_secs = 30
user_agent = "request-engine-tests"

[retry]
max_retries = 5
initial_backoff_ms = 250

[oauth]
token_url = "https://app.example.com/-/oauth_token"
authorize_url = "https://app.example.com/-/oauth_authorize"
client_id = "client-1"
expiry_margin_secs = 120
"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&write_config(&dir, MINIMAL)).unwrap();

        assert_eq!(config.api.timeout_secs, 60);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert!(config.api.user_agent.is_none());
        assert!(config.oauth.is_none());
        assert_eq!(
            config.base_url().unwrap().as_str(),
            "https://app.example.com/api/1.0"
        );
    }

    #[test]
    fn full_config_parses_every_table() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("OAUTH_CLIENT_SECRET") };

        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&write_config(&dir, WITH_OAUTH)).unwrap();

        assert_eq!(config.api.user_agent.as_deref(), Some("request-engine-tests"));
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(5, Duration::from_millis(250))
        );
        let oauth = config.oauth.as_ref().unwrap();
        assert_eq!(oauth.client_id, "client-1");
        assert_eq!(oauth.expiry_margin_secs, 120);
        assert_eq!(oauth.refresh_timeout_secs, 30);
        assert!(oauth.client_secret.is_none());
    }

    #[test]
    fn oauth_secret_comes_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("OAUTH_CLIENT_SECRET", "from-env") };

        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(&dir, WITH_OAUTH));
        unsafe { remove_env("OAUTH_CLIENT_SECRET") };

        let config = result.unwrap();
        let secret = config.oauth.unwrap().client_secret.unwrap();
        assert_eq!(secret.expose(), "from-env");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"ftp://app.example.com\"\n");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("http:// or https://"), "got: {err}");
    }

    #[test]
    fn rejects_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[api]\nbase_url = \"https://app.example.com\"\ntimeout_secs = 0\n",
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("timeout_secs"), "got: {err}");
    }

    #[test]
    fn rejects_zero_refresh_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            &format!("{WITH_OAUTH}refresh_timeout_secs = 0\n"),
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("refresh_timeout_secs"), "got: {err}");
    }

    #[test]
    fn missing_file_and_bad_toml_are_errors() {
        assert!(Config::load(Path::new("/nonexistent/request-engine.toml")).is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");
        assert!(Config::load(&path).is_err());
    }

    #[test]
    fn resolve_path_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap();

        unsafe { set_env("CONFIG_PATH", "/etc/engine/from-env.toml") };
        assert_eq!(
            Config::resolve_path(Some("/cli.toml")),
            PathBuf::from("/cli.toml")
        );
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("/etc/engine/from-env.toml")
        );

        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("request-engine.toml")
        );
    }

    #[tokio::test]
    async fn static_config_serves_access_token() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&write_config(&dir, MINIMAL)).unwrap();

        let tokens = config.token_manager(Credential::bearer("pat_123"), reqwest::Client::new());
        let credential = tokens.get_valid_credential().await.unwrap();
        assert_eq!(credential.access_token.expose(), "pat_123");
    }
}
