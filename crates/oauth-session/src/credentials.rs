//! Bearer credential and its on-disk form
//!
//! A `Credential` is immutable once built: a refresh produces a whole new
//! value that replaces the old one. `CredentialFile` is an optional storage
//! collaborator; the session itself only keeps the credential in memory.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::manager::RefreshSubscriber;
use crate::token::TokenResponse;

/// OAuth bearer credential.
///
/// `expires_at` is a unix timestamp in milliseconds (absolute, not a delta).
/// `None` means the token does not expire (personal access tokens).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: Secret<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<Secret<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    /// Extra token endpoint fields, e.g. the authorized user
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<Secret<String>>,
        refresh_token: Option<Secret<String>>,
        expires_at: Option<u64>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at,
            metadata: serde_json::Map::new(),
        }
    }

    /// A non-expiring, non-refreshable bearer token.
    pub fn bearer(access_token: impl Into<Secret<String>>) -> Self {
        Self::new(access_token, None, None)
    }

    /// Build a credential from a token endpoint response issued at `issued_at`
    /// (unix ms).
    ///
    /// When the endpoint does not rotate the refresh token, `previous_refresh`
    /// is carried over.
    pub fn from_token_response(
        response: TokenResponse,
        issued_at: u64,
        previous_refresh: Option<&Secret<String>>,
    ) -> Self {
        let expires_at = response
            .expires_in
            .map(|secs| issued_at.saturating_add(secs.saturating_mul(1000)));
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| previous_refresh.cloned()),
            expires_at,
            metadata: response.extra,
        }
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expires_at.is_some_and(|expires| expires <= now_millis)
    }

    /// Whether the token expires within `margin_millis` of `now_millis`.
    pub fn expires_within(&self, margin_millis: u64, now_millis: u64) -> bool {
        self.expires_at
            .is_some_and(|expires| expires <= now_millis.saturating_add(margin_millis))
    }

    /// Value for the `Authorization` header.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.access_token.expose())
    }
}

/// Current wall-clock time as unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// JSON file holding a single credential.
///
/// All writes use atomic temp-file + rename to prevent corruption on crash.
/// A tokio Mutex serializes concurrent writes.
pub struct CredentialFile {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CredentialFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credential, or `None` if the file does not exist yet.
    pub async fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "credential file not found");
            return Ok(None);
        }
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
        let credential: Credential = serde_json::from_str(&contents)
            .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
        info!(path = %self.path.display(), "loaded credential");
        Ok(Some(credential))
    }

    /// Persist `credential`, replacing whatever was stored.
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.path, credential).await
    }
}

impl RefreshSubscriber for CredentialFile {
    fn on_refresh<'a>(
        &'a self,
        credential: &'a Credential,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.save(credential).await?;
            Ok(())
        })
    }
}

/// Write a credential to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 (owner read/write only) since
/// the file contains OAuth tokens.
async fn write_atomic(path: &Path, credential: &Credential) -> Result<()> {
    let json = serde_json::to_string_pretty(credential)
        .map_err(|e| Error::CredentialParse(format!("serializing credential: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credential.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credential");
    Ok(())
}
