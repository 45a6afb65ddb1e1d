//! Credential Storage
//!
//! Holds the operator's bearer token and persists it across restarts.
//! The on-disk format is a single JSON object with one fixed key, the same
//! shape a browser's local storage would hold.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Key the credential is stored under
pub const CREDENTIAL_KEY: &str = "token";

/// Opaque bearer token. Empty means unauthenticated.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Unauthenticated credential
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Header value, sent verbatim
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read the claims of a JWT without verifying the signature.
    ///
    /// Only for display; the backend is the authority on validity.
    pub fn claims(&self) -> Option<TokenClaims> {
        let payload = self.0.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Expiry from the `exp` claim, if the token carries one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims()?
            .exp
            .and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// True only if the token says it has expired
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().map(|exp| exp <= now).unwrap_or(false)
    }
}

impl From<String> for Credential {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Credential {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Credential(<empty>)")
        } else {
            f.write_str("Credential(<redacted>)")
        }
    }
}

/// Subset of JWT claims issued by the AstraDNS backend
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// Credential store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Persists the credential across process restarts.
///
/// `load` never fails: an unavailable store reads as the empty credential.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Credential;
    fn save(&self, credential: &Credential);
    fn clear(&self);
}

/// File-backed store, one file per client profile
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Credential, StoreError> {
        if !self.path.exists() {
            return Ok(Credential::empty());
        }
        let data = std::fs::read_to_string(&self.path)?;
        let mut entries: HashMap<String, String> = serde_json::from_str(&data)?;
        Ok(entries
            .remove(CREDENTIAL_KEY)
            .map(Credential::from)
            .unwrap_or_default())
    }

    fn write(&self, credential: &Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = HashMap::new();
        entries.insert(CREDENTIAL_KEY, credential.as_str());
        let data = serde_json::to_string(&entries)?;

        // Write atomically via temp file
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &data)?;
        restrict_permissions(&temp_path)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Credential {
        match self.read() {
            Ok(credential) => credential,
            Err(e) => {
                warn!("Credential store unavailable ({}), starting anonymous", e);
                Credential::empty()
            }
        }
    }

    fn save(&self, credential: &Credential) {
        if credential.is_empty() {
            self.clear();
            return;
        }
        match self.write(credential) {
            Ok(()) => debug!("Credential saved to {}", self.path.display()),
            Err(e) => warn!("Failed to persist credential: {}", e),
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Credential removed from {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove credential: {}", e),
        }
    }
}

/// Process-local store, lost on exit
#[derive(Default)]
pub struct MemoryCredentialStore {
    value: Mutex<Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: impl Into<Credential>) -> Self {
        Self {
            value: Mutex::new(credential.into()),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Credential {
        self.value.lock().clone()
    }

    fn save(&self, credential: &Credential) {
        *self.value.lock() = credential.clone();
    }

    fn clear(&self) {
        *self.value.lock() = Credential::empty();
    }
}
