//! Kaggle API credentials.
//!
//! Resolution order: `KAGGLE_USERNAME` + `KAGGLE_KEY` environment variables,
//! then the key file at `$KAGGLE_CONFIG_DIR/kaggle.json` (default
//! `~/.kaggle/kaggle.json`).

use super::provider::DataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_USERNAME: &str = "KAGGLE_USERNAME";
pub const ENV_KEY: &str = "KAGGLE_KEY";
pub const ENV_CONFIG_DIR: &str = "KAGGLE_CONFIG_DIR";
pub const KEY_FILE_NAME: &str = "kaggle.json";

/// Username + API key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"***")
            .finish()
    }
}

/// Where resolved credentials came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialOrigin {
    Environment,
    KeyFile(PathBuf),
}

/// Outcome of a non-failing credentials check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialStatus {
    Present { username: String, origin: CredentialOrigin },
    Missing { expected_path: PathBuf },
    Malformed { path: PathBuf, reason: String },
}

/// Default key file location, honouring `KAGGLE_CONFIG_DIR`.
pub fn default_key_path() -> PathBuf {
    if let Some(dir) = std::env::var_os(ENV_CONFIG_DIR) {
        return PathBuf::from(dir).join(KEY_FILE_NAME);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".kaggle")
        .join(KEY_FILE_NAME)
}

/// Parse and check a key file's contents.
pub fn parse_key_file(path: &Path, contents: &str) -> Result<KaggleCredentials, DataError> {
    let creds: KaggleCredentials =
        serde_json::from_str(contents).map_err(|e| DataError::CredentialsMalformed {
            path: path.to_path_buf(),
            reason: format!("expected {{\"username\": ..., \"key\": ...}}: {e}"),
        })?;
    if creds.username.trim().is_empty() || creds.key.trim().is_empty() {
        return Err(DataError::CredentialsMalformed {
            path: path.to_path_buf(),
            reason: "username and key must be non-empty".into(),
        });
    }
    Ok(creds)
}

/// Locates, loads and installs credentials.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    key_path: PathBuf,
    use_env: bool,
}

impl CredentialStore {
    /// Standard lookup: environment first, then the default key file.
    pub fn standard() -> Self {
        Self {
            key_path: default_key_path(),
            use_env: true,
        }
    }

    /// Key file only, at an explicit path. Environment variables are ignored.
    pub fn at(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
            use_env: false,
        }
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    fn from_env(&self) -> Option<KaggleCredentials> {
        if !self.use_env {
            return None;
        }
        let username = std::env::var(ENV_USERNAME).ok()?;
        let key = std::env::var(ENV_KEY).ok()?;
        if username.trim().is_empty() || key.trim().is_empty() {
            return None;
        }
        Some(KaggleCredentials { username, key })
    }

    /// Resolve credentials or fail with an error naming the expected path.
    pub fn load(&self) -> Result<(KaggleCredentials, CredentialOrigin), DataError> {
        if let Some(creds) = self.from_env() {
            return Ok((creds, CredentialOrigin::Environment));
        }
        let contents = match fs::read_to_string(&self.key_path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::CredentialsNotFound {
                    expected_path: self.key_path.clone(),
                })
            }
            Err(e) => return Err(DataError::io(&self.key_path, e)),
        };
        let creds = parse_key_file(&self.key_path, &contents)?;
        Ok((creds, CredentialOrigin::KeyFile(self.key_path.clone())))
    }

    /// Report credential state without failing.
    pub fn check(&self) -> CredentialStatus {
        match self.load() {
            Ok((creds, origin)) => CredentialStatus::Present {
                username: creds.username,
                origin,
            },
            Err(DataError::CredentialsMalformed { path, reason }) => {
                CredentialStatus::Malformed { path, reason }
            }
            Err(DataError::Io { path, source }) => CredentialStatus::Malformed {
                path,
                reason: source.to_string(),
            },
            Err(_) => CredentialStatus::Missing {
                expected_path: self.key_path.clone(),
            },
        }
    }

    /// Copy a downloaded `kaggle.json` into place.
    ///
    /// The source is validated first, so a malformed file never replaces a
    /// working one. On Unix the installed file is made owner-only (0600).
    pub fn install_from(&self, src: &Path) -> Result<KaggleCredentials, DataError> {
        let contents = match fs::read_to_string(src) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DataError::FileNotFound {
                    path: src.to_path_buf(),
                })
            }
            Err(e) => return Err(DataError::io(src, e)),
        };
        let creds = parse_key_file(src, &contents)?;

        if let Some(parent) = self.key_path.parent() {
            fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
        }
        fs::write(&self.key_path, contents).map_err(|e| DataError::io(&self.key_path, e))?;
        restrict_permissions(&self.key_path)?;

        tracing::info!(path = %self.key_path.display(), "installed Kaggle credentials");
        Ok(creds)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), DataError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| DataError::io(path, e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), DataError> {
    Ok(())
}

/// Candidate location for a freshly downloaded key file.
pub fn downloads_key_file() -> Option<PathBuf> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .map(|d| d.join(KEY_FILE_NAME))
}
