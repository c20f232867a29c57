//! Dataset provider trait and structured error types.
//!
//! The `DatasetProvider` trait abstracts over where dataset bytes come from
//! (the Kaggle API, a local file, a test double) so the ingestion layer can
//! be exercised without network access.

use super::credentials::KaggleCredentials;
use crate::domain::DatasetRef;
use std::path::PathBuf;
use thiserror::Error;

/// Structured error types for data operations.
///
/// User-setup failures carry their remediation in the message, since they
/// are shown verbatim by the CLI.
#[derive(Debug, Error)]
pub enum DataError {
    #[error(
        "Kaggle credentials not found at {}. Download kaggle.json from \
         https://www.kaggle.com/settings/account and place it there (or run `farelab setup --from <file>`)",
        expected_path.display()
    )]
    CredentialsNotFound { expected_path: PathBuf },

    #[error("Kaggle credentials at {} are malformed: {reason}", path.display())]
    CredentialsMalformed { path: PathBuf, reason: String },

    #[error("Kaggle rejected the credentials (HTTP 401): {0}")]
    Unauthorized(String),

    #[error(
        "download refused (HTTP 403): visit {url} and accept the dataset's terms of use, then retry"
    )]
    TermsNotAccepted { url: String },

    #[error("dataset not found (HTTP 404): {url}")]
    DatasetNotFound { url: String },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("archive error: {0}")]
    Archive(String),

    #[error("expected file '{expected}' not found after download (archive contained: {})", found.join(", "))]
    FileMissingFromArchive { expected: String, found: Vec<String> },

    #[error("file {} is not readable as CSV: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(String),
}

impl DataError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure needs manual action outside the program
    /// (credentials, terms of use).
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            DataError::CredentialsNotFound { .. }
                | DataError::CredentialsMalformed { .. }
                | DataError::Unauthorized(_)
                | DataError::TermsNotAccepted { .. }
        )
    }

    /// Steps a user can take before retrying a failed download.
    pub fn remediation(&self) -> Vec<String> {
        match self {
            DataError::Unreadable { path, .. } => vec![format!(
                "Delete {} and run `farelab download` again",
                path.display()
            )],
            DataError::NetworkUnreachable(_) | DataError::Http { .. } => {
                vec!["Check that an internet connection is available".into()]
            }
            DataError::DatasetNotFound { .. } => {
                vec!["Check `kaggle_ref` under [dataset] in the config file".into()]
            }
            e if e.is_setup_error() => vec![
                "Configure Kaggle API credentials (~/.kaggle/kaggle.json or `farelab setup --from <file>`)"
                    .into(),
                "Accept the dataset terms on the Kaggle dataset page".into(),
            ],
            _ => Vec::new(),
        }
    }
}

/// Bytes returned by a provider for one dataset.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub bytes: Vec<u8>,
    pub source_url: String,
}

/// Trait for dataset hosts.
///
/// Providers only fetch bytes. Existence checks, archive extraction and
/// atomic placement on disk live in the ingestion layer above.
pub trait DatasetProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the dataset archive (or raw file) for `dataset`.
    fn fetch(
        &self,
        dataset: &DatasetRef,
        credentials: &KaggleCredentials,
    ) -> Result<FetchResult, DataError>;
}
