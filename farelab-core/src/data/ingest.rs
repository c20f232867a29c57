//! Dataset ingestion: make sure the raw CSV exists locally.
//!
//! Flow for a missing file: resolve credentials, fetch once, extract the
//! expected entry, check it parses, then write `<file>.part` and rename it
//! into place. Nothing is left in the raw directory when any step fails.
//! A destination that already exists and is non-empty short-circuits the
//! whole flow before credentials are touched; if it does not parse as CSV
//! ingestion fails instead of reporting it as present.

use super::archive::extract_expected;
use super::credentials::CredentialStore;
use super::loader::{check_csv_bytes, inspect_file, FileReport};
use super::provider::{DataError, DatasetProvider};
use super::stages::{atomic_write, part_path, StageError};
use crate::domain::DatasetRef;
use std::fs;
use std::path::{Path, PathBuf};

/// Whether ingestion fetched the file or found it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    Downloaded,
    AlreadyPresent,
}

/// Result of a successful ingestion.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub path: PathBuf,
    pub status: IngestStatus,
    pub file_report: FileReport,
}

/// Fetches one dataset file into a raw data directory.
pub struct DataIngestion<'a> {
    provider: &'a dyn DatasetProvider,
    credentials: CredentialStore,
    dataset: DatasetRef,
    raw_dir: PathBuf,
}

impl<'a> DataIngestion<'a> {
    pub fn new(
        provider: &'a dyn DatasetProvider,
        credentials: CredentialStore,
        dataset: DatasetRef,
        raw_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            credentials,
            dataset,
            raw_dir: raw_dir.into(),
        }
    }

    /// Where the dataset file lives once ingested.
    pub fn target_path(&self) -> PathBuf {
        self.raw_dir.join(&self.dataset.file_name)
    }

    pub fn dataset(&self) -> &DatasetRef {
        &self.dataset
    }

    /// Ensure the dataset file is present, downloading it if needed.
    pub fn run(&self) -> Result<IngestOutcome, DataError> {
        let target = self.target_path();

        if is_present(&target) {
            tracing::info!(path = %target.display(), "dataset already present, skipping download");
            let file_report = inspect_file(&target)?;
            if !file_report.readable {
                return Err(DataError::Unreadable {
                    path: target,
                    reason: "existing file does not parse as the flight CSV".into(),
                });
            }
            return Ok(IngestOutcome {
                path: target,
                status: IngestStatus::AlreadyPresent,
                file_report,
            });
        }

        let (creds, origin) = self.credentials.load()?;
        tracing::debug!(username = %creds.username, ?origin, "resolved credentials");

        let fetched = self.provider.fetch(&self.dataset, &creds)?;
        tracing::info!(
            provider = self.provider.name(),
            url = %fetched.source_url,
            bytes = fetched.bytes.len(),
            "fetched dataset payload"
        );

        let csv = extract_expected(&fetched.bytes, &self.dataset.file_name)?;
        check_csv_bytes(&csv).map_err(|reason| DataError::Unreadable {
            path: target.clone(),
            reason,
        })?;

        atomic_write(&target, &csv).map_err(stage_to_data)?;

        let file_report = match inspect_file(&target) {
            Ok(r) => r,
            Err(e) => {
                discard(&target);
                return Err(e);
            }
        };

        tracing::info!(path = %target.display(), size_mb = file_report.size_mb, "dataset downloaded");
        Ok(IngestOutcome {
            path: target,
            status: IngestStatus::Downloaded,
            file_report,
        })
    }
}

fn is_present(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file() && m.len() > 0).unwrap_or(false)
}

fn discard(path: &Path) {
    let _ = fs::remove_file(path);
    let _ = fs::remove_file(part_path(path));
}

fn stage_to_data(e: StageError) -> DataError {
    match e {
        StageError::Io { path, source } => DataError::Io { path, source },
        StageError::MissingInput { path } | StageError::EmptyInput { path } => {
            DataError::FileNotFound { path }
        }
    }
}
