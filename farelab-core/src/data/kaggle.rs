//! Kaggle dataset provider.
//!
//! Fetches a dataset archive from the Kaggle v1 download endpoint with HTTP
//! basic auth. One attempt per call: failures are classified and returned,
//! never retried.

use super::credentials::KaggleCredentials;
use super::provider::{DataError, DatasetProvider, FetchResult};
use crate::domain::DatasetRef;
use reqwest::StatusCode;
use std::time::Duration;

/// Kaggle API provider.
pub struct KaggleProvider {
    client: reqwest::blocking::Client,
}

impl KaggleProvider {
    pub fn new() -> Result<Self, DataError> {
        Self::with_timeout(Duration::from_secs(120))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("farelab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

/// Map a non-success HTTP status to the user-facing error taxonomy.
pub fn classify_status(status: StatusCode, dataset: &DatasetRef) -> Result<(), DataError> {
    if status.is_success() {
        return Ok(());
    }
    Err(match status {
        StatusCode::UNAUTHORIZED => DataError::Unauthorized(
            "check the username and key in kaggle.json, or regenerate the API token".into(),
        ),
        StatusCode::FORBIDDEN => DataError::TermsNotAccepted {
            url: dataset.page_url(),
        },
        StatusCode::NOT_FOUND => DataError::DatasetNotFound {
            url: dataset.page_url(),
        },
        other => DataError::Http {
            status: other.as_u16(),
            url: dataset.download_url(),
        },
    })
}

impl DatasetProvider for KaggleProvider {
    fn name(&self) -> &str {
        "kaggle"
    }

    fn fetch(
        &self,
        dataset: &DatasetRef,
        credentials: &KaggleCredentials,
    ) -> Result<FetchResult, DataError> {
        let url = dataset.download_url();
        tracing::info!(dataset = %dataset, "downloading from Kaggle");

        let resp = self
            .client
            .get(&url)
            .basic_auth(&credentials.username, Some(&credentials.key))
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        classify_status(resp.status(), dataset)?;

        let bytes = resp
            .bytes()
            .map_err(|e| DataError::NetworkUnreachable(format!("reading response body: {e}")))?;

        tracing::debug!(bytes = bytes.len(), "download complete");
        Ok(FetchResult {
            bytes: bytes.to_vec(),
            source_url: url,
        })
    }
}
