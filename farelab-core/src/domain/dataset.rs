//! Remote dataset identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Default Kaggle dataset for the Bangladesh flight fares data.
pub const DEFAULT_KAGGLE_REF: &str = "farhanaaktermukarrima/flight-price-dataset-of-bangladesh";

/// File expected inside the downloaded archive.
pub const DEFAULT_FILE_NAME: &str = "Flight_Price_Dataset_of_Bangladesh.csv";

/// A Kaggle dataset reference (`owner/slug`) plus the CSV file it must contain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub owner: String,
    pub slug: String,
    pub file_name: String,
}

impl DatasetRef {
    /// Parse `owner/slug`. Returns `None` unless both parts are non-empty.
    pub fn parse(reference: &str, file_name: impl Into<String>) -> Option<Self> {
        let (owner, slug) = reference.trim().split_once('/')?;
        if owner.is_empty() || slug.is_empty() || slug.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            slug: slug.to_string(),
            file_name: file_name.into(),
        })
    }

    /// The flight fares dataset this project is built around.
    pub fn flight_prices() -> Self {
        Self {
            owner: "farhanaaktermukarrima".to_string(),
            slug: "flight-price-dataset-of-bangladesh".to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }

    /// Public dataset page, where the user accepts the terms of use.
    pub fn page_url(&self) -> String {
        format!("https://www.kaggle.com/datasets/{}/{}", self.owner, self.slug)
    }

    /// Kaggle API download endpoint (returns a zip archive).
    pub fn download_url(&self) -> String {
        format!(
            "https://www.kaggle.com/api/v1/datasets/download/{}/{}",
            self.owner, self.slug
        )
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_slug() {
        let r = DatasetRef::parse(DEFAULT_KAGGLE_REF, DEFAULT_FILE_NAME).unwrap();
        assert_eq!(r, DatasetRef::flight_prices());
        assert_eq!(r.to_string(), DEFAULT_KAGGLE_REF);
    }

    #[test]
    fn rejects_malformed_refs() {
        assert!(DatasetRef::parse("no-slash", "x.csv").is_none());
        assert!(DatasetRef::parse("/slug", "x.csv").is_none());
        assert!(DatasetRef::parse("a/b/c", "x.csv").is_none());
    }

    #[test]
    fn urls_point_at_kaggle() {
        let r = DatasetRef::flight_prices();
        assert!(r.page_url().ends_with("/datasets/farhanaaktermukarrima/flight-price-dataset-of-bangladesh"));
        assert!(r.download_url().contains("/api/v1/datasets/download/"));
    }
}
