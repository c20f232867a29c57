//! Data layer: credentials, providers, ingestion, CSV I/O and the staged
//! directory layout.

pub mod archive;
pub mod credentials;
pub mod ingest;
pub mod kaggle;
pub mod loader;
pub mod provider;
pub mod stages;

pub use credentials::{
    CredentialOrigin, CredentialStatus, CredentialStore, KaggleCredentials,
};
pub use ingest::{DataIngestion, IngestOutcome, IngestStatus};
pub use kaggle::KaggleProvider;
pub use loader::{
    inspect_file, load_records, parse_records, read_raw, read_raw_from, records_to_csv,
    FileReport, ParsedRecords, RawTable,
};
pub use provider::{DataError, DatasetProvider, FetchResult};
pub use stages::{Stage, StageError, StageLayout, WriteOutcome};
