//! Ingestion behaviour against a scripted provider.
//!
//! Covers: successful download, idempotent skip without touching
//! credentials or the provider, an unparseable file already in place,
//! missing credentials, refused downloads,
//! and archives that do not contain the expected file. Failure cases must
//! leave nothing behind in the raw directory.

use farelab_core::data::{
    CredentialStore, DataError, DataIngestion, DatasetProvider, FetchResult, IngestStatus,
    KaggleCredentials,
};
use farelab_core::domain::DatasetRef;
use std::env;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_dir() -> PathBuf {
    let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = env::temp_dir().join(format!("farelab_ingest_it_{}_{id}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

const CSV: &[u8] = b"\
Airline,Source,Source Name,Destination,Destination Name,Departure Date & Time,Arrival Date & Time,Duration (hrs),Stopovers,Aircraft Type,Class,Booking Source,Base Fare (BDT),Tax & Surcharge (BDT),Total Fare (BDT),Seasonality,Days Before Departure
Biman,DAC,Dhaka,CGP,Chittagong,2025-01-10 08:00:00,2025-01-10 09:00:00,1.0,Direct,ATR 72,Economy,Online Website,4000,600,4600,Regular,10
";

fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut w = zip::ZipWriter::new(&mut buf);
        for (name, data) in entries {
            w.start_file(*name, SimpleFileOptions::default()).unwrap();
            w.write_all(data).unwrap();
        }
        w.finish().unwrap();
    }
    buf.into_inner()
}

/// Provider returning a fixed response and recording calls.
struct ScriptedProvider {
    response: Mutex<Option<Result<Vec<u8>, DataError>>>,
    calls: AtomicUsize,
    last_user: Mutex<Option<String>>,
}

impl ScriptedProvider {
    fn ok(bytes: Vec<u8>) -> Self {
        Self {
            response: Mutex::new(Some(Ok(bytes))),
            calls: AtomicUsize::new(0),
            last_user: Mutex::new(None),
        }
    }

    fn err(e: DataError) -> Self {
        Self {
            response: Mutex::new(Some(Err(e))),
            calls: AtomicUsize::new(0),
            last_user: Mutex::new(None),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DatasetProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch(&self, dataset: &DatasetRef, creds: &KaggleCredentials) -> Result<FetchResult, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_user.lock().unwrap() = Some(creds.username.clone());
        let bytes = self
            .response
            .lock()
            .unwrap()
            .take()
            .expect("provider called more than once")?;
        Ok(FetchResult {
            bytes,
            source_url: dataset.download_url(),
        })
    }
}

fn write_key(dir: &Path) -> PathBuf {
    let path = dir.join("kaggle").join("kaggle.json");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, r#"{"username":"alice","key":"secret"}"#).unwrap();
    path
}

fn raw_dir_is_clean(raw: &Path) -> bool {
    match fs::read_dir(raw) {
        Ok(entries) => entries.count() == 0,
        Err(_) => true,
    }
}

#[test]
fn downloads_and_extracts_expected_file() {
    let dir = temp_dir();
    let ds = DatasetRef::flight_prices();
    let provider = ScriptedProvider::ok(zip_with(&[(ds.file_name.as_str(), CSV)]));
    let raw = dir.join("data").join("01-raw");

    let ing = DataIngestion::new(&provider, CredentialStore::at(write_key(&dir)), ds.clone(), &raw);
    let out = ing.run().unwrap();

    assert_eq!(out.status, IngestStatus::Downloaded);
    assert_eq!(out.path, raw.join("Flight_Price_Dataset_of_Bangladesh.csv"));
    assert_eq!(fs::read(&out.path).unwrap(), CSV);
    assert!(out.file_report.readable);
    assert_eq!(out.file_report.columns, 17);
    assert_eq!(provider.calls(), 1);
    assert_eq!(provider.last_user.lock().unwrap().as_deref(), Some("alice"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn existing_file_skips_credentials_and_network() {
    let dir = temp_dir();
    let ds = DatasetRef::flight_prices();
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();
    fs::write(raw.join(&ds.file_name), CSV).unwrap();

    let provider = ScriptedProvider::err(DataError::NetworkUnreachable("must not be called".into()));
    // Key file path that does not exist: loading it would fail.
    let store = CredentialStore::at(dir.join("missing").join("kaggle.json"));
    let out = DataIngestion::new(&provider, store, ds, &raw).run().unwrap();

    assert_eq!(out.status, IngestStatus::AlreadyPresent);
    assert_eq!(provider.calls(), 0);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unparseable_existing_file_is_an_error_not_a_skip() {
    let dir = temp_dir();
    let ds = DatasetRef::flight_prices();
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();
    let target = raw.join(&ds.file_name);
    fs::write(&target, "<html>terms not accepted</html>").unwrap();

    let provider = ScriptedProvider::err(DataError::NetworkUnreachable("must not be called".into()));
    let store = CredentialStore::at(dir.join("missing").join("kaggle.json"));
    let err = DataIngestion::new(&provider, store, ds, &raw).run().unwrap_err();

    match &err {
        DataError::Unreadable { path, .. } => assert_eq!(path, &target),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.remediation()[0].contains(&target.display().to_string()));
    assert_eq!(provider.calls(), 0);
    // The user's file is reported, not removed.
    assert!(target.exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_credentials_name_expected_path_and_create_nothing() {
    let dir = temp_dir();
    let provider = ScriptedProvider::ok(CSV.to_vec());
    let key = dir.join("nowhere").join("kaggle.json");
    let raw = dir.join("raw");

    let err = DataIngestion::new(&provider, CredentialStore::at(&key), DatasetRef::flight_prices(), &raw)
        .run()
        .unwrap_err();

    match &err {
        DataError::CredentialsNotFound { expected_path } => assert_eq!(expected_path, &key),
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains(&key.display().to_string()));
    assert!(err.is_setup_error());
    assert_eq!(provider.calls(), 0);
    assert!(raw_dir_is_clean(&raw));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn refused_download_names_dataset_page() {
    let dir = temp_dir();
    let ds = DatasetRef::flight_prices();
    let provider = ScriptedProvider::err(DataError::TermsNotAccepted { url: ds.page_url() });
    let raw = dir.join("raw");

    let err = DataIngestion::new(&provider, CredentialStore::at(write_key(&dir)), ds, &raw)
        .run()
        .unwrap_err();

    assert!(err
        .to_string()
        .contains("https://www.kaggle.com/datasets/farhanaaktermukarrima/flight-price-dataset-of-bangladesh"));
    assert!(raw_dir_is_clean(&raw));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn archive_without_expected_file_leaves_nothing() {
    let dir = temp_dir();
    let provider = ScriptedProvider::ok(zip_with(&[("something_else.csv", CSV)]));
    let raw = dir.join("raw");

    let err = DataIngestion::new(
        &provider,
        CredentialStore::at(write_key(&dir)),
        DatasetRef::flight_prices(),
        &raw,
    )
    .run()
    .unwrap_err();

    match err {
        DataError::FileMissingFromArchive { expected, found } => {
            assert_eq!(expected, "Flight_Price_Dataset_of_Bangladesh.csv");
            assert_eq!(found, vec!["something_else.csv".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(raw_dir_is_clean(&raw));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn corrupt_archive_leaves_nothing() {
    let dir = temp_dir();
    let ds = DatasetRef::flight_prices();
    let mut bytes = zip_with(&[(ds.file_name.as_str(), CSV)]);
    bytes.truncate(40);
    let provider = ScriptedProvider::ok(bytes);
    let raw = dir.join("raw");

    let result = DataIngestion::new(&provider, CredentialStore::at(write_key(&dir)), ds, &raw).run();
    assert!(result.is_err());
    assert!(raw_dir_is_clean(&raw));
    let _ = fs::remove_dir_all(&dir);
}
