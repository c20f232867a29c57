//! Preprocessing and feature persistence stages.
//!
//! `preprocess` turns the raw CSV into typed, de-duplicated records and
//! writes a cleaned copy to `02-preprocessed/`. `persist_features` writes an
//! encoded matrix to `03-features/`. Both name their outputs by a content
//! hash and never overwrite an existing file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use farelab_core::data::stages::{hash_file, require_input, write_new};
use farelab_core::data::{
    parse_records, read_raw, records_to_csv, DataError, RawTable, Stage, StageError, StageLayout,
    WriteOutcome,
};
use farelab_core::domain::FlightRecord;
use farelab_core::features::{write_matrix, FeatureError, FeatureMatrix, UNKNOWN_AIRCRAFT};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error("no usable rows in {}: all {rows} rows failed to parse", path.display())]
    NoUsableRows { path: PathBuf, rows: usize },
}

/// Records after cleaning, with counts of what was changed or dropped.
#[derive(Debug, Clone, Default)]
pub struct CleanedData {
    pub records: Vec<FlightRecord>,
    pub input_rows: usize,
    pub rejected: usize,
    pub duplicates_dropped: usize,
    pub filled_aircraft: usize,
}

/// Parse, fill and de-duplicate raw rows. Order of first occurrence is kept.
pub fn clean_table(table: &RawTable) -> CleanedData {
    let parsed = parse_records(&table.rows);
    for (row, reason) in parsed.rejected.iter().take(5) {
        debug!(row, %reason, "rejected row");
    }

    let mut out = CleanedData {
        input_rows: table.len(),
        rejected: parsed.rejected.len(),
        ..CleanedData::default()
    };
    let mut seen = HashSet::new();
    for mut rec in parsed.records {
        if rec.aircraft_type.is_none() {
            rec.aircraft_type = Some(UNKNOWN_AIRCRAFT.to_string());
            out.filled_aircraft += 1;
        }
        // FlightRecord holds floats, so identity goes through its canonical CSV fields.
        if seen.insert(rec.to_raw()) {
            out.records.push(rec);
        } else {
            out.duplicates_dropped += 1;
        }
    }
    out
}

/// BLAKE3 of the cleaned records in CSV form: the identity of a training set.
pub fn dataset_hash(records: &[FlightRecord]) -> Result<String, DataError> {
    let bytes = records_to_csv(records)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Result of the preprocessing stage.
#[derive(Debug, Clone)]
pub struct PreprocessReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: WriteOutcome,
    pub input_rows: usize,
    pub rejected: usize,
    pub duplicates_dropped: usize,
    pub filled_aircraft: usize,
    pub rows_out: usize,
    pub dataset_hash: String,
}

/// Clean `input` and write `02-preprocessed/flights_clean_<hash>.csv`.
pub fn preprocess(
    layout: &StageLayout,
    input: &Path,
) -> Result<(PreprocessReport, Vec<FlightRecord>), PipelineError> {
    require_input(input)?;
    let input_hash = hash_file(input)?;
    let table = read_raw(input)?;
    let cleaned = clean_table(&table);

    if cleaned.records.is_empty() {
        return Err(PipelineError::NoUsableRows {
            path: input.to_path_buf(),
            rows: cleaned.input_rows,
        });
    }
    if cleaned.rejected > 0 {
        warn!(
            rejected = cleaned.rejected,
            rows = cleaned.input_rows,
            "dropped rows that failed to parse"
        );
    }

    let bytes = records_to_csv(&cleaned.records)?;
    let dataset_hash = blake3::hash(&bytes).to_hex().to_string();
    let output = layout.content_path(Stage::Preprocessed, "flights_clean", &input_hash, "csv");
    let outcome = write_new(&output, &bytes)?;

    info!(
        output = %output.display(),
        rows = cleaned.records.len(),
        duplicates = cleaned.duplicates_dropped,
        "preprocessing complete"
    );

    let report = PreprocessReport {
        input: input.to_path_buf(),
        output,
        outcome,
        input_rows: cleaned.input_rows,
        rejected: cleaned.rejected,
        duplicates_dropped: cleaned.duplicates_dropped,
        filled_aircraft: cleaned.filled_aircraft,
        rows_out: cleaned.records.len(),
        dataset_hash,
    };
    Ok((report, cleaned.records))
}

/// Read and clean a CSV without writing anything.
pub fn load_clean(input: &Path) -> Result<CleanedData, PipelineError> {
    require_input(input)?;
    let cleaned = clean_table(&read_raw(input)?);
    if cleaned.records.is_empty() {
        return Err(PipelineError::NoUsableRows {
            path: input.to_path_buf(),
            rows: cleaned.input_rows,
        });
    }
    Ok(cleaned)
}

/// Write a feature matrix to `03-features/<stem>_<hash>.parquet`.
///
/// `key` identifies the inputs (dataset, split, encoder); equal keys reuse
/// the existing file.
pub fn persist_features(
    layout: &StageLayout,
    stem: &str,
    key: &str,
    matrix: &FeatureMatrix,
) -> Result<(PathBuf, WriteOutcome), PipelineError> {
    let hash = blake3::hash(key.as_bytes()).to_hex().to_string();
    let path = layout.content_path(Stage::Features, stem, &hash, "parquet");
    let outcome = write_matrix(&path, matrix)?;
    debug!(path = %path.display(), ?outcome, "feature matrix stored");
    Ok((path, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use farelab_core::data::read_raw_from;
    use farelab_core::synthetic::synthetic_flights;

    fn table_with(extra: &str) -> RawTable {
        let records = synthetic_flights(3, 5);
        let mut csv = String::from_utf8(records_to_csv(&records).unwrap()).unwrap();
        csv.push_str(extra);
        read_raw_from(csv.as_bytes()).unwrap()
    }

    #[test]
    fn drops_unparseable_rows_and_duplicates() {
        let base = table_with("");
        let header_len = base.headers.len();
        assert_eq!(header_len, 17);

        // Duplicate the first data row and add a row with a bad class.
        let records = synthetic_flights(3, 5);
        let csv = String::from_utf8(records_to_csv(&records).unwrap()).unwrap();
        let first_row = csv.lines().nth(1).unwrap().to_string();
        let class = format!(",{},", records[0].class);
        let bad = first_row.replace(&class, ",Premium,");
        let table = table_with(&format!("{first_row}\n{bad}\n"));

        let cleaned = clean_table(&table);
        assert_eq!(cleaned.input_rows, 5);
        assert_eq!(cleaned.rejected, 1);
        assert_eq!(cleaned.duplicates_dropped, 1);
        assert_eq!(cleaned.records, records);
    }

    #[test]
    fn missing_aircraft_is_filled() {
        let mut records = synthetic_flights(2, 9);
        records[0].aircraft_type = None;
        let table = read_raw_from(&records_to_csv(&records).unwrap()[..]).unwrap();
        let cleaned = clean_table(&table);
        assert_eq!(cleaned.filled_aircraft, 1);
        assert_eq!(cleaned.records[0].aircraft_type.as_deref(), Some(UNKNOWN_AIRCRAFT));
    }

    #[test]
    fn rows_differing_only_in_fare_are_not_duplicates() {
        let mut records = synthetic_flights(1, 3);
        records[0].aircraft_type = Some("ATR 72".into());
        let mut twin = records[0].clone();
        twin.total_fare += 0.25;
        records.push(twin);
        records.push(records[0].clone());
        let table = read_raw_from(&records_to_csv(&records).unwrap()[..]).unwrap();

        let cleaned = clean_table(&table);
        assert_eq!(cleaned.duplicates_dropped, 1);
        assert_eq!(cleaned.records, records[..2].to_vec());
    }

    #[test]
    fn dataset_hash_tracks_content() {
        let a = synthetic_flights(10, 1);
        let mut b = a.clone();
        assert_eq!(dataset_hash(&a).unwrap(), dataset_hash(&b).unwrap());
        b[3].total_fare += 1.0;
        assert_ne!(dataset_hash(&a).unwrap(), dataset_hash(&b).unwrap());
    }
}
