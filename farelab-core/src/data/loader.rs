//! CSV reading and writing for flight data.

use super::provider::DataError;
use crate::domain::{FlightRecord, RawFlightRow, RecordError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Rows read from a CSV file, with the header as found.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawFlightRow>,
}

impl RawTable {
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn csv_err(e: csv::Error) -> DataError {
    DataError::Csv(e.to_string())
}

/// Read every row of a flight CSV from any reader.
pub fn read_raw_from<R: Read>(reader: R) -> Result<RawTable, DataError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();

    let rows = rdr
        .deserialize::<RawFlightRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(csv_err)?;

    Ok(RawTable { headers, rows })
}

/// Read every row of a flight CSV file.
pub fn read_raw(path: &Path) -> Result<RawTable, DataError> {
    let file = match fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DataError::FileNotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(DataError::io(path, e)),
    };
    read_raw_from(std::io::BufReader::new(file))
}

/// Typed records plus the rows that failed to parse.
#[derive(Debug, Clone, Default)]
pub struct ParsedRecords {
    pub records: Vec<FlightRecord>,
    /// `(row index, reason)` for each rejected row.
    pub rejected: Vec<(usize, RecordError)>,
}

/// Convert raw rows into typed records, collecting failures instead of stopping.
pub fn parse_records(rows: &[RawFlightRow]) -> ParsedRecords {
    let mut out = ParsedRecords::default();
    for (i, raw) in rows.iter().enumerate() {
        match FlightRecord::try_from(raw) {
            Ok(rec) => out.records.push(rec),
            Err(e) => out.rejected.push((i, e)),
        }
    }
    out
}

/// Read a CSV and keep only rows that parse.
pub fn load_records(path: &Path) -> Result<ParsedRecords, DataError> {
    let table = read_raw(path)?;
    Ok(parse_records(&table.rows))
}

/// Serialize records to CSV bytes using the source column names.
pub fn records_to_csv(records: &[FlightRecord]) -> Result<Vec<u8>, DataError> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for rec in records {
        wtr.serialize(rec.to_raw()).map_err(csv_err)?;
    }
    wtr.into_inner()
        .map_err(|e| DataError::Csv(format!("flushing CSV buffer: {e}")))
}

/// Basic integrity report for a downloaded file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub exists: bool,
    pub size_mb: f64,
    pub blake3: Option<String>,
    pub readable: bool,
    pub columns: usize,
    pub sample_rows: usize,
}

/// Number of rows read when checking that a file parses.
const SAMPLE_ROWS: usize = 5;

/// Parse the header and first few rows of an in-memory CSV.
///
/// Returns `(columns, sample_rows)`; a file with a header but no data rows
/// is rejected.
pub fn check_csv_bytes(bytes: &[u8]) -> Result<(usize, usize), String> {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let columns = rdr.headers().map_err(|e| e.to_string())?.len();
    if columns < 2 {
        return Err(format!("expected a delimited header, found {columns} column(s)"));
    }
    let mut rows = 0;
    for rec in rdr.records().take(SAMPLE_ROWS) {
        rec.map_err(|e| e.to_string())?;
        rows += 1;
    }
    if rows == 0 {
        return Err("no data rows".into());
    }
    Ok((columns, rows))
}

/// Size, hash, and a parse check over the first few rows.
pub fn inspect_file(path: &Path) -> Result<FileReport, DataError> {
    if !path.exists() {
        return Ok(FileReport {
            exists: false,
            size_mb: 0.0,
            blake3: None,
            readable: false,
            columns: 0,
            sample_rows: 0,
        });
    }

    let bytes = fs::read(path).map_err(|e| DataError::io(path, e))?;
    let size_mb = ((bytes.len() as f64 / (1024.0 * 1024.0)) * 100.0).round() / 100.0;
    let hash = blake3::hash(&bytes).to_hex().to_string();

    let (readable, columns, sample_rows) = match check_csv_bytes(&bytes) {
        Ok((columns, rows)) => (true, columns, rows),
        Err(reason) => {
            tracing::warn!(path = %path.display(), %reason, "file failed CSV check");
            (false, 0, 0)
        }
    };

    tracing::info!(path = %path.display(), size_mb, hash = %hash, readable, "file check");
    Ok(FileReport {
        exists: true,
        size_mb,
        blake3: Some(hash),
        readable,
        columns,
        sample_rows,
    })
}
