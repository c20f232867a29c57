//! Pull the expected CSV out of a downloaded payload.

use super::provider::DataError;
use std::io::{Cursor, Read};
use std::path::Path;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Largest expansion ratio trusted when pre-sizing the output buffer.
const MAX_RESERVE_RATIO: u64 = 64;

/// Whether the payload looks like a zip archive.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Extract `expected` from a zip payload. A non-zip payload is taken to be
/// the file itself.
///
/// Entries are matched on their final path component, so archives that nest
/// the CSV in a folder still resolve.
pub fn extract_expected(bytes: &[u8], expected: &str) -> Result<Vec<u8>, DataError> {
    if bytes.is_empty() {
        return Err(DataError::Archive("empty response body".into()));
    }
    if !is_zip(bytes) {
        return Ok(bytes.to_vec());
    }

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| DataError::Archive(format!("invalid zip archive: {e}")))?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let entry_name = names
        .iter()
        .find(|name| {
            Path::new(name)
                .file_name()
                .and_then(|f| f.to_str())
                .is_some_and(|f| f == expected)
        })
        .cloned()
        .ok_or_else(|| DataError::FileMissingFromArchive {
            expected: expected.to_string(),
            found: names.clone(),
        })?;

    let mut file = archive
        .by_name(&entry_name)
        .map_err(|e| DataError::Archive(format!("reading '{entry_name}': {e}")))?;
    let mut out = Vec::with_capacity(reserve_hint(file.size(), bytes.len()));
    file.read_to_end(&mut out)
        .map_err(|e| DataError::Archive(format!("decompressing '{entry_name}': {e}")))?;
    Ok(out)
}

/// Buffer size to reserve for an entry. The declared size comes from the
/// archive header and is capped relative to the compressed payload.
fn reserve_hint(declared: u64, payload_len: usize) -> usize {
    let cap = (payload_len as u64).saturating_mul(MAX_RESERVE_RATIO);
    usize::try_from(declared.min(cap)).unwrap_or(0)
}
