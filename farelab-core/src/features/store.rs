//! Parquet persistence for feature matrices.
//!
//! One `f64` column per feature in matrix order, plus a trailing `target`
//! column. Writes go to `{file}.part` and are renamed into place.

use super::{FeatureError, FeatureMatrix};
use crate::data::stages::{part_path, WriteOutcome};
use polars::prelude::*;
use std::fs;
use std::path::Path;

/// Name of the target column in feature files.
pub const TARGET_COLUMN: &str = "target";

fn parquet_err(context: &str) -> impl Fn(PolarsError) -> FeatureError + '_ {
    move |e| FeatureError::Parquet(format!("{context}: {e}"))
}

fn to_dataframe(matrix: &FeatureMatrix) -> Result<DataFrame, FeatureError> {
    matrix.check_width()?;
    let mut cols: Vec<Column> = Vec::with_capacity(matrix.width() + 1);
    for (j, name) in matrix.names.iter().enumerate() {
        let values: Vec<f64> = matrix.rows.iter().map(|r| r[j]).collect();
        cols.push(Column::new(name.as_str().into(), values));
    }
    cols.push(Column::new(TARGET_COLUMN.into(), matrix.targets.clone()));
    DataFrame::new(cols).map_err(parquet_err("dataframe creation"))
}

/// Write a matrix unless the content-named file already exists.
pub fn write_matrix(path: &Path, matrix: &FeatureMatrix) -> Result<WriteOutcome, FeatureError> {
    if path.exists() {
        tracing::info!(path = %path.display(), "feature file already present, reusing");
        return Ok(WriteOutcome::Reused);
    }
    let mut df = to_dataframe(matrix)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FeatureError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let tmp = part_path(path);
    let file = fs::File::create(&tmp).map_err(|e| FeatureError::Io {
        path: tmp.clone(),
        source: e,
    })?;
    if let Err(e) = ParquetWriter::new(file).finish(&mut df) {
        let _ = fs::remove_file(&tmp);
        return Err(FeatureError::Parquet(format!("write parquet: {e}")));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        FeatureError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    })?;

    tracing::info!(path = %path.display(), rows = matrix.len(), width = matrix.width(), "wrote feature matrix");
    Ok(WriteOutcome::Written)
}

/// Read a matrix written by [`write_matrix`].
pub fn read_matrix(path: &Path) -> Result<FeatureMatrix, FeatureError> {
    let file = fs::File::open(path).map_err(|e| FeatureError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(parquet_err("read parquet"))?;

    let names: Vec<String> = df
        .get_columns()
        .iter()
        .map(|c| c.name().as_str().to_string())
        .filter(|n| n != TARGET_COLUMN)
        .collect();

    let n = df.height();
    let mut rows = vec![Vec::with_capacity(names.len()); n];
    for name in &names {
        let ca = df
            .column(name)
            .map_err(parquet_err("column read"))?
            .f64()
            .map_err(parquet_err("column type"))?;
        for (i, row) in rows.iter_mut().enumerate() {
            row.push(ca.get(i).unwrap_or(f64::NAN));
        }
    }

    let target = df
        .column(TARGET_COLUMN)
        .map_err(|_| FeatureError::MissingColumn(TARGET_COLUMN.to_string()))?
        .f64()
        .map_err(parquet_err("target column type"))?;
    let targets = (0..n).map(|i| target.get(i).unwrap_or(f64::NAN)).collect();

    Ok(FeatureMatrix {
        names,
        rows,
        targets,
    })
}
