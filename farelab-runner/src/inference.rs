//! Evaluation and batch prediction with a saved pipeline.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use farelab_core::data::stages::{hash_file, require_input, short_hash, write_new};
use farelab_core::data::{read_raw, Stage, StageLayout, WriteOutcome};
use farelab_core::domain::flight::{columns, CANONICAL_TIMESTAMP};
use farelab_core::domain::{FlightRecord, RawFlightRow, RecordError};
use farelab_core::features::UNKNOWN_AIRCRAFT;

use crate::artifacts::FittedPipeline;
use crate::metrics::RegressionMetrics;
use crate::pipeline::{dataset_hash, load_clean, PipelineError};
use crate::split::train_test_split;
use crate::trainer::RunError;

/// Held-out metrics for a saved pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub run_id: String,
    pub input: PathBuf,
    pub rows: usize,
    pub test_rows: usize,
    pub metrics: RegressionMetrics,
    /// False when `input` is not the data the pipeline was trained on; the
    /// re-derived test rows may then overlap training rows.
    pub dataset_matches: bool,
}

/// Re-derive the pipeline's held-out split on `input` and score it.
pub fn evaluate(pipeline: &FittedPipeline, input: &Path) -> Result<EvaluationReport, RunError> {
    let cleaned = load_clean(input)?;
    let records = cleaned.records;
    let dataset_matches = dataset_hash(&records)? == pipeline.dataset_hash;
    if !dataset_matches {
        warn!(
            input = %input.display(),
            "input differs from the training data; held-out rows may not be unseen"
        );
    }

    let split = train_test_split(records.len(), pipeline.split);
    let test: Vec<FlightRecord> = split.test.iter().map(|&i| records[i].clone()).collect();
    let actual: Vec<f64> = test.iter().map(|r| r.total_fare).collect();
    let predicted = pipeline.predict_records(&test)?;
    let metrics = RegressionMetrics::compute(&actual, &predicted);

    info!(run_id = %short_hash(&pipeline.run_id), rmse = metrics.rmse, r2 = metrics.r2, "evaluation complete");
    Ok(EvaluationReport {
        run_id: pipeline.run_id.clone(),
        input: input.to_path_buf(),
        rows: records.len(),
        test_rows: test.len(),
        metrics,
        dataset_matches,
    })
}

/// Result of a batch prediction.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionReport {
    pub output: PathBuf,
    #[serde(skip)]
    pub outcome: WriteOutcome,
    pub rows: usize,
    pub skipped: usize,
    /// Present when the input carried `Total Fare (BDT)` for at least one row.
    pub metrics: Option<RegressionMetrics>,
}

/// Parse a row for scoring. Fare columns may be absent; the actual total
/// fare is returned when present.
pub fn prediction_record(raw: &RawFlightRow) -> Result<(FlightRecord, Option<f64>), RecordError> {
    let actual = raw.get_f64(columns::TOTAL_FARE);
    let mut row = raw.clone();
    for field in [&mut row.base_fare, &mut row.tax_surcharge, &mut row.total_fare] {
        if field.as_deref().map_or(true, |s| s.trim().is_empty()) {
            *field = Some("0".to_string());
        }
    }
    let mut record = FlightRecord::try_from(&row)?;
    if record.aircraft_type.is_none() {
        record.aircraft_type = Some(UNKNOWN_AIRCRAFT.to_string());
    }
    Ok((record, actual))
}

const OUTPUT_HEADER: [&str; 7] = [
    columns::AIRLINE,
    columns::SOURCE,
    columns::DESTINATION,
    columns::DEPARTURE,
    columns::CLASS,
    "predicted_total_fare",
    "actual_total_fare",
];

/// Score every row of `input` and write
/// `04-predictions/predictions_<run>_<hash>.csv`.
pub fn predict(
    pipeline: &FittedPipeline,
    layout: &StageLayout,
    input: &Path,
) -> Result<PredictionReport, RunError> {
    require_input(input)?;
    let input_hash = hash_file(input)?;
    let table = read_raw(input)?;

    let mut records = Vec::with_capacity(table.len());
    let mut actuals = Vec::with_capacity(table.len());
    let mut skipped = 0;
    for (i, raw) in table.rows.iter().enumerate() {
        match prediction_record(raw) {
            Ok((rec, actual)) => {
                records.push(rec);
                actuals.push(actual);
            }
            Err(e) => {
                skipped += 1;
                tracing::debug!(row = i, reason = %e, "row skipped");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, rows = table.len(), "rows could not be scored");
    }
    if records.is_empty() {
        return Err(PipelineError::NoUsableRows {
            path: input.to_path_buf(),
            rows: table.len(),
        }
        .into());
    }

    let predicted = pipeline.predict_records(&records)?;

    let mut wtr = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| RunError::Csv(e.to_string());
    wtr.write_record(OUTPUT_HEADER).map_err(csv_err)?;
    for ((rec, pred), actual) in records.iter().zip(&predicted).zip(&actuals) {
        let departure = rec.departure.format(CANONICAL_TIMESTAMP).to_string();
        let actual = actual.map(|a| a.to_string()).unwrap_or_default();
        wtr.write_record([
            rec.airline.as_str(),
            rec.source.as_str(),
            rec.destination.as_str(),
            departure.as_str(),
            rec.class.as_str(),
            format!("{pred:.2}").as_str(),
            actual.as_str(),
        ])
        .map_err(csv_err)?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| RunError::Csv(format!("flushing predictions: {e}")))?;

    let stem = format!("predictions_{}", short_hash(&pipeline.run_id));
    let output = layout.content_path(Stage::Predictions, &stem, &input_hash, "csv");
    let outcome = write_new(&output, &bytes)?;

    let (a, p): (Vec<f64>, Vec<f64>) = actuals
        .iter()
        .zip(&predicted)
        .filter_map(|(a, p)| a.map(|a| (a, *p)))
        .unzip();
    let metrics = (!a.is_empty()).then(|| RegressionMetrics::compute(&a, &p));

    info!(output = %output.display(), rows = records.len(), "predictions written");
    Ok(PredictionReport {
        output,
        outcome,
        rows: records.len(),
        skipped,
        metrics,
    })
}
