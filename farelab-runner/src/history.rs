//! Experiment history: JSONL append-only run log.
//!
//! One `RunRecord` per training run, one JSON object per line. Lines that
//! fail to parse are skipped with a warning, so a truncated write never
//! makes the whole history unreadable.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use farelab_core::models::{ModelKind, ModelParams};

use crate::metrics::RegressionMetrics;
use crate::trainer::TrainingResult;

/// One training run as stored in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: ModelKind,
    pub params: ModelParams,
    pub train_metrics: RegressionMetrics,
    pub test_metrics: RegressionMetrics,
    #[serde(default)]
    pub cv_rmse: Option<f64>,
    pub dataset_hash: String,
    #[serde(default)]
    pub artifact_path: Option<PathBuf>,
    pub tuned: bool,
    pub train_rows: usize,
    pub test_rows: usize,
    pub duration_ms: u64,
}

impl RunRecord {
    pub fn from_result(result: &TrainingResult, timestamp: DateTime<Utc>) -> Self {
        Self {
            run_id: result.run_id.clone(),
            timestamp,
            kind: result.kind,
            params: result.params.clone(),
            train_metrics: result.train_metrics,
            test_metrics: result.test_metrics,
            cv_rmse: result.cv_rmse,
            dataset_hash: result.dataset_hash.clone(),
            artifact_path: result.artifact_path.clone(),
            tuned: result.tuned,
            train_rows: result.train_rows,
            test_rows: result.test_rows,
            duration_ms: result.duration_ms,
        }
    }
}

/// Test-set metric used to rank runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankMetric {
    R2,
    Mae,
    Rmse,
    Mape,
}

impl RankMetric {
    fn value(self, m: &RegressionMetrics) -> f64 {
        match self {
            RankMetric::R2 => m.r2,
            RankMetric::Mae => m.mae,
            RankMetric::Rmse => m.rmse,
            RankMetric::Mape => m.mape,
        }
    }

    pub fn higher_is_better(self) -> bool {
        matches!(self, RankMetric::R2)
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RankMetric::R2 => "r2",
            RankMetric::Mae => "mae",
            RankMetric::Rmse => "rmse",
            RankMetric::Mape => "mape",
        })
    }
}

impl FromStr for RankMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r2" | "r²" => Ok(RankMetric::R2),
            "mae" => Ok(RankMetric::Mae),
            "rmse" => Ok(RankMetric::Rmse),
            "mape" => Ok(RankMetric::Mape),
            other => Err(format!("unknown metric '{other}' (expected r2, mae, rmse or mape)")),
        }
    }
}

/// JSONL history file manager.
pub struct RunHistory {
    path: PathBuf,
}

impl RunHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the file and its directory if needed.
    pub fn append(&self, record: &RunRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Read every well-formed record, in file order.
    pub fn read_all(&self) -> io::Result<Vec<RunRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = fs::File::open(&self.path)?;
        let reader = io::BufReader::new(file);
        let mut records = Vec::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RunRecord>(&line) {
                Ok(r) => records.push(r),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed history line"
                ),
            }
        }

        Ok(records)
    }

    /// Records sorted by test RMSE, best first, at most `limit` of them.
    pub fn list(&self, limit: Option<usize>) -> io::Result<Vec<RunRecord>> {
        let mut records = self.read_all()?;
        sort_by_metric(&mut records, RankMetric::Rmse);
        if let Some(n) = limit {
            records.truncate(n);
        }
        Ok(records)
    }

    /// Best run by a test metric.
    pub fn best_by(&self, metric: RankMetric) -> io::Result<Option<RunRecord>> {
        let mut records = self.read_all()?;
        sort_by_metric(&mut records, metric);
        Ok(records.into_iter().next())
    }
}

/// Stable sort, best first. Earlier runs win ties.
pub fn sort_by_metric(records: &mut [RunRecord], metric: RankMetric) {
    records.sort_by(|a, b| {
        let (va, vb) = (metric.value(&a.test_metrics), metric.value(&b.test_metrics));
        if metric.higher_is_better() {
            vb.total_cmp(&va)
        } else {
            va.total_cmp(&vb)
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use farelab_core::models::LinearParams;

    fn record(id: &str, rmse: f64, r2: f64) -> RunRecord {
        RunRecord {
            run_id: id.to_string(),
            timestamp: DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            kind: ModelKind::Linear,
            params: ModelParams::Linear(LinearParams::default()),
            train_metrics: RegressionMetrics::default(),
            test_metrics: RegressionMetrics {
                r2,
                mae: rmse * 0.8,
                rmse,
                mape: 10.0,
                count: 20,
            },
            cv_rmse: None,
            dataset_hash: "abc".into(),
            artifact_path: None,
            tuned: false,
            train_rows: 80,
            test_rows: 20,
            duration_ms: 5,
        }
    }

    #[test]
    fn append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let history = RunHistory::new(dir.path().join("runs").join("history.jsonl"));
        history.append(&record("a", 3.0, 0.5)).unwrap();
        history.append(&record("b", 1.0, 0.9)).unwrap();

        let all = history.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], record("a", 3.0, 0.5));
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let history = RunHistory::new(dir.path().join("history.jsonl"));
        history.append(&record("a", 3.0, 0.5)).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(history.path()).unwrap();
            writeln!(f, "{{not json").unwrap();
            writeln!(f).unwrap();
        }
        history.append(&record("b", 1.0, 0.9)).unwrap();

        let ids: Vec<String> = history.read_all().unwrap().into_iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = RunHistory::new(dir.path().join("none.jsonl"));
        assert!(history.read_all().unwrap().is_empty());
        assert!(history.best_by(RankMetric::Rmse).unwrap().is_none());
    }

    #[test]
    fn list_sorts_by_rmse_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let history = RunHistory::new(dir.path().join("h.jsonl"));
        for (id, rmse) in [("a", 5.0), ("b", 1.0), ("c", 3.0)] {
            history.append(&record(id, rmse, 0.0)).unwrap();
        }
        let ids: Vec<String> = history.list(Some(2)).unwrap().into_iter().map(|r| r.run_id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn best_by_respects_metric_direction() {
        let dir = tempfile::tempdir().unwrap();
        let history = RunHistory::new(dir.path().join("h.jsonl"));
        history.append(&record("low_rmse", 1.0, 0.2)).unwrap();
        history.append(&record("high_r2", 4.0, 0.95)).unwrap();

        assert_eq!(history.best_by(RankMetric::Rmse).unwrap().unwrap().run_id, "low_rmse");
        assert_eq!(history.best_by(RankMetric::R2).unwrap().unwrap().run_id, "high_r2");
    }

    #[test]
    fn metric_names_parse() {
        assert_eq!("RMSE".parse::<RankMetric>().unwrap(), RankMetric::Rmse);
        assert_eq!("r2".parse::<RankMetric>().unwrap(), RankMetric::R2);
        assert!("accuracy".parse::<RankMetric>().is_err());
    }
}
