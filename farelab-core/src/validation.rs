//! Schema and business-rule validation for raw flight data.
//!
//! Every rule is evaluated over every row; failures are collected rather
//! than stopping at the first one. Unknown extra columns are allowed.
//!
//! A missing required column is a schema error. Business rules never make a
//! dataset invalid, they only add warnings.

use crate::data::{read_raw, DataError, RawTable};
use crate::domain::{columns, parse_timestamp, RawFlightRow};
use crate::stats::{median, NumericSummary};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Total fare may differ from base + tax by this much before it is flagged.
pub const FARE_TOLERANCE_BDT: f64 = 1.0;

/// Columns identifying one scheduled flight.
pub const FLIGHT_KEY: [&str; 4] = [
    columns::AIRLINE,
    columns::SOURCE,
    columns::DESTINATION,
    columns::DEPARTURE,
];

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("failed to write report to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One check that failed. `row` is `None` for column-level failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureCase {
    pub row: Option<usize>,
    pub column: String,
    pub check: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Info => f.write_str("info"),
        }
    }
}

/// A business rule that matched some rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessWarning {
    pub rule: String,
    pub message: String,
    pub severity: Severity,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_rows: usize,
    pub total_columns: usize,
    /// Missing (blank or absent) values per known column present in the file.
    pub missing_values: BTreeMap<String, usize>,
    pub duplicate_rows: usize,
    pub fare_stats: Option<NumericSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<FailureCase>,
    pub warnings: Vec<BusinessWarning>,
    pub stats: DatasetStats,
}

impl ValidationReport {
    pub fn write_json(&self, path: &Path) -> Result<(), ValidationError> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ValidationError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        fs::write(path, json).map_err(|e| ValidationError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Failures grouped by `(column, check)` with counts, largest first.
    pub fn error_counts(&self) -> Vec<((String, String), usize)> {
        let mut counts: BTreeMap<(String, String), usize> = BTreeMap::new();
        for e in &self.errors {
            *counts.entry((e.column.clone(), e.check.clone())).or_default() += 1;
        }
        let mut out: Vec<_> = counts.into_iter().collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}

#[derive(Debug, Clone, Copy)]
enum Check {
    StrLen { min: usize, max: usize },
    Uppercase,
    Timestamp,
    Float,
    Integer,
    Gt(f64),
    Ge(f64),
    Lt(f64),
    IsIn(&'static [&'static str]),
}

impl Check {
    fn name(&self) -> String {
        match self {
            Check::StrLen { min, max } => format!("str_length({min}, {max})"),
            Check::Uppercase => "uppercase".into(),
            Check::Timestamp => "timestamp".into(),
            Check::Float => "dtype(float64)".into(),
            Check::Integer => "dtype(int64)".into(),
            Check::Gt(v) => format!("greater_than({v})"),
            Check::Ge(v) => format!("greater_than_or_equal_to({v})"),
            Check::Lt(v) => format!("less_than({v})"),
            Check::IsIn(vals) => format!("isin({vals:?})"),
        }
    }

    /// Type checks gate the value checks that follow them.
    fn is_type_check(&self) -> bool {
        matches!(self, Check::Float | Check::Integer | Check::Timestamp)
    }

    fn passes(&self, value: &str) -> bool {
        let num = || value.parse::<f64>().ok().filter(|v| v.is_finite());
        match *self {
            Check::StrLen { min, max } => (min..=max).contains(&value.chars().count()),
            Check::Uppercase => value.chars().any(char::is_alphabetic)
                && !value.chars().any(char::is_lowercase),
            Check::Timestamp => parse_timestamp(value).is_some(),
            Check::Float => num().is_some(),
            Check::Integer => num().is_some_and(|v| v.fract() == 0.0),
            Check::Gt(b) => num().is_some_and(|v| v > b),
            Check::Ge(b) => num().is_some_and(|v| v >= b),
            Check::Lt(b) => num().is_some_and(|v| v < b),
            Check::IsIn(vals) => vals.contains(&value),
        }
    }
}

struct ColumnRule {
    column: &'static str,
    nullable: bool,
    checks: Vec<Check>,
}

impl ColumnRule {
    fn new(column: &'static str, checks: Vec<Check>) -> Self {
        Self {
            column,
            nullable: false,
            checks,
        }
    }

    fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Checks raw flight data against the expected schema.
pub struct FlightValidator {
    rules: Vec<ColumnRule>,
}

impl Default for FlightValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FlightValidator {
    pub fn new() -> Self {
        use Check::*;
        let iata = || vec![StrLen { min: 2, max: 5 }, Uppercase];
        let rules = vec![
            ColumnRule::new(columns::AIRLINE, vec![StrLen { min: 3, max: 100 }]),
            ColumnRule::new(columns::SOURCE, iata()),
            ColumnRule::new(columns::SOURCE_NAME, vec![]),
            ColumnRule::new(columns::DESTINATION, iata()),
            ColumnRule::new(columns::DESTINATION_NAME, vec![]),
            ColumnRule::new(columns::DEPARTURE, vec![Timestamp]),
            ColumnRule::new(columns::ARRIVAL, vec![Timestamp]),
            ColumnRule::new(columns::DURATION, vec![Float, Gt(0.0), Lt(50.0)]),
            ColumnRule::new(columns::STOPOVERS, vec![]),
            ColumnRule::new(columns::AIRCRAFT_TYPE, vec![]).nullable(),
            ColumnRule::new(columns::CLASS, vec![IsIn(&["Economy", "Business", "First"])]),
            ColumnRule::new(columns::BOOKING_SOURCE, vec![]),
            ColumnRule::new(columns::BASE_FARE, vec![Float, Gt(0.0), Lt(1_000_000.0)]),
            ColumnRule::new(columns::TAX_SURCHARGE, vec![Float, Ge(0.0), Lt(500_000.0)]),
            ColumnRule::new(columns::TOTAL_FARE, vec![Float, Gt(0.0), Lt(1_500_000.0)]),
            ColumnRule::new(columns::SEASONALITY, vec![]),
            ColumnRule::new(columns::DAYS_BEFORE_DEPARTURE, vec![Integer, Ge(0.0), Lt(365.0)]),
        ];
        Self { rules }
    }

    /// Validate a table. Never fails: problems are reported, not raised.
    pub fn validate(&self, table: &RawTable) -> ValidationReport {
        let errors = self.schema_errors(table);
        let is_valid = errors.is_empty();
        if is_valid {
            tracing::info!(rows = table.len(), "schema validation passed");
        } else {
            tracing::warn!(failures = errors.len(), "schema validation failed");
        }

        ValidationReport {
            is_valid,
            errors,
            warnings: business_warnings(table),
            stats: dataset_stats(table),
        }
    }

    fn schema_errors(&self, table: &RawTable) -> Vec<FailureCase> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            if !table.has_column(rule.column) {
                errors.push(FailureCase {
                    row: None,
                    column: rule.column.to_string(),
                    check: "column_in_dataframe".into(),
                    value: None,
                });
                continue;
            }
            for (i, row) in table.rows.iter().enumerate() {
                let Some(value) = row.get(rule.column) else {
                    if !rule.nullable {
                        errors.push(FailureCase {
                            row: Some(i),
                            column: rule.column.to_string(),
                            check: "not_nullable".into(),
                            value: None,
                        });
                    }
                    continue;
                };
                for check in &rule.checks {
                    if !check.passes(value) {
                        errors.push(FailureCase {
                            row: Some(i),
                            column: rule.column.to_string(),
                            check: check.name(),
                            value: Some(value.to_string()),
                        });
                        if check.is_type_check() {
                            break;
                        }
                    }
                }
            }
        }
        errors
    }
}

/// Read and validate a CSV file.
pub fn validate_file(path: &Path) -> Result<ValidationReport, ValidationError> {
    let table = read_raw(path)?;
    tracing::info!(path = %path.display(), rows = table.len(), columns = table.headers.len(), "loaded dataset");
    Ok(FlightValidator::new().validate(&table))
}

/// Rows whose total fare differs from base + tax by more than the tolerance.
pub fn fare_mismatches(table: &RawTable) -> usize {
    table
        .rows
        .iter()
        .filter(|r| {
            match (
                r.get_f64(columns::BASE_FARE),
                r.get_f64(columns::TAX_SURCHARGE),
                r.get_f64(columns::TOTAL_FARE),
            ) {
                (Some(b), Some(t), Some(total)) => (b + t - total).abs() > FARE_TOLERANCE_BDT,
                _ => false,
            }
        })
        .count()
}

/// Rows repeating an earlier row's values on `key` columns.
pub fn count_duplicates(rows: &[RawFlightRow], key: &[&str]) -> usize {
    let mut seen = HashSet::with_capacity(rows.len());
    rows.iter()
        .filter(|r| {
            let k: Vec<Option<&str>> = key.iter().map(|c| r.get(c)).collect();
            !seen.insert(k)
        })
        .count()
}

/// Parsed total fares, skipping unparseable values.
pub fn total_fares(table: &RawTable) -> Vec<f64> {
    table
        .rows
        .iter()
        .filter_map(|r| r.get_f64(columns::TOTAL_FARE))
        .collect()
}

fn business_warnings(table: &RawTable) -> Vec<BusinessWarning> {
    let mut warnings = Vec::new();

    let fare_cols = [columns::BASE_FARE, columns::TAX_SURCHARGE, columns::TOTAL_FARE];
    if fare_cols.iter().all(|c| table.has_column(c)) {
        let n = fare_mismatches(table);
        if n > 0 {
            warnings.push(BusinessWarning {
                rule: "Total Fare Calculation".into(),
                message: format!("{n} rows have Total Fare != Base Fare + Tax"),
                severity: Severity::Warning,
                count: n,
            });
        }
    }

    if FLIGHT_KEY.iter().all(|c| table.has_column(c)) {
        let n = count_duplicates(&table.rows, &FLIGHT_KEY);
        if n > 0 {
            warnings.push(BusinessWarning {
                rule: "Duplicate Flights".into(),
                message: format!("{n} potential duplicate flight records found"),
                severity: Severity::Info,
                count: n,
            });
        }
    }

    if table.has_column(columns::TOTAL_FARE) {
        let fares = total_fares(table);
        if let Some(m) = median(&fares) {
            let n = fares.iter().filter(|f| **f > m * 10.0 || **f < m * 0.1).count();
            if n > 0 {
                warnings.push(BusinessWarning {
                    rule: "Fare Outliers".into(),
                    message: format!("{n} rows with extreme fares (10x or 0.1x median)"),
                    severity: Severity::Info,
                    count: n,
                });
            }
        }
    }

    for w in &warnings {
        tracing::warn!(rule = %w.rule, count = w.count, "business rule");
    }
    warnings
}

fn dataset_stats(table: &RawTable) -> DatasetStats {
    let missing_values = columns::ALL
        .iter()
        .filter(|c| table.has_column(c))
        .map(|c| {
            let n = table.rows.iter().filter(|r| r.get(c).is_none()).count();
            (c.to_string(), n)
        })
        .collect();

    let fare_stats = if table.has_column(columns::TOTAL_FARE) {
        NumericSummary::of(&total_fares(table))
    } else {
        None
    };

    DatasetStats {
        total_rows: table.len(),
        total_columns: table.headers.len(),
        missing_values,
        duplicate_rows: count_duplicates(&table.rows, &columns::ALL),
        fare_stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::read_raw_from;

    const HEADER: &str = "Airline,Source,Source Name,Destination,Destination Name,Departure Date & Time,Arrival Date & Time,Duration (hrs),Stopovers,Aircraft Type,Class,Booking Source,Base Fare (BDT),Tax & Surcharge (BDT),Total Fare (BDT),Seasonality,Days Before Departure";

    fn row(airline: &str, dep: &str, class: &str, base: &str, tax: &str, total: &str) -> String {
        format!(
            "{airline},DAC,Dhaka,CGP,Chittagong,{dep},2025-01-10 23:00:00,1.5,Direct,ATR 72,{class},Online Website,{base},{tax},{total},Regular,10"
        )
    }

    fn table(rows: &[String]) -> RawTable {
        let csv = format!("{HEADER}\n{}\n", rows.join("\n"));
        read_raw_from(csv.as_bytes()).unwrap()
    }

    #[test]
    fn clean_data_is_valid() {
        let t = table(&[
            row("Biman", "2025-01-10 08:00:00", "Economy", "4000", "600", "4600"),
            row("Novoair", "2025-01-11 08:00:00", "Business", "9000", "1000", "10000"),
        ]);
        let report = FlightValidator::new().validate(&t);
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.warnings.is_empty());
        assert_eq!(report.stats.total_rows, 2);
        assert_eq!(report.stats.total_columns, 17);
    }

    #[test]
    fn invalid_class_and_negative_fare_are_errors() {
        let t = table(&[row("Biman", "2025-01-10 08:00:00", "Premium", "-5", "600", "595")]);
        let report = FlightValidator::new().validate(&t);
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.column == columns::CLASS));
        assert!(report
            .errors
            .iter()
            .any(|e| e.column == columns::BASE_FARE && e.check == "greater_than(0)"));
    }

    #[test]
    fn flags_fare_mismatch_and_duplicate_flight() {
        let t = table(&[
            row("Biman", "2025-01-10 08:00:00", "Economy", "4000", "600", "4700"),
            row("Biman", "2025-01-10 08:00:00", "Economy", "4000", "600", "4600"),
        ]);
        let report = FlightValidator::new().validate(&t);
        let rules: Vec<&str> = report.warnings.iter().map(|w| w.rule.as_str()).collect();
        assert!(rules.contains(&"Total Fare Calculation"));
        assert!(rules.contains(&"Duplicate Flights"));
        let mismatch = &report.warnings[0];
        assert_eq!(mismatch.severity, Severity::Warning);
        assert_eq!(mismatch.count, 1);
    }

    #[test]
    fn fare_within_tolerance_is_not_flagged() {
        let t = table(&[row("Biman", "2025-01-10 08:00:00", "Economy", "4000", "600", "4600.5")]);
        assert_eq!(fare_mismatches(&t), 0);
    }

    #[test]
    fn missing_column_is_schema_error() {
        let csv = "Airline,Source\nBiman,DAC\n";
        let t = read_raw_from(csv.as_bytes()).unwrap();
        let report = FlightValidator::new().validate(&t);
        assert!(!report.is_valid);
        assert!(report
            .errors
            .iter()
            .any(|e| e.column == columns::TOTAL_FARE && e.check == "column_in_dataframe"));
    }

    #[test]
    fn null_aircraft_type_is_allowed() {
        let line = row("Biman", "2025-01-10 08:00:00", "Economy", "4000", "600", "4600")
            .replace("ATR 72", "");
        let report = FlightValidator::new().validate(&table(&[line]));
        assert!(report.is_valid, "{:?}", report.errors);
        assert_eq!(report.stats.missing_values[columns::AIRCRAFT_TYPE], 1);
    }

    #[test]
    fn exact_duplicate_rows_counted() {
        let r = row("Biman", "2025-01-10 08:00:00", "Economy", "4000", "600", "4600");
        let report = FlightValidator::new().validate(&table(&[r.clone(), r.clone(), r]));
        assert_eq!(report.stats.duplicate_rows, 2);
    }

    #[test]
    fn lowercase_iata_code_fails() {
        let line = row("Biman", "2025-01-10 08:00:00", "Economy", "4000", "600", "4600")
            .replacen("DAC", "dac", 1);
        let report = FlightValidator::new().validate(&table(&[line]));
        assert!(report
            .errors
            .iter()
            .any(|e| e.column == columns::SOURCE && e.check == "uppercase"));
    }
}
