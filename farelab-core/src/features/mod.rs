//! Feature engineering: typed flight records to a dense numeric matrix.
//!
//! The encoder is fitted on training rows only. Its vocabularies travel with
//! the fitted model, so prediction-time rows are encoded with exactly the
//! columns the model was trained on.

pub mod store;

use crate::domain::FlightRecord;
use chrono::{Datelike, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

pub use store::{read_matrix, write_matrix, TARGET_COLUMN};

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("cannot fit an encoder on zero rows")]
    EmptyInput,

    #[error("feature width mismatch: expected {expected}, found {found}")]
    WidthMismatch { expected: usize, found: usize },

    #[error("feature file is missing column '{0}'")]
    MissingColumn(String),

    #[error("parquet error: {0}")]
    Parquet(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Value used for a missing aircraft type.
pub const UNKNOWN_AIRCRAFT: &str = "Unknown";

/// Numeric and temporal features, in matrix column order.
pub const NUMERIC_FEATURES: [&str; 10] = [
    "duration_hrs",
    "days_before_departure",
    "stopovers",
    "class_ordinal",
    "departure_month",
    "departure_weekday",
    "departure_hour",
    "is_weekend",
    "arrival_hour",
    "is_overnight",
];

/// Columns one-hot encoded by the fitted encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoricalField {
    Airline,
    Source,
    Destination,
    AircraftType,
    BookingSource,
    Seasonality,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 6] = [
        CategoricalField::Airline,
        CategoricalField::Source,
        CategoricalField::Destination,
        CategoricalField::AircraftType,
        CategoricalField::BookingSource,
        CategoricalField::Seasonality,
    ];

    /// Prefix used in feature names: `{prefix}={value}`.
    pub fn prefix(self) -> &'static str {
        match self {
            CategoricalField::Airline => "airline",
            CategoricalField::Source => "source",
            CategoricalField::Destination => "destination",
            CategoricalField::AircraftType => "aircraft_type",
            CategoricalField::BookingSource => "booking_source",
            CategoricalField::Seasonality => "seasonality",
        }
    }

    pub fn value(self, r: &FlightRecord) -> &str {
        match self {
            CategoricalField::Airline => &r.airline,
            CategoricalField::Source => &r.source,
            CategoricalField::Destination => &r.destination,
            CategoricalField::AircraftType => r.aircraft_type.as_deref().unwrap_or(UNKNOWN_AIRCRAFT),
            CategoricalField::BookingSource => &r.booking_source,
            CategoricalField::Seasonality => &r.seasonality,
        }
    }
}

/// Sorted vocabulary of one categorical field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub field: CategoricalField,
    pub values: Vec<String>,
}

impl Vocabulary {
    fn index_of(&self, value: &str) -> Option<usize> {
        self.values
            .binary_search_by(|v| v.as_str().cmp(value))
            .ok()
    }
}

/// Bangladesh's weekend falls on Friday and Saturday.
fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Fri | Weekday::Sat)
}

/// Numeric and temporal features of one record, in `NUMERIC_FEATURES` order.
pub fn numeric_features(r: &FlightRecord) -> [f64; 10] {
    let dep = r.departure;
    let arr = r.arrival;
    [
        r.duration_hrs,
        f64::from(r.days_before_departure),
        f64::from(r.stopovers),
        r.class.ordinal(),
        f64::from(dep.month()),
        f64::from(dep.weekday().num_days_from_monday()),
        f64::from(dep.hour()),
        if is_weekend(dep.weekday()) { 1.0 } else { 0.0 },
        f64::from(arr.hour()),
        if arr.date() > dep.date() { 1.0 } else { 0.0 },
    ]
}

/// Fitted feature encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    vocabularies: Vec<Vocabulary>,
}

impl FeatureEncoder {
    /// Learn vocabularies from training records.
    pub fn fit(records: &[FlightRecord]) -> Result<Self, FeatureError> {
        if records.is_empty() {
            return Err(FeatureError::EmptyInput);
        }
        let vocabularies = CategoricalField::ALL
            .iter()
            .map(|&field| {
                let values: BTreeSet<&str> = records.iter().map(|r| field.value(r)).collect();
                Vocabulary {
                    field,
                    values: values.into_iter().map(str::to_string).collect(),
                }
            })
            .collect();
        let enc = Self { vocabularies };
        tracing::info!(rows = records.len(), width = enc.width(), "fitted feature encoder");
        Ok(enc)
    }

    pub fn vocabularies(&self) -> &[Vocabulary] {
        &self.vocabularies
    }

    /// Number of columns produced per row.
    pub fn width(&self) -> usize {
        NUMERIC_FEATURES.len()
            + self
                .vocabularies
                .iter()
                .map(|v| v.values.len())
                .sum::<usize>()
    }

    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect();
        for vocab in &self.vocabularies {
            for value in &vocab.values {
                names.push(format!("{}={value}", vocab.field.prefix()));
            }
        }
        names
    }

    /// Encode one record. Categories unseen at fit time leave their block zero.
    pub fn encode(&self, r: &FlightRecord) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.width());
        row.extend_from_slice(&numeric_features(r));
        for vocab in &self.vocabularies {
            let start = row.len();
            row.resize(start + vocab.values.len(), 0.0);
            if let Some(i) = vocab.index_of(vocab.field.value(r)) {
                row[start + i] = 1.0;
            }
        }
        row
    }

    /// Encode records with `Total Fare` as the target.
    pub fn transform(&self, records: &[FlightRecord]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.feature_names(),
            rows: records.iter().map(|r| self.encode(r)).collect(),
            targets: records.iter().map(|r| r.total_fare).collect(),
        }
    }
}

/// Row-major feature matrix with its targets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Rows selected by index, in the given order.
    pub fn select(&self, indices: &[usize]) -> FeatureMatrix {
        FeatureMatrix {
            names: self.names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
        }
    }

    /// Check every row has `names.len()` columns.
    pub fn check_width(&self) -> Result<(), FeatureError> {
        let expected = self.width();
        match self.rows.iter().find(|r| r.len() != expected) {
            Some(r) => Err(FeatureError::WidthMismatch {
                expected,
                found: r.len(),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CabinClass;
    use chrono::NaiveDate;

    pub(crate) fn record(airline: &str, dest: &str, aircraft: Option<&str>) -> FlightRecord {
        let dep = NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(22, 30, 0)
            .unwrap();
        FlightRecord {
            airline: airline.into(),
            source: "DAC".into(),
            source_name: "Dhaka".into(),
            destination: dest.into(),
            destination_name: "X".into(),
            departure: dep,
            arrival: dep + chrono::Duration::hours(3),
            duration_hrs: 3.0,
            stopovers: 1,
            aircraft_type: aircraft.map(str::to_string),
            class: CabinClass::Business,
            booking_source: "Online Website".into(),
            base_fare: 9000.0,
            tax_surcharge: 1000.0,
            total_fare: 10000.0,
            seasonality: "Regular".into(),
            days_before_departure: 20,
        }
    }

    #[test]
    fn temporal_features_decompose_departure() {
        let f = numeric_features(&record("Biman", "CGP", None));
        // 2025-03-14 is a Friday
        assert_eq!(f[4], 3.0);
        assert_eq!(f[5], 4.0);
        assert_eq!(f[6], 22.0);
        assert_eq!(f[7], 1.0);
        assert_eq!(f[8], 1.0);
        assert_eq!(f[9], 1.0);
        assert_eq!(f[3], 1.0);
    }

    #[test]
    fn one_hot_uses_sorted_vocabulary() {
        let recs = vec![record("Novoair", "CGP", Some("ATR 72")), record("Biman", "CXB", None)];
        let enc = FeatureEncoder::fit(&recs).unwrap();
        let names = enc.feature_names();
        assert_eq!(names.len(), enc.width());
        assert!(names.contains(&"airline=Biman".to_string()));
        assert!(names.contains(&"aircraft_type=Unknown".to_string()));

        let row = enc.encode(&recs[1]);
        let biman = names.iter().position(|n| n == "airline=Biman").unwrap();
        let novo = names.iter().position(|n| n == "airline=Novoair").unwrap();
        assert!(biman < novo);
        assert_eq!(row[biman], 1.0);
        assert_eq!(row[novo], 0.0);
    }

    #[test]
    fn unseen_category_encodes_as_zeros() {
        let enc = FeatureEncoder::fit(&[record("Biman", "CGP", None)]).unwrap();
        let row = enc.encode(&record("Air Astra", "CGP", None));
        assert_eq!(row.len(), enc.width());
        let names = enc.feature_names();
        let airline_cols: Vec<usize> = names
            .iter()
            .enumerate()
            .filter(|(_, n)| n.starts_with("airline="))
            .map(|(i, _)| i)
            .collect();
        assert!(airline_cols.iter().all(|&i| row[i] == 0.0));
    }

    #[test]
    fn fares_are_not_features() {
        let enc = FeatureEncoder::fit(&[record("Biman", "CGP", None)]).unwrap();
        assert!(enc
            .feature_names()
            .iter()
            .all(|n| !n.contains("fare") && !n.contains("tax")));
    }

    #[test]
    fn empty_fit_is_an_error() {
        assert!(matches!(FeatureEncoder::fit(&[]), Err(FeatureError::EmptyInput)));
    }
}
