//! Data-quality and exploratory summary of a raw flight table.

use crate::data::RawTable;
use crate::domain::{columns, RawFlightRow};
use crate::stats::{iqr_outliers, NumericSummary};
use crate::validation::{count_duplicates, fare_mismatches, total_fares, FLIGHT_KEY};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Categorical columns given a top-values breakdown.
pub const CATEGORICAL: [&str; 5] = [
    columns::AIRLINE,
    columns::CLASS,
    columns::STOPOVERS,
    columns::SEASONALITY,
    columns::BOOKING_SOURCE,
];

const TOP_N: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnOverview {
    pub name: String,
    pub unique: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueShare {
    pub value: String,
    pub count: usize,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalBreakdown {
    pub column: String,
    pub distinct: usize,
    pub top: Vec<ValueShare>,
}

/// Mean total fare for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupFare {
    pub key: String,
    pub mean_fare: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Percent of rows with no missing known value.
    pub completeness: f64,
    /// Percent of rows that are not exact duplicates.
    pub uniqueness: f64,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub rows: usize,
    pub columns: Vec<ColumnOverview>,
    pub missing_total: usize,
    pub duplicate_rows: usize,
    pub duplicate_flights: usize,
    pub numeric: Vec<(String, NumericSummary)>,
    pub categorical: Vec<CategoricalBreakdown>,
    pub fare_by_airline: Vec<GroupFare>,
    pub top_routes: Vec<GroupFare>,
    pub fare_by_season: Vec<GroupFare>,
    pub fare_by_class: Vec<GroupFare>,
    pub quality: QualityScore,
    pub fare_mismatches: usize,
    pub fare_outliers: usize,
    pub recommendations: Vec<String>,
}

/// Build the summary for a table. Empty tables give an all-zero report.
pub fn summarize(table: &RawTable) -> SummaryReport {
    let rows = table.len();
    let known: Vec<&str> = columns::ALL
        .iter()
        .copied()
        .filter(|c| table.has_column(c))
        .collect();

    let overview: Vec<ColumnOverview> = known
        .iter()
        .map(|c| {
            let values: HashSet<&str> = table.rows.iter().filter_map(|r| r.get(c)).collect();
            ColumnOverview {
                name: c.to_string(),
                unique: values.len(),
                missing: table.rows.iter().filter(|r| r.get(c).is_none()).count(),
            }
        })
        .collect();
    let missing_total: usize = overview.iter().map(|c| c.missing).sum();

    let duplicate_rows = count_duplicates(&table.rows, &columns::ALL);
    let duplicate_flights = if FLIGHT_KEY.iter().all(|c| table.has_column(c)) {
        count_duplicates(&table.rows, &FLIGHT_KEY)
    } else {
        0
    };

    let numeric = columns::NUMERIC
        .iter()
        .filter(|c| table.has_column(c))
        .filter_map(|c| {
            let vals: Vec<f64> = table.rows.iter().filter_map(|r| r.get_f64(c)).collect();
            NumericSummary::of(&vals).map(|s| (c.to_string(), s))
        })
        .collect();

    let categorical = CATEGORICAL
        .iter()
        .filter(|c| table.has_column(c))
        .map(|c| categorical_breakdown(table, c))
        .collect();

    let route = |r: &RawFlightRow| {
        Some(format!(
            "{} → {}",
            r.get(columns::SOURCE)?,
            r.get(columns::DESTINATION)?
        ))
    };
    let column_key = |col: &'static str| {
        move |r: &RawFlightRow| r.get(col).map(str::to_string)
    };

    let mut fare_by_airline = group_fares(table, column_key(columns::AIRLINE));
    fare_by_airline.truncate(TOP_N);

    let mut top_routes = group_fares(table, route);
    top_routes.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    top_routes.truncate(TOP_N);

    let fare_by_season = group_fares(table, column_key(columns::SEASONALITY));
    let fare_by_class = group_fares(table, column_key(columns::CLASS));

    let quality = quality_score(table, &known, duplicate_rows);
    let fare_mismatches = fare_mismatches(table);
    let fare_outliers = iqr_outliers(&total_fares(table));

    let mut recommendations = Vec::new();
    if missing_total > 0 {
        recommendations.push("Handle missing values with an imputation strategy".to_string());
    }
    if duplicate_rows > 0 {
        recommendations.push("Investigate and remove duplicate rows".to_string());
    }
    if fare_mismatches > 0 {
        recommendations.push(format!(
            "Verify {fare_mismatches} rows with fare calculation mismatches"
        ));
    }
    if fare_outliers > 0 {
        recommendations.push(format!(
            "Investigate {fare_outliers} potential outliers in Total Fare"
        ));
    }
    recommendations.push("Create temporal features from date columns".to_string());
    recommendations.push("Encode categorical variables for modeling".to_string());
    recommendations.push("Normalize/scale numerical features".to_string());

    tracing::info!(rows, overall_quality = quality.overall, "summary computed");

    SummaryReport {
        rows,
        columns: overview,
        missing_total,
        duplicate_rows,
        duplicate_flights,
        numeric,
        categorical,
        fare_by_airline,
        top_routes,
        fare_by_season,
        fare_by_class,
        quality,
        fare_mismatches,
        fare_outliers,
        recommendations,
    }
}

fn categorical_breakdown(table: &RawTable, column: &str) -> CategoricalBreakdown {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in &table.rows {
        if let Some(v) = r.get(column) {
            *counts.entry(v).or_default() += 1;
        }
    }
    let distinct = counts.len();
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let total = table.len().max(1) as f64;
    let top = ranked
        .into_iter()
        .take(TOP_N)
        .map(|(value, count)| ValueShare {
            value: value.to_string(),
            count,
            percent: count as f64 / total * 100.0,
        })
        .collect();

    CategoricalBreakdown {
        column: column.to_string(),
        distinct,
        top,
    }
}

/// Mean total fare per group, highest mean first. Rows without a fare or a
/// key are skipped.
fn group_fares<F>(table: &RawTable, key: F) -> Vec<GroupFare>
where
    F: Fn(&RawFlightRow) -> Option<String>,
{
    let mut acc: HashMap<String, (f64, usize)> = HashMap::new();
    for r in &table.rows {
        let (Some(k), Some(fare)) = (key(r), r.get_f64(columns::TOTAL_FARE)) else {
            continue;
        };
        let e = acc.entry(k).or_default();
        e.0 += fare;
        e.1 += 1;
    }
    let mut out: Vec<GroupFare> = acc
        .into_iter()
        .map(|(key, (sum, count))| GroupFare {
            key,
            mean_fare: sum / count as f64,
            count,
        })
        .collect();
    out.sort_by(|a, b| {
        b.mean_fare
            .total_cmp(&a.mean_fare)
            .then_with(|| a.key.cmp(&b.key))
    });
    out
}

fn quality_score(table: &RawTable, known: &[&str], duplicate_rows: usize) -> QualityScore {
    if table.is_empty() {
        return QualityScore {
            completeness: 0.0,
            uniqueness: 0.0,
            overall: 0.0,
        };
    }
    let n = table.len() as f64;
    let incomplete = table
        .rows
        .iter()
        .filter(|r| known.iter().any(|c| r.get(c).is_none()))
        .count();
    let completeness = (n - incomplete as f64) / n * 100.0;
    let uniqueness = (1.0 - duplicate_rows as f64 / n) * 100.0;
    QualityScore {
        completeness,
        uniqueness,
        overall: (completeness + uniqueness) / 2.0,
    }
}
