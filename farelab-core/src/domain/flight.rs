//! Flight records: the raw CSV row shape and the typed record built from it.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Column names exactly as they appear in the source CSV.
pub mod columns {
    pub const AIRLINE: &str = "Airline";
    pub const SOURCE: &str = "Source";
    pub const SOURCE_NAME: &str = "Source Name";
    pub const DESTINATION: &str = "Destination";
    pub const DESTINATION_NAME: &str = "Destination Name";
    pub const DEPARTURE: &str = "Departure Date & Time";
    pub const ARRIVAL: &str = "Arrival Date & Time";
    pub const DURATION: &str = "Duration (hrs)";
    pub const STOPOVERS: &str = "Stopovers";
    pub const AIRCRAFT_TYPE: &str = "Aircraft Type";
    pub const CLASS: &str = "Class";
    pub const BOOKING_SOURCE: &str = "Booking Source";
    pub const BASE_FARE: &str = "Base Fare (BDT)";
    pub const TAX_SURCHARGE: &str = "Tax & Surcharge (BDT)";
    pub const TOTAL_FARE: &str = "Total Fare (BDT)";
    pub const SEASONALITY: &str = "Seasonality";
    pub const DAYS_BEFORE_DEPARTURE: &str = "Days Before Departure";

    /// All known columns, in source order.
    pub const ALL: [&str; 17] = [
        AIRLINE,
        SOURCE,
        SOURCE_NAME,
        DESTINATION,
        DESTINATION_NAME,
        DEPARTURE,
        ARRIVAL,
        DURATION,
        STOPOVERS,
        AIRCRAFT_TYPE,
        CLASS,
        BOOKING_SOURCE,
        BASE_FARE,
        TAX_SURCHARGE,
        TOTAL_FARE,
        SEASONALITY,
        DAYS_BEFORE_DEPARTURE,
    ];

    /// Columns whose values are numeric in the source data.
    pub const NUMERIC: [&str; 5] = [
        DURATION,
        BASE_FARE,
        TAX_SURCHARGE,
        TOTAL_FARE,
        DAYS_BEFORE_DEPARTURE,
    ];
}

/// Timestamp formats seen in exports of the dataset.
const TIMESTAMP_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Canonical format used when writing records back out.
pub const CANONICAL_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a departure/arrival timestamp in any of the accepted formats.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// One CSV row with every field kept as text.
///
/// Missing columns deserialize to `None`, unknown columns are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawFlightRow {
    #[serde(rename = "Airline")]
    pub airline: Option<String>,
    #[serde(rename = "Source")]
    pub source: Option<String>,
    #[serde(rename = "Source Name")]
    pub source_name: Option<String>,
    #[serde(rename = "Destination")]
    pub destination: Option<String>,
    #[serde(rename = "Destination Name")]
    pub destination_name: Option<String>,
    #[serde(rename = "Departure Date & Time")]
    pub departure: Option<String>,
    #[serde(rename = "Arrival Date & Time")]
    pub arrival: Option<String>,
    #[serde(rename = "Duration (hrs)")]
    pub duration_hrs: Option<String>,
    #[serde(rename = "Stopovers")]
    pub stopovers: Option<String>,
    #[serde(rename = "Aircraft Type")]
    pub aircraft_type: Option<String>,
    #[serde(rename = "Class")]
    pub class: Option<String>,
    #[serde(rename = "Booking Source")]
    pub booking_source: Option<String>,
    #[serde(rename = "Base Fare (BDT)")]
    pub base_fare: Option<String>,
    #[serde(rename = "Tax & Surcharge (BDT)")]
    pub tax_surcharge: Option<String>,
    #[serde(rename = "Total Fare (BDT)")]
    pub total_fare: Option<String>,
    #[serde(rename = "Seasonality")]
    pub seasonality: Option<String>,
    #[serde(rename = "Days Before Departure")]
    pub days_before_departure: Option<String>,
}

impl RawFlightRow {
    /// Value of a column by its source name. Blank strings count as missing.
    pub fn get(&self, column: &str) -> Option<&str> {
        let v = match column {
            columns::AIRLINE => &self.airline,
            columns::SOURCE => &self.source,
            columns::SOURCE_NAME => &self.source_name,
            columns::DESTINATION => &self.destination,
            columns::DESTINATION_NAME => &self.destination_name,
            columns::DEPARTURE => &self.departure,
            columns::ARRIVAL => &self.arrival,
            columns::DURATION => &self.duration_hrs,
            columns::STOPOVERS => &self.stopovers,
            columns::AIRCRAFT_TYPE => &self.aircraft_type,
            columns::CLASS => &self.class,
            columns::BOOKING_SOURCE => &self.booking_source,
            columns::BASE_FARE => &self.base_fare,
            columns::TAX_SURCHARGE => &self.tax_surcharge,
            columns::TOTAL_FARE => &self.total_fare,
            columns::SEASONALITY => &self.seasonality,
            columns::DAYS_BEFORE_DEPARTURE => &self.days_before_departure,
            _ => return None,
        };
        v.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Numeric value of a column, if present and parseable.
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(|s| s.parse::<f64>().ok())
    }
}

/// Cabin class, ordered by price tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CabinClass {
    Economy,
    Business,
    First,
}

impl CabinClass {
    pub const ALL: [CabinClass; 3] = [CabinClass::Economy, CabinClass::Business, CabinClass::First];

    /// Ordinal encoding used as a model feature.
    pub fn ordinal(self) -> f64 {
        match self {
            CabinClass::Economy => 0.0,
            CabinClass::Business => 1.0,
            CabinClass::First => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CabinClass::Economy => "Economy",
            CabinClass::Business => "Business",
            CabinClass::First => "First",
        }
    }
}

impl fmt::Display for CabinClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CabinClass {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "economy" => Ok(CabinClass::Economy),
            "business" => Ok(CabinClass::Business),
            "first" | "first class" => Ok(CabinClass::First),
            other => Err(RecordError::InvalidValue {
                column: columns::CLASS,
                value: other.to_string(),
            }),
        }
    }
}

/// Number of stopovers, parsed from labels like `Direct`, `1 Stop`, `2 Stops`.
pub fn parse_stopovers(s: &str) -> Option<u8> {
    let lower = s.trim().to_ascii_lowercase();
    if lower == "direct" || lower == "non-stop" || lower == "nonstop" {
        return Some(0);
    }
    let digits: String = lower.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Errors turning a raw row into a typed record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RecordError {
    #[error("missing value in column '{0}'")]
    Missing(&'static str),

    #[error("invalid value '{value}' in column '{column}'")]
    InvalidValue { column: &'static str, value: String },
}

/// A fully typed flight record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub airline: String,
    pub source: String,
    pub source_name: String,
    pub destination: String,
    pub destination_name: String,
    pub departure: NaiveDateTime,
    pub arrival: NaiveDateTime,
    pub duration_hrs: f64,
    pub stopovers: u8,
    pub aircraft_type: Option<String>,
    pub class: CabinClass,
    pub booking_source: String,
    pub base_fare: f64,
    pub tax_surcharge: f64,
    pub total_fare: f64,
    pub seasonality: String,
    pub days_before_departure: u32,
}

fn required<'a>(raw: &'a RawFlightRow, column: &'static str) -> Result<&'a str, RecordError> {
    raw.get(column).ok_or(RecordError::Missing(column))
}

fn required_f64(raw: &RawFlightRow, column: &'static str) -> Result<f64, RecordError> {
    let s = required(raw, column)?;
    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| RecordError::InvalidValue {
            column,
            value: s.to_string(),
        })
}

impl TryFrom<&RawFlightRow> for FlightRecord {
    type Error = RecordError;

    fn try_from(raw: &RawFlightRow) -> Result<Self, Self::Error> {
        let departure_s = required(raw, columns::DEPARTURE)?;
        let departure = parse_timestamp(departure_s).ok_or_else(|| RecordError::InvalidValue {
            column: columns::DEPARTURE,
            value: departure_s.to_string(),
        })?;
        let arrival_s = required(raw, columns::ARRIVAL)?;
        let arrival = parse_timestamp(arrival_s).ok_or_else(|| RecordError::InvalidValue {
            column: columns::ARRIVAL,
            value: arrival_s.to_string(),
        })?;

        let stop_s = required(raw, columns::STOPOVERS)?;
        let stopovers = parse_stopovers(stop_s).ok_or_else(|| RecordError::InvalidValue {
            column: columns::STOPOVERS,
            value: stop_s.to_string(),
        })?;

        let days_s = required(raw, columns::DAYS_BEFORE_DEPARTURE)?;
        // Some exports write integers as "12.0"
        let days_before_departure = days_s
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0 && d.fract() == 0.0)
            .map(|d| d as u32)
            .ok_or_else(|| RecordError::InvalidValue {
                column: columns::DAYS_BEFORE_DEPARTURE,
                value: days_s.to_string(),
            })?;

        Ok(FlightRecord {
            airline: required(raw, columns::AIRLINE)?.to_string(),
            source: required(raw, columns::SOURCE)?.to_string(),
            source_name: required(raw, columns::SOURCE_NAME)?.to_string(),
            destination: required(raw, columns::DESTINATION)?.to_string(),
            destination_name: required(raw, columns::DESTINATION_NAME)?.to_string(),
            departure,
            arrival,
            duration_hrs: required_f64(raw, columns::DURATION)?,
            stopovers,
            aircraft_type: raw.get(columns::AIRCRAFT_TYPE).map(str::to_string),
            class: required(raw, columns::CLASS)?.parse()?,
            booking_source: required(raw, columns::BOOKING_SOURCE)?.to_string(),
            base_fare: required_f64(raw, columns::BASE_FARE)?,
            tax_surcharge: required_f64(raw, columns::TAX_SURCHARGE)?,
            total_fare: required_f64(raw, columns::TOTAL_FARE)?,
            seasonality: required(raw, columns::SEASONALITY)?.to_string(),
            days_before_departure,
        })
    }
}

impl FlightRecord {
    /// `SRC → DST` route label.
    pub fn route(&self) -> String {
        format!("{} → {}", self.source, self.destination)
    }

    /// Stopover label in the source's wording.
    pub fn stopover_label(&self) -> String {
        match self.stopovers {
            0 => "Direct".to_string(),
            1 => "1 Stop".to_string(),
            n => format!("{n} Stops"),
        }
    }

    pub fn departure_hour(&self) -> u32 {
        self.departure.hour()
    }

    /// Convert back to the raw CSV shape with canonical formatting.
    pub fn to_raw(&self) -> RawFlightRow {
        RawFlightRow {
            airline: Some(self.airline.clone()),
            source: Some(self.source.clone()),
            source_name: Some(self.source_name.clone()),
            destination: Some(self.destination.clone()),
            destination_name: Some(self.destination_name.clone()),
            departure: Some(self.departure.format(CANONICAL_TIMESTAMP).to_string()),
            arrival: Some(self.arrival.format(CANONICAL_TIMESTAMP).to_string()),
            duration_hrs: Some(self.duration_hrs.to_string()),
            stopovers: Some(self.stopover_label()),
            aircraft_type: self.aircraft_type.clone(),
            class: Some(self.class.to_string()),
            booking_source: Some(self.booking_source.clone()),
            base_fare: Some(self.base_fare.to_string()),
            tax_surcharge: Some(self.tax_surcharge.to_string()),
            total_fare: Some(self.total_fare.to_string()),
            seasonality: Some(self.seasonality.clone()),
            days_before_departure: Some(self.days_before_departure.to_string()),
        }
    }
}
