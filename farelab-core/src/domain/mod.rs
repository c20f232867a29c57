//! Domain types: flight records and dataset identity.

pub mod dataset;
pub mod flight;

pub use dataset::DatasetRef;
pub use flight::{columns, parse_timestamp, CabinClass, FlightRecord, RawFlightRow, RecordError};
