//! Synthetic flight records for offline development and tests.
//!
//! Fares follow a simple multiplicative structure (route distance, airline
//! tier, class, season, booking lead time) plus noise, so models have
//! something real to learn. Output is deterministic for a given seed.

use crate::domain::{CabinClass, FlightRecord};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

const AIRLINES: [(&str, f64); 5] = [
    ("Biman Bangladesh Airlines", 1.10),
    ("US-Bangla Airlines", 1.00),
    ("Novoair", 0.95),
    ("Air Astra", 0.90),
    ("Emirates", 1.60),
];

/// `(code, name, distance factor from Dhaka)`
const AIRPORTS: [(&str, &str, f64); 6] = [
    ("DAC", "Hazrat Shahjalal International Airport, Dhaka", 0.0),
    ("CGP", "Shah Amanat International Airport, Chittagong", 1.0),
    ("CXB", "Cox's Bazar Airport", 1.3),
    ("ZYL", "Osmani International Airport, Sylhet", 0.9),
    ("JSR", "Jessore Airport", 0.8),
    ("DXB", "Dubai International Airport", 6.0),
];

const SEASONS: [(&str, f64); 4] = [
    ("Regular", 1.0),
    ("Winter Holidays", 1.15),
    ("Eid", 1.4),
    ("Hajj", 1.6),
];

const BOOKING_SOURCES: [&str; 3] = ["Online Website", "Travel Agency", "Direct Booking"];
const AIRCRAFT: [&str; 4] = ["Boeing 737", "ATR 72", "Airbus A320", "Boeing 787"];

/// Generate `n` synthetic records.
pub fn synthetic_flights(n: usize, seed: u64) -> Vec<FlightRecord> {
    let mut rng = StdRng::seed_from_u64(seed);
    let base_date = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();
    let mut out = Vec::with_capacity(n);

    for _ in 0..n {
        let &(airline, airline_factor) = AIRLINES.choose(&mut rng).unwrap_or(&AIRLINES[0]);
        let src = rng.gen_range(0..AIRPORTS.len());
        let mut dst = rng.gen_range(0..AIRPORTS.len() - 1);
        if dst >= src {
            dst += 1;
        }
        let (src_code, src_name, src_d) = AIRPORTS[src];
        let (dst_code, dst_name, dst_d) = AIRPORTS[dst];
        let distance = (src_d - dst_d).abs().max(0.5);

        let class = match rng.gen_range(0..100) {
            0..=74 => CabinClass::Economy,
            75..=94 => CabinClass::Business,
            _ => CabinClass::First,
        };
        let class_factor = [1.0, 2.5, 4.0][class.ordinal() as usize];
        let &(season, season_factor) = SEASONS.choose(&mut rng).unwrap_or(&SEASONS[0]);
        let days_before: u32 = rng.gen_range(1..90);
        let lead_factor = 1.0 + 0.5 * (-(f64::from(days_before)) / 15.0).exp();
        let stopovers: u8 = if distance > 3.0 { rng.gen_range(0..=2) } else { 0 };

        let duration_hrs = (0.6 * distance + 0.5 + 1.5 * f64::from(stopovers)).min(40.0);
        let departure = base_date.and_hms_opt(0, 0, 0).unwrap_or_default()
            + Duration::days(rng.gen_range(0..365))
            + Duration::minutes(rng.gen_range(5 * 60..23 * 60));
        let arrival = departure + Duration::minutes((duration_hrs * 60.0).round() as i64);

        let noise: f64 = rng.gen_range(0.9..1.1);
        let base_fare = (3000.0
            * distance
            * airline_factor
            * class_factor
            * season_factor
            * lead_factor
            * noise)
            .round();
        let tax_surcharge = (base_fare * 0.15).round();

        out.push(FlightRecord {
            airline: airline.to_string(),
            source: src_code.to_string(),
            source_name: src_name.to_string(),
            destination: dst_code.to_string(),
            destination_name: dst_name.to_string(),
            departure,
            arrival,
            duration_hrs: (duration_hrs * 100.0).round() / 100.0,
            stopovers,
            aircraft_type: AIRCRAFT.choose(&mut rng).map(|s| s.to_string()),
            class,
            booking_source: BOOKING_SOURCES
                .choose(&mut rng)
                .copied()
                .unwrap_or("Online Website")
                .to_string(),
            base_fare,
            tax_surcharge,
            total_fare: base_fare + tax_surcharge,
            seasonality: season.to_string(),
            days_before_departure: days_before,
        });
    }
    out
}
