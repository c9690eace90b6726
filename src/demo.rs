use anyhow::Result;
use std::io::Write;

use crate::api::{Geocoder, find_location, reverse_lookup};
use crate::domain::Coordinates;
use crate::rate_limit::RateLimiter;

pub const DEMO_PLACES: [&str; 3] = [
    "Accra, Ghana",
    "Kumasi, Ghana",
    "Korle Bu Teaching Hospital, Accra",
];

/// San Francisco city hall area
pub const DEMO_POINT: Coordinates = Coordinates {
    lat: 37.7749,
    lon: -122.4194,
};

/// Geocode the fixed demo list, then reverse geocode one point, printing
/// each result to `out`.
pub fn run_demo<W: Write>(
    geocoder: &dyn Geocoder,
    limiter: &mut RateLimiter,
    out: &mut W,
) -> Result<()> {
    writeln!(out, "Single lookups:")?;
    for place in DEMO_PLACES {
        limiter.wait();
        match find_location(geocoder, place) {
            Some(loc) => writeln!(
                out,
                "{} -> ({:.6}, {:.6}, {})",
                place, loc.lat, loc.lon, loc.address
            )?,
            None => writeln!(out, "{} -> not found", place)?,
        }
    }

    writeln!(out)?;
    writeln!(out, "Reverse lookup example (lat,lon):")?;
    limiter.wait();
    match reverse_lookup(geocoder, DEMO_POINT) {
        Some(address) => writeln!(out, "{} -> {}", DEMO_POINT, address)?,
        None => writeln!(out, "{} -> not found", DEMO_POINT)?,
    }

    Ok(())
}
