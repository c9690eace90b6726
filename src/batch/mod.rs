//! Table in, table out: read place names from a delimited file, geocode each
//! row in order, write one result row per input row.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::api::{Geocoder, lookup};
use crate::config::ConfigError;
use crate::domain::{GeocodeRecord, PlaceQuery};
use crate::rate_limit::RateLimiter;

pub const PLACE_COLUMN: &str = "place";
pub const OUTPUT_HEADER: [&str; 4] = ["place", "latitude", "longitude", "address"];

/// Outcome counts of one batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub resolved: usize,
}

impl BatchSummary {
    pub fn from_records(records: &[GeocodeRecord]) -> Self {
        Self {
            total: records.len(),
            resolved: records.iter().filter(|r| r.is_resolved()).count(),
        }
    }

    pub fn failed(&self) -> usize {
        self.total - self.resolved
    }
}

/// Read the `place` column (header matched case-insensitively) from a
/// delimited table. Other columns are ignored; every row must have as many
/// fields as the header. Cells are returned exactly as written.
pub fn read_places<R: Read>(reader: R, delimiter: u8) -> Result<Vec<String>> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .context("Failed to read input header")?
        .clone();

    let place_idx = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(PLACE_COLUMN))
        .ok_or_else(|| ConfigError::MissingColumn {
            column: PLACE_COLUMN,
            found: headers.iter().map(str::to_string).collect(),
        })?;

    let mut places = Vec::new();
    for (row, result) in csv_reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read input row {}", row + 1))?;
        places.push(record.get(place_idx).unwrap_or("").to_string());
    }

    Ok(places)
}

/// Per-row hooks for a running batch. Both default to doing nothing.
pub trait BatchProgress {
    /// Called before row `idx` is looked up
    fn started(&mut self, _idx: usize, _place: &str) {}

    /// Called once row `idx` has its result
    fn finished(&mut self, _idx: usize, _record: &GeocodeRecord) {}
}

impl BatchProgress for () {}

/// Geocode every place in order, pacing calls with `limiter`.
///
/// Always returns exactly one record per input place, carrying the place
/// text unchanged. Surrounding whitespace is ignored for the lookup only.
pub fn geocode_places(
    geocoder: &dyn Geocoder,
    limiter: &mut RateLimiter,
    places: &[String],
    progress: &mut dyn BatchProgress,
) -> Vec<GeocodeRecord> {
    let mut records = Vec::with_capacity(places.len());

    for (idx, place) in places.iter().enumerate() {
        progress.started(idx, place);

        let record = if place.trim().is_empty() {
            warn!(row = idx + 1, "Empty place, skipping lookup");
            GeocodeRecord::unresolved(place.as_str())
        } else {
            limiter.wait();
            let query = PlaceQuery::parse(place);
            GeocodeRecord::new(place.as_str(), lookup(geocoder, &query))
        };

        debug!(?record, "row {}", idx + 1);
        progress.finished(idx, &record);
        records.push(record);
    }

    records
}

/// Write records with a `place,latitude,longitude,address` header. Absent
/// values become empty cells.
pub fn write_records<W: Write>(writer: W, records: &[GeocodeRecord]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);

    wtr.write_record(OUTPUT_HEADER)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;

    Ok(())
}

/// Full input-to-output conversion.
///
/// The input is read and validated before the first request, so a missing
/// column or unreadable file aborts without touching the network.
pub fn run_batch(
    geocoder: &dyn Geocoder,
    limiter: &mut RateLimiter,
    input: &Path,
    output: &Path,
    delimiter: u8,
    progress: &mut dyn BatchProgress,
) -> Result<BatchSummary> {
    let file = File::open(input)
        .with_context(|| format!("Failed to open input file: {}", input.display()))?;
    let places = read_places(file, delimiter)
        .with_context(|| format!("Invalid input file: {}", input.display()))?;
    info!("Read {} places from {}", places.len(), input.display());

    let records = geocode_places(geocoder, limiter, &places, progress);

    let out = File::create(output)
        .with_context(|| format!("Failed to create output file: {}", output.display()))?;
    write_records(out, &records)
        .with_context(|| format!("Failed to write output file: {}", output.display()))?;

    Ok(BatchSummary::from_records(&records))
}
