use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use super::{Geocoder, Location, LookupError};
use crate::domain::Coordinates;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = concat!("placecode/", env!("CARGO_PKG_VERSION"));

/// Nominatim usage policy: at most one request per second
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResult {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OpenStreetMap Nominatim backend. Needs no key, only an identifying User-Agent.
pub struct NominatimGeocoder {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(user_agent: &str, timeout: Duration, base_url: Option<&str>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        })
    }

    fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, LookupError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(query)
            .send()?
            .error_for_status()?;
        Ok(response.text()?)
    }
}

impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    fn geocode(&self, query: &str) -> Result<Location, LookupError> {
        let body = self.get(
            "search",
            &[
                ("q", query.to_string()),
                ("format", "jsonv2".to_string()),
                ("limit", "1".to_string()),
            ],
        )?;
        parse_search(&body, query)
    }

    fn reverse(&self, at: Coordinates) -> Result<String, LookupError> {
        let body = self.get(
            "reverse",
            &[
                ("lat", at.lat.to_string()),
                ("lon", at.lon.to_string()),
                ("format", "jsonv2".to_string()),
            ],
        )?;
        parse_reverse(&body, at)
    }
}

fn parse_search(body: &str, query: &str) -> Result<Location, LookupError> {
    let results: Vec<SearchResult> =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;

    let result = results
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NotFound(query.to_string()))?;

    // Nominatim sends coordinates as decimal strings
    let lat: f64 = result
        .lat
        .parse()
        .map_err(|_| LookupError::Malformed(format!("latitude {:?}", result.lat)))?;
    let lon: f64 = result
        .lon
        .parse()
        .map_err(|_| LookupError::Malformed(format!("longitude {:?}", result.lon)))?;

    Ok(Location {
        lat,
        lon,
        address: result.display_name,
    })
}

fn parse_reverse(body: &str, at: Coordinates) -> Result<String, LookupError> {
    let result: ReverseResult =
        serde_json::from_str(body).map_err(|e| LookupError::Malformed(e.to_string()))?;

    match (result.display_name, result.error) {
        (Some(name), _) if !name.is_empty() => Ok(name),
        (_, Some(error)) => Err(LookupError::Status {
            status: "error".to_string(),
            message: Some(error),
        }),
        _ => Err(LookupError::NotFound(at.to_string())),
    }
}
