use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use super::{Geocoder, Location, LookupError};
use crate::config::ApiKey;
use crate::domain::Coordinates;

pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    formatted_address: Option<String>,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Google Maps Geocoding API backend
pub struct GoogleGeocoder {
    client: reqwest::blocking::Client,
    api_key: ApiKey,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(api_key: ApiKey, timeout: Duration, base_url: Option<&str>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("placecode/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
        })
    }

    fn request(&self, param: &str, value: &str) -> Result<GeocodeResponse, LookupError> {
        let body = self
            .client
            .get(&self.base_url)
            .query(&[(param, value), ("key", self.api_key.expose())])
            .send()?
            .error_for_status()?
            .text()?;
        serde_json::from_str(&body).map_err(|e| LookupError::Malformed(e.to_string()))
    }
}

impl Geocoder for GoogleGeocoder {
    fn name(&self) -> &'static str {
        "google"
    }

    fn geocode(&self, query: &str) -> Result<Location, LookupError> {
        let response = self.request("address", query)?;
        first_location(response, query)
    }

    fn reverse(&self, at: Coordinates) -> Result<String, LookupError> {
        let point = at.to_string();
        let response = self.request("latlng", &point)?;
        let location = first_location(response, &point)?;
        Ok(location.address)
    }
}

/// Take the best match out of a response, classifying everything but
/// `status == "OK"` with results as a failure.
fn first_location(response: GeocodeResponse, query: &str) -> Result<Location, LookupError> {
    if response.status != "OK" {
        return Err(LookupError::Status {
            status: response.status,
            message: response.error_message,
        });
    }

    let result = response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NotFound(query.to_string()))?;

    let address = result
        .formatted_address
        .filter(|a| !a.is_empty())
        .ok_or_else(|| LookupError::Malformed("result without formatted_address".to_string()))?;

    Ok(Location {
        lat: result.geometry.location.lat,
        lon: result.geometry.location.lng,
        address,
    })
}
