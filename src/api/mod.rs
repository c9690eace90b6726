pub mod google;
pub mod nominatim;

pub use google::GoogleGeocoder;
pub use nominatim::NominatimGeocoder;

use thiserror::Error;
use tracing::warn;

pub use crate::domain::Location;

use crate::domain::{Coordinates, PlaceQuery};

/// Why a single lookup produced no result
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no result for {0}")]
    NotFound(String),

    #[error("status {status}{}", detail(.message))]
    Status {
        status: String,
        message: Option<String>,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(" ({m})"))
        .unwrap_or_default()
}

/// A remote geocoding backend.
///
/// Implementations perform exactly one blocking request per call and do no
/// rate limiting of their own; callers pace them with a `RateLimiter`.
pub trait Geocoder {
    /// Short backend name for log lines
    fn name(&self) -> &'static str;

    /// Forward geocode a free-text place name
    fn geocode(&self, query: &str) -> Result<Location, LookupError>;

    /// Resolve coordinates to a formatted address
    fn reverse(&self, at: Coordinates) -> Result<String, LookupError>;
}

/// Forward geocode `place`, logging and absorbing any failure.
pub fn find_location(geocoder: &dyn Geocoder, place: &str) -> Option<Location> {
    match geocoder.geocode(place) {
        Ok(location) => Some(location),
        Err(e) => {
            warn!(backend = geocoder.name(), %place, "geocode failed: {e}");
            None
        }
    }
}

/// Reverse geocode `at`, logging and absorbing any failure.
pub fn reverse_lookup(geocoder: &dyn Geocoder, at: Coordinates) -> Option<String> {
    match geocoder.reverse(at) {
        Ok(address) => Some(address),
        Err(e) => {
            warn!(backend = geocoder.name(), point = %at, "reverse geocode failed: {e}");
            None
        }
    }
}

/// Resolve one parsed query. Literal coordinates keep their own lat/lon and
/// only gain an address.
pub fn lookup(geocoder: &dyn Geocoder, query: &PlaceQuery) -> Option<Location> {
    match query {
        PlaceQuery::Name(name) => find_location(geocoder, name),
        PlaceQuery::Point(at) => reverse_lookup(geocoder, *at).map(|address| Location {
            lat: at.lat,
            lon: at.lon,
            address,
        }),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// In-memory backend that answers from a fixed table and records calls
    #[derive(Default)]
    pub struct FakeGeocoder {
        pub places: HashMap<String, Location>,
        pub addresses: HashMap<String, String>,
        pub calls: RefCell<Vec<String>>,
    }

    impl FakeGeocoder {
        pub fn with_place(mut self, name: &str, lat: f64, lon: f64, address: &str) -> Self {
            self.places.insert(
                name.to_string(),
                Location {
                    lat,
                    lon,
                    address: address.to_string(),
                },
            );
            self
        }

        pub fn with_address(mut self, at: Coordinates, address: &str) -> Self {
            self.addresses.insert(at.to_string(), address.to_string());
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    /// Serve one canned HTTP response on 127.0.0.1 and hand back the request
    /// line that was received, e.g. `GET /search?q=x HTTP/1.1`.
    pub fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(response.as_bytes()).unwrap();
            let text = String::from_utf8_lossy(&request).into_owned();
            text.lines().next().unwrap_or_default().to_string()
        });

        (base_url, handle)
    }

    /// A base URL nothing is listening on
    pub fn closed_port_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    impl Geocoder for FakeGeocoder {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn geocode(&self, query: &str) -> Result<Location, LookupError> {
            self.calls.borrow_mut().push(query.to_string());
            self.places
                .get(query)
                .cloned()
                .ok_or_else(|| LookupError::NotFound(query.to_string()))
        }

        fn reverse(&self, at: Coordinates) -> Result<String, LookupError> {
            let key = at.to_string();
            self.calls.borrow_mut().push(key.clone());
            self.addresses
                .get(&key)
                .cloned()
                .ok_or(LookupError::NotFound(key))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeGeocoder;
    use super::*;

    #[test]
    fn test_find_location_absorbs_failure() {
        let geocoder = FakeGeocoder::default().with_place("Accra, Ghana", 5.6, -0.19, "Accra");

        let hit = find_location(&geocoder, "Accra, Ghana").unwrap();
        assert_eq!(hit.address, "Accra");
        assert!(find_location(&geocoder, "Nonexistent Place ZZZ").is_none());
        assert_eq!(geocoder.call_count(), 2);
    }

    #[test]
    fn test_lookup_point_keeps_input_coordinates() {
        let at = Coordinates::new(37.7749, -122.4194).unwrap();
        let geocoder = FakeGeocoder::default().with_address(at, "San Francisco, CA");

        let loc = lookup(&geocoder, &PlaceQuery::Point(at)).unwrap();
        assert_eq!(loc.lat, 37.7749);
        assert_eq!(loc.lon, -122.4194);
        assert_eq!(loc.address, "San Francisco, CA");

        let elsewhere = Coordinates::new(0.0, 0.0).unwrap();
        assert!(lookup(&geocoder, &PlaceQuery::Point(elsewhere)).is_none());
    }

    #[test]
    fn test_status_error_message() {
        let err = LookupError::Status {
            status: "REQUEST_DENIED".to_string(),
            message: Some("The provided API key is invalid.".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "status REQUEST_DENIED (The provided API key is invalid.)"
        );

        let bare = LookupError::Status {
            status: "ZERO_RESULTS".to_string(),
            message: None,
        };
        assert_eq!(bare.to_string(), "status ZERO_RESULTS");
    }
}
