use serde::Serialize;

use super::Location;

/// One output row. Absent fields mean the lookup failed; the row is kept anyway.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeocodeRecord {
    pub place: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
}

impl GeocodeRecord {
    pub fn new(place: impl Into<String>, location: Option<Location>) -> Self {
        let place = place.into();
        match location {
            Some(loc) => Self {
                place,
                latitude: Some(loc.lat),
                longitude: Some(loc.lon),
                address: Some(loc.address),
            },
            None => Self::unresolved(place),
        }
    }

    pub fn unresolved(place: impl Into<String>) -> Self {
        Self {
            place: place.into(),
            latitude: None,
            longitude: None,
            address: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }
}
