use std::fmt;

/// A WGS84 point in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// Build a point, rejecting values outside the valid lat/lon ranges
    pub fn new(lat: f64, lon: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lon.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lon);
        valid.then_some(Self { lat, lon })
    }

    /// Parse a literal "lat,lon" pair such as "37.7749,-122.4194"
    pub fn parse(text: &str) -> Option<Self> {
        let (lat, lon) = text.split_once(',')?;
        let lat = parse_decimal(lat)?;
        let lon = parse_decimal(lon)?;
        Self::new(lat, lon)
    }
}

// Only plain decimals count; "inf", "NaN" or "1e5" are place names
fn parse_decimal(part: &str) -> Option<f64> {
    let part = part.trim();
    let digits = part.strip_prefix(['-', '+']).unwrap_or(part);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    part.parse().ok()
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

/// What a single row of input asks the geocoder to do
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceQuery {
    /// Free-text place name, resolved by forward geocoding
    Name(String),
    /// Literal coordinates, resolved to an address by reverse geocoding
    Point(Coordinates),
}

impl PlaceQuery {
    pub fn parse(text: &str) -> Self {
        match Coordinates::parse(text) {
            Some(point) => PlaceQuery::Point(point),
            None => PlaceQuery::Name(text.trim().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coordinate_pair() {
        let point = Coordinates::parse("37.7749,-122.4194").unwrap();
        assert_eq!(point.lat, 37.7749);
        assert_eq!(point.lon, -122.4194);

        let spaced = Coordinates::parse(" 5.6037 , -0.1870 ").unwrap();
        assert_eq!(spaced.lat, 5.6037);
    }

    #[test]
    fn test_reject_out_of_range() {
        assert!(Coordinates::parse("91.0,10.0").is_none());
        assert!(Coordinates::parse("10.0,181.0").is_none());
        assert!(Coordinates::new(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_place_names_stay_names() {
        assert_eq!(
            PlaceQuery::parse("Accra, Ghana"),
            PlaceQuery::Name("Accra, Ghana".to_string())
        );
        assert!(matches!(PlaceQuery::parse("inf,nan"), PlaceQuery::Name(_)));
        assert!(matches!(PlaceQuery::parse("1e1,2"), PlaceQuery::Name(_)));
        assert!(matches!(
            PlaceQuery::parse("37.7749,-122.4194"),
            PlaceQuery::Point(_)
        ));
    }
}
