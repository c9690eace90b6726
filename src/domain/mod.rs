pub mod location;
pub mod query;
pub mod record;

pub use location::Location;
pub use query::{Coordinates, PlaceQuery};
pub use record::GeocodeRecord;
