//! Geospatial primitives - distance math and the geocoding gateway

pub mod distance;
pub mod geocode;

pub use distance::haversine_km;
pub use geocode::{Coordinates, Geocoder, ResolvedAddress};
