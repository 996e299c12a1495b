//! Great-circle distance between two WGS84 coordinates

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance in kilometers between two lat/lon pairs.
/// Pure function - no side effects.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance_same_point() {
        let d = haversine_km(43.2965, 5.3698, 43.2965, 5.3698);
        assert!(d.abs() < 1e-9);
    }

    #[test]
    fn test_paris_to_marseille() {
        // Notre-Dame to the Vieux-Port, roughly 660 km
        let d = haversine_km(48.8530, 2.3499, 43.2951, 5.3740);
        assert!((d - 660.0).abs() < 5.0, "got {d}");
    }

    #[test]
    fn test_short_distance_within_city() {
        // Two points ~1.1 km apart in central Marseille
        let d = haversine_km(43.2965, 5.3698, 43.3065, 5.3698);
        assert!(d > 1.0 && d < 1.2, "got {d}");
    }

    #[test]
    fn test_symmetry() {
        let a = haversine_km(48.8530, 2.3499, 43.2951, 5.3740);
        let b = haversine_km(43.2951, 5.3740, 48.8530, 2.3499);
        assert!((a - b).abs() < 1e-9);
    }
}
