//! Great-circle distance.

use crate::geo::types::Coordinates;

/// Mean earth radius in kilometers (spherical approximation).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two coordinates, in meters.
///
/// Deterministic and symmetric; accurate to within a few meters at the
/// gym-geofence scale (hundreds of meters).
pub fn haversine_distance_m(a: Coordinates, b: Coordinates) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = Coordinates::new(48.8584, 2.2945);
        assert_eq!(haversine_distance_m(p, p), 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        // One degree of latitude is ~111.19 km on a 6371 km sphere.
        let a = Coordinates::new(0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0);
        let d = haversine_distance_m(a, b);
        assert!((d - 111_195.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn test_symmetric() {
        let pairs = [
            (Coordinates::new(52.52, 13.405), Coordinates::new(48.8566, 2.3522)),
            (Coordinates::new(-33.8688, 151.2093), Coordinates::new(35.6762, 139.6503)),
            (Coordinates::new(0.001, -0.002), Coordinates::new(-0.003, 0.004)),
        ];
        for (a, b) in pairs {
            assert_eq!(haversine_distance_m(a, b), haversine_distance_m(b, a));
        }
    }

    #[test]
    fn test_gym_scale() {
        // Roughly 156 m apart (100 m east, 120 m north at the equator).
        let gym = Coordinates::new(0.0, 0.0);
        let device = Coordinates::new(0.00108, 0.0009);
        let d = haversine_distance_m(gym, device);
        assert!(d > 140.0 && d < 170.0, "got {d}");
    }
}
