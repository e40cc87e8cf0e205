//! Geolocation: great-circle distance and the geofenced auto-tracker.

pub mod distance;
pub mod tracker;
pub mod types;

pub use distance::haversine_distance_m;
pub use tracker::{GeoTracker, GeofenceTransition, EXIT_HYSTERESIS_M};
pub use types::{
    Coordinates, GymLocation, LocationError, LocationFix, TrackerStatus,
    DEFAULT_TRACKING_RADIUS_M, MAX_TRACKING_RADIUS_M, MIN_TRACKING_RADIUS_M,
};
