//! Geolocation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default tracking radius around a gym in meters.
pub const DEFAULT_TRACKING_RADIUS_M: u32 = 200;

/// Smallest configurable tracking radius in meters.
pub const MIN_TRACKING_RADIUS_M: u32 = 100;

/// Largest configurable tracking radius in meters.
pub const MAX_TRACKING_RADIUS_M: u32 = 1_000;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// A registered gym with its geofence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymLocation {
    pub id: Uuid,
    pub name: String,
    pub coordinates: Coordinates,
    /// Geofence radius in meters, clamped to
    /// [[`MIN_TRACKING_RADIUS_M`], [`MAX_TRACKING_RADIUS_M`]].
    pub tracking_radius_m: u32,
}

impl GymLocation {
    /// Create a gym with the default tracking radius.
    pub fn new(id: Uuid, name: impl Into<String>, coordinates: Coordinates) -> Self {
        Self {
            id,
            name: name.into(),
            coordinates,
            tracking_radius_m: DEFAULT_TRACKING_RADIUS_M,
        }
    }

    /// Set a custom tracking radius, clamped to the allowed range.
    pub fn with_radius(mut self, radius_m: u32) -> Self {
        self.tracking_radius_m = radius_m.clamp(MIN_TRACKING_RADIUS_M, MAX_TRACKING_RADIUS_M);
        self
    }
}

/// One reading from the geolocation provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub coordinates: Coordinates,
    pub timestamp: DateTime<Utc>,
}

/// Failure reported by the geolocation provider instead of a fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LocationError {
    /// Permission denied or insecure origin.
    #[error("location permission denied")]
    PermissionDenied,
    /// Position could not be determined.
    #[error("location unavailable")]
    Unavailable,
    /// The position request timed out.
    #[error("location request timed out")]
    Timeout,
}

/// Degraded-state reporting for the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerStatus {
    /// No fix received yet.
    #[default]
    Idle,
    /// Receiving fixes.
    Tracking,
    /// Location permission denied.
    Denied,
    /// Provider cannot determine position.
    Unavailable,
    /// Last position request timed out.
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_clamped() {
        let gym = GymLocation::new(Uuid::new_v4(), "Test", Coordinates::new(0.0, 0.0));
        assert_eq!(gym.tracking_radius_m, DEFAULT_TRACKING_RADIUS_M);
        assert_eq!(gym.clone().with_radius(50).tracking_radius_m, 100);
        assert_eq!(gym.clone().with_radius(5_000).tracking_radius_m, 1_000);
        assert_eq!(gym.with_radius(300).tracking_radius_m, 300);
    }
}
