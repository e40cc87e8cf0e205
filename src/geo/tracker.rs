//! Geofenced auto check-in tracker.
//!
//! Consumes location fixes from the platform geolocation provider, compares
//! them against the user's registered gyms, and drives automatic check-in and
//! check-out. Exit uses a hysteresis band so GPS jitter at the radius edge
//! does not flap the session.

use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::geo::distance::haversine_distance_m;
use crate::geo::types::{GymLocation, LocationError, LocationFix, TrackerStatus};
use crate::workout::checkin::{
    CheckInError, CheckInManager, CheckInType, GymCheckInSession, StopReason,
};

/// Extra meters past the radius before an exit is confirmed.
pub const EXIT_HYSTERESIS_M: f64 = 50.0;

/// A state change produced by a location update.
#[derive(Debug, Clone, PartialEq)]
pub enum GeofenceTransition {
    /// Entered a gym's radius and auto check-in started.
    CheckedIn(GymCheckInSession),
    /// Confirmed exit closed the session.
    CheckedOut(GymCheckInSession),
}

/// Per-user geofence state machine.
pub struct GeoTracker {
    user_id: Uuid,
    gyms: Vec<GymLocation>,
    checkins: Arc<Mutex<CheckInManager>>,
    auto_tracking_enabled: bool,
    status: TrackerStatus,
    last_fix: Option<LocationFix>,
    distance_to_nearest_m: Option<f64>,
    at_gym: bool,
}

impl GeoTracker {
    pub fn new(
        user_id: Uuid,
        gyms: Vec<GymLocation>,
        checkins: Arc<Mutex<CheckInManager>>,
        auto_tracking_enabled: bool,
    ) -> Self {
        Self {
            user_id,
            gyms,
            checkins,
            auto_tracking_enabled,
            status: TrackerStatus::Idle,
            last_fix: None,
            distance_to_nearest_m: None,
            at_gym: false,
        }
    }

    /// Replace the registered gym list.
    pub fn set_gyms(&mut self, gyms: Vec<GymLocation>) {
        self.gyms = gyms;
    }

    /// Enable or disable automatic check-in/out.
    pub fn set_auto_tracking(&mut self, enabled: bool) {
        self.auto_tracking_enabled = enabled;
    }

    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    pub fn last_fix(&self) -> Option<LocationFix> {
        self.last_fix
    }

    /// Distance to the nearest registered gym as of the last fix, in meters.
    pub fn distance_to_nearest_m(&self) -> Option<f64> {
        self.distance_to_nearest_m
    }

    /// Whether the last fix was inside a gym's radius.
    pub fn is_at_gym(&self) -> bool {
        self.at_gym
    }

    /// Process one location reading.
    ///
    /// Returns the transition it caused, if any. Entering a radius opens an
    /// auto session for the nearest gym unless suppression is armed for it;
    /// a confirmed exit (past the hysteresis band) closes the tracked auto
    /// session. Manual sessions are never auto-closed here.
    pub fn on_location(
        &mut self,
        fix: LocationFix,
    ) -> Result<Option<GeofenceTransition>, CheckInError> {
        self.status = TrackerStatus::Tracking;
        self.last_fix = Some(fix);

        if self.gyms.is_empty() {
            return Ok(None);
        }

        let Some((nearest, distance)) = self
            .gyms
            .iter()
            .map(|gym| {
                (
                    gym,
                    haversine_distance_m(gym.coordinates, fix.coordinates),
                )
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
        else {
            return Ok(None);
        };
        let nearest = nearest.clone();
        self.distance_to_nearest_m = Some(distance);

        let radius = f64::from(nearest.tracking_radius_m);
        let inside = distance <= radius;
        let confirmed_outside = distance > radius + EXIT_HYSTERESIS_M;
        self.at_gym = inside;

        if !self.auto_tracking_enabled {
            return Ok(None);
        }

        let mut checkins = self
            .checkins
            .lock()
            .map_err(|e| CheckInError::Database(format!("Check-in lock failed: {e}")))?;
        let active = checkins.active(self.user_id)?;

        if inside {
            match active {
                Some(session) if session.gym_id == nearest.id => Ok(None),
                Some(_) => Ok(None),
                None => {
                    if checkins.is_suppressed(nearest.id) {
                        tracing::debug!(gym = %nearest.name, "inside radius but suppressed");
                        return Ok(None);
                    }
                    tracing::info!(gym = %nearest.name, distance_m = distance, "entered geofence");
                    let session =
                        checkins.start(self.user_id, &nearest, CheckInType::Auto, false)?;
                    Ok(Some(GeofenceTransition::CheckedIn(session)))
                }
            }
        } else if confirmed_outside {
            match active {
                Some(session)
                    if session.kind == CheckInType::Auto && session.gym_id == nearest.id =>
                {
                    tracing::info!(gym = %nearest.name, distance_m = distance, "left geofence");
                    let closed = checkins.stop(self.user_id, StopReason::GeofenceExit)?;
                    Ok(Some(GeofenceTransition::CheckedOut(closed)))
                }
                _ => Ok(None),
            }
        } else {
            // Inside the hysteresis band: no transition either way.
            Ok(None)
        }
    }

    /// Process a provider failure.
    ///
    /// Degrades the reported status but never touches an active session: a
    /// single failed read is not evidence the user left the gym.
    pub fn on_location_error(&mut self, error: LocationError) {
        self.status = match error {
            LocationError::PermissionDenied => TrackerStatus::Denied,
            LocationError::Unavailable => TrackerStatus::Unavailable,
            LocationError::Timeout => TrackerStatus::Timeout,
        };
        tracing::warn!(%error, status = ?self.status, "location update failed");
    }
}
