//! Gym check-in sessions.
//!
//! A check-in records physical presence at a gym, independent of whether any
//! sets are logged. Sessions are opened manually or by the geofence tracker,
//! and closed by leaving the radius, a manual stop, an external timeout
//! policy, or finishing a workout.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geo::types::GymLocation;
use crate::notify::Notifier;
use crate::storage::Database;

/// How long a manual stop suppresses auto check-in for the same gym.
pub const SUPPRESSION_WINDOW_MINS: i64 = 30;

/// Lifecycle of a check-in session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInStatus {
    #[default]
    Active,
    Completed,
    /// Force-closed by the external maximum-duration policy.
    Timeout,
}

impl CheckInStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInStatus::Active => "active",
            CheckInStatus::Completed => "completed",
            CheckInStatus::Timeout => "timeout",
        }
    }
}

impl std::str::FromStr for CheckInStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(CheckInStatus::Active),
            "completed" => Ok(CheckInStatus::Completed),
            "timeout" => Ok(CheckInStatus::Timeout),
            _ => Err(()),
        }
    }
}

/// How a session was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInType {
    #[default]
    Manual,
    Auto,
}

impl CheckInType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckInType::Manual => "manual",
            CheckInType::Auto => "auto",
        }
    }
}

impl std::str::FromStr for CheckInType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(CheckInType::Manual),
            "auto" => Ok(CheckInType::Auto),
            _ => Err(()),
        }
    }
}

/// Why a session is being closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// User tapped stop. Arms the per-gym suppression flag.
    Manual,
    /// Geofence-confirmed exit.
    GeofenceExit,
    /// External maximum-duration policy.
    Timeout,
    /// A workout finished and closed the session with it. Arms suppression
    /// so the geofence does not immediately re-open it.
    WorkoutFinished,
}

impl StopReason {
    fn closing_status(self) -> CheckInStatus {
        match self {
            StopReason::Timeout => CheckInStatus::Timeout,
            _ => CheckInStatus::Completed,
        }
    }

    fn arms_suppression(self) -> bool {
        matches!(self, StopReason::Manual | StopReason::WorkoutFinished)
    }
}

/// One gym presence session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GymCheckInSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub gym_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<u64>,
    pub status: CheckInStatus,
    pub kind: CheckInType,
    pub is_private: bool,
}

/// Errors from check-in operations.
#[derive(Debug, Error)]
pub enum CheckInError {
    /// A check-in session is already active.
    #[error("Already checked in")]
    AlreadyCheckedIn,

    /// No active check-in session to stop.
    #[error("No active check-in session")]
    NoActiveSession,

    /// Persistence failure.
    #[error("Database error: {0}")]
    Database(String),
}

/// Manages gym check-in sessions for one user.
pub struct CheckInManager {
    db: Arc<Mutex<Database>>,
    notifier: Arc<dyn Notifier>,
    /// Gyms suppressed after a manual stop, with the time the flag was armed.
    suppressed: HashMap<Uuid, DateTime<Utc>>,
}

impl CheckInManager {
    pub fn new(db: Arc<Mutex<Database>>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db,
            notifier,
            suppressed: HashMap::new(),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, CheckInError> {
        self.db
            .lock()
            .map_err(|e| CheckInError::Database(format!("Database lock failed: {e}")))
    }

    /// The user's active session, if any.
    pub fn active(&self, user_id: Uuid) -> Result<Option<GymCheckInSession>, CheckInError> {
        let db = self.lock()?;
        db.active_checkin(user_id)
            .map_err(|e| CheckInError::Database(e.to_string()))
    }

    /// Open a check-in session at a gym.
    ///
    /// Rejected while another session is active (one-active invariant).
    pub fn start(
        &mut self,
        user_id: Uuid,
        gym: &GymLocation,
        kind: CheckInType,
        is_private: bool,
    ) -> Result<GymCheckInSession, CheckInError> {
        let db = self.lock()?;
        if db
            .active_checkin(user_id)
            .map_err(|e| CheckInError::Database(e.to_string()))?
            .is_some()
        {
            return Err(CheckInError::AlreadyCheckedIn);
        }

        let session = GymCheckInSession {
            id: Uuid::new_v4(),
            user_id,
            gym_id: gym.id,
            start_time: Utc::now(),
            end_time: None,
            duration_secs: None,
            status: CheckInStatus::Active,
            kind,
            is_private,
        };
        db.insert_checkin(&session)
            .map_err(|e| CheckInError::Database(e.to_string()))?;
        drop(db);

        self.notifier.start_tracking(
            "Iron Circle",
            &format!("Checked into {}", gym.name),
            session.start_time,
        );
        tracing::info!(%user_id, gym = %gym.name, kind = kind.as_str(), "checked in");
        Ok(session)
    }

    /// Close the active session.
    ///
    /// Duration is computed at close; the closing status follows the reason
    /// (`Timeout` for the external policy, `Completed` otherwise). A manual
    /// stop arms the per-gym suppression flag so auto-tracking does not
    /// re-open the session while the user is still inside the radius.
    pub fn stop(
        &mut self,
        user_id: Uuid,
        reason: StopReason,
    ) -> Result<GymCheckInSession, CheckInError> {
        let session = self
            .stop_if_active(user_id, reason)?
            .ok_or(CheckInError::NoActiveSession)?;
        Ok(session)
    }

    /// Close the active session if there is one; `Ok(None)` otherwise.
    pub fn stop_if_active(
        &mut self,
        user_id: Uuid,
        reason: StopReason,
    ) -> Result<Option<GymCheckInSession>, CheckInError> {
        let db = self.lock()?;
        let Some(mut session) = db
            .active_checkin(user_id)
            .map_err(|e| CheckInError::Database(e.to_string()))?
        else {
            return Ok(None);
        };

        let end_time = Utc::now();
        let duration = (end_time - session.start_time).num_seconds().max(0) as u64;
        session.end_time = Some(end_time);
        session.duration_secs = Some(duration);
        session.status = reason.closing_status();

        db.close_checkin(session.id, end_time, duration, session.status)
            .map_err(|e| CheckInError::Database(e.to_string()))?;
        drop(db);

        if reason.arms_suppression() {
            self.suppressed.insert(session.gym_id, Utc::now());
            tracing::debug!(gym_id = %session.gym_id, "auto check-in suppressed");
        }

        self.notifier.stop();
        tracing::info!(
            %user_id,
            gym_id = %session.gym_id,
            duration_secs = duration,
            status = session.status.as_str(),
            "checked out"
        );
        Ok(Some(session))
    }

    /// Whether auto check-in is currently suppressed for a gym. Expired
    /// flags are cleared on query.
    pub fn is_suppressed(&mut self, gym_id: Uuid) -> bool {
        let window = Duration::minutes(SUPPRESSION_WINDOW_MINS);
        match self.suppressed.get(&gym_id) {
            Some(armed_at) if Utc::now() - *armed_at < window => true,
            Some(_) => {
                self.suppressed.remove(&gym_id);
                false
            }
            None => false,
        }
    }
}
