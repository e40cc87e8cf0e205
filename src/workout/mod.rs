//! Workout module for session tracking and gym check-ins.

pub mod checkin;
pub mod tracker;
pub mod types;

pub use checkin::{
    CheckInError, CheckInManager, CheckInStatus, CheckInType, GymCheckInSession, StopReason,
};
pub use tracker::WorkoutTracker;
pub use types::{
    ExerciseCatalog, ExerciseKind, ExerciseLog, PlanRef, SetEntry, SetUpdate, Visibility,
    WorkoutError, WorkoutSession, WorkoutStatus, WorkoutSummary, WorkoutTemplate,
};
