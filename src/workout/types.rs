//! Workout session types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::gamification::xp::XpBreakdown;

/// One logged set.
///
/// For cardio exercises the fields are overloaded: `weight` carries distance
/// in meters and `reps` carries minutes. This mirrors the stored data format
/// and is preserved as observed behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetEntry {
    pub weight: f64,
    pub reps: u32,
    pub completed: bool,
    /// Set when the set transitions to completed, cleared otherwise.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for SetEntry {
    fn default() -> Self {
        Self {
            weight: 0.0,
            reps: 0,
            completed: false,
            completed_at: None,
        }
    }
}

impl SetEntry {
    /// Strength volume contribution (weight x reps).
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

/// Partial update applied to a set by [`crate::workout::WorkoutTracker::log_set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SetUpdate {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub completed: Option<bool>,
}

/// All sets performed for one exercise, in performance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseLog {
    pub exercise_id: String,
    pub sets: Vec<SetEntry>,
}

impl ExerciseLog {
    /// New log with a single empty set.
    pub fn new(exercise_id: impl Into<String>) -> Self {
        Self {
            exercise_id: exercise_id.into(),
            sets: vec![SetEntry::default()],
        }
    }
}

/// Lifecycle of a workout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutStatus {
    #[default]
    Active,
    Completed,
    Cancelled,
}

/// Who can see a finished workout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Visibility::Public),
            "private" => Ok(Visibility::Private),
            _ => Err(()),
        }
    }
}

/// An in-progress or finished workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub logs: Vec<ExerciseLog>,
    pub status: WorkoutStatus,
    pub plan_id: Option<Uuid>,
    pub plan_day_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
}

impl WorkoutSession {
    /// Total and completed set counts, for progress display.
    pub fn set_counts(&self) -> (usize, usize) {
        let total = self.logs.iter().map(|l| l.sets.len()).sum();
        let done = self
            .logs
            .iter()
            .map(|l| l.sets.iter().filter(|s| s.completed).count())
            .sum();
        (total, done)
    }
}

/// Link from a workout back to the training plan day it fulfills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRef {
    pub plan_id: Uuid,
    pub plan_day_id: Option<Uuid>,
}

/// One exercise in a template, with optional pre-seeded sets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub exercise_id: String,
    #[serde(default)]
    pub sets: Vec<SetEntry>,
}

/// A reusable workout template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub name: String,
    pub exercises: Vec<TemplateExercise>,
}

/// Strength exercises accumulate volume; cardio exercises accumulate
/// distance (via the overloaded set fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    #[default]
    Strength,
    Cardio,
}

/// Maps exercise ids to their kind. Unknown exercises default to strength.
#[derive(Debug, Clone, Default)]
pub struct ExerciseCatalog {
    kinds: HashMap<String, ExerciseKind>,
}

impl ExerciseCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, exercise_id: impl Into<String>, kind: ExerciseKind) {
        self.kinds.insert(exercise_id.into(), kind);
    }

    pub fn kind(&self, exercise_id: &str) -> ExerciseKind {
        self.kinds
            .get(exercise_id)
            .copied()
            .unwrap_or(ExerciseKind::Strength)
    }

    pub fn is_cardio(&self, exercise_id: &str) -> bool {
        self.kind(exercise_id) == ExerciseKind::Cardio
    }
}

impl FromIterator<(String, ExerciseKind)> for ExerciseCatalog {
    fn from_iter<T: IntoIterator<Item = (String, ExerciseKind)>>(iter: T) -> Self {
        Self {
            kinds: iter.into_iter().collect(),
        }
    }
}

/// Summary returned by a finished workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSummary {
    pub name: String,
    pub earned_xp: u64,
    pub breakdown: XpBreakdown,
    pub duration_secs: u64,
    pub volume: f64,
    pub distance_m: f64,
}

/// Errors from the workout state machine.
#[derive(Debug, Error)]
pub enum WorkoutError {
    /// A workout is already active; finish or cancel it first.
    #[error("A workout is already active")]
    AlreadyActive,

    /// No workout in progress.
    #[error("No active workout")]
    NoActiveWorkout,

    /// The exercise is not part of the active workout.
    #[error("Exercise not in workout: {0}")]
    UnknownExercise(String),

    /// The exercise is already part of the active workout.
    #[error("Exercise already in workout: {0}")]
    DuplicateExercise(String),

    /// The set index does not exist for that exercise.
    #[error("Set {index} out of range for exercise {exercise_id}")]
    SetOutOfRange { exercise_id: String, index: usize },

    /// An exercise log must always retain at least one set.
    #[error("Cannot remove the last set of {0}")]
    LastSet(String),

    /// Persistence failure; locally logged data is kept for retry.
    #[error("Failed to save workout: {0}")]
    SaveFailed(String),
}
