//! Workout session state machine.
//!
//! At most one workout is active per tracker. Every mutation is persisted
//! twice: a JSON snapshot for crash recovery and the database row with a
//! NULL end time. Finishing computes totals from completed sets only, runs
//! the XP pipeline, and commits everything in one transaction.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use uuid::Uuid;

use crate::gamification::xp::{calculate_session_xp, SessionMetrics, XpWeights};
use crate::notify::Notifier;
use crate::storage::{ActiveWorkoutCache, Database};
use crate::workout::checkin::{CheckInManager, StopReason};
use crate::workout::types::{
    ExerciseCatalog, ExerciseLog, PlanRef, SetEntry, SetUpdate, Visibility, WorkoutError,
    WorkoutSession, WorkoutStatus, WorkoutSummary, WorkoutTemplate,
};

/// Notification title shared by workout and check-in tracking.
const NOTIFICATION_TITLE: &str = "Iron Circle";

/// Drives the active workout through its lifecycle.
pub struct WorkoutTracker {
    db: Arc<Mutex<Database>>,
    cache: ActiveWorkoutCache,
    notifier: Arc<dyn Notifier>,
    catalog: ExerciseCatalog,
    active: Option<WorkoutSession>,
}

impl WorkoutTracker {
    pub fn new(
        db: Arc<Mutex<Database>>,
        cache: ActiveWorkoutCache,
        notifier: Arc<dyn Notifier>,
        catalog: ExerciseCatalog,
    ) -> Self {
        Self {
            db,
            cache,
            notifier,
            catalog,
            active: None,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, WorkoutError> {
        self.db
            .lock()
            .map_err(|e| WorkoutError::SaveFailed(format!("Database lock failed: {e}")))
    }

    /// The workout in progress, if any.
    pub fn active(&self) -> Option<&WorkoutSession> {
        self.active.as_ref()
    }

    /// Recover an interrupted workout on startup.
    ///
    /// The crash-recovery snapshot wins when fresh; otherwise the database
    /// row with a NULL end time is resumed. Recovery restarts the ongoing
    /// notification so the session looks uninterrupted.
    pub fn resume(&mut self, user_id: Uuid) -> Result<Option<&WorkoutSession>, WorkoutError> {
        if self.active.is_some() {
            return Ok(self.active.as_ref());
        }

        let mut session = match self.cache.load() {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("workout cache unreadable, falling back to database: {e}");
                None
            }
        };

        // The snapshot may belong to a different user of the same device.
        if let Some(cached) = &session {
            if cached.user_id != user_id {
                tracing::warn!(
                    cached_user = %cached.user_id,
                    "cached workout belongs to another user, falling back to database"
                );
                session = None;
            }
        }

        if session.is_none() {
            session = self
                .lock()?
                .load_active_workout(user_id)
                .map_err(|e| WorkoutError::SaveFailed(e.to_string()))?;
        }

        let Some(session) = session else {
            return Ok(None);
        };

        tracing::info!(workout_id = %session.id, name = %session.name, "resuming workout");
        self.notifier
            .start_tracking(NOTIFICATION_TITLE, &session.name, session.start_time);
        self.active = Some(session);
        self.update_notification();
        Ok(self.active.as_ref())
    }

    /// Start a new workout.
    ///
    /// A template seeds the exercise list; exercises without pre-seeded sets
    /// get a single empty one. Rejected while another workout is active.
    pub fn start(
        &mut self,
        user_id: Uuid,
        name: impl Into<String>,
        template: Option<&WorkoutTemplate>,
        plan: Option<PlanRef>,
    ) -> Result<&WorkoutSession, WorkoutError> {
        if self.active.is_some() {
            return Err(WorkoutError::AlreadyActive);
        }

        let logs = template
            .map(|t| {
                t.exercises
                    .iter()
                    .map(|exercise| {
                        if exercise.sets.is_empty() {
                            ExerciseLog::new(&exercise.exercise_id)
                        } else {
                            ExerciseLog {
                                exercise_id: exercise.exercise_id.clone(),
                                sets: exercise.sets.clone(),
                            }
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let session = WorkoutSession {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            start_time: Utc::now(),
            logs,
            status: WorkoutStatus::Active,
            plan_id: plan.map(|p| p.plan_id),
            plan_day_id: plan.and_then(|p| p.plan_day_id),
            template_id: template.map(|t| t.id),
        };

        tracing::info!(workout_id = %session.id, name = %session.name, "workout started");
        self.notifier
            .start_tracking(NOTIFICATION_TITLE, &session.name, session.start_time);
        self.active = Some(session);
        self.persist_active();
        self.update_notification();
        Ok(self.active.as_ref().ok_or(WorkoutError::NoActiveWorkout)?)
    }

    /// Add an exercise to the active workout, with one empty set.
    pub fn add_exercise(&mut self, exercise_id: &str) -> Result<(), WorkoutError> {
        let session = self.active.as_mut().ok_or(WorkoutError::NoActiveWorkout)?;
        if session.logs.iter().any(|l| l.exercise_id == exercise_id) {
            return Err(WorkoutError::DuplicateExercise(exercise_id.to_string()));
        }
        session.logs.push(ExerciseLog::new(exercise_id));
        self.persist_active();
        self.update_notification();
        Ok(())
    }

    /// Remove an exercise and all its sets.
    pub fn remove_exercise(&mut self, exercise_id: &str) -> Result<(), WorkoutError> {
        let session = self.active.as_mut().ok_or(WorkoutError::NoActiveWorkout)?;
        let before = session.logs.len();
        session.logs.retain(|l| l.exercise_id != exercise_id);
        if session.logs.len() == before {
            return Err(WorkoutError::UnknownExercise(exercise_id.to_string()));
        }
        self.persist_active();
        self.update_notification();
        Ok(())
    }

    /// Apply a partial update to one set.
    ///
    /// Marking a set completed stamps its completion time; un-marking clears
    /// it. Returns the set after the update.
    pub fn log_set(
        &mut self,
        exercise_id: &str,
        index: usize,
        update: SetUpdate,
    ) -> Result<SetEntry, WorkoutError> {
        let log = self.log_mut(exercise_id)?;
        let set = log
            .sets
            .get_mut(index)
            .ok_or_else(|| WorkoutError::SetOutOfRange {
                exercise_id: exercise_id.to_string(),
                index,
            })?;

        if let Some(weight) = update.weight {
            set.weight = weight;
        }
        if let Some(reps) = update.reps {
            set.reps = reps;
        }
        if let Some(completed) = update.completed {
            set.completed = completed;
            set.completed_at = completed.then(Utc::now);
        }

        let updated = *set;
        self.persist_active();
        self.update_notification();
        Ok(updated)
    }

    /// Append a set to an exercise, seeded from its last set.
    pub fn add_set(&mut self, exercise_id: &str) -> Result<SetEntry, WorkoutError> {
        let log = self.log_mut(exercise_id)?;
        let seed = log.sets.last().copied().unwrap_or_default();
        let set = SetEntry {
            weight: seed.weight,
            reps: seed.reps,
            completed: false,
            completed_at: None,
        };
        log.sets.push(set);
        self.persist_active();
        self.update_notification();
        Ok(set)
    }

    /// Remove a set. Every exercise keeps at least one.
    pub fn remove_set(&mut self, exercise_id: &str, index: usize) -> Result<(), WorkoutError> {
        let log = self.log_mut(exercise_id)?;
        if index >= log.sets.len() {
            return Err(WorkoutError::SetOutOfRange {
                exercise_id: exercise_id.to_string(),
                index,
            });
        }
        if log.sets.len() == 1 {
            return Err(WorkoutError::LastSet(exercise_id.to_string()));
        }
        log.sets.remove(index);
        self.persist_active();
        self.update_notification();
        Ok(())
    }

    /// Finish the active workout.
    ///
    /// Totals come from completed sets only. The workout row, its logs, the
    /// XP award, and the progress update commit in one transaction; on a
    /// persistence failure the in-memory session is kept so the user can
    /// retry without losing logged sets. Any check-in session the workout
    /// was running under is closed with it.
    pub fn finish(
        &mut self,
        visibility: Visibility,
        weights: XpWeights,
        streak: u32,
        prs: u32,
        checkins: &mut CheckInManager,
    ) -> Result<WorkoutSummary, WorkoutError> {
        let session = self.active.take().ok_or(WorkoutError::NoActiveWorkout)?;

        let end_time = Utc::now();
        let duration_secs = (end_time - session.start_time).num_seconds().max(0) as u64;
        let (volume, distance_m) = tally_completed(&session, &self.catalog);
        let metrics = SessionMetrics {
            duration_secs,
            volume,
            distance_m,
            prs,
            streak,
        };
        let award = calculate_session_xp(&metrics, weights);

        let saved = (|| -> Result<bool, WorkoutError> {
            let mut db = self
                .db
                .lock()
                .map_err(|e| WorkoutError::SaveFailed(format!("Database lock failed: {e}")))?;
            let mut progress = db
                .get_or_create_progress(session.user_id)
                .map_err(|e| WorkoutError::SaveFailed(e.to_string()))?;
            progress.apply_award(award.total);
            db.finish_workout(
                &session,
                end_time,
                duration_secs,
                volume,
                distance_m,
                visibility,
                &award,
                &progress,
            )
            .map_err(|e| WorkoutError::SaveFailed(e.to_string()))
        })();

        let awarded = match saved {
            Ok(awarded) => awarded,
            Err(e) => {
                tracing::error!(workout_id = %session.id, "failed to save finished workout: {e}");
                self.active = Some(session);
                return Err(e);
            }
        };
        if !awarded {
            tracing::debug!(workout_id = %session.id, "finish retried, XP already awarded");
        }

        if let Err(e) = checkins.stop_if_active(session.user_id, StopReason::WorkoutFinished) {
            tracing::warn!("failed to close check-in with workout: {e}");
        }
        if let Err(e) = self.cache.clear() {
            tracing::warn!("failed to clear workout cache: {e}");
        }
        self.notifier.stop();

        tracing::info!(
            workout_id = %session.id,
            earned_xp = award.total,
            duration_secs,
            "workout finished"
        );
        Ok(WorkoutSummary {
            name: session.name,
            earned_xp: award.total,
            breakdown: award.breakdown,
            duration_secs,
            volume,
            distance_m,
        })
    }

    /// Discard the active workout entirely.
    ///
    /// On a persistence failure the in-memory session is kept so the user
    /// can retry the cancel; otherwise a restart would resurrect a workout
    /// the user already discarded.
    pub fn cancel(&mut self) -> Result<(), WorkoutError> {
        let session = self.active.take().ok_or(WorkoutError::NoActiveWorkout)?;

        let deleted = match self.lock() {
            Ok(mut db) => db
                .delete_workout(session.id)
                .map_err(|e| WorkoutError::SaveFailed(e.to_string())),
            Err(e) => Err(e),
        };
        if let Err(e) = deleted {
            tracing::error!(workout_id = %session.id, "failed to delete cancelled workout: {e}");
            self.active = Some(session);
            return Err(e);
        }

        if let Err(e) = self.cache.clear() {
            tracing::warn!("failed to clear workout cache: {e}");
        }
        self.notifier.stop();
        tracing::info!(workout_id = %session.id, "workout cancelled");
        Ok(())
    }

    fn log_mut(&mut self, exercise_id: &str) -> Result<&mut ExerciseLog, WorkoutError> {
        self.active
            .as_mut()
            .ok_or(WorkoutError::NoActiveWorkout)?
            .logs
            .iter_mut()
            .find(|l| l.exercise_id == exercise_id)
            .ok_or_else(|| WorkoutError::UnknownExercise(exercise_id.to_string()))
    }

    /// Mirror the session to the crash cache and the database.
    ///
    /// Failures are logged, not surfaced: the in-memory state stays valid
    /// and the next mutation retries the write.
    fn persist_active(&self) {
        let Some(session) = &self.active else {
            return;
        };

        if let Err(e) = self.cache.save(session) {
            tracing::warn!("failed to write workout cache: {e}");
        }
        match self.db.lock() {
            Ok(mut db) => {
                if let Err(e) = db.save_active_workout(session) {
                    tracing::warn!("failed to persist active workout: {e}");
                }
            }
            Err(e) => tracing::warn!("Database lock failed: {e}"),
        }
    }

    fn update_notification(&self) {
        if let Some(session) = &self.active {
            let (total, done) = session.set_counts();
            self.notifier
                .set_completion_text(&format!("{done}/{total} Sets"));
        }
    }
}

/// Volume and distance from completed sets only.
///
/// Cardio sets store distance in the weight field (meters); strength sets
/// contribute weight times reps.
fn tally_completed(session: &WorkoutSession, catalog: &ExerciseCatalog) -> (f64, f64) {
    let mut volume = 0.0;
    let mut distance_m = 0.0;
    for log in &session.logs {
        let cardio = catalog.is_cardio(&log.exercise_id);
        for set in log.sets.iter().filter(|s| s.completed) {
            if cardio {
                distance_m += set.weight;
            } else {
                volume += set.volume();
            }
        }
    }
    (volume, distance_m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;
    use crate::workout::types::ExerciseKind;

    fn tracker() -> (WorkoutTracker, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
        let mut catalog = ExerciseCatalog::new();
        catalog.insert("bench-press", ExerciseKind::Strength);
        catalog.insert("treadmill", ExerciseKind::Cardio);
        (
            WorkoutTracker::new(db, cache, Arc::new(NullNotifier), catalog),
            dir,
        )
    }

    fn complete_set(tracker: &mut WorkoutTracker, exercise: &str, index: usize, weight: f64, reps: u32) {
        tracker
            .log_set(
                exercise,
                index,
                SetUpdate {
                    weight: Some(weight),
                    reps: Some(reps),
                    completed: Some(true),
                },
            )
            .unwrap();
    }

    #[test]
    fn test_one_active_workout() {
        let (mut tracker, _dir) = tracker();
        let user = Uuid::new_v4();

        tracker.start(user, "Push Day", None, None).unwrap();
        assert!(matches!(
            tracker.start(user, "Pull Day", None, None),
            Err(WorkoutError::AlreadyActive)
        ));
    }

    #[test]
    fn test_set_lifecycle() {
        let (mut tracker, _dir) = tracker();
        tracker
            .start(Uuid::new_v4(), "Push Day", None, None)
            .unwrap();
        tracker.add_exercise("bench-press").unwrap();

        let set = tracker
            .log_set(
                "bench-press",
                0,
                SetUpdate {
                    weight: Some(80.0),
                    reps: Some(8),
                    completed: Some(true),
                },
            )
            .unwrap();
        assert!(set.completed_at.is_some());

        // New sets inherit weight and reps but start uncompleted.
        let added = tracker.add_set("bench-press").unwrap();
        assert_eq!(added.weight, 80.0);
        assert_eq!(added.reps, 8);
        assert!(!added.completed);

        // Un-marking clears the completion stamp.
        let cleared = tracker
            .log_set(
                "bench-press",
                0,
                SetUpdate {
                    completed: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(cleared.completed_at.is_none());

        tracker.remove_set("bench-press", 1).unwrap();
        assert!(matches!(
            tracker.remove_set("bench-press", 0),
            Err(WorkoutError::LastSet(_))
        ));
    }

    #[test]
    fn test_duplicate_and_unknown_exercise() {
        let (mut tracker, _dir) = tracker();
        tracker.start(Uuid::new_v4(), "Push Day", None, None).unwrap();
        tracker.add_exercise("bench-press").unwrap();

        assert!(matches!(
            tracker.add_exercise("bench-press"),
            Err(WorkoutError::DuplicateExercise(_))
        ));
        assert!(matches!(
            tracker.log_set("squat", 0, SetUpdate::default()),
            Err(WorkoutError::UnknownExercise(_))
        ));
    }

    #[test]
    fn test_finish_counts_completed_sets_only() {
        let (mut tracker, _dir) = tracker();
        let db = Arc::clone(&tracker.db);
        let mut checkins = CheckInManager::new(Arc::clone(&db), Arc::new(NullNotifier));
        let user = Uuid::new_v4();

        tracker.start(user, "Push Day", None, None).unwrap();
        tracker.add_exercise("bench-press").unwrap();
        complete_set(&mut tracker, "bench-press", 0, 100.0, 10);
        tracker.add_set("bench-press").unwrap();
        complete_set(&mut tracker, "bench-press", 1, 100.0, 10);
        tracker.add_set("bench-press").unwrap();
        // Third set left uncompleted: must not count.

        let summary = tracker
            .finish(
                Visibility::Public,
                XpWeights::default(),
                0,
                0,
                &mut checkins,
            )
            .unwrap();
        assert_eq!(summary.volume, 2_000.0);
        assert_eq!(summary.breakdown.volume, 100);
        assert_eq!(summary.earned_xp, summary.breakdown.sum());
        assert!(tracker.active().is_none());
    }

    #[test]
    fn test_finish_awards_xp_and_closes_checkin() {
        let (mut tracker, _dir) = tracker();
        let db = Arc::clone(&tracker.db);
        let mut checkins = CheckInManager::new(Arc::clone(&db), Arc::new(NullNotifier));
        let user = Uuid::new_v4();
        let gym = crate::geo::types::GymLocation::new(
            Uuid::new_v4(),
            "Iron Temple",
            crate::geo::types::Coordinates::new(0.0, 0.0),
        );

        checkins
            .start(user, &gym, crate::workout::checkin::CheckInType::Manual, false)
            .unwrap();
        tracker.start(user, "Push Day", None, None).unwrap();
        tracker.add_exercise("treadmill").unwrap();
        // 5 km logged as a cardio set.
        complete_set(&mut tracker, "treadmill", 0, 5_000.0, 30);

        let summary = tracker
            .finish(
                Visibility::Public,
                XpWeights::default(),
                0,
                0,
                &mut checkins,
            )
            .unwrap();
        assert_eq!(summary.distance_m, 5_000.0);
        assert_eq!(summary.breakdown.distance, 500);

        let progress = db
            .lock()
            .unwrap()
            .get_progress(user)
            .unwrap()
            .unwrap();
        assert_eq!(progress.cycle_xp, summary.earned_xp);
        assert!(checkins.active(user).unwrap().is_none());
        // Closing with the workout arms suppression like a manual stop.
        assert!(checkins.is_suppressed(gym.id));
    }

    #[test]
    fn test_cancel_discards_everything() {
        let (mut tracker, _dir) = tracker();
        let db = Arc::clone(&tracker.db);
        let user = Uuid::new_v4();

        tracker.start(user, "Push Day", None, None).unwrap();
        tracker.add_exercise("bench-press").unwrap();
        tracker.cancel().unwrap();

        assert!(tracker.active().is_none());
        assert!(db.lock().unwrap().load_active_workout(user).unwrap().is_none());
        assert!(tracker.cache.load().unwrap().is_none());
    }

    #[test]
    fn test_cancel_failure_keeps_session_for_retry() {
        let (mut tracker, _dir) = tracker();
        let user = Uuid::new_v4();

        tracker.start(user, "Push Day", None, None).unwrap();
        tracker.add_exercise("bench-press").unwrap();

        // Poison the database mutex so the delete cannot run.
        let db = Arc::clone(&tracker.db);
        let _ = std::thread::spawn(move || {
            let _guard = db.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(matches!(tracker.cancel(), Err(WorkoutError::SaveFailed(_))));
        // The session stays active so the cancel can be retried; a failed
        // cancel must not look like a clean one and resurrect on restart.
        assert!(tracker.active().is_some());
        assert!(tracker.cache.load().unwrap().is_some());
    }

    #[test]
    fn test_resume_ignores_other_users_cache() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let owner = Uuid::new_v4();

        {
            let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
            let mut tracker = WorkoutTracker::new(
                Arc::clone(&db),
                cache,
                Arc::new(NullNotifier),
                ExerciseCatalog::new(),
            );
            tracker.start(owner, "Push Day", None, None).unwrap();
        }

        // A different user on the same device must not pick up the snapshot.
        let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
        let mut tracker = WorkoutTracker::new(
            Arc::clone(&db),
            cache,
            Arc::new(NullNotifier),
            ExerciseCatalog::new(),
        );
        assert!(tracker.resume(Uuid::new_v4()).unwrap().is_none());

        // The owner still recovers their workout.
        let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
        let mut tracker =
            WorkoutTracker::new(db, cache, Arc::new(NullNotifier), ExerciseCatalog::new());
        assert!(tracker.resume(owner).unwrap().is_some());
    }

    #[test]
    fn test_resume_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let user = Uuid::new_v4();
        let workout_id;

        {
            let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
            let mut tracker = WorkoutTracker::new(
                Arc::clone(&db),
                cache,
                Arc::new(NullNotifier),
                ExerciseCatalog::new(),
            );
            tracker.start(user, "Push Day", None, None).unwrap();
            tracker.add_exercise("bench-press").unwrap();
            workout_id = tracker.active().unwrap().id;
            // Dropped without finishing: simulates a crash.
        }

        let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
        let mut tracker =
            WorkoutTracker::new(db, cache, Arc::new(NullNotifier), ExerciseCatalog::new());
        let resumed = tracker.resume(user).unwrap().unwrap();
        assert_eq!(resumed.id, workout_id);
        assert_eq!(resumed.logs.len(), 1);
    }

    #[test]
    fn test_resume_from_database_when_cache_missing() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let user = Uuid::new_v4();
        let workout_id;

        {
            let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
            let mut tracker = WorkoutTracker::new(
                Arc::clone(&db),
                cache,
                Arc::new(NullNotifier),
                ExerciseCatalog::new(),
            );
            tracker.start(user, "Push Day", None, None).unwrap();
            workout_id = tracker.active().unwrap().id;
        }
        std::fs::remove_file(dir.path().join("active_workout.json")).unwrap();

        let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
        let mut tracker =
            WorkoutTracker::new(db, cache, Arc::new(NullNotifier), ExerciseCatalog::new());
        let resumed = tracker.resume(user).unwrap().unwrap();
        assert_eq!(resumed.id, workout_id);
    }

    #[test]
    fn test_template_seeds_logs() {
        let (mut tracker, _dir) = tracker();
        let template = WorkoutTemplate {
            id: Uuid::new_v4(),
            name: "PPL Day 1".to_string(),
            exercises: vec![
                crate::workout::types::TemplateExercise {
                    exercise_id: "bench-press".to_string(),
                    sets: vec![
                        SetEntry {
                            weight: 60.0,
                            reps: 10,
                            ..Default::default()
                        };
                        3
                    ],
                },
                crate::workout::types::TemplateExercise {
                    exercise_id: "treadmill".to_string(),
                    sets: Vec::new(),
                },
            ],
        };

        let session = tracker
            .start(Uuid::new_v4(), "PPL Day 1", Some(&template), None)
            .unwrap();
        assert_eq!(session.template_id, Some(template.id));
        assert_eq!(session.logs[0].sets.len(), 3);
        assert_eq!(session.logs[1].sets.len(), 1);
    }
}
