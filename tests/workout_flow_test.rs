//! Integration tests for the workout lifecycle end to end.
//!
//! Drives the public API the way the app does: start a session, log sets,
//! crash and recover, finish, and verify the XP that lands on the profile
//! matches the summary.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use ironcore::gamification::xp::{Goal, XpWeights};
use ironcore::notify::NullNotifier;
use ironcore::storage::{ActiveWorkoutCache, Database};
use ironcore::workout::{
    CheckInManager, ExerciseCatalog, ExerciseKind, SetUpdate, Visibility, WorkoutTracker,
};
use ironcore::ProgressTracker;
use uuid::Uuid;

struct Harness {
    db: Arc<Mutex<Database>>,
    tracker: WorkoutTracker,
    checkins: CheckInManager,
    _dir: tempfile::TempDir,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
    let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));

    let mut catalog = ExerciseCatalog::new();
    catalog.insert("bench-press", ExerciseKind::Strength);
    catalog.insert("squat", ExerciseKind::Strength);
    catalog.insert("rowing-machine", ExerciseKind::Cardio);

    Harness {
        tracker: WorkoutTracker::new(
            Arc::clone(&db),
            cache,
            Arc::new(NullNotifier),
            catalog,
        ),
        checkins: CheckInManager::new(Arc::clone(&db), Arc::new(NullNotifier)),
        db,
        _dir: dir,
    }
}

fn log_completed(tracker: &mut WorkoutTracker, exercise: &str, index: usize, weight: f64, reps: u32) {
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
fn test_full_session_awards_match_profile() {
    let mut h = harness();
    let user = Uuid::new_v4();

    h.tracker.start(user, "Push Day", None, None).unwrap();
    h.tracker.add_exercise("bench-press").unwrap();
    log_completed(&mut h.tracker, "bench-press", 0, 80.0, 10);
    h.tracker.add_set("bench-press").unwrap();
    log_completed(&mut h.tracker, "bench-press", 1, 80.0, 8);
    h.tracker.add_exercise("rowing-machine").unwrap();
    log_completed(&mut h.tracker, "rowing-machine", 0, 2_000.0, 10);

    let summary = h
        .tracker
        .finish(
            Visibility::Public,
            XpWeights::from(Goal::Endurance),
            5,
            1,
            &mut h.checkins,
        )
        .unwrap();

    assert_eq!(summary.volume, 80.0 * 10.0 + 80.0 * 8.0);
    assert_eq!(summary.distance_m, 2_000.0);
    assert_eq!(summary.earned_xp, summary.breakdown.sum());

    // The profile gained exactly what the summary reported.
    let progress = ProgressTracker::new(Arc::clone(&h.db))
        .load_or_create(user)
        .unwrap();
    assert_eq!(progress.cycle_xp, summary.earned_xp);
    assert_eq!(progress.lifetime_xp, summary.earned_xp);

    // The stored row matches the summary too.
    let history = h.db.lock().unwrap().workout_history(user).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].volume, summary.volume);
    assert_eq!(history[0].visibility, Visibility::Public);
    assert!(history[0].end_time.is_some());
}

#[test]
fn test_crash_recovery_preserves_logged_sets() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
    let user = Uuid::new_v4();

    {
        let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
        let mut tracker = WorkoutTracker::new(
            Arc::clone(&db),
            cache,
            Arc::new(NullNotifier),
            ExerciseCatalog::new(),
        );
        tracker.start(user, "Leg Day", None, None).unwrap();
        tracker.add_exercise("squat").unwrap();
        log_completed(&mut tracker, "squat", 0, 120.0, 5);
        // Dropped mid-session: simulates the app dying.
    }

    let cache = ActiveWorkoutCache::new(dir.path().join("active_workout.json"));
    let mut tracker = WorkoutTracker::new(
        Arc::clone(&db),
        cache,
        Arc::new(NullNotifier),
        ExerciseCatalog::new(),
    );
    let resumed = tracker.resume(user).unwrap().unwrap();
    assert_eq!(resumed.name, "Leg Day");
    assert_eq!(resumed.logs[0].sets[0].weight, 120.0);
    assert!(resumed.logs[0].sets[0].completed);

    // Finishing after recovery still works end to end.
    let mut checkins = CheckInManager::new(Arc::clone(&db), Arc::new(NullNotifier));
    let summary = tracker
        .finish(Visibility::Private, XpWeights::default(), 0, 0, &mut checkins)
        .unwrap();
    assert_eq!(summary.volume, 600.0);
}

#[test]
fn test_finished_workout_is_not_resumed() {
    let mut h = harness();
    let user = Uuid::new_v4();

    h.tracker.start(user, "Push Day", None, None).unwrap();
    h.tracker.add_exercise("bench-press").unwrap();
    log_completed(&mut h.tracker, "bench-press", 0, 60.0, 10);
    h.tracker
        .finish(Visibility::Public, XpWeights::default(), 0, 0, &mut h.checkins)
        .unwrap();

    assert!(h.tracker.resume(user).unwrap().is_none());
}

#[test]
fn test_finish_with_zero_completed_sets_is_valid() {
    let mut h = harness();
    let user = Uuid::new_v4();

    h.tracker.start(user, "Cut Short", None, None).unwrap();
    h.tracker.add_exercise("bench-press").unwrap();
    // Weight and reps entered, but the set is never marked done.
    h.tracker
        .log_set(
            "bench-press",
            0,
            SetUpdate {
                weight: Some(80.0),
                reps: Some(10),
                completed: None,
            },
        )
        .unwrap();

    // An empty session is a valid finish, not an error.
    let summary = h
        .tracker
        .finish(Visibility::Public, XpWeights::default(), 0, 0, &mut h.checkins)
        .unwrap();

    assert_eq!(summary.volume, 0.0);
    assert_eq!(summary.distance_m, 0.0);
    assert_eq!(summary.breakdown.volume, 0);
    assert_eq!(summary.breakdown.distance, 0);
    assert_eq!(summary.breakdown.pr, 0);
    assert_eq!(summary.breakdown.streak, 0);
    // Duration XP still applies when any time elapsed.
    let expected_time = if summary.duration_secs > 0 {
        100 + (summary.duration_secs / 60) * 2
    } else {
        0
    };
    assert_eq!(summary.breakdown.time, expected_time);
    assert_eq!(summary.earned_xp, summary.breakdown.sum());

    // The workout is stored and the profile credited consistently.
    let history = h.db.lock().unwrap().workout_history(user).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].volume, 0.0);
    let progress = ProgressTracker::new(Arc::clone(&h.db))
        .load_or_create(user)
        .unwrap();
    assert_eq!(progress.cycle_xp, summary.earned_xp);
    assert!(h.tracker.active().is_none());
}

#[test]
fn test_cancelled_workout_leaves_no_trace() {
    let mut h = harness();
    let user = Uuid::new_v4();

    h.tracker.start(user, "Push Day", None, None).unwrap();
    h.tracker.add_exercise("bench-press").unwrap();
    h.tracker.cancel().unwrap();

    assert!(h.tracker.resume(user).unwrap().is_none());
    assert!(h.db.lock().unwrap().workout_history(user).unwrap().is_empty());

    // Profile never saw any XP.
    let progress = ProgressTracker::new(Arc::clone(&h.db))
        .load_or_create(user)
        .unwrap();
    assert_eq!(progress.lifetime_xp, 0);
}

#[test]
fn test_private_visibility_is_stored() {
    let mut h = harness();
    let user = Uuid::new_v4();

    h.tracker.start(user, "Secret Session", None, None).unwrap();
    h.tracker.add_exercise("squat").unwrap();
    log_completed(&mut h.tracker, "squat", 0, 100.0, 5);
    h.tracker
        .finish(Visibility::Private, XpWeights::default(), 0, 0, &mut h.checkins)
        .unwrap();

    let history = h.db.lock().unwrap().workout_history(user).unwrap();
    assert_eq!(history[0].visibility, Visibility::Private);
}

#[test]
fn test_session_duration_is_non_negative() {
    let mut h = harness();
    let user = Uuid::new_v4();

    let started = Utc::now();
    h.tracker.start(user, "Quick One", None, None).unwrap();
    h.tracker.add_exercise("bench-press").unwrap();
    log_completed(&mut h.tracker, "bench-press", 0, 40.0, 12);
    let summary = h
        .tracker
        .finish(Visibility::Public, XpWeights::default(), 0, 0, &mut h.checkins)
        .unwrap();

    let elapsed = (Utc::now() - started).num_seconds().max(0) as u64;
    assert!(summary.duration_secs <= elapsed + 1);
}
