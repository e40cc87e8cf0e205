//! Database schema definitions.

/// SQL schema for creating all tables.
pub const SCHEMA: &str = r#"
-- User leveling state
CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT PRIMARY KEY,
    lifetime_xp INTEGER NOT NULL DEFAULT 0,
    cycle_xp INTEGER NOT NULL DEFAULT 0,
    level INTEGER NOT NULL DEFAULT 1,
    current_xp_in_level INTEGER NOT NULL DEFAULT 0,
    prestige_level INTEGER NOT NULL DEFAULT 0,
    xp_overflow INTEGER NOT NULL DEFAULT 0,
    updated_at TEXT NOT NULL
);

-- Workouts: active rows have NULL end_time
CREATE TABLE IF NOT EXISTS workouts (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    name TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    duration_seconds INTEGER,
    volume REAL NOT NULL DEFAULT 0,
    distance_meters REAL NOT NULL DEFAULT 0,
    visibility TEXT NOT NULL DEFAULT 'public',
    plan_id TEXT,
    plan_day_id TEXT,
    template_id TEXT
);

-- Per-exercise set logs for a workout
CREATE TABLE IF NOT EXISTS workout_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workout_id TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
    exercise_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    sets_json TEXT NOT NULL
);

-- Gym presence sessions
CREATE TABLE IF NOT EXISTS checkin_sessions (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    gym_id TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    duration_seconds INTEGER,
    status TEXT NOT NULL DEFAULT 'active',
    type TEXT NOT NULL DEFAULT 'manual',
    is_private INTEGER NOT NULL DEFAULT 0
);

-- Registered gyms with geofence settings
CREATE TABLE IF NOT EXISTS gyms (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    lat REAL NOT NULL,
    lng REAL NOT NULL,
    tracking_radius_m INTEGER NOT NULL DEFAULT 200
);

-- XP award ledger: one row per awarded source, makes retries idempotent
CREATE TABLE IF NOT EXISTS xp_awards (
    source_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    amount INTEGER NOT NULL,
    awarded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_workouts_user_end ON workouts(user_id, end_time);
CREATE INDEX IF NOT EXISTS idx_logs_workout ON workout_logs(workout_id, position);
CREATE INDEX IF NOT EXISTS idx_checkins_user_status ON checkin_sessions(user_id, status);
"#;

/// SQL for the schema version tracking table.
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version.
pub const CURRENT_VERSION: i32 = 1;
