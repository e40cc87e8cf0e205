//! Database operations using rusqlite.
//!
//! The record store behind the core: user progress, workouts and their set
//! logs, gym check-in sessions, registered gyms, and the XP award ledger.
//! Finishing a workout and applying an XP award run inside a single
//! transaction so a crash can never half-apply them.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use uuid::Uuid;

use crate::gamification::types::UserProgress;
use crate::gamification::xp::XpAward;
use crate::geo::types::{Coordinates, GymLocation};
use crate::storage::schema::{CURRENT_VERSION, SCHEMA, SCHEMA_VERSION_TABLE};
use crate::workout::checkin::{CheckInStatus, CheckInType, GymCheckInSession};
use crate::workout::types::{ExerciseLog, Visibility, WorkoutSession, WorkoutStatus};

/// Database wrapper for SQLite operations.
pub struct Database {
    conn: Connection,
}

/// A finished workout as stored, without its set logs.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_secs: Option<u64>,
    pub volume: f64,
    pub distance_m: f64,
    pub visibility: Visibility,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open(path: &PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::IoError(e.to_string()))?;
        }

        let conn =
            Connection::open(path).map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

        let db = Self { conn };
        db.initialize()?;

        Ok(db)
    }

    /// Initialize the database schema.
    fn initialize(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute_batch(SCHEMA_VERSION_TABLE)
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

        let current_version = self.get_schema_version()?;
        if current_version < CURRENT_VERSION {
            self.migrate(current_version)?;
        }

        Ok(())
    }

    /// Get the current schema version.
    fn get_schema_version(&self) -> Result<i32, DatabaseError> {
        let result = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get::<_, i32>(0),
        );

        match result {
            Ok(version) => Ok(version),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
            Err(e) => Err(DatabaseError::QueryFailed(e.to_string())),
        }
    }

    /// Run database migrations.
    fn migrate(&self, from_version: i32) -> Result<(), DatabaseError> {
        if from_version < 1 {
            self.conn
                .execute_batch(SCHEMA)
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            self.conn
                .execute(
                    "INSERT INTO schema_version (version, applied_at) VALUES (?, datetime('now'))",
                    [CURRENT_VERSION],
                )
                .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;

            tracing::info!("Database migrated to version {}", CURRENT_VERSION);
        }

        Ok(())
    }

    // --- profiles ---

    /// Fetch a user's progress row.
    pub fn get_progress(&self, user_id: Uuid) -> Result<Option<UserProgress>, DatabaseError> {
        read_progress(&self.conn, user_id)
    }

    /// Fetch a user's progress, inserting a zeroed level-1 profile if absent.
    pub fn get_or_create_progress(&self, user_id: Uuid) -> Result<UserProgress, DatabaseError> {
        if let Some(progress) = read_progress(&self.conn, user_id)? {
            return Ok(progress);
        }

        let progress = UserProgress::new(user_id);
        write_progress(&self.conn, &progress)?;
        tracing::debug!(%user_id, "created progress profile");
        Ok(progress)
    }

    /// Overwrite a user's progress row.
    pub fn update_progress(&self, progress: &UserProgress) -> Result<(), DatabaseError> {
        write_progress(&self.conn, progress)
    }

    /// Overwrite a user's progress row only if the authoritative row still
    /// matches the expected cycle XP and prestige rank. Returns whether the
    /// write was applied.
    pub fn update_progress_guarded(
        &self,
        progress: &UserProgress,
        expected_cycle_xp: u64,
        expected_prestige: u32,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .conn
            .execute(
                "UPDATE profiles
                 SET lifetime_xp = ?1, cycle_xp = ?2, level = ?3, current_xp_in_level = ?4,
                     prestige_level = ?5, xp_overflow = ?6, updated_at = ?7
                 WHERE user_id = ?8 AND cycle_xp = ?9 AND prestige_level = ?10",
                params![
                    progress.lifetime_xp as i64,
                    progress.cycle_xp as i64,
                    progress.level,
                    progress.current_xp_in_level as i64,
                    progress.prestige_level,
                    progress.xp_overflow as i64,
                    progress.updated_at.to_rfc3339(),
                    progress.user_id.to_string(),
                    expected_cycle_xp as i64,
                    expected_prestige,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(changed > 0)
    }

    /// Apply an XP award atomically, deduplicated by `source_id`.
    ///
    /// Returns the updated progress, or `None` if the award was already
    /// applied (idempotent retry).
    pub fn apply_award(
        &mut self,
        user_id: Uuid,
        source_id: Uuid,
        amount: u64,
    ) -> Result<Option<UserProgress>, DatabaseError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        let inserted = record_award(&tx, user_id, source_id, amount)?;
        if inserted == 0 {
            tx.commit()
                .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
            return Ok(None);
        }

        let mut progress =
            read_progress(&tx, user_id)?.unwrap_or_else(|| UserProgress::new(user_id));
        progress.apply_award(amount);
        write_progress(&tx, &progress)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(Some(progress))
    }

    /// Whether an award for this source has been applied.
    pub fn has_award(&self, source_id: Uuid) -> Result<bool, DatabaseError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM xp_awards WHERE source_id = ?1",
                [source_id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(found.is_some())
    }

    // --- workouts ---

    /// Persist the active workout snapshot (end_time stays NULL).
    pub fn save_active_workout(&mut self, session: &WorkoutSession) -> Result<(), DatabaseError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tx.execute(
            "INSERT OR REPLACE INTO workouts
             (id, user_id, name, start_time, end_time, plan_id, plan_day_id, template_id)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.name,
                session.start_time.to_rfc3339(),
                session.plan_id.map(|id| id.to_string()),
                session.plan_day_id.map(|id| id.to_string()),
                session.template_id.map(|id| id.to_string()),
            ],
        )
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        replace_logs(&tx, session.id, &session.logs)?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    /// Load the user's active workout (NULL end_time), with logs.
    pub fn load_active_workout(
        &self,
        user_id: Uuid,
    ) -> Result<Option<WorkoutSession>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, start_time, plan_id, plan_day_id, template_id
                 FROM workouts WHERE user_id = ?1 AND end_time IS NULL LIMIT 1",
                [user_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let Some((id, name, start_time, plan_id, plan_day_id, template_id)) = row else {
            return Ok(None);
        };

        let workout_id = parse_uuid(&id)?;
        let logs = self.workout_logs(workout_id)?;

        Ok(Some(WorkoutSession {
            id: workout_id,
            user_id,
            name,
            start_time: parse_ts(&start_time)?,
            logs,
            status: WorkoutStatus::Active,
            plan_id: parse_opt_uuid(plan_id)?,
            plan_day_id: parse_opt_uuid(plan_day_id)?,
            template_id: parse_opt_uuid(template_id)?,
        }))
    }

    /// Load the set logs for a workout, in performance order.
    pub fn workout_logs(&self, workout_id: Uuid) -> Result<Vec<ExerciseLog>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT exercise_id, sets_json FROM workout_logs
                 WHERE workout_id = ?1 ORDER BY position",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([workout_id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut logs = Vec::new();
        for row in rows {
            let (exercise_id, sets_json) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            let sets = serde_json::from_str(&sets_json)
                .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;
            logs.push(ExerciseLog { exercise_id, sets });
        }
        Ok(logs)
    }

    /// Persist a finished workout, its logs, and the XP award as one unit.
    ///
    /// The award ledger row is keyed by the workout id; on a retry of an
    /// already-persisted finish the workout row and logs are overwritten
    /// identically and the progress update is skipped, so XP is never
    /// double-awarded. Returns whether the award was applied.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_workout(
        &mut self,
        session: &WorkoutSession,
        end_time: DateTime<Utc>,
        duration_secs: u64,
        volume: f64,
        distance_m: f64,
        visibility: Visibility,
        award: &XpAward,
        progress_after: &UserProgress,
    ) -> Result<bool, DatabaseError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tx.execute(
            "INSERT OR REPLACE INTO workouts
             (id, user_id, name, start_time, end_time, duration_seconds, volume,
              distance_meters, visibility, plan_id, plan_day_id, template_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.name,
                session.start_time.to_rfc3339(),
                end_time.to_rfc3339(),
                duration_secs as i64,
                volume,
                distance_m,
                visibility.as_str(),
                session.plan_id.map(|id| id.to_string()),
                session.plan_day_id.map(|id| id.to_string()),
                session.template_id.map(|id| id.to_string()),
            ],
        )
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        replace_logs(&tx, session.id, &session.logs)?;

        let inserted = record_award(&tx, session.user_id, session.id, award.total)?;
        if inserted > 0 {
            write_progress(&tx, progress_after)?;
        }

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(inserted > 0)
    }

    /// Delete a workout and its logs (cancelled session cleanup).
    pub fn delete_workout(&mut self, workout_id: Uuid) -> Result<(), DatabaseError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;

        tx.execute(
            "DELETE FROM workout_logs WHERE workout_id = ?1",
            [workout_id.to_string()],
        )
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        tx.execute(
            "DELETE FROM workouts WHERE id = ?1",
            [workout_id.to_string()],
        )
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        tx.commit()
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()))?;
        Ok(())
    }

    /// Fetch a stored workout row.
    pub fn get_workout(&self, workout_id: Uuid) -> Result<Option<WorkoutRecord>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, user_id, name, start_time, end_time, duration_seconds,
                        volume, distance_meters, visibility
                 FROM workouts WHERE id = ?1",
                [workout_id.to_string()],
                map_workout_row,
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        row.map(workout_record_from_raw).transpose()
    }

    /// Finished workouts for a user, most recent first.
    pub fn workout_history(&self, user_id: Uuid) -> Result<Vec<WorkoutRecord>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, name, start_time, end_time, duration_seconds,
                        volume, distance_meters, visibility
                 FROM workouts
                 WHERE user_id = ?1 AND end_time IS NOT NULL
                 ORDER BY end_time DESC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([user_id.to_string()], map_workout_row)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            records.push(workout_record_from_raw(raw)?);
        }
        Ok(records)
    }

    // --- check-in sessions ---

    /// Insert a new check-in session.
    pub fn insert_checkin(&self, session: &GymCheckInSession) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO checkin_sessions
                 (id, user_id, gym_id, start_time, end_time, duration_seconds, status, type, is_private)
                 VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5, ?6, ?7)",
                params![
                    session.id.to_string(),
                    session.user_id.to_string(),
                    session.gym_id.to_string(),
                    session.start_time.to_rfc3339(),
                    session.status.as_str(),
                    session.kind.as_str(),
                    session.is_private,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    /// The user's active check-in session, if any.
    pub fn active_checkin(
        &self,
        user_id: Uuid,
    ) -> Result<Option<GymCheckInSession>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, gym_id, start_time, type, is_private
                 FROM checkin_sessions
                 WHERE user_id = ?1 AND status = 'active' LIMIT 1",
                [user_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, bool>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let Some((id, gym_id, start_time, kind, is_private)) = row else {
            return Ok(None);
        };

        Ok(Some(GymCheckInSession {
            id: parse_uuid(&id)?,
            user_id,
            gym_id: parse_uuid(&gym_id)?,
            start_time: parse_ts(&start_time)?,
            end_time: None,
            duration_secs: None,
            status: CheckInStatus::Active,
            kind: kind
                .parse::<CheckInType>()
                .map_err(|_| DatabaseError::DeserializationError(format!("bad type: {kind}")))?,
            is_private,
        }))
    }

    /// Close a check-in session with the given end time and status.
    pub fn close_checkin(
        &self,
        session_id: Uuid,
        end_time: DateTime<Utc>,
        duration_secs: u64,
        status: CheckInStatus,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .conn
            .execute(
                "UPDATE checkin_sessions
                 SET end_time = ?1, duration_seconds = ?2, status = ?3
                 WHERE id = ?4 AND status = 'active'",
                params![
                    end_time.to_rfc3339(),
                    duration_secs as i64,
                    status.as_str(),
                    session_id.to_string(),
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound(format!(
                "active check-in session {session_id}"
            )));
        }
        Ok(())
    }

    /// Fetch a check-in session by id.
    pub fn get_checkin(
        &self,
        session_id: Uuid,
    ) -> Result<Option<GymCheckInSession>, DatabaseError> {
        let row = self
            .conn
            .query_row(
                "SELECT id, user_id, gym_id, start_time, end_time, duration_seconds, status, type, is_private
                 FROM checkin_sessions WHERE id = ?1",
                [session_id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, bool>(8)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let Some((id, user_id, gym_id, start_time, end_time, duration, status, kind, is_private)) =
            row
        else {
            return Ok(None);
        };

        Ok(Some(GymCheckInSession {
            id: parse_uuid(&id)?,
            user_id: parse_uuid(&user_id)?,
            gym_id: parse_uuid(&gym_id)?,
            start_time: parse_ts(&start_time)?,
            end_time: end_time.as_deref().map(parse_ts).transpose()?,
            duration_secs: duration.map(|d| d.max(0) as u64),
            status: status
                .parse::<CheckInStatus>()
                .map_err(|_| DatabaseError::DeserializationError(format!("bad status: {status}")))?,
            kind: kind
                .parse::<CheckInType>()
                .map_err(|_| DatabaseError::DeserializationError(format!("bad type: {kind}")))?,
            is_private,
        }))
    }

    // --- gyms ---

    /// Insert or update a registered gym.
    pub fn upsert_gym(&self, gym: &GymLocation) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO gyms (id, name, lat, lng, tracking_radius_m)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    gym.id.to_string(),
                    gym.name,
                    gym.coordinates.lat,
                    gym.coordinates.lng,
                    gym.tracking_radius_m,
                ],
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        Ok(())
    }

    /// All registered gyms.
    pub fn list_gyms(&self) -> Result<Vec<GymLocation>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, lat, lng, tracking_radius_m FROM gyms ORDER BY name")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, u32>(4)?,
                ))
            })
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut gyms = Vec::new();
        for row in rows {
            let (id, name, lat, lng, radius) =
                row.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            gyms.push(
                GymLocation::new(parse_uuid(&id)?, name, Coordinates::new(lat, lng))
                    .with_radius(radius),
            );
        }
        Ok(gyms)
    }
}

type RawWorkoutRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    f64,
    f64,
    String,
);

fn map_workout_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawWorkoutRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn workout_record_from_raw(raw: RawWorkoutRow) -> Result<WorkoutRecord, DatabaseError> {
    let (id, user_id, name, start_time, end_time, duration, volume, distance_m, visibility) = raw;
    Ok(WorkoutRecord {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        name,
        start_time: parse_ts(&start_time)?,
        end_time: end_time.as_deref().map(parse_ts).transpose()?,
        duration_secs: duration.map(|d| d.max(0) as u64),
        volume,
        distance_m,
        visibility: visibility
            .parse::<Visibility>()
            .map_err(|_| DatabaseError::DeserializationError(format!("bad visibility: {visibility}")))?,
    })
}

fn read_progress(conn: &Connection, user_id: Uuid) -> Result<Option<UserProgress>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT lifetime_xp, cycle_xp, level, current_xp_in_level, prestige_level,
                    xp_overflow, updated_at
             FROM profiles WHERE user_id = ?1",
            [user_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, u32>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            },
        )
        .optional()
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

    let Some((lifetime, cycle, level, in_level, prestige, overflow, updated_at)) = row else {
        return Ok(None);
    };

    Ok(Some(UserProgress {
        user_id,
        lifetime_xp: lifetime.max(0) as u64,
        cycle_xp: cycle.max(0) as u64,
        level,
        current_xp_in_level: in_level.max(0) as u64,
        prestige_level: prestige,
        xp_overflow: overflow.max(0) as u64,
        updated_at: parse_ts(&updated_at)?,
    }))
}

fn write_progress(conn: &Connection, progress: &UserProgress) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR REPLACE INTO profiles
         (user_id, lifetime_xp, cycle_xp, level, current_xp_in_level, prestige_level,
          xp_overflow, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            progress.user_id.to_string(),
            progress.lifetime_xp as i64,
            progress.cycle_xp as i64,
            progress.level,
            progress.current_xp_in_level as i64,
            progress.prestige_level,
            progress.xp_overflow as i64,
            progress.updated_at.to_rfc3339(),
        ],
    )
    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    Ok(())
}

fn record_award(
    conn: &Connection,
    user_id: Uuid,
    source_id: Uuid,
    amount: u64,
) -> Result<usize, DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO xp_awards (source_id, user_id, amount, awarded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            source_id.to_string(),
            user_id.to_string(),
            amount as i64,
            Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
}

fn replace_logs(
    conn: &Connection,
    workout_id: Uuid,
    logs: &[ExerciseLog],
) -> Result<(), DatabaseError> {
    conn.execute(
        "DELETE FROM workout_logs WHERE workout_id = ?1",
        [workout_id.to_string()],
    )
    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

    for (position, log) in logs.iter().enumerate() {
        let sets_json = serde_json::to_string(&log.sets)
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
        conn.execute(
            "INSERT INTO workout_logs (workout_id, exercise_id, position, sets_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                workout_id.to_string(),
                log.exercise_id,
                position as i64,
                sets_json,
            ],
        )
        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
    }
    Ok(())
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| DatabaseError::DeserializationError(e.to_string()))
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|e| DatabaseError::DeserializationError(e.to_string()))
}

fn parse_opt_uuid(s: Option<String>) -> Result<Option<Uuid>, DatabaseError> {
    s.as_deref().map(parse_uuid).transpose()
}

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workout::types::SetEntry;

    fn session(user_id: Uuid) -> WorkoutSession {
        WorkoutSession {
            id: Uuid::new_v4(),
            user_id,
            name: "Push Day".to_string(),
            start_time: Utc::now(),
            logs: vec![ExerciseLog {
                exercise_id: "bench-press".to_string(),
                sets: vec![SetEntry {
                    weight: 80.0,
                    reps: 8,
                    completed: true,
                    completed_at: Some(Utc::now()),
                }],
            }],
            status: WorkoutStatus::Active,
            plan_id: None,
            plan_day_id: None,
            template_id: None,
        }
    }

    #[test]
    fn test_progress_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();

        let created = db.get_or_create_progress(user).unwrap();
        assert_eq!(created.level, 1);

        let mut updated = created;
        updated.apply_award(750);
        db.update_progress(&updated).unwrap();

        let loaded = db.get_progress(user).unwrap().unwrap();
        assert_eq!(loaded.cycle_xp, 750);
        assert_eq!(loaded.level, 2);
    }

    #[test]
    fn test_guarded_update_detects_stale_state() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let mut progress = db.get_or_create_progress(user).unwrap();
        progress.apply_award(100);

        // Guard expects the pre-award state: applies once, then goes stale.
        assert!(db.update_progress_guarded(&progress, 0, 0).unwrap());
        assert!(!db.update_progress_guarded(&progress, 0, 0).unwrap());
    }

    #[test]
    fn test_award_ledger_deduplicates() {
        let mut db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let source = Uuid::new_v4();

        let first = db.apply_award(user, source, 500).unwrap();
        assert_eq!(first.unwrap().cycle_xp, 500);

        let second = db.apply_award(user, source, 500).unwrap();
        assert!(second.is_none());
        assert_eq!(db.get_progress(user).unwrap().unwrap().cycle_xp, 500);
    }

    #[test]
    fn test_active_workout_roundtrip() {
        let mut db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let session = session(user);

        db.save_active_workout(&session).unwrap();
        let loaded = db.load_active_workout(user).unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.logs, session.logs);

        db.delete_workout(session.id).unwrap();
        assert!(db.load_active_workout(user).unwrap().is_none());
    }

    #[test]
    fn test_checkin_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let user = Uuid::new_v4();
        let checkin = GymCheckInSession {
            id: Uuid::new_v4(),
            user_id: user,
            gym_id: Uuid::new_v4(),
            start_time: Utc::now(),
            end_time: None,
            duration_secs: None,
            status: CheckInStatus::Active,
            kind: CheckInType::Auto,
            is_private: false,
        };

        db.insert_checkin(&checkin).unwrap();
        assert!(db.active_checkin(user).unwrap().is_some());

        db.close_checkin(checkin.id, Utc::now(), 1200, CheckInStatus::Completed)
            .unwrap();
        assert!(db.active_checkin(user).unwrap().is_none());

        let stored = db.get_checkin(checkin.id).unwrap().unwrap();
        assert_eq!(stored.status, CheckInStatus::Completed);
        assert_eq!(stored.duration_secs, Some(1200));
    }

    #[test]
    fn test_gym_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        let gym = GymLocation::new(
            Uuid::new_v4(),
            "Iron Temple",
            Coordinates::new(52.52, 13.405),
        )
        .with_radius(350);

        db.upsert_gym(&gym).unwrap();
        let gyms = db.list_gyms().unwrap();
        assert_eq!(gyms, vec![gym]);
    }
}
