//! Crash-recovery cache for the active workout.
//!
//! Every mutation of the active workout is mirrored to a small JSON file so
//! an abrupt shutdown loses nothing. On startup the cache is consulted
//! before the database; snapshots older than the staleness window are
//! discarded rather than resumed.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workout::types::WorkoutSession;

/// Snapshots older than this are considered abandoned, not resumable.
pub const CACHE_STALE_HOURS: i64 = 24;

#[derive(Debug, Serialize, Deserialize)]
struct CachedWorkout {
    saved_at: DateTime<Utc>,
    session: WorkoutSession,
}

/// File-backed snapshot of the in-flight workout.
pub struct ActiveWorkoutCache {
    path: PathBuf,
}

impl ActiveWorkoutCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache file under the platform data directory.
    pub fn default_path() -> Result<PathBuf, CacheError> {
        let dirs = directories::ProjectDirs::from("com", "ironcircle", "iron-circle")
            .ok_or_else(|| CacheError::IoError("Could not determine data directory".to_string()))?;
        Ok(dirs.data_dir().join("active_workout.json"))
    }

    /// Load the cached workout if it exists and is fresh.
    ///
    /// Stale or unreadable snapshots are deleted and reported as absent so
    /// recovery can fall back to the database.
    pub fn load(&self) -> Result<Option<WorkoutSession>, CacheError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| CacheError::IoError(e.to_string()))?;

        let cached: CachedWorkout = match serde_json::from_str(&contents) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("discarding unreadable workout cache: {e}");
                self.clear()?;
                return Ok(None);
            }
        };

        if Utc::now() - cached.saved_at > Duration::hours(CACHE_STALE_HOURS) {
            tracing::info!(
                workout_id = %cached.session.id,
                "discarding stale workout cache"
            );
            self.clear()?;
            return Ok(None);
        }

        Ok(Some(cached.session))
    }

    /// Write the current snapshot.
    pub fn save(&self, session: &WorkoutSession) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CacheError::IoError(e.to_string()))?;
        }

        let cached = CachedWorkout {
            saved_at: Utc::now(),
            session: session.clone(),
        };
        let contents = serde_json::to_string(&cached)
            .map_err(|e| CacheError::SerializeError(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| CacheError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Remove the snapshot, if any.
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).map_err(|e| CacheError::IoError(e.to_string()))?;
        }
        Ok(())
    }
}

/// Cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
