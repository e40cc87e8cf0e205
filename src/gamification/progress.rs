//! User progress persistence and the prestige commit path.
//!
//! The leveling curve and prestige transition are pure; this module is where
//! they meet the record store. All writes go through the shared [`Database`]
//! and are guarded so that retries and stale clients cannot double-award XP
//! or double-prestige.

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use uuid::Uuid;

use crate::gamification::prestige::{prestige_transition, PrestigeError, PrestigeOutcome};
use crate::gamification::types::UserProgress;
use crate::storage::Database;

/// Errors from progress operations.
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Persistence failure; the caller may retry.
    #[error("Database error: {0}")]
    Database(String),
}

/// Manages [`UserProgress`] records.
pub struct ProgressTracker {
    db: Arc<Mutex<Database>>,
}

impl ProgressTracker {
    /// Create a new progress tracker over the shared database.
    pub fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>, ProgressError> {
        self.db
            .lock()
            .map_err(|e| ProgressError::Database(format!("Database lock failed: {e}")))
    }

    /// Fetch a user's progress, creating a zeroed level-1 profile on first
    /// access.
    pub fn load_or_create(&self, user_id: Uuid) -> Result<UserProgress, ProgressError> {
        let db = self.lock()?;
        db.get_or_create_progress(user_id)
            .map_err(|e| ProgressError::Database(e.to_string()))
    }

    /// Award XP from a non-workout source (e.g. a claimed mission).
    ///
    /// `source_id` keys the award ledger: re-submitting the same source never
    /// double-awards, making caller retries safe. Returns the profile after
    /// the award (unchanged if the award was already applied).
    pub fn award_xp(
        &self,
        user_id: Uuid,
        source_id: Uuid,
        amount: u64,
    ) -> Result<UserProgress, ProgressError> {
        let mut db = self.lock()?;
        match db
            .apply_award(user_id, source_id, amount)
            .map_err(|e| ProgressError::Database(e.to_string()))?
        {
            Some(updated) => {
                tracing::info!(%user_id, amount, "XP awarded");
                Ok(updated)
            }
            None => {
                tracing::debug!(%user_id, %source_id, "XP award already applied, skipping");
                db.get_or_create_progress(user_id)
                    .map_err(|e| ProgressError::Database(e.to_string()))
            }
        }
    }

    /// Attempt to prestige.
    ///
    /// Re-fetches the authoritative profile immediately before committing and
    /// writes the reset with a compare-and-set guard on (`cycle_xp`,
    /// `prestige_level`). A profile that changed in between surfaces as
    /// [`PrestigeError::Conflict`] with no state modified.
    pub fn attempt_prestige(&self, user_id: Uuid) -> Result<PrestigeOutcome, PrestigeError> {
        let db = self
            .db
            .lock()
            .map_err(|e| PrestigeError::Database(format!("Database lock failed: {e}")))?;

        let current = db
            .get_or_create_progress(user_id)
            .map_err(|e| PrestigeError::Database(e.to_string()))?;

        let (updated, outcome) = prestige_transition(&current)?;

        let committed = db
            .update_progress_guarded(&updated, current.cycle_xp, current.prestige_level)
            .map_err(|e| PrestigeError::Database(e.to_string()))?;
        if !committed {
            tracing::warn!(%user_id, "prestige lost the compare-and-set race");
            return Err(PrestigeError::Conflict);
        }

        tracing::info!(
            %user_id,
            rank = outcome.new_prestige_level,
            head_start = outcome.head_start_xp,
            "user ascended"
        );
        Ok(outcome)
    }

    /// Repair a profile whose derived fields drifted from `cycle_xp`.
    ///
    /// The one sanctioned direction: recompute `level` and
    /// `current_xp_in_level` from `cycle_xp` and persist the correction.
    pub fn repair(&self, user_id: Uuid) -> Result<UserProgress, ProgressError> {
        let db = self.lock()?;
        let mut progress = db
            .get_or_create_progress(user_id)
            .map_err(|e| ProgressError::Database(e.to_string()))?;

        if progress.is_consistent() {
            return Ok(progress);
        }

        tracing::warn!(%user_id, cycle_xp = progress.cycle_xp, "repairing inconsistent progress");
        progress.recompute_derived();
        db.update_progress(&progress)
            .map_err(|e| ProgressError::Database(e.to_string()))?;
        Ok(progress)
    }
}
