//! Prestige (ascension) transition.
//!
//! Prestiging ends a leveling cycle: the rank counter goes up, `cycle_xp`
//! restarts pre-loaded with the head start (XP past the cap plus any banked
//! overflow), and the derived level is recomputed from that head start. The
//! transition here is pure; [`crate::gamification::progress::ProgressTracker`]
//! re-verifies the authoritative row and commits it atomically.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gamification::leveling::{compute_level_progress, XP_TO_LEVEL_100};
use crate::gamification::types::UserProgress;

/// Maximum prestige rank.
pub const MAX_PRESTIGE: u32 = 12;

/// Why a prestige attempt was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrestigeError {
    /// Cycle cap not reached yet.
    #[error("Must reach Level 100 to Ascend")]
    NotEligible,

    /// Rank counter already at the cap.
    #[error("Maximum prestige rank ({MAX_PRESTIGE}) already reached")]
    MaxPrestigeReached,

    /// The authoritative profile changed between eligibility check and
    /// commit; the caller should re-fetch and retry.
    #[error("Profile changed during ascension, retry")]
    Conflict,

    /// Persistence failure; nothing was committed.
    #[error("Database error: {0}")]
    Database(String),
}

/// Result of a successful prestige.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrestigeOutcome {
    /// Rank after the ascension.
    pub new_prestige_level: u32,
    /// Level recomputed from the head start.
    pub new_level: u32,
    /// XP the new cycle starts with.
    pub head_start_xp: u64,
}

/// Check eligibility without mutating anything.
pub fn check_eligibility(progress: &UserProgress) -> Result<(), PrestigeError> {
    if progress.prestige_level >= MAX_PRESTIGE {
        return Err(PrestigeError::MaxPrestigeReached);
    }
    if progress.cycle_xp < XP_TO_LEVEL_100 {
        return Err(PrestigeError::NotEligible);
    }
    Ok(())
}

/// Apply the prestige transition to a profile.
///
/// Returns the updated profile and the outcome; the input is untouched on
/// failure. The head start is the excess XP past the cap plus any previously
/// banked overflow, and the new cycle starts pre-loaded with it.
pub fn prestige_transition(
    progress: &UserProgress,
) -> Result<(UserProgress, PrestigeOutcome), PrestigeError> {
    check_eligibility(progress)?;

    let excess_xp = progress.cycle_xp - XP_TO_LEVEL_100;
    let head_start_xp = excess_xp + progress.xp_overflow;
    let derived = compute_level_progress(head_start_xp);

    let mut updated = progress.clone();
    updated.prestige_level += 1;
    updated.cycle_xp = head_start_xp;
    updated.level = derived.current_level;
    updated.current_xp_in_level = derived.progress;
    updated.xp_overflow = 0;
    updated.updated_at = chrono::Utc::now();

    let outcome = PrestigeOutcome {
        new_prestige_level: updated.prestige_level,
        new_level: updated.level,
        head_start_xp,
    };
    Ok((updated, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn capped_profile() -> UserProgress {
        let mut p = UserProgress::new(Uuid::new_v4());
        p.lifetime_xp = XP_TO_LEVEL_100 + 5_000;
        p.cycle_xp = XP_TO_LEVEL_100 + 5_000;
        p.xp_overflow = 200;
        p.recompute_derived();
        p
    }

    #[test]
    fn test_carryover() {
        let before = capped_profile();
        let (after, outcome) = prestige_transition(&before).unwrap();

        assert_eq!(outcome.new_prestige_level, 1);
        assert_eq!(outcome.head_start_xp, 5_200);
        assert_eq!(after.cycle_xp, 5_200);
        assert_eq!(after.xp_overflow, 0);
        assert_eq!(after.lifetime_xp, before.lifetime_xp);
        assert!(after.is_consistent());
        // 5200 XP lands in level 7 (threshold 4500, next at 5600).
        assert_eq!(after.level, 7);
        assert_eq!(after.current_xp_in_level, 700);
    }

    #[test]
    fn test_not_eligible_below_cap() {
        let p = UserProgress::new(Uuid::new_v4());
        assert_eq!(prestige_transition(&p).unwrap_err(), PrestigeError::NotEligible);
    }

    #[test]
    fn test_max_rank_refused() {
        let mut p = capped_profile();
        p.prestige_level = MAX_PRESTIGE;
        assert_eq!(
            prestige_transition(&p).unwrap_err(),
            PrestigeError::MaxPrestigeReached
        );
    }

    #[test]
    fn test_exact_cap_yields_zero_head_start() {
        let mut p = UserProgress::new(Uuid::new_v4());
        p.cycle_xp = XP_TO_LEVEL_100;
        p.recompute_derived();
        let (after, outcome) = prestige_transition(&p).unwrap();
        assert_eq!(outcome.head_start_xp, 0);
        assert_eq!(after.level, 1);
        assert_eq!(after.current_xp_in_level, 0);
    }
}
