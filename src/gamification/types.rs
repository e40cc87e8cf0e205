//! Gamification types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::gamification::leveling::{compute_level_progress, LevelProgress};

/// A user's leveling state.
///
/// `level` and `current_xp_in_level` are derived from `cycle_xp`; whenever the
/// two drift apart, the repair is to recompute them from `cycle_xp`, never the
/// other way around.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    /// Owner of this progress record.
    pub user_id: Uuid,
    /// Total XP ever earned. Monotonically increasing.
    pub lifetime_xp: u64,
    /// XP within the current prestige cycle. Resets (with head start) on
    /// prestige.
    pub cycle_xp: u64,
    /// Level derived from `cycle_xp`.
    pub level: u32,
    /// Progress within the current level, derived from `cycle_xp`.
    pub current_xp_in_level: u64,
    /// Prestige (ascension) rank, 0 to 12.
    pub prestige_level: u32,
    /// Banked excess XP from exceeding the cycle cap, consumed by the next
    /// prestige.
    pub xp_overflow: u64,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
}

impl UserProgress {
    /// Fresh profile: everything zeroed, level 1.
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            lifetime_xp: 0,
            cycle_xp: 0,
            level: 1,
            current_xp_in_level: 0,
            prestige_level: 0,
            xp_overflow: 0,
            updated_at: Utc::now(),
        }
    }

    /// Current position on the leveling curve.
    pub fn level_progress(&self) -> LevelProgress {
        compute_level_progress(self.cycle_xp)
    }

    /// True if the derived fields match `cycle_xp` under the curve.
    pub fn is_consistent(&self) -> bool {
        let derived = self.level_progress();
        self.level == derived.current_level && self.current_xp_in_level == derived.progress
    }

    /// Recompute `level` and `current_xp_in_level` from `cycle_xp`.
    pub fn recompute_derived(&mut self) {
        let derived = self.level_progress();
        self.level = derived.current_level;
        self.current_xp_in_level = derived.progress;
    }

    /// Apply an XP award: bumps lifetime and cycle XP, then recomputes the
    /// derived fields.
    pub fn apply_award(&mut self, amount: u64) {
        self.lifetime_xp = self.lifetime_xp.saturating_add(amount);
        self.cycle_xp = self.cycle_xp.saturating_add(amount);
        self.recompute_derived();
        self.updated_at = Utc::now();
    }
}

/// Display title for a prestige rank.
pub fn prestige_title(rank: u32) -> &'static str {
    match rank {
        1 => "PROSPECT",
        2 => "HAZARD",
        3 => "UNCHAINED",
        4 => "GRIND",
        5 => "REAPER",
        6 => "BERSERKER",
        7 => "VANGUARD",
        8 => "IMPERATOR",
        9 => "PHANTOM",
        10 => "LEGION",
        11 => "TITAN",
        12 => "APEX",
        _ => "INITIATE",
    }
}
