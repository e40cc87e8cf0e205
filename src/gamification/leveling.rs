//! Leveling curve.
//!
//! Maps XP accumulated within the current prestige cycle to a level and
//! progress toward the next one. The curve is an arithmetic progression:
//! level 1 -> 2 costs 500 XP, and each subsequent level costs 100 XP more
//! than the last. The cycle is capped at level 100; XP beyond the cap is
//! reported as overflow and banked for the next prestige.
//!
//! The step constants and `XP_TO_LEVEL_100` are fixed data: stored user XP
//! values depend on them, so they must never change.

use serde::{Deserialize, Serialize};

/// XP required to go from level 1 to level 2.
pub const FIRST_LEVEL_STEP: u64 = 500;

/// How much more each level costs than the previous one.
pub const STEP_INCREMENT: u64 = 100;

/// Level at which a cycle ends and prestige becomes available.
pub const LEVEL_CAP: u32 = 100;

/// Cumulative XP required to reach level 100 (sum of the progression).
pub const XP_TO_LEVEL_100: u64 = 534_600;

/// Level and in-level progress derived from cycle XP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    /// Current level, 1 to [`LEVEL_CAP`].
    pub current_level: u32,
    /// XP accumulated within the current level.
    pub progress: u64,
    /// XP requirement for the current level's next threshold.
    pub total_needed: u64,
    /// True once the level cap is reached.
    pub is_max_level: bool,
    /// True once prestige is unlockable (level cap reached). The prestige
    /// engine additionally checks the rank cap.
    pub is_prestige_ready: bool,
    /// XP beyond the cap, banked for the next prestige cycle.
    pub overflow: u64,
}

/// Cumulative XP threshold to reach a given level.
pub fn xp_to_reach(level: u32) -> u64 {
    let level = level.clamp(1, LEVEL_CAP) as u64;
    // Sum of FIRST_LEVEL_STEP + k * STEP_INCREMENT for k in 0..level-1.
    let n = level - 1;
    FIRST_LEVEL_STEP * n + STEP_INCREMENT * n * n.saturating_sub(1) / 2
}

/// Compute level and progress from cycle XP.
///
/// Total over `[0, u64::MAX]`: never panics, never produces an inconsistent
/// pair. At the cap the progress bar is reported full and everything past
/// [`XP_TO_LEVEL_100`] lands in `overflow`.
pub fn compute_level_progress(cycle_xp: u64) -> LevelProgress {
    let mut level = 1u32;
    let mut step = FIRST_LEVEL_STEP;
    let mut accumulated = 0u64;

    while level < LEVEL_CAP && cycle_xp >= accumulated + step {
        accumulated += step;
        level += 1;
        step += STEP_INCREMENT;
    }

    if level >= LEVEL_CAP {
        // The loop advanced `step` past the final requirement.
        let final_step = step - STEP_INCREMENT;
        return LevelProgress {
            current_level: LEVEL_CAP,
            progress: final_step,
            total_needed: final_step,
            is_max_level: true,
            is_prestige_ready: true,
            overflow: cycle_xp - XP_TO_LEVEL_100,
        };
    }

    LevelProgress {
        current_level: level,
        progress: cycle_xp - accumulated,
        total_needed: step,
        is_max_level: false,
        is_prestige_ready: false,
        overflow: 0,
    }
}
