//! Session XP calculator.
//!
//! Converts a finished workout's metrics into an XP award with a per-category
//! breakdown. Pure and deterministic: the same metrics and weights always
//! produce the same award, and the total always equals the exact sum of the
//! breakdown entries.

use serde::{Deserialize, Serialize};

/// Flat XP for completing any session with nonzero duration.
pub const WORKOUT_COMPLETE_XP: u64 = 100;

/// Time-based XP per full minute of session duration.
pub const XP_PER_MINUTE: u64 = 2;

/// XP per kilogram of volume before weighting.
pub const VOLUME_XP_RATE: f64 = 0.05;

/// Volume above this is ignored (anti-cheat).
pub const VOLUME_INPUT_CAP: f64 = 100_000.0;

/// Maximum XP the volume category can contribute.
pub const VOLUME_XP_CAP: u64 = 2_000;

/// XP per kilometer of cardio distance before weighting.
pub const DISTANCE_XP_PER_KM: f64 = 100.0;

/// Maximum XP the distance category can contribute.
pub const DISTANCE_XP_CAP: u64 = 1_500;

/// XP per personal record.
pub const PR_XP: u64 = 250;

/// PRs counted beyond this are ignored (anti-cheat).
pub const MAX_PRS_PER_SESSION: u32 = 5;

/// Streak length that must be exceeded before the bonus applies.
pub const STREAK_THRESHOLD: u32 = 3;

/// Streak bonus as a fraction of the pre-streak subtotal.
pub const STREAK_BONUS_RATE: f64 = 0.2;

/// Hard cap on a single session's total XP.
pub const SESSION_XP_CAP: u64 = 5_000;

/// Metrics of a completed workout session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Session duration in seconds.
    pub duration_secs: u64,
    /// Total volume in weight units (weight x reps over completed sets).
    pub volume: f64,
    /// Cardio distance in meters.
    pub distance_m: f64,
    /// Personal records hit this session.
    pub prs: u32,
    /// Consecutive-day streak including today.
    pub streak: u32,
}

/// Training goal, used to weight the XP categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    /// Heavy weights count extra, cardio barely counts.
    Strength,
    /// Cardio counts double, volume is secondary.
    Endurance,
    /// Cardio-leaning balance.
    WeightLoss,
    /// Balanced baseline.
    #[default]
    Muscle,
}

impl std::fmt::Display for Goal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Goal::Strength => write!(f, "Strength"),
            Goal::Endurance => write!(f, "Endurance"),
            Goal::WeightLoss => write!(f, "Weight Loss"),
            Goal::Muscle => write!(f, "Muscle"),
        }
    }
}

/// Category weights applied to the volume and distance contributions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XpWeights {
    /// Multiplier for the volume category.
    pub volume: f64,
    /// Multiplier for the distance (cardio) category.
    pub cardio: f64,
}

impl Default for XpWeights {
    fn default() -> Self {
        Self {
            volume: 1.0,
            cardio: 1.0,
        }
    }
}

impl From<Goal> for XpWeights {
    fn from(goal: Goal) -> Self {
        match goal {
            Goal::Strength => Self {
                volume: 1.2,
                cardio: 0.5,
            },
            Goal::Endurance => Self {
                volume: 0.5,
                cardio: 2.0,
            },
            Goal::WeightLoss => Self {
                volume: 1.0,
                cardio: 1.5,
            },
            Goal::Muscle => Self {
                volume: 1.0,
                cardio: 1.0,
            },
        }
    }
}

/// Per-category XP contributions. Every category is always present so
/// downstream rendering stays uniform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpBreakdown {
    /// Base completion XP plus per-minute XP.
    pub time: u64,
    /// Volume bonus.
    pub volume: u64,
    /// Cardio distance bonus.
    pub distance: u64,
    /// Personal record bonus.
    pub pr: u64,
    /// Streak bonus.
    pub streak: u64,
}

impl XpBreakdown {
    /// Sum of all categories.
    pub fn sum(&self) -> u64 {
        self.time + self.volume + self.distance + self.pr + self.streak
    }
}

/// A session XP award: total plus its breakdown. `total` is always the exact
/// sum of the breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAward {
    /// Total XP earned.
    pub total: u64,
    /// Per-category contributions.
    pub breakdown: XpBreakdown,
}

/// Calculate the XP award for a finished session.
///
/// All-zero metrics yield a zero award, not an error. Non-finite or negative
/// float inputs are treated as zero.
pub fn calculate_session_xp(metrics: &SessionMetrics, weights: XpWeights) -> XpAward {
    let time = if metrics.duration_secs > 0 {
        WORKOUT_COMPLETE_XP + (metrics.duration_secs / 60) * XP_PER_MINUTE
    } else {
        0
    };

    let volume = floor_xp(
        sanitize(metrics.volume).min(VOLUME_INPUT_CAP) * VOLUME_XP_RATE * sanitize(weights.volume),
    )
    .min(VOLUME_XP_CAP);

    let distance = floor_xp(
        sanitize(metrics.distance_m) / 1000.0 * DISTANCE_XP_PER_KM * sanitize(weights.cardio),
    )
    .min(DISTANCE_XP_CAP);

    let pr = u64::from(metrics.prs.min(MAX_PRS_PER_SESSION)) * PR_XP;

    let subtotal = time + volume + distance + pr;
    let streak = if metrics.streak > STREAK_THRESHOLD {
        floor_xp(subtotal as f64 * STREAK_BONUS_RATE)
    } else {
        0
    };

    let mut breakdown = XpBreakdown {
        time,
        volume,
        distance,
        pr,
        streak,
    };

    // Enforce the session cap by deducting the overage category by category,
    // lowest priority first, so the sum law holds after capping.
    let mut over = breakdown.sum().saturating_sub(SESSION_XP_CAP);
    for slot in [
        &mut breakdown.streak,
        &mut breakdown.pr,
        &mut breakdown.distance,
        &mut breakdown.volume,
        &mut breakdown.time,
    ] {
        if over == 0 {
            break;
        }
        let cut = (*slot).min(over);
        *slot -= cut;
        over -= cut;
    }

    XpAward {
        total: breakdown.sum(),
        breakdown,
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn floor_xp(value: f64) -> u64 {
    sanitize(value).floor() as u64
}
