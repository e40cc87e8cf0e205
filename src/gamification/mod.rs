//! Gamification: leveling curve, session XP, prestige.

pub mod leveling;
pub mod prestige;
pub mod progress;
pub mod types;
pub mod xp;

pub use leveling::{compute_level_progress, LevelProgress, LEVEL_CAP, XP_TO_LEVEL_100};
pub use prestige::{check_eligibility, prestige_transition, PrestigeError, PrestigeOutcome, MAX_PRESTIGE};
pub use progress::{ProgressError, ProgressTracker};
pub use types::{prestige_title, UserProgress};
pub use xp::{calculate_session_xp, Goal, SessionMetrics, XpAward, XpBreakdown, XpWeights};
