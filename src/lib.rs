//! Iron Circle - Social Fitness Tracking Core
//!
//! The domain core of a gym-centric fitness application. Provides the
//! leveling and prestige (Ascension) progression system, workout session
//! tracking with crash recovery, geofenced gym check-ins, and SQLite-backed
//! persistence.

pub mod gamification;
pub mod geo;
pub mod notify;
pub mod storage;
pub mod workout;

// Re-export commonly used types
pub use gamification::progress::ProgressTracker;
pub use geo::tracker::GeoTracker;
pub use storage::config::AppConfig;
pub use storage::database::Database;
pub use workout::checkin::CheckInManager;
pub use workout::tracker::WorkoutTracker;
