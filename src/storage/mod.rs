//! Storage module for database, configuration, and crash recovery.

pub mod cache;
pub mod config;
pub mod database;
pub mod schema;

pub use cache::{ActiveWorkoutCache, CacheError};
pub use config::{load_config, save_config, AppConfig, ConfigError, TrackingSettings};
pub use database::{Database, DatabaseError, WorkoutRecord};
