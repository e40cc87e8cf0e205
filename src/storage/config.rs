//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::geo::types::{DEFAULT_TRACKING_RADIUS_M, MAX_TRACKING_RADIUS_M, MIN_TRACKING_RADIUS_M};

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application version
    pub version: String,
    /// Data directory path
    #[serde(skip)]
    pub data_dir: PathBuf,
    /// Geofence tracking settings
    pub tracking: TrackingSettings,
    /// Workout settings
    pub workout: WorkoutSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            data_dir: PathBuf::new(),
            tracking: TrackingSettings::default(),
            workout: WorkoutSettings::default(),
        }
    }
}

/// Geofence tracking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingSettings {
    /// Open and close gym check-ins from geofence transitions
    pub auto_tracking_enabled: bool,
    /// Radius applied to gyms without a custom radius, in meters
    pub default_radius_m: u32,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            auto_tracking_enabled: false,
            default_radius_m: DEFAULT_TRACKING_RADIUS_M,
        }
    }
}

impl TrackingSettings {
    /// Default radius clamped to the allowed geofence range.
    pub fn clamped_radius_m(&self) -> u32 {
        self.default_radius_m
            .clamp(MIN_TRACKING_RADIUS_M, MAX_TRACKING_RADIUS_M)
    }
}

/// Workout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutSettings {
    /// Default visibility for finished workouts
    pub default_public: bool,
}

impl Default for WorkoutSettings {
    fn default() -> Self {
        Self {
            default_public: true,
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "ironcircle", "IronCircle")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    directories::ProjectDirs::from("com", "ironcircle", "IronCircle")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// Load application configuration from file.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = get_config_path();

    if !path.exists() {
        let config = AppConfig {
            data_dir: get_data_dir(),
            ..Default::default()
        };
        return Ok(config);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    let mut config: AppConfig =
        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

    config.data_dir = get_data_dir();

    Ok(config)
}

/// Save application configuration to file.
pub fn save_config(config: &AppConfig) -> Result<(), ConfigError> {
    let path = get_config_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

    Ok(())
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(!config.tracking.auto_tracking_enabled);
        assert_eq!(config.tracking.default_radius_m, DEFAULT_TRACKING_RADIUS_M);
        assert!(config.workout.default_public);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.tracking.default_radius_m,
            config.tracking.default_radius_m
        );
    }

    #[test]
    fn test_radius_clamped() {
        let mut settings = TrackingSettings::default();
        settings.default_radius_m = 50;
        assert_eq!(settings.clamped_radius_m(), MIN_TRACKING_RADIUS_M);
        settings.default_radius_m = 9_000;
        assert_eq!(settings.clamped_radius_m(), MAX_TRACKING_RADIUS_M);
    }
}
