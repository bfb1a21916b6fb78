//! Game configuration: named tuning values with defaults, loadable from JSON.
//! Every field is optional in the file; missing fields keep their default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed configuration for the lifetime of a game controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GameConfig {
    /// Number of screen zones, and therefore player slots.
    pub max_players: u8,
    /// Mean L1 movement (pixels) above which a frozen player is eliminated.
    pub movement_threshold: f32,
    /// How long the red light holds before the next green light.
    pub frozen_duration_ms: u64,
    /// Minimum nose confidence for a pose to be tracked at all.
    pub detection_confidence: f32,
    /// Landmarks at or below this confidence are ignored for movement.
    pub keypoint_confidence: f32,
    /// Slots unseen for longer than this are dropped.
    pub stale_timeout_ms: u64,
    pub warning_flash_ms: u64,
    pub green_light_cue: String,
    pub red_light_cue: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 4,
            movement_threshold: 15.0,
            frozen_duration_ms: 1500,
            detection_confidence: 0.5,
            keypoint_confidence: 0.2,
            stale_timeout_ms: 5000,
            warning_flash_ms: 500,
            green_light_cue: "무궁화 꽃이 피었습니다".to_string(),
            red_light_cue: "정지!".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl GameConfig {
    /// Load and validate a JSON config file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_players == 0 {
            return Err(ConfigError::Invalid("maxPlayers must be at least 1".into()));
        }
        let thresholds = [
            ("movementThreshold", self.movement_threshold),
            ("detectionConfidence", self.detection_confidence),
            ("keypointConfidence", self.keypoint_confidence),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn frozen_duration(&self) -> Duration {
        Duration::from_millis(self.frozen_duration_ms)
    }

    pub fn stale_timeout(&self) -> Duration {
        Duration::from_millis(self.stale_timeout_ms)
    }
}
