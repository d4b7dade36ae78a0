use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::movement::MovementConfig;
use crate::spatial::{AwarenessConfig, NavigatorConfig, ProximityConfig, VisionConfig};

/// Errors raised while loading a config file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Every engine tunable. Any subset may be given in a JSON file; the rest
/// keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub vision: VisionConfig,
    pub navigator: NavigatorConfig,
    pub proximity: ProximityConfig,
    pub awareness: AwarenessConfig,
    pub movement: MovementConfig,
}

impl SimConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
