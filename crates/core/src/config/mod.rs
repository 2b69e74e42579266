use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{pattern::PatternSource, LedGraphError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    /// Pattern activated at startup.
    pub pattern: PatternSource,
    /// Reject shapes whose LED ranges overlap or leave gaps instead of
    /// rendering them with aliased slots.
    pub strict_led_ranges: bool,
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        let fps = self.scheduler.target_fps;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(LedGraphError::InvalidConfig(format!(
                "scheduler.target_fps must be a positive number, got {fps}"
            )));
        }
        if self.pattern.name.is_empty() {
            return Err(LedGraphError::InvalidConfig(
                "pattern.name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration specific to frame scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub target_fps: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { target_fps: 30.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pattern.name, "walkers");
        assert!(!config.strict_led_ranges);
    }

    #[test]
    fn reads_pattern_params() {
        let config = AppConfig::from_json_str(
            r#"{
                "scheduler": { "target_fps": 60 },
                "pattern": { "name": "solid", "params": { "color": [1, 2, 3] } },
                "strict_led_ranges": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.scheduler.target_fps, 60.0);
        assert_eq!(config.pattern.params["color"][2], 3);
        assert!(config.strict_led_ranges);
    }

    #[test]
    fn rejects_bad_frame_rate() {
        let err = AppConfig::from_json_str(r#"{ "scheduler": { "target_fps": 0 } }"#).unwrap_err();
        assert!(matches!(err, LedGraphError::InvalidConfig(_)));
    }
}
