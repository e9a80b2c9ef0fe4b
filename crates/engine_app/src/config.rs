//! Engine configuration.
//!
//! Loaded from the JSON file named by the `ENGINE_CONFIG` environment
//! variable; defaults apply when it is unset. Per-processor overrides are
//! keyed by processor name:
//!
//! ```json
//! {
//!   "frame_rate": 30.0,
//!   "max_frames": 600,
//!   "processors": { "render": { "order": 100, "enabled": false } }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use engine_processor::ProcessorConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

/// Environment variable naming the configuration file.
pub const ENGINE_CONFIG_ENV: &str = "ENGINE_CONFIG";

/// Top-level engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target frames per second.
    pub frame_rate: f64,
    /// Number of frames to run (0 = unlimited).
    pub max_frames: u64,
    /// Overrides keyed by processor name.
    pub processors: BTreeMap<String, ProcessorOverride>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 60.0,
            max_frames: 0,
            processors: BTreeMap::new(),
        }
    }
}

/// Replaces fields of a processor's built-in [`ProcessorConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorOverride {
    /// Replacement scheduling order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    /// Replacement enabled flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl EngineConfig {
    /// Load from the file named by `ENGINE_CONFIG`, or defaults when unset.
    ///
    /// # Errors
    ///
    /// See [`EngineConfig::from_path`].
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var(ENGINE_CONFIG_ENV) {
            Ok(path) => Self::from_path(path),
            Err(_) => Ok(Self::default()),
        }
    }

    /// Load and validate a JSON file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_json`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), overrides = config.processors.len(), "loaded engine config");
        Ok(config)
    }

    /// Parse and validate JSON text. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed JSON, [`ConfigError::Invalid`]
    /// for a non-positive or non-finite frame rate.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame_rate must be positive, got {}",
                self.frame_rate
            )));
        }
        Ok(())
    }

    /// Apply the override for `config.name`, if any.
    #[must_use]
    pub fn apply(&self, mut config: ProcessorConfig) -> ProcessorConfig {
        if let Some(o) = self.processors.get(&config.name) {
            if let Some(order) = o.order {
                config.order = order;
            }
            if let Some(enabled) = o.enabled {
                config.enabled = enabled;
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_fields() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.frame_rate, 60.0);
    }

    #[test]
    fn test_overrides_applied_by_name() {
        let config = EngineConfig::from_json(
            r#"{ "max_frames": 3, "processors": { "render": { "order": 100, "enabled": false } } }"#,
        )
        .unwrap();
        assert_eq!(config.max_frames, 3);

        let render = config.apply(ProcessorConfig::new("render").with_order(5));
        assert_eq!(render.order, 100);
        assert!(!render.enabled);

        let motion = config.apply(ProcessorConfig::new("motion").with_order(5));
        assert_eq!(motion, ProcessorConfig::new("motion").with_order(5));
    }

    #[test]
    fn test_partial_override_keeps_other_fields() {
        let config = EngineConfig::from_json(r#"{ "processors": { "render": { "enabled": false } } }"#).unwrap();
        let render = config.apply(ProcessorConfig::new("render").with_order(7));
        assert_eq!(render.order, 7);
        assert!(!render.enabled);
    }

    #[test]
    fn test_invalid_frame_rate_rejected() {
        assert!(matches!(
            EngineConfig::from_json(r#"{ "frame_rate": 0 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EngineConfig::from_path("/nonexistent/engine.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/engine.json"));
    }
}
