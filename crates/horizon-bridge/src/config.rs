//! Bridge configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// What the router does when a widget has a proxy but no callback for an
/// event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingCallback {
    /// Treat the absent callback as a falsy return and swallow the event.
    #[default]
    Swallow,
    /// Let native default handling run.
    Forward,
}

/// Errors loading a [`BridgeConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read bridge config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML was malformed or named an unknown key.
    #[error("Invalid bridge config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value was out of range.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Configuration for a bridge instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct BridgeConfig {
    /// Manhattan distance, in pixels, the pointer must travel with the left
    /// button held before a drag arms. The toolkit's own distance wins when
    /// it reports one.
    pub drag_start_distance: i32,
    /// Policy for events whose callback is not defined.
    pub missing_callback: MissingCallback,
    /// Title of the exception modal.
    pub exception_title: String,
    /// Native wheel units per notch.
    pub wheel_delta_divisor: i32,
    /// Post exceptions to the pump even when reported on the UI thread,
    /// while the pump is running.
    pub report_off_thread_when_running: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            drag_start_distance: 4,
            missing_callback: MissingCallback::Swallow,
            exception_title: "Exception".to_string(),
            wheel_delta_divisor: 120,
            report_off_thread_when_running: false,
        }
    }
}

impl BridgeConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drag_start_distance(mut self, pixels: i32) -> Self {
        self.drag_start_distance = pixels;
        self
    }

    pub fn missing_callback(mut self, policy: MissingCallback) -> Self {
        self.missing_callback = policy;
        self
    }

    pub fn exception_title(mut self, title: impl Into<String>) -> Self {
        self.exception_title = title.into();
        self
    }

    pub fn wheel_delta_divisor(mut self, divisor: i32) -> Self {
        self.wheel_delta_divisor = divisor;
        self
    }

    pub fn report_off_thread_when_running(mut self, enabled: bool) -> Self {
        self.report_off_thread_when_running = enabled;
        self
    }

    /// Parse from TOML text. Unknown keys are rejected.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.drag_start_distance < 0 {
            return Err(ConfigError::InvalidValue {
                key: "drag-start-distance",
                message: format!("must not be negative, got {}", self.drag_start_distance),
            });
        }
        if self.wheel_delta_divisor <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "wheel-delta-divisor",
                message: format!("must be positive, got {}", self.wheel_delta_divisor),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.drag_start_distance, 4);
        assert_eq!(config.missing_callback, MissingCallback::Swallow);
        assert_eq!(config.exception_title, "Exception");
        assert_eq!(config.wheel_delta_divisor, 120);
        assert!(!config.report_off_thread_when_running);
    }

    #[test]
    fn test_builder() {
        let config = BridgeConfig::new()
            .drag_start_distance(10)
            .missing_callback(MissingCallback::Forward)
            .exception_title("Oops");
        assert_eq!(config.drag_start_distance, 10);
        assert_eq!(config.missing_callback, MissingCallback::Forward);
        assert_eq!(config.exception_title, "Oops");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BridgeConfig::from_toml_str(
            r#"
            drag-start-distance = 8
            missing-callback = "forward"
            "#,
        )
        .unwrap();
        assert_eq!(config.drag_start_distance, 8);
        assert_eq!(config.missing_callback, MissingCallback::Forward);
        assert_eq!(config.wheel_delta_divisor, 120);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = BridgeConfig::from_toml_str("drag-distance = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_divisor_rejected() {
        let err = BridgeConfig::from_toml_str("wheel-delta-divisor = 0").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "wheel-delta-divisor",
                ..
            }
        ));
    }
}
