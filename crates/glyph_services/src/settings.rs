//! Settings management

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Simulation settings. Every field is optional in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub display: DisplaySettings,
    pub timing: TimingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width: i32,
    pub height: i32,
    pub cell_width: u32,
    pub buffer_count: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: 100,
            height: 60,
            cell_width: 5,
            buffer_count: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub event_interval_ms: u64,
    pub logic_interval_ms: u64,
    pub render_interval_ms: u64,
    pub spin_threshold_ms: u64,
    pub liveness_poll_ms: u64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            event_interval_ms: 10,
            logic_interval_ms: 5,
            render_interval_ms: 20,
            spin_threshold_ms: 2,
            liveness_poll_ms: 1000,
        }
    }
}

impl TimingSettings {
    pub fn event_interval(&self) -> Duration {
        Duration::from_millis(self.event_interval_ms)
    }

    pub fn logic_interval(&self) -> Duration {
        Duration::from_millis(self.logic_interval_ms)
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms)
    }

    pub fn spin_threshold(&self) -> Duration {
        Duration::from_millis(self.spin_threshold_ms)
    }

    pub fn liveness_poll(&self) -> Duration {
        Duration::from_millis(self.liveness_poll_ms)
    }
}

impl Settings {
    /// Read settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&text)?;
        debug!(path = %path.display(), "settings loaded");
        Ok(settings)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json_string(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings = Settings::from_json_str(
            r#"{ "display": { "width": 40 }, "timing": { "render_interval_ms": 33 } }"#,
        )
        .unwrap();
        assert_eq!(settings.display.width, 40);
        assert_eq!(settings.display.height, 60);
        assert_eq!(settings.timing.render_interval(), Duration::from_millis(33));
        assert_eq!(settings.timing.logic_interval(), Duration::from_millis(5));
    }

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(Settings::from_json_str("{}").unwrap(), Settings::default());
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            Settings::from_json_str("{ \"display\": 3 }"),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = Settings::load("/definitely/not/here/settings.json").unwrap_err();
        assert!(matches!(err, SettingsError::Io { .. }));
    }

    #[test]
    fn test_written_settings_load_back() {
        let mut settings = Settings::default();
        settings.timing.spin_threshold_ms = 1;
        let path = std::env::temp_dir().join(format!("glyph-settings-{}.json", std::process::id()));
        std::fs::write(&path, settings.to_json_string().unwrap()).unwrap();
        let loaded = Settings::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, settings);
    }
}
