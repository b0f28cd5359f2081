//! Configuration management for LS9 Remote
//!
//! Handles loading, parsing, and validation of the YAML configuration file.
//! Every section is optional; a missing file means all defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::fade::FadeConfig;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub fade: FadeSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Substring of the port name (matched case-insensitively)
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default = "default_client_name")]
    pub client_name: String,
}

/// Blocking wait limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_read_ms")]
    pub read_ms: u64,
    /// Wait for a touched parameter forever when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub touch_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FadeSettings {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    /// Also write logs to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let config = Self::read(path).await?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the file without validating it
    ///
    /// For callers that apply overrides before calling [`validate`](Self::validate).
    pub async fn read(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))
    }

    /// Like [`read`](Self::read), but `None` when there is no file at `path`
    pub async fn read_if_exists(path: &str) -> Result<Option<Self>> {
        if Path::new(path).exists() {
            Self::read(path).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.port.is_empty() {
            anyhow::bail!("MIDI port cannot be empty");
        }
        if self.midi.client_name.is_empty() {
            anyhow::bail!("MIDI client_name cannot be empty");
        }
        if self.timeouts.read_ms == 0 {
            anyhow::bail!("timeouts.read_ms must be greater than 0");
        }
        if self.timeouts.touch_ms == Some(0) {
            anyhow::bail!("timeouts.touch_ms must be greater than 0 when set");
        }
        if self.fade.tick_ms == 0 {
            anyhow::bail!("fade.tick_ms must be greater than 0");
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.read_ms)
    }

    pub fn touch_timeout(&self) -> Option<Duration> {
        self.timeouts.touch_ms.map(Duration::from_millis)
    }

    pub fn fade_config(&self) -> FadeConfig {
        FadeConfig {
            tick: Duration::from_millis(self.fade.tick_ms),
        }
    }
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            client_name: default_client_name(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            read_ms: default_read_ms(),
            touch_ms: None,
        }
    }
}

impl Default for FadeSettings {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: None,
        }
    }
}

// Default value functions
fn default_port() -> String { "LS9".to_string() }
fn default_client_name() -> String { "LS9-Remote".to_string() }
fn default_read_ms() -> u64 { 1000 }
fn default_tick_ms() -> u64 { 10 }
fn default_log_level() -> String { "info".to_string() }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_full_config() {
        let file = write_config(
            r#"
midi:
  port: "Cathedral Port 1"
  client_name: "FOH"
timeouts:
  read_ms: 250
  touch_ms: 5000
fade:
  tick_ms: 20
logging:
  level: debug
  json: true
"#,
        );

        let config = AppConfig::load(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(config.midi.port, "Cathedral Port 1");
        assert_eq!(config.midi.client_name, "FOH");
        assert_eq!(config.read_timeout(), Duration::from_millis(250));
        assert_eq!(config.touch_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.fade_config().tick, Duration::from_millis(20));
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert!(config.logging.file.is_none());
    }

    #[tokio::test]
    async fn test_partial_config_uses_defaults() {
        let file = write_config("midi:\n  port: LS9-64\n");

        let config = AppConfig::load(file.path().to_str().unwrap()).await.unwrap();
        assert_eq!(config.midi.port, "LS9-64");
        assert_eq!(config.midi.client_name, "LS9-Remote");
        assert_eq!(config.read_timeout(), Duration::from_secs(1));
        assert_eq!(config.touch_timeout(), None);
        assert_eq!(config.fade_config(), FadeConfig::default());
    }

    #[tokio::test]
    async fn test_validation_rejects_zero_tick() {
        let file = write_config("fade:\n  tick_ms: 0\n");
        let err = AppConfig::load(file.path().to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("tick_ms"));
    }

    #[tokio::test]
    async fn test_read_if_exists_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let config = AppConfig::read_if_exists(path.to_str().unwrap()).await.unwrap();
        assert!(config.is_none());
    }

    #[tokio::test]
    async fn test_read_defers_validation_to_caller() {
        let file = write_config("midi:\n  port: \"\"\n");
        let path = file.path().to_str().unwrap();

        let mut config = AppConfig::read_if_exists(path).await.unwrap().unwrap();
        assert!(config.validate().is_err());
        assert!(AppConfig::load(path).await.is_err());

        config.midi.port = "LS9".to_string();
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ls9.yaml");
        let path = path.to_str().unwrap();

        let mut config = AppConfig::default();
        config.midi.port = "USB MIDI".to_string();
        config.timeouts.touch_ms = Some(3000);
        config.save(path).await.unwrap();

        let loaded = AppConfig::load(path).await.unwrap();
        assert_eq!(loaded.midi.port, "USB MIDI");
        assert_eq!(loaded.timeouts.touch_ms, Some(3000));
    }
}
