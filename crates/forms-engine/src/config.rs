//! Engine Configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    /// Debounced auto-execute behaviour
    pub auto_execute: AutoExecuteConfig,
    /// Machine-name derivation
    pub naming: NamingConfig,
    /// Language given to new forms when the caller does not pick one
    pub default_language: String,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            auto_execute: AutoExecuteConfig::default(),
            naming: NamingConfig::default(),
            default_language: "en".into(),
        }
    }
}

impl FormsConfig {
    /// Load from a JSON file
    pub fn load(path: &str) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, std::io::Error> {
        serde_json::from_str(content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save to a JSON file
    pub fn save(&self, path: &str) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoExecuteConfig {
    /// Quiet period after the last edit before the action fires
    pub debounce_ms: u64,
    /// Minimum time the loading flag stays up for actions that do not
    /// report their own completion
    pub min_loading_ms: u64,
}

impl Default for AutoExecuteConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            min_loading_ms: 1000,
        }
    }
}

impl AutoExecuteConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn min_loading(&self) -> Duration {
        Duration::from_millis(self.min_loading_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Longest base name before collision suffixes
    pub max_length: usize,
    /// Suffixes tried before giving up with an error
    pub max_suffix_attempts: u32,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_length: 120,
            max_suffix_attempts: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FormsConfig::default();
        assert_eq!(config.auto_execute.debounce(), Duration::from_millis(1000));
        assert_eq!(config.auto_execute.min_loading(), Duration::from_millis(1000));
        assert_eq!(config.naming.max_length, 120);
        assert_eq!(config.default_language, "en");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = FormsConfig::from_json(r#"{"auto_execute": {"debounce_ms": 250}}"#).unwrap();
        assert_eq!(config.auto_execute.debounce_ms, 250);
        assert_eq!(config.auto_execute.min_loading_ms, 1000);
        assert_eq!(config.naming, NamingConfig::default());
    }

    #[test]
    fn test_invalid_json_is_invalid_data() {
        let err = FormsConfig::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("forms-config-{}.json", uuid::Uuid::new_v4()));
        let path = path.to_string_lossy().to_string();

        let mut config = FormsConfig::default();
        config.default_language = "fr".into();
        config.save(&path).unwrap();

        assert_eq!(FormsConfig::load(&path).unwrap(), config);
        let _ = std::fs::remove_file(&path);
    }
}
