//! User settings stored as settings.json in the app data directory

use crate::constants::{DEFAULT_API_BASE_URL, PROJECT_TOKEN_ENV};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no project token configured (set {PROJECT_TOKEN_ENV} or project_token in settings.json)")]
    MissingProjectToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Window geometry
    pub window_x: Option<f32>,
    pub window_y: Option<f32>,
    pub window_w: Option<f32>,
    pub window_h: Option<f32>,

    // Platform
    pub api_base_url: String,
    pub project_token: Option<String>,

    /// From the environment, never written back to disk
    #[serde(skip)]
    pub env_project_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_x: None,
            window_y: None,
            window_w: None,
            window_h: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            project_token: None,
            env_project_token: None,
        }
    }
}

impl Settings {
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join("settings.json");
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(s) => Self::parse(&s).unwrap_or_else(|e| {
                warn!(error = %e, "Failed to parse settings, using defaults");
                Self::default()
            }),
            Err(_) => {
                debug!("No settings file found, using defaults");
                Self::default()
            }
        };
        settings.apply_env_token(std::env::var(PROJECT_TOKEN_ENV).ok());
        settings
    }

    fn parse(s: &str) -> serde_json::Result<Self> {
        let settings: Self = serde_json::from_str(s)?;
        debug!("Settings parsed");
        Ok(settings)
    }

    /// Environment token wins over the file; blank values are ignored.
    fn apply_env_token(&mut self, token: Option<String>) {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.env_project_token = Some(token.trim().to_string());
        }
    }

    pub fn project_token(&self) -> Result<&str, ConfigError> {
        self.env_project_token
            .as_deref()
            .or(self.project_token.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingProjectToken)
    }

    pub fn save(&self, data_dir: &Path) {
        let path = data_dir.join("settings.json");
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&path, json) {
                    warn!(error = %e, "Failed to save settings");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize settings"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = Settings::parse(r#"{"window_w": 800.0}"#).unwrap();
        assert_eq!(settings.window_w, Some(800.0));
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE_URL);
        assert!(settings.project_token.is_none());
    }

    #[test]
    fn env_token_overrides_file() {
        let mut settings = Settings::parse(r#"{"project_token": "from-file"}"#).unwrap();
        settings.apply_env_token(Some("  from-env ".into()));
        assert_eq!(settings.project_token().unwrap(), "from-env");
    }

    #[test]
    fn blank_env_token_is_ignored() {
        let mut settings = Settings::parse(r#"{"project_token": "from-file"}"#).unwrap();
        settings.apply_env_token(Some("   ".into()));
        assert_eq!(settings.project_token().unwrap(), "from-file");
    }

    #[test]
    fn blank_token_is_missing() {
        let settings = Settings {
            project_token: Some("  ".into()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.project_token(),
            Err(ConfigError::MissingProjectToken)
        ));
    }

    #[test]
    fn env_token_is_not_saved() {
        let mut settings = Settings::default();
        settings.apply_env_token(Some("secret".into()));
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret"));
        assert_eq!(settings.project_token().unwrap(), "secret");
    }

    #[test]
    fn save_then_load_keeps_geometry() {
        let dir = std::env::temp_dir().join(format!("duck-settings-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let settings = Settings {
            window_x: Some(10.0),
            window_h: Some(600.0),
            ..Settings::default()
        };
        settings.save(&dir);
        let loaded = Settings::load(&dir);
        assert_eq!(loaded.window_x, Some(10.0));
        assert_eq!(loaded.window_h, Some(600.0));
        std::fs::remove_dir_all(&dir).ok();
    }
}
