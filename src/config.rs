use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ReportError, Result};
use crate::report::ExportFormat;

/// Environment variable holding the summarization credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Seconds to wait for the service; 0 waits indefinitely.
    pub timeout_secs: u64,
    /// Alternative OpenAI-compatible endpoint.
    pub api_base: Option<String>,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_owned(),
            temperature: 0.3,
            max_tokens: 800,
            timeout_secs: 60,
            api_base: None,
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ReportSettings {
    /// Rows shown by `preview`.
    pub preview_rows: usize,
    /// Rows sent to the summarization service alongside the statistics.
    pub sample_rows: usize,
    pub default_format: ExportFormat,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            preview_rows: 5,
            sample_rows: 10,
            default_format: ExportFormat::Html,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub ai: AiConfig,
    pub report: ReportSettings,
}

pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("report-builder").join("config.json"))
}

/// Load the config file, falling back to defaults when it is absent or unreadable.
pub fn load_app_config() -> AppConfig {
    match get_config_path() {
        Some(path) => load_app_config_from(&path),
        None => AppConfig::default(),
    }
}

pub fn load_app_config_from(path: &Path) -> AppConfig {
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(path)
        .map_err(ReportError::from)
        .and_then(|content| serde_json::from_str::<AppConfig>(&content).map_err(ReportError::from))
    {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!("Ignoring config file {}: {e}", path.display());
            AppConfig::default()
        }
    }
}

/// Write the config to the standard location and return that path.
pub fn save_app_config(config: &AppConfig) -> Result<PathBuf> {
    let path = get_config_path()
        .ok_or_else(|| ReportError::Config("cannot determine the config directory".to_owned()))?;
    save_app_config_to(config, &path)?;
    Ok(path)
}

pub fn save_app_config_to(config: &AppConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!("Saved config to {}", path.display());
    Ok(())
}

/// Pick the credential from an explicit value or the environment.
///
/// # Errors
///
/// [`ReportError::MissingCredential`] when neither holds a non-blank key.
pub fn resolve_credential(explicit: Option<SecretString>) -> Result<SecretString> {
    explicit
        .or_else(|| std::env::var(API_KEY_ENV).ok().map(|k| SecretString::new(k.into())))
        .filter(|key| !key.expose_secret().trim().is_empty())
        .ok_or(ReportError::MissingCredential)
}
