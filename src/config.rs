use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base path of the dialog proxy
    pub dialog_proxy_url: String,

    /// Grace period before the list is trusted again after a delete
    pub delete_refresh_delay_ms: u64,

    /// Timeout applied to every proxy request
    pub request_timeout_secs: u64,

    /// Text-to-speech settings
    pub speech: SpeechConfig,

    /// Console home directory, not persisted
    #[serde(skip)]
    pub home: PathBuf,
}

/// Text-to-speech configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub proxy_url: String,
    pub voice: String,
    pub enabled: bool,
    pub audio_dir: PathBuf,
}

fn default_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dialog-console")
}

impl Default for SpeechConfig {
    fn default() -> Self {
        SpeechConfig {
            proxy_url: "http://localhost:3000/proxy/text_to_speech".to_string(),
            voice: "en-US_AllisonVoice".to_string(),
            enabled: true,
            audio_dir: default_home().join("audio"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            dialog_proxy_url: "http://localhost:3000/proxy/dialog".to_string(),
            delete_refresh_delay_ms: 2000,
            request_timeout_secs: 30,
            speech: SpeechConfig::default(),
            home: default_home(),
        }
    }
}

impl Config {
    /// Load configuration from `~/.dialog-console/config.toml`, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir()
            .context("Could not find home directory")?
            .join(".dialog-console");
        let mut config = Self::load_from(&home.join("config.toml"))?;
        config.home = home;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from an explicit file; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DIALOG_PROXY_URL") {
            self.dialog_proxy_url = url;
        }
        if let Some(url) = lookup("TTS_PROXY_URL") {
            self.speech.proxy_url = url;
        }
        if let Some(voice) = lookup("TTS_VOICE") {
            self.speech.voice = voice;
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.home)
            .context("Failed to create .dialog-console directory")?;
        let config_path = self.home.join("config.toml");
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .context("Failed to write config file")?;
        Ok(config_path)
    }

    pub fn delete_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.delete_refresh_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Link to the proxy's visual editor for a dialog, which sits next to
    /// the proxy base path
    pub fn design_tool_url(&self, dialog_id: &str) -> Result<reqwest::Url> {
        let base = format!("{}/", self.dialog_proxy_url.trim_end_matches('/'));
        let base = reqwest::Url::parse(&base)
            .with_context(|| format!("Invalid dialog proxy url: {}", self.dialog_proxy_url))?;
        base.join(&format!("../ui/designtool/{dialog_id}"))
            .context("Failed to build design tool url")
    }
}
