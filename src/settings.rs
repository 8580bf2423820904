use crate::protocol::{SessionConfig, DEFAULT_SERVER_URL};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Pause after an unexpected close before reconnecting.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Send a ping this often while connected. 0 disables pings.
    #[serde(default)]
    pub keepalive_interval_secs: u64,
    /// Keep at most this many results in the history. Unbounded when unset.
    #[serde(default)]
    pub history_limit: Option<usize>,
    #[serde(default = "default_playback_enabled")]
    pub playback_enabled: bool,
    /// Language selection restored on startup.
    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            keepalive_interval_secs: 0,
            history_limit: None,
            playback_enabled: default_playback_enabled(),
            session: SessionConfig::default(),
        }
    }
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.into()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_playback_enabled() -> bool {
    true
}

pub fn settings_path() -> Result<PathBuf, String> {
    if let Some(dir) = dirs::data_local_dir() {
        return Ok(dir.join("LiveInterpreter").join("settings.json"));
    }
    if let Some(home) = dirs::home_dir() {
        return Ok(home.join(".live-interpreter").join("settings.json"));
    }
    Err("Failed to resolve data directory".into())
}

pub fn load() -> Settings {
    match settings_path() {
        Ok(path) => load_from(&path),
        Err(_) => Settings::default(),
    }
}

/// Read settings from `path`. A missing or unreadable file yields defaults,
/// and an invalid stored language selection is replaced by the default one.
pub fn load_from(path: &Path) -> Settings {
    let mut settings: Settings = match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("[settings] ignoring unreadable {}: {}", path.display(), e);
                Settings::default()
            }
        },
        Err(_) => return Settings::default(),
    };
    if let Err(e) = settings.session.validate() {
        log::warn!("[settings] stored language selection rejected: {}", e);
        settings.session = SessionConfig::default();
    }
    settings
}

pub fn save(settings: &Settings) -> Result<(), String> {
    save_to(&settings_path()?, settings)
}

pub fn save_to(path: &Path, settings: &Settings) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create settings dir: {}", e))?;
    }
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to write settings: {}", e))?;
    Ok(())
}
