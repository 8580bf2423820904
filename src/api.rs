//! REST side of the interpreter server: health, language catalog and the
//! server's own defaults. Addresses are derived from the websocket URL.

use crate::error::ApiError;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const APP_USER_AGENT: &str = concat!("live-interpreter/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub azure_region: String,
    #[serde(default)]
    pub live_interpreter_enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LanguageCatalog {
    /// Locale code to display name.
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
    /// Locale code to the neural voices available for it.
    #[serde(default)]
    pub voices: BTreeMap<String, Vec<String>>,
}

impl LanguageCatalog {
    pub fn default_voice(&self, language: &str) -> Option<&str> {
        self.voices
            .get(language)
            .and_then(|v| v.first())
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_languages: Vec<String>,
    pub voice_name: Option<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub live_interpreter_enabled: bool,
    #[serde(default)]
    pub auto_detect_enabled: bool,
}

/// `ws://host:port/ws/translate` becomes `http://host:port`.
pub fn http_base(ws_url: &str) -> Result<String, ApiError> {
    let url = Url::parse(ws_url).map_err(|_| ApiError::InvalidUrl(ws_url.to_string()))?;
    let scheme = match url.scheme() {
        "ws" | "http" => "http",
        "wss" | "https" => "https",
        _ => return Err(ApiError::InvalidUrl(ws_url.to_string())),
    };
    let host = url
        .host_str()
        .ok_or_else(|| ApiError::InvalidUrl(ws_url.to_string()))?;
    Ok(match url.port() {
        Some(port) => format!("{}://{}:{}", scheme, host, port),
        None => format!("{}://{}", scheme, host),
    })
}

async fn get_json<T: DeserializeOwned>(ws_url: &str, path: &str) -> Result<T, ApiError> {
    let url = format!("{}{}", http_base(ws_url)?, path);
    log::debug!("[api] GET {}", url);
    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let body = client
        .get(&url)
        .header("User-Agent", APP_USER_AGENT)
        .send()
        .await?
        .error_for_status()?
        .json::<T>()
        .await?;
    Ok(body)
}

pub async fn fetch_health(ws_url: &str) -> Result<HealthStatus, ApiError> {
    get_json(ws_url, "/health").await
}

pub async fn fetch_languages(ws_url: &str) -> Result<LanguageCatalog, ApiError> {
    get_json(ws_url, "/languages").await
}

pub async fn fetch_server_config(ws_url: &str) -> Result<ServerConfig, ApiError> {
    get_json(ws_url, "/config").await
}
