pub mod decode;
pub mod encode;

pub use decode::{decode_command, decode_frame};
pub use encode::{encode_command, encode_server_message};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Default translation endpoint of the interpreter server.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000/ws/translate";

/// The server translates into at most this many languages at once.
pub const MAX_TARGET_LANGUAGES: usize = 3;

/// Language selection and recognition options for the session.
///
/// Sent to the server whenever it changes while connected and once after
/// every `connected` handshake, since the server keeps no config across
/// reconnects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_language: Option<String>,
    #[serde(default)]
    pub target_languages: Vec<String>,
    #[serde(default)]
    pub use_live_interpreter: bool,
    #[serde(default = "default_continuous_mode")]
    pub use_continuous_mode: bool,
    /// Preferred synthesis voice per language tag.
    #[serde(default)]
    pub voice_preferences: BTreeMap<String, String>,
}

fn default_continuous_mode() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source_language: Some("en-US".into()),
            target_languages: vec!["es-ES".into()],
            use_live_interpreter: true,
            use_continuous_mode: true,
            voice_preferences: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Check the target list: at most three entries, no blanks, no duplicates.
    pub fn validate(&self) -> Result<(), String> {
        if self.target_languages.len() > MAX_TARGET_LANGUAGES {
            return Err(format!(
                "at most {} target languages are supported, got {}",
                MAX_TARGET_LANGUAGES,
                self.target_languages.len()
            ));
        }
        let mut seen = HashSet::new();
        for lang in &self.target_languages {
            if lang.trim().is_empty() {
                return Err("empty target language".into());
            }
            if !seen.insert(lang.as_str()) {
                return Err(format!("duplicate target language '{}'", lang));
            }
        }
        if let Some(source) = &self.source_language {
            if source.trim().is_empty() {
                return Err("empty source language".into());
            }
        }
        Ok(())
    }
}

/// Partial recognition output. Superseded by the next partial or finalized by
/// a `recognized` message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterimResult {
    #[serde(rename = "original_text", default)]
    pub text: String,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
}

/// One finalized utterance with its translations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub original_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_language: Option<String>,
    #[serde(default)]
    pub translations: BTreeMap<String, String>,
    /// Server timestamp as sent on the wire (ISO 8601, possibly without offset).
    pub timestamp: String,
    #[serde(default)]
    pub duration_ms: u64,
    /// Base64 encoded synthesized speech per language tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesized_audio: Option<BTreeMap<String, String>>,
}

impl TranslationRecord {
    /// Parse the wire timestamp. Timestamps without an offset are taken as UTC.
    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(&self.timestamp) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Audio payloads ordered by `languages` first, then any remaining tags.
    pub fn audio_in_order<'a>(&'a self, languages: &[String]) -> Vec<(&'a str, &'a str)> {
        let Some(audio) = &self.synthesized_audio else {
            return Vec::new();
        };
        let mut ordered: Vec<(&str, &str)> = languages
            .iter()
            .filter_map(|lang| {
                audio
                    .get_key_value(lang.as_str())
                    .map(|(k, v)| (k.as_str(), v.as_str()))
            })
            .collect();
        for (lang, payload) in audio {
            if !languages.iter().any(|l| l == lang) {
                ordered.push((lang.as_str(), payload.as_str()));
            }
        }
        ordered.retain(|(_, payload)| !payload.is_empty());
        ordered
    }
}

/// Streamed synthesized audio, independent of any recognition result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChunk {
    pub audio: String,
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub sample_rate: u32,
}

/// Messages sent from the server to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Server ready; the client must (re)send its config.
    Connected {
        message: String,
        server_version: Option<String>,
    },
    /// Echo of the config the server applied.
    ConfigConfirmed(SessionConfig),
    Recognizing(InterimResult),
    Recognized(TranslationRecord),
    Audio(AudioChunk),
    Started,
    Stopped,
    /// Non-fatal server error; recording is over.
    Error {
        message: String,
    },
    Pong {
        timestamp: Option<u64>,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Connected { .. } => "connected",
            ServerMessage::ConfigConfirmed(_) => "config_confirmed",
            ServerMessage::Recognizing(_) => "recognizing",
            ServerMessage::Recognized(_) => "recognized",
            ServerMessage::Audio(_) => "audio",
            ServerMessage::Started => "started",
            ServerMessage::Stopped => "stopped",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Pong { .. } => "pong",
        }
    }
}

/// Commands sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    Config(SessionConfig),
    StartRecording,
    StopRecording,
    /// Liveness probe; `timestamp` is milliseconds since the Unix epoch.
    Ping { timestamp: u64 },
}

impl ClientCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientCommand::Config(_) => "config",
            ClientCommand::StartRecording => "start_recording",
            ClientCommand::StopRecording => "stop_recording",
            ClientCommand::Ping { .. } => "ping",
        }
    }
}

pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}
