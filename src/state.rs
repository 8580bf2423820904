use crate::error::SessionError;
use crate::protocol::{
    AudioChunk, ClientCommand, InterimResult, ServerMessage, SessionConfig, TranslationRecord,
};
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    /// Stop was requested; waiting for the server's `stopped` or `error`.
    Processing,
}

impl RecordingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingState::Idle => "idle",
            RecordingState::Recording => "recording",
            RecordingState::Processing => "processing",
        }
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events sent from the session to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    ConnectionChanged(ConnectionState),
    RecordingChanged(RecordingState),
    HandshakeComplete {
        message: String,
        server_version: Option<String>,
    },
    ConfigConfirmed(SessionConfig),
    InterimUpdated(InterimResult),
    InterimCleared,
    ResultAppended(TranslationRecord),
    AudioChunk(AudioChunk),
    /// Server-reported error, for display only.
    ServerError(String),
    /// A user action was refused locally; nothing was sent.
    ActionRejected(SessionError),
    PlaybackFinished {
        language: String,
        error: Option<String>,
    },
}

/// Output of the reducer: frames to send and events to surface.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send(ClientCommand),
    Emit(AppEvent),
}

/// In-memory state of one client session.
///
/// History is kept most-recent-first. It is unbounded unless a limit is set,
/// in which case the oldest records are evicted.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    recording: RecordingState,
    config: SessionConfig,
    interim: Option<InterimResult>,
    history: VecDeque<TranslationRecord>,
    history_limit: Option<usize>,
    handshake_complete: bool,
}

impl SessionState {
    pub fn new(config: SessionConfig, history_limit: Option<usize>) -> Self {
        Self {
            config,
            history_limit: history_limit.filter(|limit| *limit > 0),
            ..Self::default()
        }
    }

    pub fn recording(&self) -> RecordingState {
        self.recording
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn interim(&self) -> Option<&InterimResult> {
        self.interim.as_ref()
    }

    /// Finalized results, most recent first.
    pub fn history(&self) -> impl Iterator<Item = &TranslationRecord> {
        self.history.iter()
    }

    pub fn latest(&self) -> Option<&TranslationRecord> {
        self.history.front()
    }

    pub fn results_count(&self) -> usize {
        self.history.len()
    }

    pub fn handshake_complete(&self) -> bool {
        self.handshake_complete
    }

    fn set_recording(&mut self, next: RecordingState, effects: &mut Vec<Effect>) {
        if self.recording != next {
            log::info!("[session] recording {} -> {}", self.recording, next);
            self.recording = next;
            effects.push(Effect::Emit(AppEvent::RecordingChanged(next)));
        }
    }

    fn clear_interim(&mut self, effects: &mut Vec<Effect>) {
        if self.interim.take().is_some() {
            effects.push(Effect::Emit(AppEvent::InterimCleared));
        }
    }

    /// Apply one decoded server message.
    pub fn apply_server(&mut self, message: ServerMessage) -> Vec<Effect> {
        let mut effects = Vec::new();
        match message {
            ServerMessage::Connected {
                message,
                server_version,
            } => {
                log::info!(
                    "[session] server ready: {} (version {})",
                    message,
                    server_version.as_deref().unwrap_or("unknown")
                );
                self.handshake_complete = true;
                effects.push(Effect::Emit(AppEvent::HandshakeComplete {
                    message,
                    server_version,
                }));
                effects.push(Effect::Send(ClientCommand::Config(self.config.clone())));
            }
            ServerMessage::ConfigConfirmed(confirmed) => {
                log::info!(
                    "[session] config confirmed: source={} targets={:?} live_interpreter={}",
                    confirmed.source_language.as_deref().unwrap_or("auto"),
                    confirmed.target_languages,
                    confirmed.use_live_interpreter
                );
                effects.push(Effect::Emit(AppEvent::ConfigConfirmed(confirmed)));
            }
            ServerMessage::Recognizing(interim) => {
                self.interim = Some(interim.clone());
                effects.push(Effect::Emit(AppEvent::InterimUpdated(interim)));
            }
            ServerMessage::Recognized(record) => {
                self.clear_interim(&mut effects);
                self.history.push_front(record.clone());
                if let Some(limit) = self.history_limit {
                    self.history.truncate(limit);
                }
                effects.push(Effect::Emit(AppEvent::ResultAppended(record)));
            }
            ServerMessage::Audio(chunk) => {
                effects.push(Effect::Emit(AppEvent::AudioChunk(chunk)));
            }
            ServerMessage::Started => {
                self.set_recording(RecordingState::Recording, &mut effects);
            }
            ServerMessage::Stopped => {
                self.clear_interim(&mut effects);
                self.set_recording(RecordingState::Idle, &mut effects);
            }
            ServerMessage::Error { message } => {
                log::error!("[session] server error: {}", message);
                self.clear_interim(&mut effects);
                self.set_recording(RecordingState::Idle, &mut effects);
                effects.push(Effect::Emit(AppEvent::ServerError(message)));
            }
            ServerMessage::Pong { .. } => {}
        }
        effects
    }

    /// The server forgets everything on disconnect, so no `stopped` will
    /// follow: recording ends here and the next `connected` starts a new
    /// handshake.
    pub fn connection_lost(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.handshake_complete = false;
        self.clear_interim(&mut effects);
        self.set_recording(RecordingState::Idle, &mut effects);
        effects
    }

    pub fn start_recording(
        &mut self,
        connection: ConnectionState,
    ) -> Result<Vec<Effect>, SessionError> {
        if connection != ConnectionState::Connected {
            return Err(SessionError::NotConnected);
        }
        if self.recording != RecordingState::Idle {
            return Err(SessionError::AlreadyRecording);
        }
        let mut effects = vec![Effect::Send(ClientCommand::StartRecording)];
        self.set_recording(RecordingState::Recording, &mut effects);
        Ok(effects)
    }

    pub fn stop_recording(&mut self) -> Result<Vec<Effect>, SessionError> {
        if self.recording != RecordingState::Recording {
            return Err(SessionError::NotRecording);
        }
        let mut effects = vec![Effect::Send(ClientCommand::StopRecording)];
        self.set_recording(RecordingState::Processing, &mut effects);
        Ok(effects)
    }

    pub fn change_config(
        &mut self,
        config: SessionConfig,
        connection: ConnectionState,
    ) -> Result<Vec<Effect>, SessionError> {
        config.validate().map_err(SessionError::InvalidConfig)?;
        self.config = config;
        if connection == ConnectionState::Connected {
            Ok(vec![Effect::Send(ClientCommand::Config(self.config.clone()))])
        } else {
            Ok(Vec::new())
        }
    }
}
