//! Offline demo backend.
//!
//! [`DemoTransport`] plays the server's side of the protocol: it answers the
//! handshake and config, and on `start_recording` replays a scripted
//! conversation as `recognizing`/`recognized` frames with table-driven
//! translations. The session cannot tell it apart from a real server.

pub mod script;
pub mod speech;
pub mod translate;

use crate::error::TransportError;
use crate::protocol::{
    decode_command, encode_server_message, ClientCommand, InterimResult, ServerMessage,
    SessionConfig, TranslationRecord, MAX_TARGET_LANGUAGES,
};
use crate::transport::{ConnectionId, Transport, TransportEvent};
use chrono::Utc;
use script::SimulatedLine;
use speech::SpeechSynthesizer;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use translate::Translator;

pub const DEMO_SERVER_VERSION: &str = "demo";

#[derive(Debug, Clone)]
pub struct DemoOptions {
    /// Pause before each scripted line.
    pub line_delay: Duration,
    /// Gap between interim updates while a line is "spoken".
    pub word_interval: Duration,
    /// Simulated translation latency, also reported as `duration_ms`.
    pub translation_latency: Duration,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            line_delay: Duration::from_secs(3),
            word_interval: Duration::from_millis(150),
            translation_latency: Duration::from_millis(500),
        }
    }
}

/// Pause/resume for a running demo. Takes effect between lines.
#[derive(Clone)]
pub struct DemoController {
    paused: Arc<watch::Sender<bool>>,
}

impl DemoController {
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }
}

struct DemoConnection {
    id: ConnectionId,
    config: Option<SessionConfig>,
    replay: Option<JoinHandle<()>>,
}

impl DemoConnection {
    fn stop_replay(&mut self) -> bool {
        match self.replay.take() {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

pub struct DemoTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    script: Arc<Vec<SimulatedLine>>,
    translator: Arc<dyn Translator>,
    speaker: Option<Arc<dyn SpeechSynthesizer>>,
    options: DemoOptions,
    paused: Arc<watch::Sender<bool>>,
    active: Option<DemoConnection>,
}

impl DemoTransport {
    pub fn new(
        events: mpsc::UnboundedSender<TransportEvent>,
        script: Vec<SimulatedLine>,
        translator: Arc<dyn Translator>,
        options: DemoOptions,
    ) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            events,
            script: Arc::new(script),
            translator,
            speaker: None,
            options,
            paused: Arc::new(paused),
            active: None,
        }
    }

    /// Speak each original line and its translations after it is recognized.
    pub fn with_speaker(mut self, speaker: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn controller(&self) -> DemoController {
        DemoController {
            paused: self.paused.clone(),
        }
    }

    fn reply(&self, id: ConnectionId, message: &ServerMessage) {
        let _ = self.events.send(TransportEvent::Frame {
            id,
            text: encode_server_message(message),
        });
    }

    fn reply_error(&self, id: ConnectionId, message: impl Into<String>) {
        self.reply(
            id,
            &ServerMessage::Error {
                message: message.into(),
            },
        );
    }

    fn start_replay(&self, id: ConnectionId, config: SessionConfig) -> JoinHandle<()> {
        let ctx = ReplayContext {
            id,
            events: self.events.clone(),
            config,
            translator: self.translator.clone(),
            speaker: self.speaker.clone(),
            options: self.options.clone(),
            paused: self.paused.subscribe(),
        };
        tokio::spawn(replay(self.script.clone(), ctx))
    }
}

impl Transport for DemoTransport {
    fn open(&mut self, id: ConnectionId, url: &str) {
        log::info!("[demo] simulated connection {} (ignoring {})", id, url);
        if let Some(mut old) = self.active.take() {
            old.stop_replay();
        }
        self.active = Some(DemoConnection {
            id,
            config: None,
            replay: None,
        });
        let _ = self.events.send(TransportEvent::Opened { id });
        self.reply(
            id,
            &ServerMessage::Connected {
                message: "Connected to demo interpreter".into(),
                server_version: Some(DEMO_SERVER_VERSION.into()),
            },
        );
    }

    fn send(&mut self, id: ConnectionId, text: String) -> Result<(), TransportError> {
        if self.active.as_ref().map(|c| c.id) != Some(id) {
            return Err(TransportError::NotOpen(id));
        }
        let command = match decode_command(&text) {
            Ok(Some(command)) => command,
            Ok(None) => {
                self.reply_error(id, "Unknown message type");
                return Ok(());
            }
            Err(e) => {
                self.reply_error(id, format!("Invalid message: {}", e));
                return Ok(());
            }
        };

        match command {
            ClientCommand::Config(mut config) => {
                config.target_languages.truncate(MAX_TARGET_LANGUAGES);
                if let Some(conn) = self.active.as_mut() {
                    conn.config = Some(config.clone());
                }
                self.reply(id, &ServerMessage::ConfigConfirmed(config));
            }
            ClientCommand::StartRecording => {
                let Some(config) = self.active.as_ref().and_then(|c| c.config.clone()) else {
                    self.reply_error(id, "Translator not configured. Send config first.");
                    return Ok(());
                };
                let task = self.start_replay(id, config);
                if let Some(conn) = self.active.as_mut() {
                    conn.stop_replay();
                    conn.replay = Some(task);
                }
                self.reply(id, &ServerMessage::Started);
            }
            ClientCommand::StopRecording => {
                if let Some(conn) = self.active.as_mut() {
                    conn.stop_replay();
                }
                self.reply(id, &ServerMessage::Stopped);
            }
            ClientCommand::Ping { timestamp } => {
                self.reply(
                    id,
                    &ServerMessage::Pong {
                        timestamp: Some(timestamp),
                    },
                );
            }
        }
        Ok(())
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(mut conn) = self.active.take_if(|c| c.id == id) {
            conn.stop_replay();
            log::info!("[demo] connection {} closed", id);
            let _ = self.events.send(TransportEvent::Closed { id });
        }
    }
}

impl Drop for DemoTransport {
    fn drop(&mut self) {
        if let Some(conn) = self.active.as_mut() {
            conn.stop_replay();
        }
    }
}

struct ReplayContext {
    id: ConnectionId,
    events: mpsc::UnboundedSender<TransportEvent>,
    config: SessionConfig,
    translator: Arc<dyn Translator>,
    speaker: Option<Arc<dyn SpeechSynthesizer>>,
    options: DemoOptions,
    paused: watch::Receiver<bool>,
}

impl ReplayContext {
    /// False once the session side has gone away.
    fn send(&self, message: &ServerMessage) -> bool {
        self.events
            .send(TransportEvent::Frame {
                id: self.id,
                text: encode_server_message(message),
            })
            .is_ok()
    }

    async fn wait_while_paused(&mut self) -> bool {
        loop {
            let paused = *self.paused.borrow_and_update();
            if !paused {
                return true;
            }
            if self.paused.changed().await.is_err() {
                return false;
            }
        }
    }

    async fn speak(&self, text: &str, language: &str) {
        let Some(speaker) = self.speaker.clone() else {
            return;
        };
        let text = text.to_string();
        let language = language.to_string();
        if let Err(e) =
            tokio::task::spawn_blocking(move || speaker.speak(&text, &language)).await
        {
            log::error!("[demo] speech task failed: {}", e);
        }
    }
}

/// The counterpart language first, then the session's other targets.
fn translation_targets(
    language: &str,
    config: &SessionConfig,
    translator: &dyn Translator,
) -> Vec<String> {
    let mut targets: Vec<String> = translator
        .counterpart(language)
        .map(|t| vec![t.to_string()])
        .unwrap_or_default();
    for target in &config.target_languages {
        if target != language && !targets.contains(target) {
            targets.push(target.clone());
        }
    }
    targets
}

async fn replay(script: Arc<Vec<SimulatedLine>>, mut ctx: ReplayContext) {
    for (idx, line) in script.iter().enumerate() {
        if !ctx.wait_while_paused().await {
            return;
        }
        tokio::time::sleep(ctx.options.line_delay).await;
        if !ctx.wait_while_paused().await {
            return;
        }
        log::info!(
            "[demo] line {}/{}: {} ({})",
            idx + 1,
            script.len(),
            line.speaker,
            line.language
        );

        let words: Vec<&str> = line.text.split_whitespace().collect();
        for n in 1..=words.len() {
            let interim = InterimResult {
                text: words[..n].join(" "),
                translations: BTreeMap::new(),
                detected_language: Some(line.language.clone()),
            };
            if !ctx.send(&ServerMessage::Recognizing(interim)) {
                return;
            }
            tokio::time::sleep(ctx.options.word_interval).await;
        }

        tokio::time::sleep(ctx.options.translation_latency).await;
        let translations: BTreeMap<String, String> =
            translation_targets(&line.language, &ctx.config, ctx.translator.as_ref())
                .into_iter()
                .map(|to| {
                    let text = ctx.translator.translate(&line.text, &line.language, &to);
                    (to, text)
                })
                .collect();
        let record = TranslationRecord {
            original_text: line.text.clone(),
            detected_language: Some(line.language.clone()),
            translations: translations.clone(),
            timestamp: Utc::now().to_rfc3339(),
            duration_ms: ctx.options.translation_latency.as_millis() as u64,
            synthesized_audio: None,
        };
        if !ctx.send(&ServerMessage::Recognized(record)) {
            return;
        }

        ctx.speak(&line.text, &line.language).await;
        for (language, text) in &translations {
            ctx.speak(text, language).await;
        }
    }
    log::info!("[demo] script finished");
    ctx.send(&ServerMessage::Stopped);
}

#[cfg(test)]
mod tests {
    use super::translate::{LookupTranslator, PLACEHOLDER};
    use super::*;
    use crate::protocol::decode_frame;
    use crate::session::{spawn, SessionOptions};
    use crate::state::{AppEvent, ConnectionState, RecordingState};
    use std::sync::Mutex;

    fn fast() -> DemoOptions {
        DemoOptions {
            line_delay: Duration::from_millis(100),
            word_interval: Duration::from_millis(10),
            translation_latency: Duration::from_millis(50),
        }
    }

    fn short_script() -> Vec<SimulatedLine> {
        script::council_meeting().into_iter().take(2).collect()
    }

    fn transport() -> (DemoTransport, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let demo = DemoTransport::new(
            tx,
            short_script(),
            Arc::new(LookupTranslator::council_meeting()),
            fast(),
        );
        (demo, rx)
    }

    fn decoded(rx: &mut mpsc::UnboundedReceiver<TransportEvent>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let TransportEvent::Frame { text, .. } = event {
                out.push(decode_frame(&text).unwrap().unwrap());
            }
        }
        out
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn open_answers_with_handshake() {
        let (mut demo, mut rx) = transport();
        demo.open(7, "ws://ignored");
        assert_eq!(rx.try_recv().unwrap(), TransportEvent::Opened { id: 7 });
        match decoded(&mut rx).as_slice() {
            [ServerMessage::Connected { server_version, .. }] => {
                assert_eq!(server_version.as_deref(), Some(DEMO_SERVER_VERSION))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn start_before_config_is_an_error() {
        let (mut demo, mut rx) = transport();
        demo.open(1, "ws://ignored");
        decoded(&mut rx);
        demo.send(1, r#"{"type":"start_recording","data":{}}"#.into())
            .unwrap();
        assert_eq!(
            decoded(&mut rx),
            vec![ServerMessage::Error {
                message: "Translator not configured. Send config first.".into()
            }]
        );
    }

    #[test]
    fn config_is_capped_and_echoed() {
        let (mut demo, mut rx) = transport();
        demo.open(1, "ws://ignored");
        decoded(&mut rx);
        demo.send(
            1,
            r#"{"type":"config","data":{"source_language":"en-US","target_languages":["es-ES","fr-FR","de-DE","it-IT"],"use_live_interpreter":true}}"#.into(),
        )
        .unwrap();
        let Some(ServerMessage::ConfigConfirmed(config)) = decoded(&mut rx).pop() else {
            panic!("expected config_confirmed");
        };
        assert_eq!(config.target_languages, vec!["es-ES", "fr-FR", "de-DE"]);
    }

    #[test]
    fn ping_and_unknown_commands() {
        let (mut demo, mut rx) = transport();
        demo.open(1, "ws://ignored");
        decoded(&mut rx);
        demo.send(1, r#"{"type":"ping","data":{"timestamp":5}}"#.into())
            .unwrap();
        demo.send(1, r#"{"type":"audio","data":{}}"#.into()).unwrap();
        let replies = decoded(&mut rx);
        assert_eq!(replies[0], ServerMessage::Pong { timestamp: Some(5) });
        assert!(matches!(replies[1], ServerMessage::Error { .. }));

        assert!(demo.send(2, "{}".into()).is_err());
    }

    #[test]
    fn close_reports_closed_once() {
        let (mut demo, mut rx) = transport();
        demo.open(1, "ws://ignored");
        demo.close(1);
        demo.close(1);
        let closed = std::iter::from_fn(|| rx.try_recv().ok())
            .filter(|e| matches!(e, TransportEvent::Closed { .. }))
            .count();
        assert_eq!(closed, 1);
    }

    #[test]
    fn targets_start_with_counterpart() {
        let translator = LookupTranslator::council_meeting();
        let config = SessionConfig {
            target_languages: vec!["es-ES".into(), "fr-FR".into()],
            ..SessionConfig::default()
        };
        assert_eq!(
            translation_targets("es-ES", &config, &translator),
            vec!["en-US", "fr-FR"]
        );
        assert_eq!(
            translation_targets("en-US", &config, &translator),
            vec!["es-ES", "fr-FR"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn full_demo_through_session() {
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let (handle, _task) = spawn(
            |tx| {
                DemoTransport::new(
                    tx,
                    short_script(),
                    Arc::new(LookupTranslator::council_meeting()),
                    fast(),
                )
            },
            SessionOptions::default(),
            events_tx,
            None,
        );
        settle().await;
        handle.start_recording().unwrap();
        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;

        let events: Vec<AppEvent> = events_rx.try_iter().collect();
        assert!(events.contains(&AppEvent::ConnectionChanged(ConnectionState::Connected)));
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::ConfigConfirmed(_))));
        assert!(events
            .iter()
            .any(|e| matches!(e, AppEvent::InterimUpdated(_))));

        let results: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                AppEvent::ResultAppended(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].detected_language.as_deref(), Some("en-US"));
        assert_ne!(results[0].translations["es-ES"], PLACEHOLDER);
        assert_eq!(results[1].detected_language.as_deref(), Some("es-ES"));
        assert!(results[1].translations["en-US"].starts_with("Good afternoon."));

        let last_recording = events.iter().rev().find_map(|e| match e {
            AppEvent::RecordingChanged(s) => Some(*s),
            _ => None,
        });
        assert_eq!(last_recording, Some(RecordingState::Idle));
    }

    #[derive(Default)]
    struct CountingSpeaker {
        spoken: Mutex<Vec<String>>,
    }

    impl SpeechSynthesizer for CountingSpeaker {
        fn speak(&self, _text: &str, language: &str) {
            self.spoken.lock().unwrap().push(language.to_string());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_the_next_line() {
        let speaker = Arc::new(CountingSpeaker::default());
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let mut controller = None;
        let (handle, _task) = spawn(
            |tx| {
                let demo = DemoTransport::new(
                    tx,
                    short_script(),
                    Arc::new(LookupTranslator::council_meeting()),
                    fast(),
                )
                .with_speaker(speaker.clone());
                controller = Some(demo.controller());
                demo
            },
            SessionOptions::default(),
            events_tx,
            None,
        );
        let controller = controller.unwrap();
        controller.pause();
        assert!(controller.is_paused());
        settle().await;
        handle.start_recording().unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        settle().await;
        let appended = |rx: &std::sync::mpsc::Receiver<AppEvent>| {
            rx.try_iter()
                .filter(|e| matches!(e, AppEvent::ResultAppended(_)))
                .count()
        };
        assert_eq!(appended(&events_rx), 0);

        controller.resume();
        let mut total = 0;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            settle().await;
            total += appended(&events_rx);
            if total == 2 {
                break;
            }
        }
        assert_eq!(total, 2);
        let spoken = speaker.spoken.lock().unwrap().clone();
        assert!(spoken.len() >= 2);
        assert_eq!(spoken[0], "en-US");
        assert_eq!(spoken[1], "es-ES");
    }
}
