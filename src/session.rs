use crate::error::SessionError;
use crate::playback::PlaybackQueue;
use crate::protocol::{decode_frame, now_ms, ClientCommand, ServerMessage, SessionConfig};
use crate::settings::Settings;
use crate::state::{AppEvent, ConnectionState, Effect, SessionState};
use crate::transport::{
    ConnectionManager, ConnectionNotice, Transport, TransportEvent, DEFAULT_RECONNECT_DELAY,
};
use std::sync::mpsc::Sender as EventSender;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub url: String,
    pub reconnect_delay: Duration,
    pub keepalive_interval: Option<Duration>,
    pub history_limit: Option<usize>,
    pub config: SessionConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            url: crate::protocol::DEFAULT_SERVER_URL.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            keepalive_interval: None,
            history_limit: None,
            config: SessionConfig::default(),
        }
    }
}

impl From<&Settings> for SessionOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            url: settings.server_url.clone(),
            reconnect_delay: Duration::from_millis(settings.reconnect_delay_ms),
            keepalive_interval: (settings.keepalive_interval_secs > 0)
                .then(|| Duration::from_secs(settings.keepalive_interval_secs)),
            history_limit: settings.history_limit,
            config: settings.session.clone(),
        }
    }
}

/// User actions forwarded from the UI to the session task.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Connect,
    Disconnect,
    StartRecording,
    StopRecording,
    ChangeConfig(SessionConfig),
    /// Disconnect and end the session task.
    Shutdown,
}

/// What the UI layer holds. Cloneable; the session ends when every handle is
/// dropped or `shutdown` is called.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(command).map_err(|_| SessionError::Closed)
    }

    pub fn connect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Connect)
    }

    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Disconnect)
    }

    pub fn start_recording(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StartRecording)
    }

    pub fn stop_recording(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::StopRecording)
    }

    pub fn change_config(&self, config: SessionConfig) -> Result<(), SessionError> {
        self.send(SessionCommand::ChangeConfig(config))
    }

    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Shutdown)
    }
}

/// One client session: connection, protocol and state, driven by transport
/// events and user actions one at a time.
pub struct Session<T: Transport> {
    conn: ConnectionManager<T>,
    state: SessionState,
    events: EventSender<AppEvent>,
    playback: Option<PlaybackQueue>,
    keepalive_interval: Option<Duration>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, options: SessionOptions, events: EventSender<AppEvent>) -> Self {
        Self {
            conn: ConnectionManager::new(transport, options.url, options.reconnect_delay),
            state: SessionState::new(options.config, options.history_limit),
            events,
            playback: None,
            keepalive_interval: options.keepalive_interval,
        }
    }

    /// Auto-play synthesized audio of new results through `queue`.
    pub fn with_playback(mut self, queue: PlaybackQueue) -> Self {
        self.playback = Some(queue);
        self
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.conn.reconnect_deadline()
    }

    fn emit(&self, event: AppEvent) {
        let _ = self.events.send(event);
    }

    pub fn connect(&mut self) {
        let notices = self.conn.connect();
        self.handle_notices(notices);
    }

    pub fn disconnect(&mut self) {
        let notices = self.conn.disconnect();
        self.handle_notices(notices);
    }

    pub fn start_recording(&mut self) -> Result<(), SessionError> {
        let effects = self
            .state
            .start_recording(self.conn.state())
            .inspect_err(|e| log::warn!("[session] start recording rejected: {}", e))?;
        self.run_effects(effects);
        Ok(())
    }

    pub fn stop_recording(&mut self) -> Result<(), SessionError> {
        let effects = self
            .state
            .stop_recording()
            .inspect_err(|e| log::warn!("[session] stop recording rejected: {}", e))?;
        self.run_effects(effects);
        Ok(())
    }

    pub fn change_config(&mut self, config: SessionConfig) -> Result<(), SessionError> {
        let effects = self
            .state
            .change_config(config, self.conn.state())
            .inspect_err(|e| log::warn!("[session] config change rejected: {}", e))?;
        self.run_effects(effects);
        Ok(())
    }

    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let notices = self.conn.on_transport_event(event, Instant::now());
        self.handle_notices(notices);
    }

    pub fn poll_reconnect(&mut self, now: Instant) {
        let notices = self.conn.poll_reconnect(now);
        self.handle_notices(notices);
    }

    fn handle_notices(&mut self, notices: Vec<ConnectionNotice>) {
        for notice in notices {
            match notice {
                ConnectionNotice::Status(status) => {
                    self.emit(AppEvent::ConnectionChanged(status));
                    if status == ConnectionState::Disconnected {
                        let effects = self.state.connection_lost();
                        self.run_effects(effects);
                    }
                }
                ConnectionNotice::Opened => {
                    log::info!("[session] transport open; waiting for server handshake");
                }
                ConnectionNotice::Frame(text) => self.handle_frame(&text),
            }
        }
    }

    fn handle_frame(&mut self, text: &str) {
        let message = match decode_frame(text) {
            Ok(Some(message)) => message,
            Ok(None) => return,
            Err(e) => {
                log::warn!("[session] dropping frame: {}", e);
                return;
            }
        };
        log::debug!("[session] received '{}'", message.kind());
        if let ServerMessage::Pong {
            timestamp: Some(sent_ms),
        } = &message
        {
            log::debug!(
                "[session] pong round trip {}ms",
                now_ms().saturating_sub(*sent_ms)
            );
        }
        let effects = self.state.apply_server(message);
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send(command) => {
                    self.conn.send(&command);
                }
                Effect::Emit(event) => {
                    if let (AppEvent::ResultAppended(record), Some(queue)) =
                        (&event, &self.playback)
                    {
                        for (lang, payload) in
                            record.audio_in_order(&self.state.config().target_languages)
                        {
                            queue.enqueue(lang, payload);
                        }
                    }
                    self.emit(event);
                }
            }
        }
    }

    fn send_ping(&mut self) {
        if self.conn.state() == ConnectionState::Connected {
            self.conn.send(&ClientCommand::Ping {
                timestamp: now_ms(),
            });
        }
    }

    /// Apply a UI command. Returns false once the session should end.
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        let result = match command {
            SessionCommand::Connect => {
                self.connect();
                Ok(())
            }
            SessionCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
            SessionCommand::StartRecording => self.start_recording(),
            SessionCommand::StopRecording => self.stop_recording(),
            SessionCommand::ChangeConfig(config) => self.change_config(config),
            SessionCommand::Shutdown => return false,
        };
        if let Err(e) = result {
            self.emit(AppEvent::ActionRejected(e));
        }
        true
    }

    /// Drive the session until shutdown or until every handle is dropped.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        let mut keepalive = match self.keepalive_interval {
            Some(period) => {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                // Skip the first immediate tick.
                interval.tick().await;
                Some(interval)
            }
            None => None,
        };

        loop {
            let deadline = self.conn.reconnect_deadline();
            tokio::select! {
                command = commands.recv() => {
                    let keep_going = match command {
                        Some(command) => self.handle_command(command),
                        None => false,
                    };
                    if !keep_going {
                        break;
                    }
                }
                event = transport_events.recv() => {
                    match event {
                        Some(event) => self.handle_transport_event(event),
                        None => {
                            log::error!("[session] transport event channel closed");
                            break;
                        }
                    }
                }
                _ = sleep_until_opt(deadline) => {
                    self.poll_reconnect(Instant::now());
                }
                _ = tick_opt(keepalive.as_mut()) => {
                    self.send_ping();
                }
            }
        }

        self.disconnect();
        log::info!("[session] stopped");
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

async fn tick_opt(interval: Option<&mut Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Start a session task and connect immediately.
///
/// `make_transport` receives the sender its connections must report on,
/// which lets callers pick the real websocket, the demo backend or a test
/// double.
pub fn spawn<T, F>(
    make_transport: F,
    options: SessionOptions,
    events: EventSender<AppEvent>,
    playback: Option<PlaybackQueue>,
) -> (SessionHandle, JoinHandle<()>)
where
    T: Transport + 'static,
    F: FnOnce(mpsc::UnboundedSender<TransportEvent>) -> T,
{
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let mut session = Session::new(make_transport(event_tx), options, events);
    if let Some(queue) = playback {
        session = session.with_playback(queue);
    }
    session.connect();
    let task = tokio::spawn(session.run(command_rx, event_rx));
    (SessionHandle { tx: command_tx }, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::tests::{wav_bytes, RecordingPlayer};
    use crate::state::RecordingState;
    use crate::transport::fake::FakeTransport;
    use base64::Engine;
    use std::sync::mpsc::Receiver;

    const CONNECTED: &str =
        r#"{"type":"connected","data":{"message":"Connected to Azure Live Interpreter API"}}"#;

    fn session() -> (Session<FakeTransport>, FakeTransport, Receiver<AppEvent>) {
        let fake = FakeTransport::default();
        let (tx, rx) = std::sync::mpsc::channel();
        let session = Session::new(fake.clone(), SessionOptions::default(), tx);
        (session, fake, rx)
    }

    fn frame(session: &mut Session<FakeTransport>, id: u64, text: &str) {
        session.handle_transport_event(TransportEvent::Frame {
            id,
            text: text.to_string(),
        });
    }

    fn connected_session() -> (Session<FakeTransport>, FakeTransport, Receiver<AppEvent>) {
        let (mut session, fake, rx) = session();
        session.connect();
        session.handle_transport_event(TransportEvent::Opened { id: 1 });
        frame(&mut session, 1, CONNECTED);
        (session, fake, rx)
    }

    fn statuses(rx: &Receiver<AppEvent>) -> Vec<ConnectionState> {
        rx.try_iter()
            .filter_map(|e| match e {
                AppEvent::ConnectionChanged(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn handshake_sends_default_config_once() {
        let (session, fake, _rx) = connected_session();
        let log = fake.log.lock().unwrap();
        assert_eq!(log.sent_kinds(), vec!["config"]);

        let sent: serde_json::Value = serde_json::from_str(&log.sent[0].1).unwrap();
        assert_eq!(sent["data"]["source_language"], "en-US");
        assert_eq!(sent["data"]["target_languages"], serde_json::json!(["es-ES"]));
        assert_eq!(sent["data"]["use_live_interpreter"], true);
        assert!(session.state().handshake_complete());
    }

    #[test]
    fn config_is_resent_after_reconnect() {
        let (mut session, fake, _rx) = connected_session();
        session.handle_transport_event(TransportEvent::Closed { id: 1 });
        assert!(!session.state().handshake_complete());

        session.poll_reconnect(Instant::now() + DEFAULT_RECONNECT_DELAY);
        session.handle_transport_event(TransportEvent::Opened { id: 2 });
        frame(&mut session, 2, CONNECTED);

        let log = fake.log.lock().unwrap();
        assert_eq!(log.sent_kinds(), vec!["config", "config"]);
        assert_eq!(log.sent[1].0, 2);
    }

    #[test]
    fn start_recording_while_disconnected_sends_nothing() {
        let (mut session, fake, _rx) = session();
        assert_eq!(session.start_recording(), Err(SessionError::NotConnected));

        session.connect();
        assert_eq!(session.start_recording(), Err(SessionError::NotConnected));
        assert!(fake.log.lock().unwrap().sent.is_empty());
        assert_eq!(session.state().recording(), RecordingState::Idle);
    }

    #[test]
    fn recording_round_trip() {
        let (mut session, fake, _rx) = connected_session();
        session.start_recording().unwrap();
        frame(&mut session, 1, r#"{"type":"started","data":{"message":"Recording started"}}"#);
        assert_eq!(session.state().recording(), RecordingState::Recording);

        session.stop_recording().unwrap();
        assert_eq!(session.state().recording(), RecordingState::Processing);
        frame(&mut session, 1, r#"{"type":"stopped","data":{"message":"Recording stopped"}}"#);
        assert_eq!(session.state().recording(), RecordingState::Idle);

        assert_eq!(
            fake.log.lock().unwrap().sent_kinds(),
            vec!["config", "start_recording", "stop_recording"]
        );
    }

    #[test]
    fn server_restart_mid_stop_allows_new_recording() {
        let (mut session, fake, rx) = connected_session();
        session.start_recording().unwrap();
        session.stop_recording().unwrap();
        assert_eq!(session.state().recording(), RecordingState::Processing);

        session.handle_transport_event(TransportEvent::Closed { id: 1 });
        assert_eq!(session.state().recording(), RecordingState::Idle);
        assert!(rx
            .try_iter()
            .any(|e| e == AppEvent::RecordingChanged(RecordingState::Idle)));

        session.poll_reconnect(Instant::now() + DEFAULT_RECONNECT_DELAY);
        session.handle_transport_event(TransportEvent::Opened { id: 2 });
        frame(&mut session, 2, CONNECTED);
        session.start_recording().unwrap();
        assert_eq!(
            fake.log.lock().unwrap().sent_kinds(),
            vec![
                "config",
                "start_recording",
                "stop_recording",
                "config",
                "start_recording"
            ]
        );
    }

    #[test]
    fn manual_disconnect_while_recording_resets() {
        let (mut session, fake, _rx) = connected_session();
        session.start_recording().unwrap();
        frame(
            &mut session,
            1,
            r#"{"type":"recognizing","data":{"original_text":"Hola"}}"#,
        );

        session.disconnect();
        assert_eq!(session.state().recording(), RecordingState::Idle);
        assert!(session.state().interim().is_none());
        assert_eq!(session.stop_recording(), Err(SessionError::NotRecording));

        session.connect();
        session.handle_transport_event(TransportEvent::Opened { id: 2 });
        frame(&mut session, 2, CONNECTED);
        session.start_recording().unwrap();
        assert_eq!(
            fake.log.lock().unwrap().sent_kinds(),
            vec!["config", "start_recording", "config", "start_recording"]
        );
    }

    #[test]
    fn interim_then_final() {
        let (mut session, _fake, _rx) = connected_session();
        frame(
            &mut session,
            1,
            r#"{"type":"recognizing","data":{"original_text":"Hola","translations":{"en-US":"Hi"}}}"#,
        );
        assert_eq!(session.state().interim().unwrap().text, "Hola");

        frame(
            &mut session,
            1,
            r#"{"type":"recognized","data":{"original_text":"Hola","translations":{"en-US":"Hello"},"timestamp":"2024-05-01T10:00:00","duration_ms":500}}"#,
        );
        assert!(session.state().interim().is_none());
        let first = session.state().latest().unwrap();
        assert_eq!(first.original_text, "Hola");
        assert_eq!(first.translations.get("en-US").unwrap(), "Hello");
        assert_eq!(first.duration_ms, 500);
    }

    #[test]
    fn bad_frames_leave_session_untouched() {
        let (mut session, _fake, rx) = connected_session();
        let _ = rx.try_iter().count();

        frame(&mut session, 1, "<<garbage>>");
        frame(&mut session, 1, r#"{"type":"translation_v2","data":{}}"#);
        frame(&mut session, 1, r#"{"type":"recognized","data":{}}"#);

        assert_eq!(session.connection_state(), ConnectionState::Connected);
        assert_eq!(session.state().results_count(), 0);
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn server_error_keeps_connection() {
        let (mut session, _fake, rx) = connected_session();
        session.start_recording().unwrap();
        frame(
            &mut session,
            1,
            r#"{"type":"error","data":{"message":"Translation canceled: timeout"}}"#,
        );
        assert_eq!(session.state().recording(), RecordingState::Idle);
        assert_eq!(session.connection_state(), ConnectionState::Connected);
        assert!(rx
            .try_iter()
            .any(|e| e == AppEvent::ServerError("Translation canceled: timeout".into())));
    }

    #[test]
    fn config_change_while_connected_is_sent() {
        let (mut session, fake, _rx) = connected_session();
        let config = SessionConfig {
            target_languages: vec!["fr-FR".into()],
            ..SessionConfig::default()
        };
        session.change_config(config).unwrap();
        let log = fake.log.lock().unwrap();
        assert_eq!(log.sent_kinds(), vec!["config", "config"]);
        let sent: serde_json::Value = serde_json::from_str(&log.sent[1].1).unwrap();
        assert_eq!(sent["data"]["target_languages"], serde_json::json!(["fr-FR"]));
    }

    #[test]
    fn rejected_command_is_reported() {
        let (mut session, _fake, rx) = session();
        assert!(session.handle_command(SessionCommand::StopRecording));
        assert!(rx
            .try_iter()
            .any(|e| e == AppEvent::ActionRejected(SessionError::NotRecording)));
        assert!(!session.handle_command(SessionCommand::Shutdown));
    }

    #[test]
    fn unexpected_close_status_sequence() {
        let (mut session, _fake, rx) = connected_session();
        assert_eq!(
            statuses(&rx),
            vec![ConnectionState::Connecting, ConnectionState::Connected]
        );

        session.handle_transport_event(TransportEvent::Closed { id: 1 });
        session.poll_reconnect(Instant::now() + DEFAULT_RECONNECT_DELAY);
        assert_eq!(
            statuses(&rx),
            vec![ConnectionState::Disconnected, ConnectionState::Connecting]
        );
    }

    #[test]
    fn synthesized_audio_is_queued_in_target_order() {
        let player = RecordingPlayer::default();
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let fake = FakeTransport::default();
        let options = SessionOptions {
            config: SessionConfig {
                target_languages: vec!["fr-FR".into(), "es-ES".into()],
                ..SessionConfig::default()
            },
            ..SessionOptions::default()
        };
        let queue = PlaybackQueue::spawn(Box::new(player.clone()), Some(events_tx.clone()));
        let mut session = Session::new(fake, options, events_tx).with_playback(queue);
        session.connect();
        session.handle_transport_event(TransportEvent::Opened { id: 1 });

        let clip = base64::engine::general_purpose::STANDARD.encode(wav_bytes(16000, 4));
        let recognized = serde_json::json!({
            "type": "recognized",
            "data": {
                "original_text": "Hello",
                "translations": {"es-ES": "Hola", "fr-FR": "Bonjour"},
                "timestamp": "2024-05-01T10:00:00",
                "duration_ms": 700,
                "synthesized_audio": {"es-ES": clip, "fr-FR": clip}
            }
        });
        frame(&mut session, 1, &recognized.to_string());

        let mut finished = Vec::new();
        while finished.len() < 2 {
            if let AppEvent::PlaybackFinished { language, error } = events_rx
                .recv_timeout(Duration::from_secs(5))
                .unwrap()
            {
                assert!(error.is_none());
                finished.push(language);
            }
        }
        assert_eq!(finished, vec!["fr-FR", "es-ES"]);
        assert_eq!(player.played.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_reconnects_after_fixed_delay() {
        let fake = FakeTransport::default();
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let mut transport_tx = None;
        let (handle, task) = spawn(
            |tx| {
                transport_tx = Some(tx);
                fake.clone()
            },
            SessionOptions::default(),
            events_tx,
            None,
        );
        let transport_tx = transport_tx.unwrap();

        transport_tx.send(TransportEvent::Opened { id: 1 }).unwrap();
        transport_tx
            .send(TransportEvent::Frame {
                id: 1,
                text: CONNECTED.into(),
            })
            .unwrap();
        settle().await;
        assert_eq!(fake.log.lock().unwrap().sent_kinds(), vec!["config"]);

        transport_tx.send(TransportEvent::Closed { id: 1 }).unwrap();
        settle().await;
        tokio::time::sleep(DEFAULT_RECONNECT_DELAY - Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(fake.log.lock().unwrap().opened.len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert_eq!(fake.log.lock().unwrap().opened.len(), 2);
        assert_eq!(
            statuses(&events_rx),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected,
                ConnectionState::Connecting
            ]
        );

        handle.shutdown().unwrap();
        task.await.unwrap();
        assert_eq!(handle.connect(), Err(SessionError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_delay_prevents_reconnect() {
        let fake = FakeTransport::default();
        let (events_tx, events_rx) = std::sync::mpsc::channel();
        let mut transport_tx = None;
        let (handle, _task) = spawn(
            |tx| {
                transport_tx = Some(tx);
                fake.clone()
            },
            SessionOptions::default(),
            events_tx,
            None,
        );
        let transport_tx = transport_tx.unwrap();
        transport_tx.send(TransportEvent::Opened { id: 1 }).unwrap();
        transport_tx.send(TransportEvent::Closed { id: 1 }).unwrap();
        settle().await;

        tokio::time::sleep(Duration::from_millis(1000)).await;
        handle.disconnect().unwrap();
        handle.disconnect().unwrap();
        settle().await;

        tokio::time::sleep(DEFAULT_RECONNECT_DELAY * 5).await;
        settle().await;
        assert_eq!(fake.log.lock().unwrap().opened.len(), 1);
        assert_eq!(
            statuses(&events_rx).last(),
            Some(&ConnectionState::Disconnected)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn no_pings_without_keepalive() {
        let fake = FakeTransport::default();
        let (events_tx, _events_rx) = std::sync::mpsc::channel();
        let mut transport_tx = None;
        let (_handle, _task) = spawn(
            |tx| {
                transport_tx = Some(tx);
                fake.clone()
            },
            SessionOptions::default(),
            events_tx,
            None,
        );
        let transport_tx = transport_tx.unwrap();
        transport_tx.send(TransportEvent::Opened { id: 1 }).unwrap();
        settle().await;

        tokio::time::sleep(Duration::from_secs(4 * 3600)).await;
        settle().await;
        assert!(fake.log.lock().unwrap().sent.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_while_connected() {
        let fake = FakeTransport::default();
        let (events_tx, _events_rx) = std::sync::mpsc::channel();
        let mut transport_tx = None;
        let options = SessionOptions {
            keepalive_interval: Some(Duration::from_secs(10)),
            ..SessionOptions::default()
        };
        let (_handle, _task) = spawn(
            |tx| {
                transport_tx = Some(tx);
                fake.clone()
            },
            options,
            events_tx,
            None,
        );
        let transport_tx = transport_tx.unwrap();
        settle().await;

        // Not connected yet: the first tick must not send anything.
        tokio::time::sleep(Duration::from_secs(11)).await;
        settle().await;
        assert!(fake.log.lock().unwrap().sent.is_empty());

        transport_tx.send(TransportEvent::Opened { id: 1 }).unwrap();
        settle().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle().await;
        assert_eq!(fake.log.lock().unwrap().sent_kinds(), vec!["ping"]);
    }
}
