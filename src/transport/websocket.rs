use super::{ConnectionId, Transport, TransportEvent};
use crate::error::TransportError;
use futures_util::{SinkExt, StreamExt};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite};

enum Outbound {
    Text(String),
    Close,
}

struct WsConnection {
    outbound: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

/// [`Transport`] over a real websocket. Each connection runs in its own task
/// and reports back on the event channel; a failed open is reported as
/// `Error` followed by `Closed`, like a browser socket would.
///
/// Must be used from within a tokio runtime.
pub struct WsTransport {
    events: mpsc::UnboundedSender<TransportEvent>,
    connections: HashMap<ConnectionId, WsConnection>,
}

impl WsTransport {
    pub fn new(events: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            events,
            connections: HashMap::new(),
        }
    }
}

impl Transport for WsTransport {
    fn open(&mut self, id: ConnectionId, url: &str) {
        self.connections.retain(|_, conn| !conn.task.is_finished());
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_connection(
            id,
            url.to_string(),
            outbound_rx,
            self.events.clone(),
        ));
        self.connections.insert(
            id,
            WsConnection {
                outbound: outbound_tx,
                task,
            },
        );
    }

    fn send(&mut self, id: ConnectionId, text: String) -> Result<(), TransportError> {
        let conn = self
            .connections
            .get(&id)
            .ok_or(TransportError::NotOpen(id))?;
        conn.outbound
            .send(Outbound::Text(text))
            .map_err(|_| TransportError::NotOpen(id))
    }

    fn close(&mut self, id: ConnectionId) {
        if let Some(conn) = self.connections.remove(&id) {
            let _ = conn.outbound.send(Outbound::Close);
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        for (_, conn) in self.connections.drain() {
            conn.task.abort();
        }
    }
}

async fn run_connection(
    id: ConnectionId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let ws_stream = match connect_async(url.as_str()).await {
        Ok((stream, _)) => stream,
        Err(e) => {
            let _ = events.send(TransportEvent::Error {
                id,
                message: format!("connect failed: {}", e),
            });
            let _ = events.send(TransportEvent::Closed { id });
            return;
        }
    };
    let _ = events.send(TransportEvent::Opened { id });

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    loop {
        tokio::select! {
            out = outbound.recv() => {
                match out {
                    Some(Outbound::Text(text)) => {
                        if let Err(e) = ws_tx.send(tungstenite::Message::Text(text.into())).await {
                            let _ = events.send(TransportEvent::Error {
                                id,
                                message: format!("send failed: {}", e),
                            });
                            break;
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let _ = ws_tx.close().await;
                        break;
                    }
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        let _ = events.send(TransportEvent::Frame {
                            id,
                            text: text.to_string(),
                        });
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        match frame {
                            Some(frame) => log::info!(
                                "[ws] server closed connection {}: {} {}",
                                id, frame.code, frame.reason
                            ),
                            None => log::info!("[ws] server closed connection {}", id),
                        }
                        break;
                    }
                    // Ping/pong is answered by tungstenite; binary frames are not part of the protocol.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        let _ = events.send(TransportEvent::Error {
                            id,
                            message: e.to_string(),
                        });
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = events.send(TransportEvent::Closed { id });
}
