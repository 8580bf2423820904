use super::{
    AudioChunk, ClientCommand, InterimResult, ServerMessage, SessionConfig, TranslationRecord,
};
use crate::error::ProtocolError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Deserialize)]
struct ConnectedData {
    #[serde(default)]
    message: String,
    #[serde(default)]
    server_version: Option<String>,
}

#[derive(Deserialize)]
struct ErrorData {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct TimestampData {
    #[serde(default)]
    timestamp: Option<Value>,
}

/// Split a text frame into its `type` tag and `data` payload.
///
/// A missing or `null` payload becomes an empty object so that types without
/// data (`started`, `stopped`) and lenient shapes decode the same way.
fn split_envelope(text: &str) -> Result<(String, Value), ProtocolError> {
    let mut frame: Value = serde_json::from_str(text)?;
    let kind = frame
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ProtocolError::MissingType)?
        .to_string();
    let data = match frame.get_mut("data").map(Value::take) {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(v) => v,
    };
    Ok((kind, data))
}

fn parse_data<T: DeserializeOwned>(kind: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidData {
        kind: kind.to_string(),
        source,
    })
}

/// Decode one inbound frame from the server.
///
/// Returns `Ok(None)` for message types this client does not know, so newer
/// servers can add types without breaking older clients.
pub fn decode_frame(text: &str) -> Result<Option<ServerMessage>, ProtocolError> {
    let (kind, data) = split_envelope(text)?;

    let message = match kind.as_str() {
        "connected" => {
            let data: ConnectedData = parse_data(&kind, data)?;
            ServerMessage::Connected {
                message: data.message,
                server_version: data.server_version,
            }
        }
        "config_confirmed" => ServerMessage::ConfigConfirmed(parse_data::<SessionConfig>(&kind, data)?),
        "recognizing" => ServerMessage::Recognizing(parse_data::<InterimResult>(&kind, data)?),
        "recognized" => ServerMessage::Recognized(parse_data::<TranslationRecord>(&kind, data)?),
        "audio" => ServerMessage::Audio(parse_data::<AudioChunk>(&kind, data)?),
        "started" => ServerMessage::Started,
        "stopped" => ServerMessage::Stopped,
        "error" => {
            let data: ErrorData = parse_data(&kind, data)?;
            ServerMessage::Error {
                message: data.message,
            }
        }
        "pong" => {
            let data: TimestampData = parse_data(&kind, data)?;
            ServerMessage::Pong {
                timestamp: data.timestamp.and_then(|t| t.as_u64()),
            }
        }
        other => {
            log::debug!("[protocol] ignoring unknown message type '{}'", other);
            return Ok(None);
        }
    };
    Ok(Some(message))
}

/// Decode one frame sent by a client. Used by the demo backend, which plays
/// the server's side of the protocol.
pub fn decode_command(text: &str) -> Result<Option<ClientCommand>, ProtocolError> {
    let (kind, data) = split_envelope(text)?;

    let command = match kind.as_str() {
        "config" => ClientCommand::Config(parse_data::<SessionConfig>(&kind, data)?),
        "start_recording" => ClientCommand::StartRecording,
        "stop_recording" => ClientCommand::StopRecording,
        "ping" => {
            let data: TimestampData = parse_data(&kind, data)?;
            ClientCommand::Ping {
                timestamp: data.timestamp.and_then(|t| t.as_u64()).unwrap_or(0),
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(command))
}
