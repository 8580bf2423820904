use super::{ClientCommand, ServerMessage, SessionConfig};
use serde_json::{json, Value};

fn config_data(config: &SessionConfig) -> Value {
    json!({
        "source_language": config.source_language,
        "target_languages": config.target_languages,
        "use_live_interpreter": config.use_live_interpreter,
        "use_continuous_mode": config.use_continuous_mode,
        "voice_preferences": config.voice_preferences,
    })
}

fn envelope(kind: &str, data: Value) -> String {
    json!({ "type": kind, "data": data }).to_string()
}

/// Serialize a client command into a `{type, data}` text frame.
pub fn encode_command(command: &ClientCommand) -> String {
    let data = match command {
        ClientCommand::Config(config) => config_data(config),
        ClientCommand::StartRecording | ClientCommand::StopRecording => json!({}),
        ClientCommand::Ping { timestamp } => json!({ "timestamp": timestamp }),
    };
    envelope(command.kind(), data)
}

/// Serialize a server message. Only the demo backend speaks as the server.
pub fn encode_server_message(message: &ServerMessage) -> String {
    let data = match message {
        ServerMessage::Connected {
            message,
            server_version,
        } => json!({ "message": message, "server_version": server_version }),
        ServerMessage::ConfigConfirmed(config) => json!({
            "use_live_interpreter": config.use_live_interpreter,
            "use_continuous_mode": config.use_continuous_mode,
            "source_language": config.source_language,
            "target_languages": config.target_languages,
        }),
        ServerMessage::Recognizing(interim) => json!(interim),
        ServerMessage::Recognized(record) => json!(record),
        ServerMessage::Audio(chunk) => json!(chunk),
        ServerMessage::Started => json!({ "message": "Recording started" }),
        ServerMessage::Stopped => json!({ "message": "Recording stopped" }),
        ServerMessage::Error { message } => json!({ "message": message }),
        ServerMessage::Pong { timestamp } => json!({ "timestamp": timestamp }),
    };
    envelope(message.kind(), data)
}
