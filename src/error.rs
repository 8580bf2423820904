//! Error types for the interpreter client.
//!
//! Nothing here is fatal: transport failures become status changes and
//! reconnects, protocol failures drop a frame, and user-action errors are
//! returned synchronously to the caller.

use thiserror::Error;

/// A frame that could not be turned into a protocol message.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope has no string `type` field.
    #[error("frame has no type field")]
    MissingType,

    /// The `data` payload does not match the shape required by its type.
    #[error("invalid data for '{kind}': {source}")]
    InvalidData {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

/// A user action that was rejected before anything reached the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("not connected to server")]
    NotConnected,

    #[error("recording already in progress")]
    AlreadyRecording,

    #[error("not recording")]
    NotRecording,

    #[error("invalid language configuration: {0}")]
    InvalidConfig(String),

    /// The session task has shut down and no longer accepts commands.
    #[error("session closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection {0} is not open")]
    NotOpen(u64),
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("audio payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("audio payload is empty")]
    Empty,

    #[error("audio output failed: {0}")]
    Output(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cannot derive http address from '{0}'")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_error_display() {
        assert_eq!(
            SessionError::NotConnected.to_string(),
            "not connected to server"
        );
        assert_eq!(
            SessionError::InvalidConfig("too many targets".into()).to_string(),
            "invalid language configuration: too many targets"
        );
    }

    #[test]
    fn protocol_error_from_json() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ProtocolError = err.into();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        assert!(err.to_string().starts_with("malformed frame"));
    }
}
