//! Client for a real-time speech interpreter server.
//!
//! A [`session::Session`] keeps one websocket connection alive, speaks the
//! `{type, data}` JSON protocol and folds server messages into
//! [`state::SessionState`]. The UI layer drives it through a
//! [`session::SessionHandle`] and listens for [`state::AppEvent`]s.

pub mod api;
pub mod demo;
pub mod error;
pub mod playback;
pub mod protocol;
pub mod session;
pub mod settings;
pub mod state;
pub mod transport;
