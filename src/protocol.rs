//! Session-level protocol messages.
//!
//! Messages are organized by direction:
//!
//! - [`ClientMessage`] - renderer TO service (authenticate, subscribe, reports)
//! - [`ServerMessage`] - service TO renderer (auth results, playback commands)
//!
//! The messages are framed as JSON text over the transport; the heavy
//! protocol work (queue management, audio delivery) lives in the service
//! and is outside this crate.

use serde::{Deserialize, Serialize};

use crate::types::{AudioFormat, PlayState};

/// Messages sent from this renderer to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate the device for this session.
    Authenticate {
        identity: String,
        token: Vec<u8>,
        format: AudioFormat,
        device_name: String,
    },
    /// Register this device as an active remote-control target.
    ///
    /// Safe to send more than once; the service treats repeats as a
    /// refresh of the registration.
    Subscribe { device_name: String, volume: u8 },
    /// Deregister the device, used during shutdown.
    Unsubscribe,
    /// Report current playback state back to the service.
    StateReport { state: PlayState, volume: u8 },
}

/// Messages received from the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication succeeded; carries a reusable token for reconnects.
    Welcome { reusable_token: Vec<u8> },
    /// Authentication was rejected.
    AuthFailed { reason: String },
    /// Start or resume playback.
    Play,
    /// Pause playback.
    Pause,
    /// Stop playback.
    Stop,
    /// Skip to the next track. The service follows up with `TrackChanged`.
    Next,
    /// Return to the previous track. The service follows up with `TrackChanged`.
    Previous,
    /// Set renderer volume.
    SetVolume { volume: u8 },
    /// The current track changed.
    TrackChanged {
        title: String,
        album: String,
        artist: String,
        artwork_url: Option<String>,
    },
    /// Keepalive from the service; no response required.
    Ping,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_round_trips_through_json() {
        let msg = ClientMessage::Authenticate {
            identity: "user@example.com".to_string(),
            token: vec![1, 2, 3],
            format: AudioFormat::Low,
            device_name: "Kitchen".to_string(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn server_message_uses_type_tag() {
        let json = r#"{"type":"set_volume","volume":128}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, ServerMessage::SetVolume { volume: 128 });
    }

    #[test]
    fn unknown_server_message_is_an_error() {
        let json = r#"{"type":"telemetry","data":"x"}"#;
        assert!(serde_json::from_str::<ServerMessage>(json).is_err());
    }
}
