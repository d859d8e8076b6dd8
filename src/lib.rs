//! # Castline
//!
//! Remote-playback session controller for a Connect-style audio
//! streaming service. Castline represents a device as a remote-control
//! playback target: it authenticates with the service, keeps a
//! message-dispatch loop running over the session connection, bridges
//! playback commands to the host's audio sink, and reports state back.
//!
//! The crate's center of gravity is the session lifecycle. The
//! [`SessionOrchestrator`] serializes setup and teardown so that a new
//! credential arriving mid-session, a configuration change, or a
//! shutdown racing a start never leave two sessions alive at once.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use castline::{NullSink, PlayerSettings, SessionOrchestrator, WsConnector};
//!
//! #[tokio::main]
//! async fn main() -> castline::Result<()> {
//!     let settings = PlayerSettings::from_options(&options)?;
//!     let (orchestrator, mut events) =
//!         SessionOrchestrator::new(settings, Arc::new(WsConnector), Arc::new(NullSink));
//!
//!     // Delivered by the external login flow.
//!     orchestrator.credential_ready(credential).await;
//!
//!     while let Some(track) = events.recv().await {
//!         println!("Now playing: {} - {}", track.artist, track.title);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod controller;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod protocol;
pub mod session;
pub mod sink;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export the main public API
pub use config::PlayerSettings;
pub use controller::RemoteControlController;
pub use credentials::Credential;
pub use dispatch::DispatchManager;
pub use error::Error;
pub use orchestrator::SessionOrchestrator;
pub use session::ConnectionSession;
pub use sink::{AudioSink, NullSink};
pub use transport::{Connector, Transport, WsConnector};
pub use types::{AudioFormat, ModuleStatus, PlayState, TrackChangedEvent};

/// Result type for castline operations.
pub type Result<T> = std::result::Result<T, Error>;
