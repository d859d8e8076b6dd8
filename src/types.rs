//! Core data types for castline.

use serde::{Deserialize, Serialize};

/// Audio quality tier for a session.
///
/// Tier names follow the service's quality labels, not bitrate magnitude:
/// the 160 kbps stream is the service's "low" tier and 96 kbps its "medium"
/// tier, with everything else falling back to the 320 kbps "high" tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Low,
    Medium,
    #[default]
    High,
}

impl AudioFormat {
    /// Nominal stream bitrate in kbps for this tier.
    pub fn bitrate(&self) -> u32 {
        match self {
            AudioFormat::Low => 160,
            AudioFormat::Medium => 96,
            AudioFormat::High => 320,
        }
    }
}

/// Playback state of the renderer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Lifecycle status of a [`SessionOrchestrator`](crate::SessionOrchestrator).
///
/// `Failed` marks a session attempt that could not complete setup
/// (connect or authentication failure). For restart purposes it is
/// equivalent to `Stopped` and `Shutdown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStatus {
    Stopped,
    Running,
    ShuttingDown,
    Failed,
    Shutdown,
}

/// Metadata emitted once per track change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackChangedEvent {
    pub title: String,
    pub album: String,
    pub artist: String,
    /// Identifies the renderer that produced the event.
    pub source_tag: String,
    pub artwork_url: Option<String>,
}
