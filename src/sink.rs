//! Audio sink interface.
//!
//! The sink is an external collaborator: its lifecycle is managed by the
//! host runtime and it outlives the controller in normal operation. The
//! controller only forwards playback commands to it.

use tracing::trace;

/// Destination for playback control, implemented by the host's audio stack.
pub trait AudioSink: Send + Sync {
    /// Start or resume playback.
    fn play(&self);

    /// Pause playback, keeping position.
    fn pause(&self);

    /// Stop playback entirely.
    fn stop(&self);

    /// Set output volume (0-255).
    fn set_volume(&self, volume: u8);
}

/// Sink that discards everything. Useful for tests and headless demos.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn play(&self) {
        trace!("NullSink: play");
    }

    fn pause(&self) {
        trace!("NullSink: pause");
    }

    fn stop(&self) {
        trace!("NullSink: stop");
    }

    fn set_volume(&self, volume: u8) {
        trace!(volume, "NullSink: set_volume");
    }
}
