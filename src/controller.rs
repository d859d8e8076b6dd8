//! Remote-control target.
//!
//! The [`RemoteControlController`] represents this device as a
//! controllable playback target: it registers with the service, bridges
//! protocol-level playback commands to the [`AudioSink`], reports state
//! back after each handled command, and surfaces track changes through a
//! registered callback.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

use crate::dispatch::DispatchManager;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::sink::AudioSink;
use crate::types::{PlayState, TrackChangedEvent};
use crate::Result;

/// Source tag stamped on every emitted [`TrackChangedEvent`].
pub const SOURCE_TAG: &str = "castline";

type TrackCallback = Box<dyn Fn(TrackChangedEvent) + Send + Sync>;

/// Bridges playback commands from the service to the audio sink.
///
/// The sink is not owned: its lifecycle is managed by the host and it
/// outlives the controller in normal operation.
pub struct RemoteControlController {
    dispatch: Arc<DispatchManager>,
    sink: Arc<dyn AudioSink>,
    device_name: String,
    volume: AtomicU8,
    state: Mutex<PlayState>,
    track_callback: Mutex<Option<TrackCallback>>,
}

impl RemoteControlController {
    pub fn new(
        dispatch: Arc<DispatchManager>,
        sink: Arc<dyn AudioSink>,
        device_name: String,
        volume: u8,
    ) -> Self {
        Self {
            dispatch,
            sink,
            device_name,
            volume: AtomicU8::new(volume),
            state: Mutex::new(PlayState::Stopped),
            track_callback: Mutex::new(None),
        }
    }

    /// (Re)register this device as an active remote-control target.
    ///
    /// Idempotent: the service treats repeated subscriptions as a
    /// registration refresh, so this is also the resubscribe hook after
    /// reconnects.
    pub async fn subscribe(&self) -> Result<()> {
        debug!(device = %self.device_name, "Subscribing as remote-control target");
        self.dispatch
            .send(ClientMessage::Subscribe {
                device_name: self.device_name.clone(),
                volume: self.volume.load(Ordering::Relaxed),
            })
            .await
    }

    /// Halt playback and signal deregistration. Best-effort: only used
    /// during shutdown, so errors are logged, not propagated.
    pub async fn stop_player(&self) {
        self.sink.stop();
        *self.state.lock().unwrap() = PlayState::Stopped;
        if let Err(e) = self.dispatch.send(ClientMessage::Unsubscribe).await {
            warn!(error = %e, "Unsubscribe during shutdown failed");
        }
    }

    /// Register the track-changed callback. Exactly one callback is
    /// active at a time; the last writer wins.
    ///
    /// The callback runs synchronously on the processing-loop context and
    /// must not block - post the event elsewhere and return.
    pub fn set_track_changed_callback(
        &self,
        callback: impl Fn(TrackChangedEvent) + Send + Sync + 'static,
    ) {
        *self.track_callback.lock().unwrap() = Some(Box::new(callback));
    }

    /// Deregister the callback. Called before teardown so no event is
    /// delivered once shutdown has begun.
    pub(crate) fn clear_track_changed_callback(&self) {
        self.track_callback.lock().unwrap().take();
    }

    /// Handle one message from the dispatch loop. Failures while
    /// reporting state are logged and the loop continues.
    pub async fn handle_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Play => {
                self.sink.play();
                self.set_state(PlayState::Playing);
                self.report_state().await;
            }
            ServerMessage::Pause => {
                self.sink.pause();
                self.set_state(PlayState::Paused);
                self.report_state().await;
            }
            ServerMessage::Stop => {
                self.sink.stop();
                self.set_state(PlayState::Stopped);
                self.report_state().await;
            }
            ServerMessage::SetVolume { volume } => {
                self.sink.set_volume(volume);
                self.volume.store(volume, Ordering::Relaxed);
                self.report_state().await;
            }
            ServerMessage::Next | ServerMessage::Previous => {
                // Track selection happens in the service; a TrackChanged
                // notification follows. We only acknowledge our state.
                debug!("Track skip requested");
                self.report_state().await;
            }
            ServerMessage::TrackChanged {
                title,
                album,
                artist,
                artwork_url,
            } => {
                debug!(title = %title, "Track changed");
                let event = TrackChangedEvent {
                    title,
                    album,
                    artist,
                    source_tag: SOURCE_TAG.to_string(),
                    artwork_url,
                };
                if let Some(callback) = self.track_callback.lock().unwrap().as_ref() {
                    callback(event);
                }
            }
            ServerMessage::Ping => {
                trace!("RX: Ping");
            }
            ServerMessage::Welcome { .. } | ServerMessage::AuthFailed { .. } => {
                warn!(msg = ?msg, "Unexpected auth message mid-session");
            }
        }
    }

    fn set_state(&self, state: PlayState) {
        *self.state.lock().unwrap() = state;
    }

    async fn report_state(&self) {
        let state = *self.state.lock().unwrap();
        let volume = self.volume.load(Ordering::Relaxed);
        if let Err(e) = self
            .dispatch
            .send(ClientMessage::StateReport { state, volume })
            .await
        {
            warn!(error = %e, "State report failed");
        }
    }
}
