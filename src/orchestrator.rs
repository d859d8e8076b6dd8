//! Session lifecycle orchestration.
//!
//! The [`SessionOrchestrator`] is the single authority for starting and
//! stopping the authenticated session, and the only component that
//! mutates [`ModuleStatus`]. Construction order is strict - session,
//! then dispatch manager, then controller - and teardown is the exact
//! reverse. A single orchestration lock serializes the setup and
//! teardown critical sections; the message-processing loop itself runs
//! outside the lock so shutdown requests are never blocked by it.
//!
//! # Example
//!
//! ```ignore
//! use castline::{NullSink, PlayerSettings, SessionOrchestrator, WsConnector};
//!
//! let settings = PlayerSettings::from_options(&options)?;
//! let (orchestrator, mut events) = SessionOrchestrator::new(
//!     settings,
//!     Arc::new(WsConnector),
//!     Arc::new(NullSink),
//! );
//!
//! // The external authenticator delivers credentials as logins happen.
//! orchestrator.credential_ready(credential).await;
//!
//! while let Some(track) = events.recv().await {
//!     println!("Now playing: {} - {}", track.artist, track.title);
//! }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PlayerSettings;
use crate::controller::RemoteControlController;
use crate::credentials::Credential;
use crate::dispatch::DispatchManager;
use crate::session::ConnectionSession;
use crate::sink::AudioSink;
use crate::transport::Connector;
use crate::types::{ModuleStatus, TrackChangedEvent};

/// Pause between teardown steps to let in-flight callbacks drain.
const TEARDOWN_GRACE: Duration = Duration::from_millis(50);
/// Upper bound on waiting for the processing loop to exit.
const LOOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// One session generation's owned objects, torn down together.
struct Generation {
    dispatch: Arc<DispatchManager>,
    controller: Arc<RemoteControlController>,
}

/// Owns the full session lifecycle.
///
/// Cheap to clone-share via the caller's `Arc`; all methods take `&self`.
pub struct SessionOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    settings: PlayerSettings,
    connector: Arc<dyn Connector>,
    sink: Arc<dyn AudioSink>,
    event_tx: mpsc::UnboundedSender<TrackChangedEvent>,

    status: StdMutex<ModuleStatus>,
    /// Orchestration lock: held across setup and teardown, never across
    /// the message loop.
    lifecycle: Mutex<()>,
    /// Stop flag of the current session generation. Each `credential_ready`
    /// installs a fresh flag and hands a clone to its loop task, so a
    /// shutdown cancels exactly the generation it observed: a stale task
    /// that was never polled cannot be revived by a later start. Written
    /// with Release, read with Acquire, so the loop observes a stop
    /// within one iteration.
    running: StdMutex<Arc<AtomicBool>>,
    stop_notify: Notify,

    credential: StdMutex<Option<Arc<Credential>>>,
    generation: StdMutex<Option<Generation>>,
    loop_task: StdMutex<Option<JoinHandle<()>>>,
}

impl SessionOrchestrator {
    /// Build an orchestrator. Returns it along with the receiver for
    /// track-changed events (the event-bus side).
    pub fn new(
        settings: PlayerSettings,
        connector: Arc<dyn Connector>,
        sink: Arc<dyn AudioSink>,
    ) -> (Self, mpsc::UnboundedReceiver<TrackChangedEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: Arc::new(Inner {
                    settings,
                    connector,
                    sink,
                    event_tx,
                    status: StdMutex::new(ModuleStatus::Stopped),
                    lifecycle: Mutex::new(()),
                    running: StdMutex::new(Arc::new(AtomicBool::new(false))),
                    stop_notify: Notify::new(),
                    credential: StdMutex::new(None),
                    generation: StdMutex::new(None),
                    loop_task: StdMutex::new(None),
                }),
            },
            event_rx,
        )
    }

    /// Current lifecycle status.
    pub fn status(&self) -> ModuleStatus {
        *self.inner.status.lock().unwrap()
    }

    /// Invoked by the external authenticator once per login event.
    ///
    /// If a session is already active it is fully shut down first, so at
    /// most one session exists even when a new credential arrives
    /// mid-session. Reentrant-safe from the caller's context.
    pub async fn credential_ready(&self, credential: Credential) {
        if matches!(
            self.status(),
            ModuleStatus::Running | ModuleStatus::ShuttingDown
        ) {
            info!("Credential arrived while a session is active; shutting down first");
            self.shutdown().await;
        }

        info!(identity = %credential.identity, "Credential ready");
        *self.inner.credential.lock().unwrap() = Some(Arc::new(credential));

        let running = Arc::new(AtomicBool::new(true));
        let inner = Arc::clone(&self.inner);
        let flag = Arc::clone(&running);
        let task = tokio::spawn(async move { inner.run(flag).await });

        // Status, stop flag and task handle are installed together under
        // the status lock; shutdown captures them under the same lock.
        let mut status = self.inner.status.lock().unwrap();
        *status = ModuleStatus::Running;
        *self.inner.running.lock().unwrap() = running;
        *self.inner.loop_task.lock().unwrap() = Some(task);
    }

    /// Tear down the active session, if any.
    ///
    /// Idempotent: a no-op when the status is `Stopped`, `Shutdown` or
    /// `Failed`. Never returns before the processing loop has exited and
    /// session, dispatch manager and controller are all released, so a
    /// new session may be started immediately afterwards.
    pub async fn shutdown(&self) {
        // Capture the generation being stopped in the same critical
        // section as the status transition, so this call can only ever
        // cancel the session it actually observed.
        let (stopping, task) = {
            let mut status = self.inner.status.lock().unwrap();
            match *status {
                ModuleStatus::Running => *status = ModuleStatus::ShuttingDown,
                // Another caller is tearing down; wait on the lock below
                // so this call also returns only once teardown is done.
                ModuleStatus::ShuttingDown => {}
                ModuleStatus::Stopped | ModuleStatus::Shutdown | ModuleStatus::Failed => {
                    debug!(status = ?*status, "Shutdown requested with no active session");
                    return;
                }
            }
            (
                Arc::clone(&*self.inner.running.lock().unwrap()),
                self.inner.loop_task.lock().unwrap().take(),
            )
        };

        stopping.store(false, Ordering::Release);
        self.inner.stop_notify.notify_waiters();

        let owns_teardown = {
            let _guard = self.inner.lifecycle.lock().await;

            // A newer generation may have been installed while this
            // caller waited on the lock; that one is not ours to touch.
            let current = Arc::ptr_eq(&stopping, &*self.inner.running.lock().unwrap());
            if current {
                let generation = self.inner.generation.lock().unwrap().take();
                if let Some(generation) = generation {
                    // Deregister the callback first: no track event may
                    // reach the bus once teardown has begun.
                    generation.controller.clear_track_changed_callback();
                    generation.controller.stop_player().await;
                    generation.dispatch.stop().await;
                    tokio::time::sleep(TEARDOWN_GRACE).await;
                    drop(generation);
                    tokio::time::sleep(TEARDOWN_GRACE).await;
                }
            }
            current
        };

        // Join outside the lock: a canceled task that never reached its
        // setup section is blocked on that very lock and exits as soon
        // as it acquires it.
        if let Some(task) = task {
            if tokio::time::timeout(LOOP_JOIN_TIMEOUT, task).await.is_err() {
                warn!("Processing loop did not exit within the join timeout");
            }
        }

        if owns_teardown {
            let mut status = self.inner.status.lock().unwrap();
            if *status == ModuleStatus::ShuttingDown {
                *status = ModuleStatus::Shutdown;
            }
        }
        info!("Session shut down");
    }

    /// Lifecycle hook for the host runtime: settings changed, so any
    /// active session must be restarted by the caller.
    pub async fn configuration_updated(&self) {
        info!("Configuration updated");
        self.shutdown().await;
    }
}

impl Inner {
    /// Mark this session attempt failed, unless a shutdown already took
    /// over the status.
    fn fail(&self) {
        let mut status = self.status.lock().unwrap();
        if *status == ModuleStatus::Running {
            *status = ModuleStatus::Failed;
        }
    }

    /// Processing-loop body; runs on its own task per session generation.
    /// `running` is this generation's stop flag, distinct per attempt.
    async fn run(self: Arc<Self>, running: Arc<AtomicBool>) {
        let credential = self.credential.lock().unwrap().clone();
        let Some(credential) = credential else {
            error!("Loop started without a credential");
            self.fail();
            return;
        };

        // Setup critical section.
        let (dispatch, controller) = {
            let _guard = self.lifecycle.lock().await;

            // A shutdown may have won the lock before this task got to
            // run; the stop flag is already down in that case and this
            // session attempt is abandoned before any network I/O.
            if !running.load(Ordering::Acquire) {
                debug!("Session attempt canceled before setup");
                return;
            }

            let mut session =
                match ConnectionSession::connect(self.connector.as_ref(), &self.settings.endpoints)
                    .await
                {
                    Ok(session) => session,
                    Err(e) => {
                        error!(error = %e, "Connection setup failed");
                        self.fail();
                        return;
                    }
                };
            info!(endpoint = %session.endpoint(), "Got session");

            let token = match session
                .authenticate(&credential, &self.settings.device_name)
                .await
            {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "Authentication failed; session not started");
                    self.fail();
                    return;
                }
            };
            debug!(token_len = token.len(), "Auth complete");

            let dispatch = Arc::new(DispatchManager::new(
                session,
                Arc::clone(&self.connector),
                Arc::clone(&credential),
                self.settings.device_name.clone(),
                self.settings.endpoints.clone(),
            ));
            dispatch.start_loop();

            let controller = Arc::new(RemoteControlController::new(
                Arc::clone(&dispatch),
                Arc::clone(&self.sink),
                self.settings.device_name.clone(),
                self.settings.volume,
            ));

            let event_tx = self.event_tx.clone();
            controller.set_track_changed_callback(move |event| {
                // Fire-and-forget post to the event bus; never blocks the
                // dispatch context.
                let _ = event_tx.send(event);
            });
            dispatch.set_reconnected_callback(&controller);

            if let Err(e) = controller.subscribe().await {
                warn!(error = %e, "Initial subscribe failed");
            }

            *self.generation.lock().unwrap() = Some(Generation {
                dispatch: Arc::clone(&dispatch),
                controller: Arc::clone(&controller),
            });

            (dispatch, controller)
        };

        info!("Session active");

        // Cooperative processing loop: block until the next message or a
        // stop signal, no lock held.
        while running.load(Ordering::Acquire) {
            tokio::select! {
                _ = self.stop_notify.notified() => {}
                msg = dispatch.next_message() => {
                    match msg {
                        Some(msg) => controller.handle_message(msg).await,
                        None => {
                            // Terminal transport failure: the session is
                            // stalled until an explicit shutdown/restart.
                            warn!("Dispatch queue closed; awaiting restart");
                            break;
                        }
                    }
                }
            }
        }

        debug!("Processing loop exited");
    }
}
