//! Message dispatch and reconnection.
//!
//! The [`DispatchManager`] owns the transport-level receive/process loop.
//! A pump task services the connection: incoming messages are queued for
//! the orchestrator's processing loop, outbound messages are accepted
//! from the controller, and transport failures are recovered internally
//! by re-dialing and re-authenticating. After a successful reconnect the
//! registered resubscribe hook is invoked so remote-control state is
//! re-established.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::controller::RemoteControlController;
use crate::credentials::Credential;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::ConnectionSession;
use crate::transport::{Connector, Transport};
use crate::{Error, Result};

/// Reconnect attempts before the pump gives up and closes the queue.
const RECONNECT_MAX_ATTEMPTS: u32 = 5;
/// Delay after the first failed reconnect attempt; doubles per attempt.
const RECONNECT_BASE_DELAY: Duration = Duration::from_millis(500);
/// Cap for the exponential backoff.
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(8);
/// How long `stop()` waits for the pump before aborting it.
const STOP_TIMEOUT: Duration = Duration::from_millis(50);

/// Commands sent from the manager to the pump task.
enum PumpCommand {
    Send(ClientMessage, oneshot::Sender<Result<()>>),
    Stop,
}

/// State shared between the manager handle and the pump task.
struct Shared {
    /// Weak back-reference: the hook must never extend the controller's
    /// lifetime past its session generation.
    resubscribe: Mutex<Option<Weak<RemoteControlController>>>,
}

/// Runs the receive/process loop over an authenticated session.
pub struct DispatchManager {
    cmd_tx: mpsc::Sender<PumpCommand>,
    queue: tokio::sync::Mutex<mpsc::Receiver<ServerMessage>>,
    shared: Arc<Shared>,
    seed: Mutex<Option<Pump>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchManager {
    /// Build a manager over an authenticated session.
    ///
    /// The connector, credential and endpoint pool are kept so the pump
    /// can re-establish the session after a transport failure.
    pub fn new(
        session: ConnectionSession,
        connector: Arc<dyn Connector>,
        credential: Arc<Credential>,
        device_name: String,
        endpoints: Vec<String>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (queue_tx, queue_rx) = mpsc::channel(64);
        let shared = Arc::new(Shared {
            resubscribe: Mutex::new(None),
        });

        let pump = Pump {
            transport: session.into_transport(),
            connector,
            credential,
            device_name,
            endpoints,
            cmd_rx,
            queue_tx,
            shared: Arc::clone(&shared),
        };

        Self {
            cmd_tx,
            queue: tokio::sync::Mutex::new(queue_rx),
            shared,
            seed: Mutex::new(Some(pump)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the pump task. Must be called exactly once.
    pub fn start_loop(&self) {
        let pump = self
            .seed
            .lock()
            .unwrap()
            .take()
            .expect("dispatch loop already started");
        let task = tokio::spawn(pump.run());
        *self.task.lock().unwrap() = Some(task);
    }

    /// Await the next pending message.
    ///
    /// Returns `None` once the pump has stopped - either on request or
    /// after a terminal transport failure.
    pub async fn next_message(&self) -> Option<ServerMessage> {
        self.queue.lock().await.recv().await
    }

    /// Send a message to the service.
    pub async fn send(&self, msg: ClientMessage) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(PumpCommand::Send(msg, reply_tx))
            .await
            .map_err(|_| Error::ConnectionClosed)?;
        reply_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Register the controller to resubscribe after reconnects.
    pub fn set_reconnected_callback(&self, controller: &Arc<RemoteControlController>) {
        *self.shared.resubscribe.lock().unwrap() = Some(Arc::downgrade(controller));
    }

    /// Request loop termination. Bounded: the pump is aborted if it does
    /// not stop within the grace period.
    pub async fn stop(&self) {
        // Bounded send: the command channel may be full while the pump
        // is mid-reconnect, and stop must not wait behind it.
        let _ = tokio::time::timeout(STOP_TIMEOUT, self.cmd_tx.send(PumpCommand::Stop)).await;
        let task = self.task.lock().unwrap().take();
        if let Some(mut task) = task {
            if tokio::time::timeout(STOP_TIMEOUT, &mut task).await.is_err() {
                warn!("Dispatch pump did not stop in time; aborting");
                task.abort();
            }
        }
    }
}

// ============================================================================
// Pump task
// ============================================================================

/// The pump owns the transport and runs in a spawned task.
struct Pump {
    transport: Box<dyn Transport>,
    connector: Arc<dyn Connector>,
    credential: Arc<Credential>,
    device_name: String,
    endpoints: Vec<String>,
    cmd_rx: mpsc::Receiver<PumpCommand>,
    queue_tx: mpsc::Sender<ServerMessage>,
    shared: Arc<Shared>,
}

impl Pump {
    async fn run(mut self) {
        debug!("Dispatch pump starting");

        loop {
            tokio::select! {
                msg = self.transport.recv() => {
                    match msg {
                        Ok(Some(m)) => {
                            if self.queue_tx.send(m).await.is_err() {
                                debug!("Message queue consumer gone");
                                break;
                            }
                        }
                        Ok(None) => {
                            info!("Connection closed by service");
                            if !self.reconnect().await {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "Transport error");
                            if !self.reconnect().await {
                                break;
                            }
                        }
                    }
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(PumpCommand::Send(msg, reply)) => {
                            let result = self.transport.send(&msg).await;
                            let _ = reply.send(result);
                        }
                        Some(PumpCommand::Stop) | None => {
                            let _ = self.transport.close().await;
                            break;
                        }
                    }
                }
            }
        }

        debug!("Dispatch pump stopped");
    }

    /// Re-establish the session, with exponential backoff between
    /// attempts. Returns false once all attempts are exhausted; the pump
    /// then exits and the message queue closes.
    async fn reconnect(&mut self) -> bool {
        let mut delay = RECONNECT_BASE_DELAY;

        for attempt in 1..=RECONNECT_MAX_ATTEMPTS {
            info!(attempt, "Reconnecting");
            match self.establish().await {
                Ok(transport) => {
                    self.transport = transport;
                    info!("Reconnected");
                    self.notify_reconnected();
                    return true;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Reconnect attempt failed");
                }
            }
            // No backoff after the final attempt: the queue closes now.
            if attempt < RECONNECT_MAX_ATTEMPTS {
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(RECONNECT_MAX_DELAY);
            }
        }

        error!(
            attempts = RECONNECT_MAX_ATTEMPTS,
            "Giving up on reconnection"
        );
        false
    }

    async fn establish(&self) -> Result<Box<dyn Transport>> {
        let mut session = ConnectionSession::connect(self.connector.as_ref(), &self.endpoints).await?;
        session
            .authenticate(&self.credential, &self.device_name)
            .await?;
        Ok(session.into_transport())
    }

    /// Resubscribe the controller after a successful reconnect. Failure
    /// is logged, never fatal - the loop keeps running either way.
    fn notify_reconnected(&self) {
        let hook = self.shared.resubscribe.lock().unwrap().clone();
        let Some(weak) = hook else {
            debug!("No resubscribe hook registered");
            return;
        };
        let Some(controller) = weak.upgrade() else {
            debug!("Controller already dropped; skipping resubscribe");
            return;
        };
        // Spawned so the pump is back in its loop to carry the Subscribe
        // message the controller sends through us.
        tokio::spawn(async move {
            if let Err(e) = controller.subscribe().await {
                warn!(error = %e, "Resubscribe after reconnect failed");
            }
        });
    }
}
