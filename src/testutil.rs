//! In-memory transport fakes for lifecycle tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{Connector, Transport};
use crate::{Error, Result};

/// What a fake service does when the client authenticates.
#[derive(Debug, Clone)]
pub enum AuthBehavior {
    /// Reply with `Welcome` carrying this token.
    Accept(Vec<u8>),
    /// Reply with `AuthFailed`.
    Reject(String),
    /// Reply with `Welcome` and an empty token.
    EmptyToken,
}

/// Events a test can inject into a [`FakeTransport`]'s receive side.
#[derive(Debug)]
pub enum FakeEvent {
    Message(ServerMessage),
    Error(String),
    Closed,
}

/// Test-side handle to one fake connection.
pub struct FakeService {
    /// Inject service-to-renderer traffic.
    pub tx: mpsc::UnboundedSender<FakeEvent>,
    /// Observe renderer-to-service traffic.
    pub sent: mpsc::UnboundedReceiver<ClientMessage>,
}

impl FakeService {
    /// Receive the next message the renderer sent, panicking on closure.
    pub async fn expect_sent(&mut self) -> ClientMessage {
        self.sent.recv().await.expect("renderer side closed")
    }
}

/// Transport half of a fake connection. Auth replies are scripted so
/// tests do not have to drive the handshake concurrently.
pub struct FakeTransport {
    auth: AuthBehavior,
    incoming: mpsc::UnboundedReceiver<FakeEvent>,
    incoming_tx: mpsc::UnboundedSender<FakeEvent>,
    sent: mpsc::UnboundedSender<ClientMessage>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn recv(&mut self) -> Result<Option<ServerMessage>> {
        match self.incoming.recv().await {
            Some(FakeEvent::Message(m)) => Ok(Some(m)),
            Some(FakeEvent::Error(e)) => Err(Error::Transport(e)),
            Some(FakeEvent::Closed) | None => Ok(None),
        }
    }

    async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        if self.sent.send(msg.clone()).is_err() {
            return Err(Error::ConnectionClosed);
        }
        if matches!(msg, ClientMessage::Authenticate { .. }) {
            let reply = match &self.auth {
                AuthBehavior::Accept(token) => ServerMessage::Welcome {
                    reusable_token: token.clone(),
                },
                AuthBehavior::EmptyToken => ServerMessage::Welcome {
                    reusable_token: Vec::new(),
                },
                AuthBehavior::Reject(reason) => ServerMessage::AuthFailed {
                    reason: reason.clone(),
                },
            };
            let _ = self.incoming_tx.send(FakeEvent::Message(reply));
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.incoming.close();
        Ok(())
    }
}

/// Build one fake connection pair.
pub fn fake_connection(auth: AuthBehavior) -> (FakeTransport, FakeService) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    (
        FakeTransport {
            auth,
            incoming: incoming_rx,
            incoming_tx: incoming_tx.clone(),
            sent: sent_tx,
        },
        FakeService {
            tx: incoming_tx,
            sent: sent_rx,
        },
    )
}

/// Connector producing one scripted [`FakeTransport`] per dial.
///
/// Service handles for each accepted connection are queued for the test
/// to pick up with [`next_service`](FakeConnector::next_service).
pub struct FakeConnector {
    auth: AuthBehavior,
    services: Arc<Mutex<VecDeque<FakeService>>>,
    /// When true, every dial fails outright.
    pub refuse_dials: Arc<Mutex<bool>>,
}

impl FakeConnector {
    pub fn new(auth: AuthBehavior) -> Arc<Self> {
        Arc::new(Self {
            auth,
            services: Arc::new(Mutex::new(VecDeque::new())),
            refuse_dials: Arc::new(Mutex::new(false)),
        })
    }

    /// Number of dials accepted so far that are still unclaimed by the test.
    pub fn pending_services(&self) -> usize {
        self.services.lock().unwrap().len()
    }

    /// Wait until the next connection is made, then return its handle.
    pub async fn next_service(&self) -> FakeService {
        loop {
            if let Some(service) = self.services.lock().unwrap().pop_front() {
                return service;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn dial(&self, _endpoint: &str) -> Result<Box<dyn Transport>> {
        if *self.refuse_dials.lock().unwrap() {
            return Err(Error::Transport("connection refused".to_string()));
        }
        let (transport, service) = fake_connection(self.auth.clone());
        self.services.lock().unwrap().push_back(service);
        Ok(Box::new(transport))
    }
}
