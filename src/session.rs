//! Authenticated session establishment.
//!
//! A [`ConnectionSession`] owns one live transport connection. It is
//! created by dialing a random access point and then authenticating with
//! a [`Credential`]; the dispatch manager takes the transport over once
//! authentication succeeds.

use rand::seq::SliceRandom;
use tracing::debug;

use crate::credentials::Credential;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{Connector, Transport};
use crate::{Error, Result};

/// Default service access points. One is picked at random per connect so
/// load spreads across the pool.
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "wss://ap1.castline.net/session",
    "wss://ap2.castline.net/session",
    "wss://ap3.castline.net/session",
];

/// Reusable token returned by a successful authentication.
pub type AuthToken = Vec<u8>;

/// One live, authenticated (or about-to-be-authenticated) connection.
pub struct ConnectionSession {
    transport: Box<dyn Transport>,
    endpoint: String,
}

impl ConnectionSession {
    /// Dial a random endpoint from the pool.
    pub async fn connect(connector: &dyn Connector, endpoints: &[String]) -> Result<Self> {
        let endpoint = endpoints
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| Error::Config("no access-point endpoints configured".to_string()))?;

        debug!(endpoint = %endpoint, "Connecting to access point");
        let transport = connector.dial(endpoint).await?;

        Ok(Self {
            transport,
            endpoint: endpoint.clone(),
        })
    }

    /// Authenticate this session with the given credential.
    ///
    /// Returns the reusable token issued by the service. An empty or
    /// rejected token is an [`Error::Auth`]; the caller must not build a
    /// dispatch manager on top of an unauthenticated session.
    pub async fn authenticate(
        &mut self,
        credential: &Credential,
        device_name: &str,
    ) -> Result<AuthToken> {
        debug!(
            identity = %credential.identity,
            bitrate = credential.format.bitrate(),
            "Authenticating"
        );
        self.transport
            .send(&ClientMessage::Authenticate {
                identity: credential.identity.clone(),
                token: credential.auth_token.clone(),
                format: credential.format,
                device_name: device_name.to_string(),
            })
            .await?;

        match self.transport.recv().await? {
            Some(ServerMessage::Welcome { reusable_token }) => {
                if reusable_token.is_empty() {
                    return Err(Error::Auth("service returned an empty token".to_string()));
                }
                debug!(
                    identity = %credential.identity,
                    token_len = reusable_token.len(),
                    "Authenticated"
                );
                Ok(reusable_token)
            }
            Some(ServerMessage::AuthFailed { reason }) => Err(Error::Auth(reason)),
            Some(other) => Err(Error::Protocol(format!(
                "unexpected reply to Authenticate: {other:?}"
            ))),
            None => Err(Error::ConnectionClosed),
        }
    }

    /// Endpoint this session is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Hand the underlying transport over to the dispatch manager.
    pub(crate) fn into_transport(self) -> Box<dyn Transport> {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{AuthBehavior, FakeConnector};
    use crate::types::AudioFormat;

    fn endpoints() -> Vec<String> {
        vec!["wss://ap.test/session".to_string()]
    }

    fn credential() -> Credential {
        Credential::new("alice", vec![9, 9, 9], AudioFormat::High)
    }

    #[tokio::test]
    async fn authenticate_returns_reusable_token() {
        let connector = FakeConnector::new(AuthBehavior::Accept(vec![1, 2, 3]));
        let mut session = ConnectionSession::connect(connector.as_ref(), &endpoints())
            .await
            .unwrap();

        let token = session.authenticate(&credential(), "Kitchen").await.unwrap();
        assert_eq!(token, vec![1, 2, 3]);

        let mut service = connector.next_service().await;
        match service.expect_sent().await {
            ClientMessage::Authenticate { identity, format, .. } => {
                assert_eq!(identity, "alice");
                assert_eq!(format, AudioFormat::High);
            }
            other => panic!("expected Authenticate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_token_is_an_auth_error() {
        let connector = FakeConnector::new(AuthBehavior::EmptyToken);
        let mut session = ConnectionSession::connect(connector.as_ref(), &endpoints())
            .await
            .unwrap();

        let err = session.authenticate(&credential(), "Kitchen").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn rejected_authentication_is_an_auth_error() {
        let connector = FakeConnector::new(AuthBehavior::Reject("bad token".to_string()));
        let mut session = ConnectionSession::connect(connector.as_ref(), &endpoints())
            .await
            .unwrap();

        let err = session.authenticate(&credential(), "Kitchen").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_no_endpoints() {
        let connector = FakeConnector::new(AuthBehavior::Accept(vec![1]));
        let result = ConnectionSession::connect(connector.as_ref(), &[]).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
