//! Authentication credentials.
//!
//! A [`Credential`] is produced externally - typically by a zeroconf
//! login handoff from the official app - and handed to the orchestrator
//! via [`credential_ready`](crate::SessionOrchestrator::credential_ready).
//! It is immutable once produced and safe to share across tasks.

use std::fmt;

use crate::types::AudioFormat;

/// An opaque authentication artifact plus the chosen audio quality.
#[derive(Clone)]
pub struct Credential {
    /// Account identity (username or canonical user id).
    pub identity: String,
    /// Opaque authentication token obtained from the login flow.
    pub auth_token: Vec<u8>,
    /// Audio quality tier to request for sessions opened with this credential.
    pub format: AudioFormat,
}

impl Credential {
    pub fn new(identity: impl Into<String>, auth_token: Vec<u8>, format: AudioFormat) -> Self {
        Self {
            identity: identity.into(),
            auth_token,
            format,
        }
    }
}

// Manual Debug so token bytes never end up in logs.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("identity", &self.identity)
            .field("auth_token", &format_args!("[{} bytes]", self.auth_token.len()))
            .field("format", &self.format)
            .finish()
    }
}
