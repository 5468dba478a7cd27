//! Current-session state: identity, token pair, and the store that holds
//! at most one of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// The authenticated principal returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider-side user metadata (registration name, phone, ...).
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// A token pair plus expiry, bound to one identity.
///
/// Exactly one session may be current at a time; it lives in memory only and
/// dies with the process.
#[derive(Clone, PartialEq)]
pub struct Session {
    pub identity: Identity,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// True once the access token's expiry timestamp has passed.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// Tokens never appear in logs or debug output.
impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// What kind of session change a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Session-change notification fanned out to listeners.
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    /// The now-current session; `None` for SignedOut.
    pub session: Option<Session>,
}

impl AuthEvent {
    pub fn signed_in(session: Session) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            session: None,
        }
    }

    pub fn token_refreshed(session: Session) -> Self {
        Self {
            kind: AuthEventKind::TokenRefreshed,
            session: Some(session),
        }
    }
}

/// Holds the single current session with atomic replace/clear.
///
/// Constructed once by the composition root and shared by handle; there is
/// no ambient global.
#[derive(Debug, Default)]
pub struct SessionStore {
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current session, if any.
    pub fn current(&self) -> Option<Session> {
        self.current.lock().expect("lock poisoned").clone()
    }

    /// Atomically make `session` the current one.
    pub fn replace(&self, session: Session) {
        *self.current.lock().expect("lock poisoned") = Some(session);
    }

    /// Atomically drop the current session. Returns true if one was present.
    pub fn clear(&self) -> bool {
        self.current.lock().expect("lock poisoned").take().is_some()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.lock().expect("lock poisoned").is_some()
    }

    /// Access token of the current session, if any.
    pub fn access_token(&self) -> Option<String> {
        self.current
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|s| s.access_token.clone())
    }

    /// Identity of the current session, if any.
    pub fn identity(&self) -> Option<Identity> {
        self.current
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .map(|s| s.identity.clone())
    }
}
