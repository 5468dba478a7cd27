//! Single-use state tokens for the OAuth deep-link callback.
//!
//! `issue_state` mints an unguessable token that travels to the provider in
//! the authorize URL and comes back on the `login-callback` deep link. Any
//! validation attempt consumes the pending token, match or not, so a replayed
//! or forged callback can never be validated twice.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{AuthError, AuthResult};

/// Number of random bytes in a state token (128 bits).
const STATE_TOKEN_BYTES: usize = 16;

/// How long an issued state token stays valid.
const DEFAULT_STATE_TTL: Duration = Duration::from_secs(600);

#[derive(Debug)]
struct PendingState {
    token: String,
    issued_at: Instant,
}

/// Guards the OAuth deep-link callback against cross-site request forgery.
///
/// Holds at most one pending state token. Issuing a new one replaces any
/// previous token, so only the most recent authorization attempt can
/// complete.
#[derive(Debug)]
pub struct DeepLinkCsrfGuard {
    pending: Mutex<Option<PendingState>>,
    ttl: Duration,
}

impl Default for DeepLinkCsrfGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl DeepLinkCsrfGuard {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_STATE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            pending: Mutex::new(None),
            ttl,
        }
    }

    /// Mint a fresh state token, replacing any previously issued one.
    pub fn issue_state(&self) -> String {
        let mut bytes = [0u8; STATE_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = URL_SAFE_NO_PAD.encode(bytes);

        let mut pending = self.pending.lock().expect("lock poisoned");
        *pending = Some(PendingState {
            token: token.clone(),
            issued_at: Instant::now(),
        });
        token
    }

    /// Validate the state parameter carried by a callback.
    ///
    /// The pending token is consumed no matter what: a mismatch, a missing
    /// parameter, or an expired token all clear it, so the next validation
    /// starts from nothing.
    pub fn validate(&self, presented: Option<&str>) -> AuthResult<()> {
        let taken = self.pending.lock().expect("lock poisoned").take();

        let Some(pending) = taken else {
            debug!("oauth callback arrived with no state token pending");
            return Err(AuthError::CsrfMismatch);
        };
        let Some(presented) = presented else {
            debug!("oauth callback is missing the state parameter");
            return Err(AuthError::CsrfMismatch);
        };
        if pending.issued_at.elapsed() >= self.ttl {
            debug!("oauth state token expired before the callback arrived");
            return Err(AuthError::CsrfMismatch);
        }
        if pending.token != presented {
            debug!("oauth state token does not match the callback");
            return Err(AuthError::CsrfMismatch);
        }
        Ok(())
    }

    /// Drop any pending state token without validating it.
    pub fn clear(&self) {
        self.pending.lock().expect("lock poisoned").take();
    }

    /// Returns true if a state token has been issued and not yet consumed.
    pub fn has_pending(&self) -> bool {
        self.pending.lock().expect("lock poisoned").is_some()
    }
}
