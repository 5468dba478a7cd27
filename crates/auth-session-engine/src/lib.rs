//! Authentication engine: the session store, the auth state machine, and the
//! gateway that drives every sign-in, sign-up, OAuth, refresh, and sign-out
//! flow against an identity provider.
//!
//! The crate is UI-toolkit agnostic. All session-change notifications are
//! marshaled through the `ui-event-dispatch` work queue, so an embedding UI
//! observes them on its own loop.

mod auth_fsm;
mod csrf;
mod error;
mod gateway;
mod pkce;
mod provider;
mod session;
mod validation;

pub use auth_fsm::{AuthState, RefreshConfig};
pub use csrf::DeepLinkCsrfGuard;
pub use error::{AuthError, AuthResult};
pub use gateway::{AuthGateway, SignUpResult};
pub use pkce::{challenge_for, PkcePair};
pub use provider::{IdentityProvider, SignUpOutcome, SupabaseAuthProvider};
pub use session::{AuthEvent, AuthEventKind, Identity, Session, SessionStore};
pub use validation::{CredentialRules, MIN_PASSWORD_LENGTH};
