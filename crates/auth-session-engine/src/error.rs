//! Authentication error taxonomy.
//!
//! Every async failure in this crate is classified into exactly one of these
//! kinds before it reaches the UI; the original provider detail is logged,
//! never surfaced raw.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Client-side validation failed; no network call was made.
    #[error("{0}")]
    Validation(String),

    /// The provider rejected the credentials.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The provider could not be reached, or answered with a server error.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// OAuth callback state token missing, stale, or not matching.
    #[error("OAuth state mismatch")]
    CsrfMismatch,

    /// Another authentication operation is already in flight.
    #[error("Another authentication operation is in progress")]
    Busy,

    /// The operation requires a current session and there is none.
    #[error("Not signed in")]
    NotSignedIn,

    /// Anything else the provider reported.
    #[error("Authentication failed: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Returns true if the operation can be retried as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::NetworkError(_))
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
