//! Client-side credential rules.
//!
//! Validation runs synchronously before any provider call is issued, so bad
//! input never costs a network round trip.

use crate::{AuthError, AuthResult};
use regex::Regex;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Standard `local@domain.tld` email shape.
const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$";

/// Field rules applied before submission.
pub struct CredentialRules {
    email_pattern: Regex,
}

impl Default for CredentialRules {
    fn default() -> Self {
        Self {
            email_pattern: Regex::new(EMAIL_PATTERN).unwrap(),
        }
    }
}

impl CredentialRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every named field must be non-empty before submission is attempted.
    pub fn require_all(&self, fields: &[(&str, &str)]) -> AuthResult<()> {
        if fields.iter().any(|(_, value)| value.trim().is_empty()) {
            return Err(AuthError::Validation(
                "Please fill in all fields".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_email(&self, email: &str) -> AuthResult<()> {
        if !self.email_pattern.is_match(email) {
            return Err(AuthError::Validation(
                "Please enter a valid email address".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_password(&self, password: &str) -> AuthResult<()> {
        if password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {MIN_PASSWORD_LENGTH} characters"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CredentialRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRules").finish_non_exhaustive()
    }
}
