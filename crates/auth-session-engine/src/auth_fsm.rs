//! Authentication state machine using rust-fsm.
//!
//! Every gateway operation consumes a transition up front, which is what
//! makes the single-flight policy explicit: a second operation arriving while
//! one is in flight finds no legal transition and is rejected with `Busy`
//! instead of interleaving partial states.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │    SignedOut    │ (initial)
//! └────────┬────────┘
//!          │ SignInAttempt / SignUpAttempt / OAuthStart
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ SigningIn /     │     │ AwaitingCallback│
//! │ SigningUp       │     └────────┬────────┘
//! └────────┬────────┘              │ CallbackReceived
//!          │ Succeeded             ▼
//!          │              ┌─────────────────┐
//!          │              │ ExchangingCode  │
//!          │              └────────┬────────┘
//!          │                       │ Succeeded
//!          ▼                       ▼
//! ┌──────────────────────────────────────────┐
//! │                 SignedIn                 │
//! └───────┬──────────────────────┬───────────┘
//!         │ RefreshAttempt       │ SignOutRequest
//!         ▼                      ▼
//! ┌─────────────────┐   ┌─────────────────┐
//! │   Refreshing    │   │   SigningOut    │
//! └─────────────────┘   └────────┬────────┘
//!   Succeeded/Abandoned          │ Cleared
//!   back to SignedIn,            ▼
//!   Failed to SignedOut      SignedOut
//! ```
//!
//! `Failed` always lands in SignedOut; `Abandoned` aborts the in-flight
//! attempt while an earlier session stays current, landing back in SignedIn.

use rust_fsm::*;
use std::time::Duration;

// Define the FSM using rust-fsm's declarative macro
// This generates a module `auth_machine` with:
// - auth_machine::State (enum)
// - auth_machine::Input (enum)
// - auth_machine::StateMachine (type alias)
// - auth_machine::Impl (trait impl)
state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(SignedOut)

    SignedOut => {
        SignInAttempt => SigningIn,
        SignUpAttempt => SigningUp,
        OAuthStart => AwaitingCallback
    },
    SigningIn => {
        Succeeded => SignedIn,
        Failed => SignedOut,
        Abandoned => SignedIn
    },
    SigningUp => {
        Succeeded => SignedIn,
        // Account created but the provider wants email confirmation first
        ConfirmationRequired => SignedOut,
        Failed => SignedOut,
        Abandoned => SignedIn
    },
    AwaitingCallback => {
        CallbackReceived => ExchangingCode,
        // The user may abandon the browser flow and start over
        OAuthStart => AwaitingCallback,
        SignInAttempt => SigningIn,
        SignUpAttempt => SigningUp,
        SignOutRequest => SigningOut,
        Failed => SignedOut,
        Abandoned => SignedIn
    },
    ExchangingCode => {
        Succeeded => SignedIn,
        Failed => SignedOut,
        Abandoned => SignedIn
    },
    SignedIn => {
        SignOutRequest => SigningOut,
        RefreshAttempt => Refreshing,
        // Re-authentication replaces the current session
        SignInAttempt => SigningIn,
        SignUpAttempt => SigningUp,
        OAuthStart => AwaitingCallback
    },
    Refreshing => {
        Succeeded => SignedIn,
        RetryDue => Refreshing,
        // Transient failures exhausted; the old session stays current
        Abandoned => SignedIn,
        Failed => SignedOut
    },
    SigningOut => {
        Cleared => SignedOut
    }
}

// Re-export the generated types with clearer names
pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Simplified view of the machine state for status displays and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SigningIn,
    SigningUp,
    AwaitingCallback,
    ExchangingCode,
    SignedIn,
    Refreshing,
    SigningOut,
}

impl AuthState {
    /// Returns true if the user has a current session (SignedIn state only).
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }

    /// Returns true if an operation is in flight.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AuthState::SigningIn
                | AuthState::SigningUp
                | AuthState::AwaitingCallback
                | AuthState::ExchangingCode
                | AuthState::Refreshing
                | AuthState::SigningOut
        )
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::SignedOut => AuthState::SignedOut,
            AuthMachineState::SigningIn => AuthState::SigningIn,
            AuthMachineState::SigningUp => AuthState::SigningUp,
            AuthMachineState::AwaitingCallback => AuthState::AwaitingCallback,
            AuthMachineState::ExchangingCode => AuthState::ExchangingCode,
            AuthMachineState::SignedIn => AuthState::SignedIn,
            AuthMachineState::Refreshing => AuthState::Refreshing,
            AuthMachineState::SigningOut => AuthState::SigningOut,
        }
    }
}

/// Configuration for retry behavior during token refresh.
#[derive(Debug, Clone)]
pub struct RefreshConfig {
    /// Maximum number of attempts.
    pub max_retries: u32,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl RefreshConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms.saturating_mul(2u64.pow(attempt));
        let capped_ms = delay_ms.min(self.max_delay_ms);
        Duration::from_millis(capped_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_signed_out() {
        let machine = AuthMachine::new();
        assert_eq!(*machine.state(), AuthMachineState::SignedOut);
    }

    #[test]
    fn test_password_sign_in_flow() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SigningIn);

        machine.consume(&AuthMachineInput::Succeeded).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedIn);
    }

    #[test]
    fn test_sign_in_failure_returns_to_signed_out() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::Failed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedOut);
    }

    #[test]
    fn test_sign_up_confirmation_required_lands_signed_out() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignUpAttempt).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SigningUp);

        machine
            .consume(&AuthMachineInput::ConfirmationRequired)
            .unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedOut);
    }

    #[test]
    fn test_oauth_flow() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::OAuthStart).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::AwaitingCallback);

        machine
            .consume(&AuthMachineInput::CallbackReceived)
            .unwrap();
        assert_eq!(*machine.state(), AuthMachineState::ExchangingCode);

        machine.consume(&AuthMachineInput::Succeeded).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedIn);
    }

    #[test]
    fn test_oauth_can_be_restarted_while_awaiting_callback() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::OAuthStart).unwrap();
        machine.consume(&AuthMachineInput::OAuthStart).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::AwaitingCallback);

        // The user may also give up on the browser and use a password instead
        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SigningIn);
    }

    #[test]
    fn test_overlapping_operations_are_rejected() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SigningIn);

        // A second operation cannot start while one is in flight
        let result = machine.consume(&AuthMachineInput::SignInAttempt);
        assert!(result.is_err());
        let result = machine.consume(&AuthMachineInput::OAuthStart);
        assert!(result.is_err());
        assert_eq!(*machine.state(), AuthMachineState::SigningIn);
    }

    #[test]
    fn test_failed_oauth_with_prior_session_returns_to_signed_in() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::Succeeded).unwrap();

        // Re-authentication attempt fails; the earlier session is untouched
        machine.consume(&AuthMachineInput::OAuthStart).unwrap();
        machine.consume(&AuthMachineInput::Abandoned).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedIn);
    }

    #[test]
    fn test_refresh_retry_stays_in_refreshing() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::Succeeded).unwrap();
        machine.consume(&AuthMachineInput::RefreshAttempt).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Refreshing);

        machine.consume(&AuthMachineInput::RetryDue).unwrap();
        machine.consume(&AuthMachineInput::RetryDue).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::Refreshing);

        machine.consume(&AuthMachineInput::Succeeded).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedIn);
    }

    #[test]
    fn test_refresh_abandoned_keeps_signed_in() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::Succeeded).unwrap();
        machine.consume(&AuthMachineInput::RefreshAttempt).unwrap();

        machine.consume(&AuthMachineInput::Abandoned).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedIn);
    }

    #[test]
    fn test_refresh_permanent_failure_signs_out() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::Succeeded).unwrap();
        machine.consume(&AuthMachineInput::RefreshAttempt).unwrap();

        machine.consume(&AuthMachineInput::Failed).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedOut);
    }

    #[test]
    fn test_sign_out_flow() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::SignInAttempt).unwrap();
        machine.consume(&AuthMachineInput::Succeeded).unwrap();

        machine.consume(&AuthMachineInput::SignOutRequest).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SigningOut);

        machine.consume(&AuthMachineInput::Cleared).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedOut);
    }

    #[test]
    fn test_sign_out_while_awaiting_callback_cancels_the_attempt() {
        let mut machine = AuthMachine::new();

        machine.consume(&AuthMachineInput::OAuthStart).unwrap();
        machine.consume(&AuthMachineInput::SignOutRequest).unwrap();
        machine.consume(&AuthMachineInput::Cleared).unwrap();
        assert_eq!(*machine.state(), AuthMachineState::SignedOut);
    }

    #[test]
    fn test_invalid_transition_returns_error() {
        let mut machine = AuthMachine::new();

        // Cannot sign out or refresh before signing in
        assert!(machine.consume(&AuthMachineInput::SignOutRequest).is_err());
        assert!(machine.consume(&AuthMachineInput::RefreshAttempt).is_err());
        assert!(machine.consume(&AuthMachineInput::Succeeded).is_err());
    }

    #[test]
    fn test_auth_state_conversion() {
        assert_eq!(
            AuthState::from(&AuthMachineState::SignedOut),
            AuthState::SignedOut
        );
        assert_eq!(
            AuthState::from(&AuthMachineState::AwaitingCallback),
            AuthState::AwaitingCallback
        );
        assert_eq!(
            AuthState::from(&AuthMachineState::SignedIn),
            AuthState::SignedIn
        );
        assert_eq!(
            AuthState::from(&AuthMachineState::Refreshing),
            AuthState::Refreshing
        );
    }

    #[test]
    fn test_auth_state_predicates() {
        assert!(AuthState::SignedIn.is_authenticated());
        assert!(!AuthState::SignedOut.is_authenticated());
        assert!(!AuthState::Refreshing.is_authenticated());

        assert!(AuthState::SigningIn.is_transient());
        assert!(AuthState::AwaitingCallback.is_transient());
        assert!(!AuthState::SignedOut.is_transient());
        assert!(!AuthState::SignedIn.is_transient());
    }

    #[test]
    fn test_refresh_config_default() {
        let config = RefreshConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 5000);
    }

    #[test]
    fn test_refresh_config_delay_exponential_backoff() {
        let config = RefreshConfig::default();

        // Attempt 0: 500ms
        assert_eq!(config.delay_for_attempt(0), Duration::from_millis(500));

        // Attempt 1: 1000ms
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(1000));

        // Attempt 2: 2000ms
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(2000));

        // Attempt 3: 4000ms
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(4000));

        // Attempt 4: 5000ms (capped)
        assert_eq!(config.delay_for_attempt(4), Duration::from_millis(5000));
    }
}
