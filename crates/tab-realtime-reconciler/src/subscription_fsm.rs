//! Subscription lifecycle state machine using rust-fsm.
//!
//! The reconciler's worker drives this machine from the stream signals it
//! receives; the machine is what keeps reconnection handling honest (a retry
//! can only follow a loss, degraded mode can only follow exhaustion, and
//! cancellation is legal from anywhere).

use rust_fsm::*;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub subscription_machine(Disconnected)

    Disconnected => {
        Subscribe => Subscribing
    },
    Subscribing => {
        Established => Subscribed,
        Lost => WaitingRetry,
        Cancel => Disconnected
    },
    Subscribed => {
        Lost => WaitingRetry,
        Cancel => Disconnected
    },
    WaitingRetry => {
        RetryDue => Subscribing,
        Exhausted => Degraded,
        Cancel => Disconnected
    },
    Degraded => {
        Cancel => Disconnected
    }
}

pub use subscription_machine::Input as SubscriptionInput;
pub use subscription_machine::State as SubscriptionMachineState;
pub use subscription_machine::StateMachine as SubscriptionMachine;

/// Connection status surfaced to status listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealtimeStatus {
    Disconnected,
    Subscribing,
    /// Live: events are flowing.
    Subscribed,
    /// The stream was lost; a reconnect is pending.
    Reconnecting,
    /// Reconnection retries were exhausted. The last known collection stays
    /// on screen but no further updates arrive.
    Degraded,
}

impl RealtimeStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, RealtimeStatus::Subscribed)
    }
}

impl From<&SubscriptionMachineState> for RealtimeStatus {
    fn from(state: &SubscriptionMachineState) -> Self {
        match state {
            SubscriptionMachineState::Disconnected => RealtimeStatus::Disconnected,
            SubscriptionMachineState::Subscribing => RealtimeStatus::Subscribing,
            SubscriptionMachineState::Subscribed => RealtimeStatus::Subscribed,
            SubscriptionMachineState::WaitingRetry => RealtimeStatus::Reconnecting,
            SubscriptionMachineState::Degraded => RealtimeStatus::Degraded,
        }
    }
}
