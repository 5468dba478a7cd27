//! Error type for realtime subscriptions.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealtimeError {
    /// `subscribe` was called while a subscription is already active.
    ///
    /// Stream failures are not errors at this boundary; they surface as
    /// status changes on the subscription's listener registry.
    #[error("A realtime subscription is already active")]
    AlreadySubscribed,
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
