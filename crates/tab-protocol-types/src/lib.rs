//! Pure tab domain and change-event types for the OpenTab client.
//!
//! This crate contains only data types and serialization — no I/O, no async,
//! no transport. It defines the shared language between the tabs REST client,
//! the realtime reconciler, and the UI layer.

mod event;
mod money;
mod tab;

pub use event::{ChangeEvent, ChangeEventType, TabRecordPatch};
pub use money::{format_currency, CURRENCY_CODE};
pub use tab::{OrderLine, OrderStatus, RestaurantInfo, Tab, TabStatus};
