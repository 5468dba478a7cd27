//! UI-thread marshaling primitives for the OpenTab client.
//!
//! Two pieces:
//!
//! - [`UiDispatcher`] / [`UiWorkQueue`]: a bounded work queue drained
//!   exclusively by the UI's own loop. Every cross-task completion that
//!   wants to touch UI-visible state posts a closure instead of mutating
//!   shared state directly.
//! - [`ListenerRegistry`]: ordered callback fan-out whose deliveries are
//!   marshaled through that queue.

mod dispatcher;
mod listeners;

pub use dispatcher::{ui_work_queue, UiDispatcher, UiTask, UiWorkQueue, DEFAULT_QUEUE_CAPACITY};
pub use listeners::{ListenerHandle, ListenerRegistry};
