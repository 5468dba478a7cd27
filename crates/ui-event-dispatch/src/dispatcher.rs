//! Bounded post-to-UI work queue.
//!
//! All UI-visible state belongs to a single UI-affine task. Completions that
//! originate anywhere else (auth futures, realtime deliveries) never touch
//! that state directly; they post a closure through [`UiDispatcher`] and the
//! owning loop drains it via [`UiWorkQueue`].

use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Queue capacity for pending UI tasks.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A unit of work to run on the UI task.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Create a connected dispatcher/queue pair.
///
/// The dispatcher side is cheap to clone and hand to every producer; the
/// queue side is owned by the UI loop, which is the only drainer.
pub fn ui_work_queue(
    capacity: usize,
    runtime: tokio::runtime::Handle,
) -> (UiDispatcher, UiWorkQueue) {
    let (sender, receiver) = mpsc::channel(capacity);
    (UiDispatcher { sender, runtime }, UiWorkQueue { receiver })
}

/// Producer handle: posts closures onto the UI work queue from any task.
#[derive(Clone)]
pub struct UiDispatcher {
    sender: mpsc::Sender<UiTask>,
    runtime: tokio::runtime::Handle,
}

impl UiDispatcher {
    /// Post a closure for execution on the UI loop.
    ///
    /// Posting never blocks the caller: when the queue is full the send is
    /// completed on a spawned task instead of dropping the work.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        match self.sender.try_send(Box::new(task)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                let sender = self.sender.clone();
                self.runtime.spawn(async move {
                    if let Err(err) = sender.send(task).await {
                        warn!(error = %err, "UI work enqueue failed (queue closed)");
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("UI work queue is closed; dropping task");
            }
        }
    }
}

impl std::fmt::Debug for UiDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiDispatcher").finish_non_exhaustive()
    }
}

/// Consumer side: drained exclusively by the UI's own loop.
pub struct UiWorkQueue {
    receiver: mpsc::Receiver<UiTask>,
}

impl UiWorkQueue {
    /// Drain tasks until every dispatcher has been dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.receiver.recv().await {
            execute(task);
        }
    }

    /// Run every task already queued, without waiting for more.
    ///
    /// Returns the number of tasks executed. Test-oriented deterministic
    /// companion to [`run`](Self::run).
    pub fn drain_pending(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(task) = self.receiver.try_recv() {
            execute(task);
            executed += 1;
        }
        executed
    }
}

impl std::fmt::Debug for UiWorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiWorkQueue").finish_non_exhaustive()
    }
}

/// Run one task, isolating the loop from its panic.
fn execute(task: UiTask) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(task)) {
        error!(panic = %panic_message(&panic), "UI task panicked");
    }
}

/// Best-effort extraction of a panic payload message.
pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic payload"
    }
}
