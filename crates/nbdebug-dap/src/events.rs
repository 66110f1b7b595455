//! Out-of-band event listener.
//!
//! Watches the backend's notification stream for thread-started events and
//! records the most recent thread id. Everything else on the stream is left
//! to collaborators.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::bus::{EventBus, SessionEvent};
use crate::error::DapError;
use crate::protocol::Event;

/// Thread id assumed until the backend announces one.
pub const DEFAULT_THREAD_ID: i64 = 1;

/// Scoped subscription to the backend's event stream.
#[derive(Debug)]
pub struct EventListener {
    thread_id: Arc<AtomicI64>,
    task: Option<JoinHandle<()>>,
}

impl EventListener {
    /// Create a detached listener holding the default thread id.
    pub fn new() -> Self {
        Self {
            thread_id: Arc::new(AtomicI64::new(DEFAULT_THREAD_ID)),
            task: None,
        }
    }

    /// Start consuming `events` on the current tokio runtime.
    ///
    /// Fails with [`DapError::ListenerAlreadyAttached`] if a previous
    /// subscription has not been detached.
    pub fn attach(
        &mut self,
        events: broadcast::Receiver<Event>,
        bus: EventBus,
    ) -> Result<(), DapError> {
        if self.is_attached() {
            return Err(DapError::ListenerAlreadyAttached);
        }
        let thread_id = self.thread_id.clone();
        self.task = Some(tokio::spawn(listen(events, thread_id, bus)));
        tracing::debug!("event listener attached");
        Ok(())
    }

    /// Stop consuming events. Returns whether a subscription was active.
    pub fn detach(&mut self) -> bool {
        match self.task.take() {
            Some(task) => {
                task.abort();
                tracing::debug!("event listener detached");
                true
            }
            None => false,
        }
    }

    /// Whether a subscription is active.
    pub fn is_attached(&self) -> bool {
        self.task.is_some()
    }

    /// The most recently announced thread id.
    pub fn thread_id(&self) -> i64 {
        self.thread_id.load(Ordering::SeqCst)
    }

    /// Forget the announced thread and go back to [`DEFAULT_THREAD_ID`].
    pub fn reset_thread(&self) {
        self.thread_id.store(DEFAULT_THREAD_ID, Ordering::SeqCst);
    }
}

impl Default for EventListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        self.detach();
    }
}

async fn listen(mut events: broadcast::Receiver<Event>, thread_id: Arc<AtomicI64>, bus: EventBus) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Some(id) = event.started_thread_id() {
                    thread_id.store(id, Ordering::SeqCst);
                    tracing::info!(thread_id = id, "thread started");
                    bus.publish(SessionEvent::ThreadStarted { thread_id: id });
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("event stream closed");
                break;
            }
        }
    }
}
