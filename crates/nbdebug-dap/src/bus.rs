//! Typed notifications for collaborators (breakpoint lists, thread
//! changes, session start/stop).

use tokio::sync::broadcast;

use crate::breakpoint::Breakpoint;

/// Buffered notifications per subscriber before it starts lagging.
const BUS_CAPACITY: usize = 64;

/// Something collaborators may want to redraw on.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The breakpoint store changed; carries the new sorted snapshot.
    BreakpointsChanged(Vec<Breakpoint>),
    /// The backend announced a new active thread.
    ThreadStarted {
        /// The thread that started.
        thread_id: i64,
    },
    /// `started` flipped.
    StartedChanged(bool),
    /// A reply arrived that no pending request was waiting for.
    ProtocolViolation {
        /// The `request_seq` of the orphaned reply.
        request_seq: i64,
    },
}

/// Broadcast channel of [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Subscribe to future notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers. Having none is fine.
    pub fn publish(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("session event dropped: no subscribers");
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
