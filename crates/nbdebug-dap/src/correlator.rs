//! Request/reply correlation.
//!
//! Tracks pending requests by sequence number, routes replies to waiting
//! callers via oneshot channels, and rejects everything still pending when
//! the transport goes away.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::bus::{EventBus, SessionEvent};
use crate::error::DapError;
use crate::protocol::{Command, Reply, Request};
use crate::seq::SequenceAllocator;

type Completion = oneshot::Sender<Result<Reply, DapError>>;

struct Pending {
    seqs: SequenceAllocator,
    waiting: HashMap<i64, Completion>,
    // Rejected before their reply arrived; a late reply is not a violation.
    abandoned: HashSet<i64>,
    closed: bool,
}

impl Pending {
    fn reject_all(&mut self) -> usize {
        let count = self.waiting.len();
        for (seq, completion) in self.waiting.drain() {
            self.abandoned.insert(seq);
            // The waiter may already be gone.
            let _ = completion.send(Err(DapError::TransportClosed));
        }
        count
    }
}

struct Shared {
    pending: Mutex<Pending>,
    bus: EventBus,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, reply: Reply) -> Result<(), DapError> {
        let (completion, abandoned) = {
            let mut pending = self.lock();
            match pending.waiting.remove(&reply.request_seq) {
                Some(completion) => (Some(completion), false),
                None => (None, pending.abandoned.remove(&reply.request_seq)),
            }
        };
        if abandoned {
            tracing::debug!(
                request_seq = reply.request_seq,
                command = %reply.command,
                "late reply for abandoned request"
            );
            return Ok(());
        }
        match completion {
            Some(completion) => {
                tracing::debug!(
                    request_seq = reply.request_seq,
                    command = %reply.command,
                    success = reply.success,
                    "reply received"
                );
                let _ = completion.send(Ok(reply));
                Ok(())
            }
            None => {
                let request_seq = reply.request_seq;
                self.bus
                    .publish(SessionEvent::ProtocolViolation { request_seq });
                Err(DapError::UnmatchedReply { request_seq })
            }
        }
    }

    fn close(&self) {
        let mut pending = self.lock();
        pending.closed = true;
        let rejected = pending.reject_all();
        if rejected > 0 {
            tracing::warn!(rejected, "transport closed with requests pending");
        }
    }
}

/// A registered request whose reply has not been consumed yet.
#[derive(Debug)]
pub struct PendingReply {
    seq: i64,
    command: &'static str,
    rx: oneshot::Receiver<Result<Reply, DapError>>,
}

impl PendingReply {
    /// Sequence number the request was sent with.
    pub fn seq(&self) -> i64 {
        self.seq
    }

    /// Wire name of the command.
    pub fn command(&self) -> &'static str {
        self.command
    }

    /// Wait for the matching reply.
    pub async fn wait(self) -> Result<Reply, DapError> {
        self.rx.await.map_err(|_| DapError::TransportClosed)?
    }
}

/// Allocates sequence numbers, transmits requests and matches replies.
pub struct Correlator {
    shared: Arc<Shared>,
    outgoing: mpsc::Sender<Request>,
    router: JoinHandle<()>,
}

impl Correlator {
    /// Create a correlator and spawn its reply router on the current
    /// tokio runtime.
    pub fn new(
        outgoing: mpsc::Sender<Request>,
        replies: mpsc::Receiver<Reply>,
        bus: EventBus,
    ) -> Self {
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                seqs: SequenceAllocator::new(),
                waiting: HashMap::new(),
                abandoned: HashSet::new(),
                closed: false,
            }),
            bus,
        });
        let router = tokio::spawn(route_replies(replies, shared.clone()));
        Self {
            shared,
            outgoing,
            router,
        }
    }

    /// Send a request and wait for its reply.
    pub async fn send(&self, command: Command) -> Result<Reply, DapError> {
        self.submit(command).await?.wait().await
    }

    /// Register and transmit a request without waiting for the reply.
    ///
    /// The completion is registered before the request leaves, so a fast
    /// reply can never be reported as unmatched.
    pub async fn submit(&self, command: Command) -> Result<PendingReply, DapError> {
        command.validate()?;

        let (tx, rx) = oneshot::channel();
        let seq = {
            let mut pending = self.shared.lock();
            if pending.closed {
                return Err(DapError::TransportClosed);
            }
            let seq = pending.seqs.next();
            pending.waiting.insert(seq, tx);
            seq
        };

        let name = command.name();
        tracing::debug!(seq, command = name, "sending request");
        if self.outgoing.send(Request::new(seq, command)).await.is_err() {
            self.shared.lock().waiting.remove(&seq);
            return Err(DapError::TransportClosed);
        }

        Ok(PendingReply {
            seq,
            command: name,
            rx,
        })
    }

    /// Transmit a request nobody will wait for, without suspending.
    ///
    /// Used on paths that cannot await, such as drop.
    pub fn send_detached(&self, command: Command) -> Result<i64, DapError> {
        command.validate()?;
        let seq = {
            let mut pending = self.shared.lock();
            if pending.closed {
                return Err(DapError::TransportClosed);
            }
            pending.seqs.next()
        };
        self.outgoing
            .try_send(Request::new(seq, command))
            .map_err(|_| DapError::TransportClosed)?;
        Ok(seq)
    }

    /// Route a reply to its waiter.
    ///
    /// A reply nobody waits for (including a second reply for the same
    /// sequence number) yields [`DapError::UnmatchedReply`] and leaves
    /// other pending requests untouched.
    pub fn dispatch(&self, reply: Reply) -> Result<(), DapError> {
        self.shared.dispatch(reply)
    }

    /// Reject every pending completion with [`DapError::TransportClosed`].
    ///
    /// A reply that still arrives for one of them is logged and dropped
    /// rather than reported as unmatched.
    pub fn fail_all(&self) -> usize {
        self.shared.lock().reject_all()
    }

    /// Start a fresh exchange: stale completions are rejected and
    /// sequence numbers restart at 0.
    pub fn reset(&self) {
        let mut pending = self.shared.lock();
        let stale = pending.reject_all();
        if stale > 0 {
            tracing::debug!(stale, "rejected stale requests on reset");
        }
        pending.abandoned.clear();
        pending.seqs.reset();
    }

    /// How many requests are waiting for a reply.
    pub fn pending_count(&self) -> usize {
        self.shared.lock().waiting.len()
    }

    /// The sequence number the next request will get.
    pub fn next_seq(&self) -> i64 {
        self.shared.lock().seqs.peek()
    }

    /// Whether the reply channel has closed.
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }
}

impl Drop for Correlator {
    fn drop(&mut self) {
        self.router.abort();
        self.shared.lock().reject_all();
    }
}

impl std::fmt::Debug for Correlator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pending = self.shared.lock();
        f.debug_struct("Correlator")
            .field("next_seq", &pending.seqs.peek())
            .field("pending", &pending.waiting.len())
            .field("closed", &pending.closed)
            .finish()
    }
}

async fn route_replies(mut replies: mpsc::Receiver<Reply>, shared: Arc<Shared>) {
    while let Some(reply) = replies.recv().await {
        if let Err(err) = shared.dispatch(reply) {
            tracing::warn!("{err}");
        }
    }
    tracing::debug!("reply channel closed");
    shared.close();
}
