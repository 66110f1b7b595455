//! Debug engine error types.

use thiserror::Error;

use crate::session::SessionState;

/// Errors from debug engine operations.
#[derive(Debug, Error)]
pub enum DapError {
    /// A reply or event had an unexpected or malformed shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A reply arrived that matches no pending request.
    #[error("unmatched reply for request seq {request_seq}")]
    UnmatchedReply {
        /// The `request_seq` carried by the orphaned reply.
        request_seq: i64,
    },

    /// The transport went away while an exchange was outstanding.
    #[error("transport closed")]
    TransportClosed,

    /// The operation is not allowed in the current session state.
    #[error("cannot {operation} while session is {state:?}")]
    InvalidTransition {
        /// The rejected operation.
        operation: &'static str,
        /// The state the session was in.
        state: SessionState,
    },

    /// The handshake's `setBreakpoints` step failed.
    #[error("breakpoint sync failed: {0}")]
    BreakpointSyncFailure(String),

    /// The backend answered with `success: false`.
    #[error("backend rejected {command}: {message}")]
    Rejected {
        /// The command that was rejected.
        command: String,
        /// The rejection message from the backend.
        message: String,
    },

    /// Request arguments failed validation before transmission.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The event listener is already subscribed.
    #[error("event listener already attached")]
    ListenerAlreadyAttached,

    /// Connecting to the backend failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
