//! nbdebug-dap: client-side engine for debugging notebook cells over the
//! Debug Adapter Protocol.
//!
//! The engine sequences requests, correlates out-of-order replies, runs the
//! attach handshake, tracks breakpoints and resolves the
//! stack → scopes → variables chain while a cell is paused.

pub mod breakpoint;
pub mod bus;
pub mod correlator;
pub mod error;
pub mod events;
pub mod protocol;
pub mod seq;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod variables;

// Re-export key types for convenience.
pub use breakpoint::{Breakpoint, BreakpointStore, Toggle};
pub use bus::{EventBus, SessionEvent};
pub use correlator::{Correlator, PendingReply};
pub use error::DapError;
pub use events::{EventListener, DEFAULT_THREAD_ID};
pub use protocol::*;
pub use seq::SequenceAllocator;
pub use session::{ContinueOutcome, DebugSession, SessionOptions, SessionState};
pub use transport::{BackendChannels, Connection};
pub use variables::VariableResolver;
