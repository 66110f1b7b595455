//! Sequence numbers for outgoing requests.

/// Distance between consecutive sequence numbers.
///
/// The backend answers on the odd numbers, so requests stay even.
pub const SEQ_STEP: i64 = 2;

/// Hands out strictly increasing even sequence numbers starting at 0.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    next: i64,
}

impl SequenceAllocator {
    /// Create an allocator whose first number is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next sequence number.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> i64 {
        let seq = self.next;
        self.next += SEQ_STEP;
        seq
    }

    /// The number the next call to [`next`](Self::next) will return.
    pub fn peek(&self) -> i64 {
        self.next
    }

    /// Start over from 0. Called at the start of every handshake.
    pub fn reset(&mut self) {
        self.next = 0;
    }
}
