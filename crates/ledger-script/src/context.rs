use crate::VerifyFlags;
use crate::constants::{LOCKTIME_THRESHOLD, SEQUENCE_FINAL};
use crate::crypto::CryptoCapability;

/// Read-only inputs of one evaluation.
///
/// Borrowed by the engine for the duration of a call, never owned or mutated by it.
#[derive(Clone, Copy)]
pub struct ExecutionContext<'a> {
    /// Current ledger height, compared against height-based absolute locks.
    pub current_height: u32,
    /// Current ledger time, compared against timestamp-based absolute locks.
    pub current_time: u32,
    /// Relative lock value of the claim, compared by `OP_CHECKSEQUENCEVERIFY`.
    pub sequence: u32,
    /// Digest that signatures are checked against.
    pub message_digest: &'a [u8],
    pub crypto: &'a dyn CryptoCapability,
    pub flags: VerifyFlags,
}

impl<'a> ExecutionContext<'a> {
    /// Creates a context with relative locks disabled and [`VerifyFlags::STANDARD`].
    ///
    /// Height starts at 0 and time at [`LOCKTIME_THRESHOLD`], the earliest value of
    /// each class, so no absolute lock is met until [`Self::with_height`] or
    /// [`Self::with_time`] moves the ledger forward.
    pub fn new(crypto: &'a dyn CryptoCapability, message_digest: &'a [u8]) -> Self {
        Self {
            current_height: 0,
            current_time: LOCKTIME_THRESHOLD,
            sequence: SEQUENCE_FINAL,
            message_digest,
            crypto,
            flags: VerifyFlags::STANDARD,
        }
    }

    pub fn with_height(mut self, height: u32) -> Self {
        self.current_height = height;
        self
    }

    pub fn with_time(mut self, time: u32) -> Self {
        self.current_time = time;
        self
    }

    pub fn with_sequence(mut self, sequence: u32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_flags(mut self, flags: VerifyFlags) -> Self {
        self.flags = flags;
        self
    }
}

impl std::fmt::Debug for ExecutionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("current_height", &self.current_height)
            .field("current_time", &self.current_time)
            .field("sequence", &self.sequence)
            .field("message_digest", &hex::encode(self.message_digest))
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}
