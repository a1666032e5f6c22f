//! Engine-level errors and the protected-call status

/// Outcome of a protected call, passed through to the host unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The call completed and its results are on the stack
    Ok,
    /// The callee reported a runtime error; the message is on the stack
    Runtime,
    /// The engine ran out of memory servicing the call
    Memory,
    /// The call could not be dispatched at all (malformed stack, no callable)
    Unhandled,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

/// Errors for engine operations whose preconditions the caller can violate
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The slot index does not name a live stack slot
    #[error("slot {slot} is not valid (stack top is {top})")]
    InvalidSlot { slot: usize, top: usize },

    /// A table operation was aimed at a slot holding something else
    #[error("expected a table, found a {found} value")]
    NotATable { found: &'static str },

    /// An operation needed a stack value that was not there
    #[error("stack underflow: needed {needed} values, had {available}")]
    StackUnderflow { needed: usize, available: usize },

    /// A heap id no longer resolves; only possible through handle misuse
    #[error("dangling heap id")]
    DanglingId,
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
