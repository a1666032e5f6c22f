//! Error classification shared by every bridge component

use bitflags::bitflags;
use tracing::error;
use vm::{Engine, Status, Value};

bitflags! {
    /// Classification of one lookup or extraction outcome.
    ///
    /// `NON_EXISTENT` and `WRONG_TYPE` describe why the real value was not
    /// used and can accompany a successfully substituted default. `FATAL`
    /// alone decides whether a caller with no explicit error handling may use
    /// the result; callers that care whether they got the real value or a
    /// fallback must inspect the other two flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ErrorFlags: u8 {
        /// The requested value was absent
        const NON_EXISTENT = 0b001;
        /// The value existed but had an incompatible type
        const WRONG_TYPE = 0b010;
        /// The value was unusable and no recovery value was supplied
        const FATAL = 0b100;
    }
}

impl ErrorFlags {
    /// No flags at all: the real value was produced
    pub fn is_clean(self) -> bool {
        self.is_empty()
    }

    /// The result is unusable without explicit handling
    pub fn is_fatal(self) -> bool {
        self.contains(ErrorFlags::FATAL)
    }
}

/// Bridge-level failures
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Handles were closed out of order, or a stale handle was used
    #[error("stack discipline violation: {0}")]
    StackDiscipline(String),

    /// A protected call failed; carries the engine's own message
    #[error("{context}: {message}")]
    Call {
        context: String,
        status: Status,
        message: String,
    },
}

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pop the error value the engine left on the stack and render it
pub(crate) fn take_error_message(engine: &mut Engine) -> String {
    let message = match engine.value_at(engine.top()) {
        Some(Value::Str(s)) => s.to_string(),
        Some(other) => format!("({} error value)", other.type_name()),
        None => return "(no error value)".to_string(),
    };
    engine.pop(1);
    message
}

/// Fold an engine status into a `Result`, consuming the error value the
/// engine left on the stack when there is one.
pub fn ensure_ok(engine: &mut Engine, context: &str, status: Status) -> Result<()> {
    if status.is_ok() {
        return Ok(());
    }
    let message = take_error_message(engine);
    Err(Error::Call {
        context: context.to_string(),
        status,
        message,
    })
}

/// Fail-fast variant of [`ensure_ok`] for unrecoverable setup errors, such
/// as a missing configuration script: logs the context together with the
/// engine's message, then terminates the process.
pub fn abort_on_error(engine: &mut Engine, context: &str, status: Status) {
    if let Err(err) = ensure_ok(engine, context, status) {
        error!(%err, "unrecoverable engine error");
        std::process::exit(1);
    }
}
