//! Non-fatal diagnostics for rejected operations
//!
//! Chainable View and Group operations never fail loudly. A rejected step
//! leaves the receiver unchanged, logs a warning and lands here so callers
//! and tests can inspect what went wrong after a chain of calls.

use meshstore_core::Error;

/// Record of one rejected operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Path name of the View or Group the operation targeted
    pub path: String,
    /// Operation that was attempted
    pub operation: &'static str,
    /// State of the View at the time, when the target is a View
    pub state: Option<&'static str>,
    /// Stable error category (see [`Error::label`])
    pub kind: &'static str,
    /// Rendered error message
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn new(
        path: String,
        operation: &'static str,
        state: Option<&'static str>,
        error: &Error,
    ) -> Self {
        Diagnostic {
            path,
            operation,
            state,
            kind: error.label(),
            message: error.to_string(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            Some(state) => write!(
                f,
                "{} [{}] {}: {}",
                self.path, state, self.operation, self.message
            ),
            None => write!(f, "{} {}: {}", self.path, self.operation, self.message),
        }
    }
}
