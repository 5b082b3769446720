//! The internal error type shared by the Keel crates.

/// An internal error indicating a bug in Keel, not a user input problem.
///
/// Problems with the captured build state are reported as diagnostics
/// instead; this type is reserved for broken codec invariants.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the internal error.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
