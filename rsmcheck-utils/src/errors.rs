//! Errors surfaced while loading inputs or writing outputs.
//!
//! Violations of internal invariants (contexts regressing, requests for
//! decided formulas, fixed points over the wrong operator) are bugs in the
//! checker itself and panic instead of flowing through this type.
use thiserror::Error;

/// Convenience wrapper to represent success or a meaningful checker error.
pub type RsmResult<T> = std::result::Result<T, Error>;

/// Errors generated while reading the machine and formula inputs.
#[derive(Error)]
pub enum Error {
    /// The input file is missing or unreadable.
    #[error("{0}")]
    InvalidFile(String),

    /// A CTL formula failed to parse.
    #[error("parse error: {0}")]
    Parse(String),

    /// The machine description violates a structural constraint.
    #[error("malformed machine: {0}")]
    MalformedMachine(String),

    /// A wrapper for IO errors.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A wrapper for JSON deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// `main` reports errors through their Debug impl, so have it read like the
// message rather than the enum structure.
impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl Error {
    pub fn invalid_file<S: ToString>(msg: S) -> Self {
        Error::InvalidFile(msg.to_string())
    }

    pub fn parse_error<S: ToString>(msg: S) -> Self {
        Error::Parse(msg.to_string())
    }

    pub fn malformed<S: ToString>(msg: S) -> Self {
        Error::MalformedMachine(msg.to_string())
    }
}
