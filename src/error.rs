use std::fmt;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while compiling a configuration or resolving a mode.
///
/// Tokenization itself never returns an `Error`: a runtime regex failure or an
/// unresolved boundary degrades to host-mode pass-through rather than
/// propagating, so every variant here is a configuration-time problem.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A pattern failed to compile as a regular expression.
    InvalidPattern { pattern: String, reason: String },

    /// A sub configuration's `open` pattern matched the empty string, which
    /// would let the engine re-enter the same sub-mode forever without ever
    /// advancing the stream.
    ZeroWidthOpen { open: String },

    /// A mode specification could not be turned into a mode object by the
    /// supplied resolver.
    UnresolvedModeSpec(String),

    /// Two configurations in the same mode disagree about whose responsibility
    /// a given open pattern is (same pattern registered twice with different
    /// behavior).
    ConflictingMode { name: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidPattern { pattern, reason } => {
                write!(f, "invalid pattern '{}': {}", pattern, reason)
            }
            Error::ZeroWidthOpen { open } => {
                write!(f, "open pattern '{}' matches the empty string", open)
            }
            Error::UnresolvedModeSpec(name) => write!(f, "mode '{}' could not be resolved", name),
            Error::ConflictingMode { name } => {
                write!(f, "conflicting configuration for mode '{}'", name)
            }
        }
    }
}

impl std::error::Error for Error {}
