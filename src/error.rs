//! Error taxonomy for the container core.
//!
//! Protocol violations (double `complete()`, dispatch after a terminal
//! transition, `start_async` on an exchange that does not support it) surface
//! synchronously as [`ContainerError::IllegalState`]. Routing misses during a
//! dispatched re-invocation never reach this type: the dispatcher turns them
//! into a terminal 404 response. Resource absence is `Option::None`, not an
//! error.

use std::fmt;
use std::io;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ContainerError>;

/// Errors produced by the dispatch engine, the module loader and the runtime.
#[derive(Debug)]
pub enum ContainerError {
    /// A lifecycle operation was invoked in a state that does not allow it.
    IllegalState(String),
    /// Writing the response or reading a backing resource failed.
    Io(io::Error),
    /// An application handler returned an error.
    Handler(anyhow::Error),
    /// Container or application configuration is invalid.
    Config(String),
    /// A module descriptor could not be parsed.
    ModuleDescriptor {
        /// Location of the resource holding the descriptor
        location: String,
        /// Parser message
        reason: String,
    },
}

impl ContainerError {
    /// Shorthand for [`ContainerError::IllegalState`].
    pub fn illegal_state(msg: impl Into<String>) -> Self {
        ContainerError::IllegalState(msg.into())
    }

    /// Returns `true` for protocol/state violations.
    #[must_use]
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, ContainerError::IllegalState(_))
    }

    /// HTTP status used when this error surfaces before the response is committed.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            ContainerError::Config(_) | ContainerError::ModuleDescriptor { .. } => 503,
            _ => 500,
        }
    }
}

impl fmt::Display for ContainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerError::IllegalState(msg) => write!(f, "illegal state: {msg}"),
            ContainerError::Io(e) => write!(f, "I/O error: {e}"),
            ContainerError::Handler(e) => write!(f, "handler failed: {e:#}"),
            ContainerError::Config(msg) => write!(f, "configuration error: {msg}"),
            ContainerError::ModuleDescriptor { location, reason } => {
                write!(f, "invalid module descriptor in '{location}': {reason}")
            }
        }
    }
}

impl std::error::Error for ContainerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContainerError::Io(e) => Some(e),
            ContainerError::Handler(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<io::Error> for ContainerError {
    fn from(e: io::Error) -> Self {
        ContainerError::Io(e)
    }
}

impl From<anyhow::Error> for ContainerError {
    fn from(e: anyhow::Error) -> Self {
        ContainerError::Handler(e)
    }
}
