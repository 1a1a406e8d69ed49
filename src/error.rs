//! Error types for the bounded runner.
//!
//! Two layers of failure exist. [`RunnerError`] is fatal to a whole run and
//! is returned from `run`; [`ItemError`] is the captured failure of a single
//! work item and is only ever recorded in the run result.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal errors returned by a runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// The run was rejected before any item was dispatched.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the rejected setting
        message: String,
    },

    /// The scheduler broke one of its own guarantees.
    ///
    /// This never happens with a correct scheduler and is not recoverable.
    #[error("Scheduler invariant violated: {message}")]
    InvariantViolation {
        /// Which guarantee was broken
        message: String,
    },

    /// The worker pool could not start a thread or lost its completion queue.
    #[error("Worker pool error: {message}")]
    WorkerPool {
        /// Error message describing what went wrong
        message: String,
    },
}

impl RunnerError {
    /// Creates a new Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new InvariantViolation error.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates a new WorkerPool error.
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Self::WorkerPool {
            message: message.into(),
        }
    }

    /// Returns true if the run was rejected before dispatching anything.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Returns true if this error reports a broken scheduling guarantee.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation { .. })
    }
}

/// The captured failure of one work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    /// Short classification of the failure, e.g. `"Io"` or `"Panic"`
    pub kind: String,
    /// Human readable message
    pub message: String,
}

impl ItemError {
    /// Kind used when the work item panicked.
    pub const PANIC: &'static str = "Panic";

    /// Kind used when no better classification is available.
    pub const GENERIC: &'static str = "ItemError";

    /// Creates a new ItemError.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Creates an ItemError with the generic kind.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(Self::GENERIC, message)
    }

    /// Builds an ItemError from a panic payload.
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "work item panicked".to_string()
        };
        Self::new(Self::PANIC, message)
    }

    /// Returns true if the item panicked instead of returning an error.
    pub fn is_panic(&self) -> bool {
        self.kind == Self::PANIC
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ItemError {}

impl From<&str> for ItemError {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

impl From<String> for ItemError {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<std::io::Error> for ItemError {
    fn from(error: std::io::Error) -> Self {
        Self::new("Io", error.to_string())
    }
}

impl From<serde_json::Error> for ItemError {
    fn from(error: serde_json::Error) -> Self {
        Self::new("SerDes", error.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ItemError {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::msg(error.to_string())
    }
}

impl From<&RunnerError> for ItemError {
    fn from(error: &RunnerError) -> Self {
        match error {
            RunnerError::Configuration { message } => Self::new("ConfigurationError", message),
            RunnerError::InvariantViolation { message } => {
                Self::new("InvariantViolation", message)
            }
            RunnerError::WorkerPool { message } => Self::new("WorkerPoolError", message),
        }
    }
}
