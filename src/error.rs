//! Error types for the evaluation harness

use thiserror::Error;

/// Errors raised by the harness library.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Input data or parameters violate a documented precondition.
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// A stateful component was used before it learned its parameters.
    #[error("{component} used before it was fit")]
    NotFitted { component: &'static str },

    /// A fitted component was asked to fit again.
    #[error("{component} is already fit; refusing to refit")]
    AlreadyFitted { component: &'static str },

    /// Matrix or vector shapes do not line up.
    #[error("dimension mismatch in {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A numeric routine could not produce a usable result.
    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        HarnessError::Precondition(msg.into())
    }
}

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, HarnessError>;
