// SPDX-License-Identifier: MIT

//! Typed error handling for calc-orchestrator
//!
//! Every fault is scoped to the single request that raised it. Nothing here is
//! retried automatically; callers decide on retry policy.

use thiserror::Error;

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, CalcError>;

/// Top-level error type for calc-orchestrator
#[derive(Debug, Error)]
pub enum CalcError {
    /// Input failed validation before tokenization (user-correctable)
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// Decomposition could not place an operator
    #[error("Malformed expression: {0}")]
    MalformedExpression(String),

    /// A submitted result names a task the store has never seen
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Lookup of an unknown entity
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The storage collaborator failed; the transaction was rolled back
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// The store could not be reached at all (poisoned lock, failed open)
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A request payload was rejected before reaching the store
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Missing or invalid credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Configuration errors (bad env values, unparsable URLs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// HTTP request errors (worker side)
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

impl CalcError {
    /// Create a not-found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_expression(message: impl Into<String>) -> Self {
        Self::InvalidExpression(message.into())
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedExpression(message.into())
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns `true` if the storage collaborator failed
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::StoreUnavailable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<&str> for CalcError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

impl From<String> for CalcError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}
