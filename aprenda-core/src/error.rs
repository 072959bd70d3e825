//! Gateway error taxonomy
//!
//! Every gateway implementation maps its transport- or backend-specific
//! failures into these variants. Errors are cloneable so a single failed
//! read can be fanned out to every deduplicated waiter.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("no matching row in {table}")]
    NotFound { table: String },

    #[error("conflict in {table}: {reason}")]
    Conflict { table: String, reason: String },

    #[error("not authorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("rpc {name} failed: {reason}")]
    Rpc { name: String, reason: String },

    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl GatewayError {
    /// Conflict helper with the conventional table/reason shape
    pub fn conflict(table: &str, reason: impl Into<String>) -> Self {
        GatewayError::Conflict {
            table: table.to_string(),
            reason: reason.into(),
        }
    }

    pub fn not_found(table: &str) -> Self {
        GatewayError::NotFound {
            table: table.to_string(),
        }
    }
}
