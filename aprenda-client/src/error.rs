//! Client error types

use aprenda_core::{GatewayError, InvalidQuestion};
use thiserror::Error;

/// Result type for data-access operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced to the view layer.
///
/// Cloneable so the query cache can hand one failed fetch to every
/// deduplicated waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The action needs a signed-in user; callers route to the login page
    #[error("sign-in required")]
    SignInRequired,

    #[error("validation failed: {0}")]
    Validation(String),

    /// A broadcast stopped partway; rows already inserted remain
    #[error("notification delivered to {delivered} of {total} recipients: {reason}")]
    BroadcastIncomplete {
        delivered: usize,
        total: usize,
        reason: String,
    },
}

impl From<InvalidQuestion> for ClientError {
    fn from(err: InvalidQuestion) -> Self {
        ClientError::Validation(err.to_string())
    }
}

impl ClientError {
    /// Map a response-body decode failure into the gateway taxonomy
    pub(crate) fn decode(err: impl std::fmt::Display) -> Self {
        ClientError::Gateway(GatewayError::Decode(err.to_string()))
    }
}
