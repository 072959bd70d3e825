//! Typed query functions
//!
//! One accessor per domain read. Each composes the cache key embedding
//! every parameter that affects its result, defers to the cache for
//! deduplication, and reshapes raw rows into typed values right at the
//! gateway boundary. Reads scoped to a user return their empty default
//! instead of fetching while nobody is signed in.

pub mod achievements;
pub mod admin;
pub mod courses;
pub mod enrollments;
pub mod notifications;
pub mod profiles;
pub mod quiz;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ClientError, Result};

/// Decode a cached JSON value into its typed form
pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(ClientError::decode)
}

/// Decode a possibly-skipped read (`None` means the read was disabled)
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(
    value: Option<Value>,
) -> Result<T> {
    match value {
        Some(value) => decode(value),
        None => Ok(T::default()),
    }
}
