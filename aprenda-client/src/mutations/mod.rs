//! Mutation actions
//!
//! One named async fn per write. Every action performs a single semantic
//! gateway operation and, only after it succeeds, invalidates the cache
//! key prefixes of every read it could have changed. A failed write
//! invalidates nothing, so the cache never believes in a write that did
//! not land.

pub mod auth;
pub mod catalog;
pub mod enrollment;
pub mod feedback;
pub mod notifications;
pub mod profile;
pub mod progress;
