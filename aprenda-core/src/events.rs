//! Events pushed by the gateway: auth lifecycle and table changes

use serde_json::Value;

use crate::account::Session;

/// Auth lifecycle events emitted by the gateway's auth service
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// Session state discovered at startup, possibly none
    InitialSession(Option<Session>),
    SignedIn(Session),
    TokenRefreshed(Session),
    SignedOut,
}

/// Kind of row change reported on a change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One row change on a subscribed table
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
    pub row: Value,
}
