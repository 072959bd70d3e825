//! Gateway abstractions
//!
//! The external backend is consumed through three capability traits:
//! [`Datastore`] for rows, counts, server procedures, and the table change
//! feed; [`AuthApi`] for identity; [`FileStore`] for uploaded assets.
//! `InMemoryGateway` implements all three for tests and offline work,
//! `RestGateway` speaks the hosted backend's HTTP conventions.

pub mod memory;
pub mod rest;

pub use memory::InMemoryGateway;
pub use rest::RestGateway;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use aprenda_core::{AuthEvent, ChangeEvent, Filter, Query, Result, Session};

/// Row-level access to the relational store
#[async_trait]
pub trait Datastore: Send + Sync {
    /// Run a filtered, ordered, paginated read
    async fn select(&self, query: &Query) -> Result<Vec<Value>>;

    /// Count the rows a query would match, ignoring its limit
    async fn count(&self, query: &Query) -> Result<u64>;

    /// Insert one row; returns the stored row with server-side defaults
    /// (id, created_at) filled in
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Patch every row matching the filters; returns the affected count
    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<u64>;

    /// Insert-or-update keyed by the `on_conflict` columns; returns the
    /// stored row
    async fn upsert(&self, table: &str, row: Value, on_conflict: &[&str]) -> Result<Value>;

    /// Delete every row matching the filters; returns the removed count
    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<u64>;

    /// Call a server-defined procedure
    async fn rpc(&self, name: &str, args: Value) -> Result<Value>;

    /// Subscribe to row changes on a table, optionally narrowed by a
    /// filter. The subscription ends when the receiver is dropped.
    async fn changes(
        &self,
        table: &str,
        filter: Option<Filter>,
    ) -> Result<mpsc::UnboundedReceiver<ChangeEvent>>;

    /// Convenience: first matching row, if any
    async fn select_one(&self, query: &Query) -> Result<Option<Value>> {
        let mut limited = query.clone();
        limited.limit = Some(1);
        Ok(self.select(&limited).await?.into_iter().next())
    }
}

/// Identity operations and the auth event stream
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Register a new account; the backend creates the matching profile
    /// row and the user signs in separately once confirmed
    async fn sign_up(&self, email: &str, password: &str, metadata: Value) -> Result<()>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    /// The current session, if one is live
    async fn get_session(&self) -> Result<Option<Session>>;

    async fn request_password_reset(&self, email: &str) -> Result<()>;

    /// Auth lifecycle events; every subscriber sees every event
    fn auth_events(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Uploaded assets (avatars, certificate files)
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, bucket: &str, path: &str, bytes: Vec<u8>, upsert: bool) -> Result<()>;

    /// Public URL for a stored object
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
