//! Aprenda Client
//!
//! The data-access layer of the Aprenda course platform. Everything here
//! follows one convention: reads go through the process-wide [`QueryCache`]
//! keyed by a [`aprenda_core::QueryKey`], writes are single-operation
//! mutation actions that invalidate every affected key prefix after the
//! write lands, and "who is signed in" lives in one place, the
//! [`AuthSession`].

pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod mutations;
pub mod queries;
pub mod realtime;
pub mod routes;
pub mod state;

pub use auth::{AuthPhase, AuthSession, AuthSnapshot};
pub use cache::{FetchOptions, QueryCache};
pub use config::Config;
pub use error::{ClientError, Result};
pub use gateway::{AuthApi, Datastore, FileStore, InMemoryGateway, RestGateway};
pub use realtime::NotificationWatcher;
pub use state::AppState;
