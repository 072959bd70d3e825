//! Application state
//!
//! One `AppState` per process: the gateway capabilities, the query cache,
//! and the auth session, shared by every query and mutation.

use std::sync::Arc;

use crate::auth::AuthSession;
use crate::cache::QueryCache;
use crate::gateway::{AuthApi, Datastore, FileStore};

pub struct AppState {
    pub datastore: Arc<dyn Datastore>,
    pub auth_api: Arc<dyn AuthApi>,
    pub files: Arc<dyn FileStore>,
    pub cache: Arc<QueryCache>,
    pub auth: Arc<AuthSession>,
}

impl AppState {
    /// Wire up the shared services around the given gateway capabilities
    pub async fn new(
        datastore: Arc<dyn Datastore>,
        auth_api: Arc<dyn AuthApi>,
        files: Arc<dyn FileStore>,
    ) -> Arc<Self> {
        let cache = Arc::new(QueryCache::new());
        let auth = AuthSession::start(Arc::clone(&auth_api), Arc::clone(&datastore)).await;
        Arc::new(AppState {
            datastore,
            auth_api,
            files,
            cache,
            auth,
        })
    }
}
