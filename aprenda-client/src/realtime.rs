//! Realtime-to-cache bridge
//!
//! Push events are degraded to cache invalidations on purpose: the
//! refetch that follows is the only code path that produces cache state,
//! so pushed payloads never need their own merge logic.

use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinHandle;

use aprenda_core::{ChangeOp, Filter};

use crate::error::Result;
use crate::queries::notifications::user_notifications_prefix;
use crate::state::AppState;

/// Watches the signed-in user's notification inserts and invalidates the
/// matching cache prefix for each one. The subscription lives as long as
/// this value: drop it on teardown or user change and the feed closes.
pub struct NotificationWatcher {
    task: JoinHandle<()>,
}

impl NotificationWatcher {
    /// Open the change feed for the current user. Returns `None` when
    /// nobody is signed in.
    pub async fn spawn(state: &Arc<AppState>) -> Result<Option<Self>> {
        let Some(user_id) = state.auth.user_id() else {
            return Ok(None);
        };

        let mut feed = state
            .datastore
            .changes(
                "notifications",
                Some(Filter::Eq("user_id".into(), json!(user_id.to_string()))),
            )
            .await?;

        let cache = Arc::clone(&state.cache);
        let task = tokio::spawn(async move {
            while let Some(event) = feed.recv().await {
                if event.op == ChangeOp::Insert {
                    tracing::debug!(%user_id, "notification pushed, invalidating");
                    cache.invalidate(&user_notifications_prefix(user_id));
                }
            }
        });

        Ok(Some(NotificationWatcher { task }))
    }
}

impl Drop for NotificationWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
