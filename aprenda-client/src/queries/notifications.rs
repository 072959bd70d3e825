//! The signed-in user's notifications

use std::sync::Arc;

use serde_json::Value;

use aprenda_core::{Notification, Query, QueryKey, UserId};

use crate::cache::FetchOptions;
use crate::error::Result;
use crate::queries::decode_or_default;
use crate::state::AppState;

/// Prefix covering every notification read of one user, whatever the
/// limit; this is what mutations and the realtime bridge invalidate
pub fn user_notifications_prefix(user_id: UserId) -> QueryKey {
    QueryKey::root("userNotifications").push(user_id)
}

pub fn user_notifications_key(user_id: UserId, limit: Option<usize>) -> QueryKey {
    user_notifications_prefix(user_id).push(limit)
}

/// Notifications newest first; empty when nobody is signed in
pub async fn user_notifications(
    state: &AppState,
    limit: Option<usize>,
) -> Result<Vec<Notification>> {
    let Some(user_id) = state.auth.user_id() else {
        return Ok(Vec::new());
    };

    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            user_notifications_key(user_id, limit),
            FetchOptions::default(),
            move || async move {
                let mut query = Query::table("notifications")
                    .eq("user_id", user_id.to_string())
                    .order("created_at", false);
                if let Some(limit) = limit {
                    query = query.limit(limit);
                }
                let rows = datastore.select(&query).await?;
                Ok(Value::Array(rows))
            },
        )
        .await?;
    decode_or_default(value)
}

/// How many of the given notifications are still unread
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}
