//! Notification writes: marking read and the admin send action

use serde_json::{json, Value};

use aprenda_core::{Filter, NotificationId, NotificationKind, Query, QueryKey, UserId};

use crate::error::{ClientError, Result};
use crate::queries::notifications::user_notifications_prefix;
use crate::state::AppState;

/// Mark one notification read
pub async fn mark_notification_read(
    state: &AppState,
    notification_id: NotificationId,
) -> Result<()> {
    let user = state.auth.require_user()?;

    state
        .datastore
        .update(
            "notifications",
            &[Filter::Eq("id".into(), json!(notification_id.to_string()))],
            json!({ "is_read": true }),
        )
        .await?;

    state.cache.invalidate(&user_notifications_prefix(user.id));
    Ok(())
}

/// Mark every unread notification of the signed-in user read; returns
/// how many rows changed
pub async fn mark_all_notifications_read(state: &AppState) -> Result<u64> {
    let user = state.auth.require_user()?;

    let changed = state
        .datastore
        .update(
            "notifications",
            &[
                Filter::Eq("user_id".into(), json!(user.id.to_string())),
                Filter::Eq("is_read".into(), json!(false)),
            ],
            json!({ "is_read": true }),
        )
        .await?;

    state.cache.invalidate(&user_notifications_prefix(user.id));
    Ok(changed)
}

/// Send a notification from the admin console; returns the number of
/// rows inserted.
///
/// With a recipient this is one insert. Without one it fans out: all
/// profile ids are read first, then one row is inserted per profile.
/// The fan-out is not transactional: if an insert fails partway, rows
/// already inserted remain and the error reports how far delivery got.
pub async fn send_notification(
    state: &AppState,
    recipient: Option<UserId>,
    message: &str,
    kind: NotificationKind,
) -> Result<usize> {
    if message.trim().chars().count() < 10 {
        return Err(ClientError::Validation(
            "notification message must be at least 10 characters".to_string(),
        ));
    }

    let row_for = |user_id: &str| {
        json!({
            "user_id": user_id,
            "message": message,
            "type": kind.as_str(),
            "is_read": false,
        })
    };

    match recipient {
        Some(user_id) => {
            state
                .datastore
                .insert("notifications", row_for(&user_id.to_string()))
                .await?;
            state.cache.invalidate(&user_notifications_prefix(user_id));
            Ok(1)
        }
        None => {
            let profiles = state
                .datastore
                .select(&Query::table("profiles").columns("id"))
                .await?;
            let ids: Vec<String> = profiles
                .iter()
                .filter_map(|row| row.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect();

            let total = ids.len();
            let mut delivered = 0;
            for id in &ids {
                if let Err(err) = state
                    .datastore
                    .insert("notifications", row_for(id))
                    .await
                {
                    return Err(ClientError::BroadcastIncomplete {
                        delivered,
                        total,
                        reason: err.to_string(),
                    });
                }
                delivered += 1;
            }

            // every recipient's notification reads are now out of date
            state.cache.invalidate(&QueryKey::root("userNotifications"));
            Ok(delivered)
        }
    }
}
