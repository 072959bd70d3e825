//! Submitting feedback

use serde_json::json;

use aprenda_core::Feedback;

use crate::error::{ClientError, Result};
use crate::queries;
use crate::queries::admin::{admin_dashboard_key, admin_feedbacks_key};
use crate::state::AppState;

/// Submit a feedback entry; works signed out, but a signed-in user's id
/// is attached to the row
pub async fn submit_feedback(
    state: &AppState,
    name: &str,
    email: &str,
    message: &str,
) -> Result<Feedback> {
    if name.trim().is_empty() {
        return Err(ClientError::Validation("name is required".into()));
    }
    if !email.contains('@') {
        return Err(ClientError::Validation("email looks invalid".into()));
    }
    if message.trim().is_empty() {
        return Err(ClientError::Validation("message is required".into()));
    }

    let user_id = state.auth.user_id().map(|id| id.to_string());
    let stored = state
        .datastore
        .insert(
            "feedbacks",
            json!({
                "name": name,
                "email": email,
                "message": message,
                "user_id": user_id,
            }),
        )
        .await?;

    state.cache.invalidate(&admin_feedbacks_key());
    state.cache.invalidate(&admin_dashboard_key());
    queries::decode(stored)
}
