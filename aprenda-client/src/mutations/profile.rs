//! Profile edits: the user's own profile form and the admin role change

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use aprenda_core::{Filter, GatewayError, Role, UserId};

use crate::error::{ClientError, Result};
use crate::queries::admin::admin_users_key;
use crate::queries::profiles::{leaderboard_key, profile_key};
use crate::state::AppState;

/// A new avatar image to store before the profile row is patched
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub bytes: Vec<u8>,
    /// File extension without the dot, e.g. `png`
    pub extension: String,
}

/// Fields of the profile form
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub full_name: String,
    pub cpf: Option<String>,
    pub avatar: Option<AvatarUpload>,
}

/// Update the signed-in user's profile; returns the new avatar URL when
/// one was uploaded
pub async fn update_profile(state: &AppState, update: ProfileUpdate) -> Result<Option<String>> {
    let user = state.auth.require_user()?;

    if update.full_name.trim().is_empty() {
        return Err(ClientError::Validation("full name is required".into()));
    }

    let mut avatar_url = None;
    if let Some(avatar) = update.avatar {
        let path = format!("{}/{}.{}", user.id, Uuid::new_v4(), avatar.extension);
        state
            .files
            .upload("avatars", &path, avatar.bytes, true)
            .await?;
        avatar_url = Some(state.files.public_url("avatars", &path));
    }

    let mut patch = json!({
        "full_name": update.full_name,
        "cpf": update.cpf,
        "updated_at": Utc::now(),
    });
    if let Some(url) = &avatar_url {
        patch["avatar_url"] = json!(url);
    }

    let changed = state
        .datastore
        .update(
            "profiles",
            &[Filter::Eq("id".into(), json!(user.id.to_string()))],
            patch,
        )
        .await?;
    if changed == 0 {
        return Err(GatewayError::not_found("profiles").into());
    }

    state.cache.invalidate(&profile_key(user.id));
    state.cache.invalidate(&leaderboard_key());
    state.cache.invalidate(&admin_users_key());
    Ok(avatar_url)
}

/// Admin edit: change another user's role
pub async fn set_user_role(state: &AppState, user_id: UserId, role: Role) -> Result<()> {
    let changed = state
        .datastore
        .update(
            "profiles",
            &[Filter::Eq("id".into(), json!(user_id.to_string()))],
            json!({ "role": role.as_str() }),
        )
        .await?;
    if changed == 0 {
        return Err(GatewayError::not_found("profiles").into());
    }

    state.cache.invalidate(&admin_users_key());
    state.cache.invalidate(&profile_key(user_id));
    Ok(())
}
