//! Profile reads: the signed-in user's own profile and the public
//! leaderboard

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use aprenda_core::{Profile, Query, QueryKey, UserId};

use crate::cache::FetchOptions;
use crate::error::Result;
use crate::queries::{decode, decode_or_default};
use crate::state::AppState;

pub fn profile_key(user_id: UserId) -> QueryKey {
    QueryKey::root("profile").push(user_id)
}

/// The signed-in user's profile; `None` when nobody is signed in
pub async fn profile_data(state: &AppState) -> Result<Option<Profile>> {
    let Some(user_id) = state.auth.user_id() else {
        return Ok(None);
    };

    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            profile_key(user_id),
            FetchOptions::default(),
            move || async move {
                let row = datastore
                    .select_one(&Query::table("profiles").eq("id", user_id.to_string()))
                    .await?;
                Ok(row.unwrap_or(Value::Null))
            },
        )
        .await?;

    match value {
        Some(Value::Null) | None => Ok(None),
        Some(value) => decode(value).map(Some),
    }
}

/// One leaderboard row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: UserId,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub points: i64,
}

pub fn leaderboard_key() -> QueryKey {
    QueryKey::root("leaderboard")
}

/// Top ten profiles by points
pub async fn leaderboard(state: &AppState) -> Result<Vec<LeaderboardEntry>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(leaderboard_key(), FetchOptions::default(), move || async move {
            let rows = datastore
                .select(
                    &Query::table("profiles")
                        .columns("id, full_name, avatar_url, points")
                        .order("points", false)
                        .limit(10),
                )
                .await?;
            Ok(Value::Array(rows))
        })
        .await?;
    decode_or_default(value)
}
