//! Module completion and quiz answers

use chrono::{DateTime, Utc};
use serde_json::json;

use aprenda_core::{CourseId, ModuleId, ModuleProgress, QuestionId, QuizAnswer};

use crate::error::Result;
use crate::queries;
use crate::queries::achievements::{user_badges_key, user_certificates_key};
use crate::queries::courses::course_details_key;
use crate::state::AppState;

/// Flip a module's completion state for the signed-in user.
///
/// Upserts on (user_id, module_id): completing stamps `completed_at`,
/// un-completing clears it. Badge and certificate reads are invalidated
/// too since completion can trigger issuance on the backend.
pub async fn toggle_module_completion(
    state: &AppState,
    course_id: CourseId,
    module_id: ModuleId,
    currently_completed: bool,
) -> Result<ModuleProgress> {
    let user = state.auth.require_user()?;

    let now_completed = !currently_completed;
    let completed_at: Option<DateTime<Utc>> = now_completed.then(|| Utc::now());
    let row = json!({
        "user_id": user.id.to_string(),
        "module_id": module_id.to_string(),
        "is_completed": now_completed,
        "completed_at": completed_at,
    });
    let stored = state
        .datastore
        .upsert("course_progress", row, &["user_id", "module_id"])
        .await?;

    state
        .cache
        .invalidate(&course_details_key(course_id, Some(user.id)));
    state.cache.invalidate(&user_badges_key(user.id));
    state.cache.invalidate(&user_certificates_key(user.id));

    queries::decode(stored)
}

/// Record one answered quiz question for the signed-in user
pub async fn record_quiz_answer(
    state: &AppState,
    question_id: QuestionId,
    selected_option_index: usize,
    is_correct: bool,
) -> Result<QuizAnswer> {
    let user = state.auth.require_user()?;

    let row = json!({
        "user_id": user.id.to_string(),
        "question_id": question_id.to_string(),
        "selected_option_index": selected_option_index,
        "is_correct": is_correct,
    });
    let stored = state.datastore.insert("user_answers", row).await?;
    queries::decode(stored)
}
