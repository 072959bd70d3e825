//! Quiz questions for a module

use std::sync::Arc;

use serde_json::Value;

use aprenda_core::{ModuleId, Query, QueryKey, Question};

use crate::cache::FetchOptions;
use crate::error::Result;
use crate::queries::decode_or_default;
use crate::state::AppState;

pub fn module_questions_key(module_id: ModuleId) -> QueryKey {
    QueryKey::root("moduleQuestions").push(module_id)
}

/// Questions of one module in creation order
pub async fn module_questions(state: &AppState, module_id: ModuleId) -> Result<Vec<Question>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            module_questions_key(module_id),
            FetchOptions::default(),
            move || async move {
                let rows = datastore
                    .select(
                        &Query::table("questions")
                            .eq("module_id", module_id.to_string())
                            .order("created_at", true),
                    )
                    .await?;
                Ok(Value::Array(rows))
            },
        )
        .await?;
    decode_or_default(value)
}

/// Grade one selected option against its question
pub fn is_correct_answer(question: &Question, selected_option_index: usize) -> bool {
    question.correct_option_index == selected_option_index
}
