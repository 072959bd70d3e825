//! Admin catalog management: courses, modules, and quiz questions

use serde_json::json;

use aprenda_core::{
    Course, CourseId, CourseModule, Filter, GatewayError, ModuleId, Question, QuestionId, QueryKey,
};

use crate::error::{ClientError, Result};
use crate::queries;
use crate::queries::admin::{admin_courses_key, admin_modules_key, admin_questions_key};
use crate::queries::courses::course_categories_key;
use crate::queries::quiz::module_questions_key;
use crate::state::AppState;

/// Editable course fields
#[derive(Debug, Clone, Default)]
pub struct CourseDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub instructor: Option<String>,
    pub image_url: Option<String>,
}

impl CourseDraft {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ClientError::Validation("course title is required".into()));
        }
        Ok(())
    }
}

fn course_reads(cache: &crate::cache::QueryCache) {
    cache.invalidate(&admin_courses_key());
    cache.invalidate(&QueryKey::root("courses"));
    cache.invalidate(&course_categories_key());
}

pub async fn create_course(state: &AppState, draft: &CourseDraft) -> Result<Course> {
    draft.validate()?;

    let stored = state
        .datastore
        .insert(
            "courses",
            json!({
                "title": draft.title,
                "description": draft.description,
                "category": draft.category,
                "instructor": draft.instructor,
                "image_url": draft.image_url,
            }),
        )
        .await?;

    course_reads(&state.cache);
    queries::decode(stored)
}

pub async fn update_course(
    state: &AppState,
    course_id: CourseId,
    draft: &CourseDraft,
) -> Result<()> {
    draft.validate()?;

    let changed = state
        .datastore
        .update(
            "courses",
            &[Filter::Eq("id".into(), json!(course_id.to_string()))],
            json!({
                "title": draft.title,
                "description": draft.description,
                "category": draft.category,
                "instructor": draft.instructor,
                "image_url": draft.image_url,
            }),
        )
        .await?;
    if changed == 0 {
        return Err(GatewayError::not_found("courses").into());
    }

    course_reads(&state.cache);
    state
        .cache
        .invalidate(&QueryKey::root("courseDetails").push(course_id));
    Ok(())
}

pub async fn delete_course(state: &AppState, course_id: CourseId) -> Result<()> {
    state
        .datastore
        .delete(
            "courses",
            &[Filter::Eq("id".into(), json!(course_id.to_string()))],
        )
        .await?;

    course_reads(&state.cache);
    state
        .cache
        .invalidate(&QueryKey::root("courseDetails").push(course_id));
    state.cache.invalidate(&admin_modules_key(course_id));
    Ok(())
}

/// Editable module fields
#[derive(Debug, Clone, Default)]
pub struct ModuleDraft {
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub pdf_url: Option<String>,
    pub module_order: i32,
}

impl ModuleDraft {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(ClientError::Validation("module title is required".into()));
        }
        Ok(())
    }
}

fn module_reads(state: &AppState, course_id: CourseId) {
    state.cache.invalidate(&admin_modules_key(course_id));
    state
        .cache
        .invalidate(&QueryKey::root("courseDetails").push(course_id));
}

pub async fn create_module(
    state: &AppState,
    course_id: CourseId,
    draft: &ModuleDraft,
) -> Result<CourseModule> {
    draft.validate()?;

    let stored = state
        .datastore
        .insert(
            "modules",
            json!({
                "course_id": course_id.to_string(),
                "title": draft.title,
                "description": draft.description,
                "video_url": draft.video_url,
                "pdf_url": draft.pdf_url,
                "module_order": draft.module_order,
            }),
        )
        .await?;

    module_reads(state, course_id);
    queries::decode(stored)
}

pub async fn update_module(
    state: &AppState,
    course_id: CourseId,
    module_id: ModuleId,
    draft: &ModuleDraft,
) -> Result<()> {
    draft.validate()?;

    let changed = state
        .datastore
        .update(
            "modules",
            &[Filter::Eq("id".into(), json!(module_id.to_string()))],
            json!({
                "title": draft.title,
                "description": draft.description,
                "video_url": draft.video_url,
                "pdf_url": draft.pdf_url,
                "module_order": draft.module_order,
            }),
        )
        .await?;
    if changed == 0 {
        return Err(GatewayError::not_found("modules").into());
    }

    module_reads(state, course_id);
    Ok(())
}

pub async fn delete_module(
    state: &AppState,
    course_id: CourseId,
    module_id: ModuleId,
) -> Result<()> {
    state
        .datastore
        .delete(
            "modules",
            &[Filter::Eq("id".into(), json!(module_id.to_string()))],
        )
        .await?;

    module_reads(state, course_id);
    // questions of the deleted module are gone with it
    state.cache.invalidate(&QueryKey::root("adminQuestions"));
    state.cache.invalidate(&QueryKey::root("moduleQuestions"));
    Ok(())
}

/// Editable question fields
#[derive(Debug, Clone, Default)]
pub struct QuestionDraft {
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
}

fn question_reads(state: &AppState, module_id: ModuleId) {
    state.cache.invalidate(&admin_questions_key(module_id));
    state.cache.invalidate(&module_questions_key(module_id));
}

pub async fn create_question(
    state: &AppState,
    module_id: ModuleId,
    draft: &QuestionDraft,
) -> Result<Question> {
    aprenda_core::Question::validate(
        &draft.question_text,
        &draft.options,
        draft.correct_option_index,
    )?;

    let stored = state
        .datastore
        .insert(
            "questions",
            json!({
                "module_id": module_id.to_string(),
                "question_text": draft.question_text,
                "options": draft.options,
                "correct_option_index": draft.correct_option_index,
            }),
        )
        .await?;

    question_reads(state, module_id);
    queries::decode(stored)
}

pub async fn update_question(
    state: &AppState,
    module_id: ModuleId,
    question_id: QuestionId,
    draft: &QuestionDraft,
) -> Result<()> {
    aprenda_core::Question::validate(
        &draft.question_text,
        &draft.options,
        draft.correct_option_index,
    )?;

    let changed = state
        .datastore
        .update(
            "questions",
            &[Filter::Eq("id".into(), json!(question_id.to_string()))],
            json!({
                "question_text": draft.question_text,
                "options": draft.options,
                "correct_option_index": draft.correct_option_index,
            }),
        )
        .await?;
    if changed == 0 {
        return Err(GatewayError::not_found("questions").into());
    }

    question_reads(state, module_id);
    Ok(())
}

pub async fn delete_question(
    state: &AppState,
    module_id: ModuleId,
    question_id: QuestionId,
) -> Result<()> {
    state
        .datastore
        .delete(
            "questions",
            &[Filter::Eq("id".into(), json!(question_id.to_string()))],
        )
        .await?;

    question_reads(state, module_id);
    Ok(())
}
