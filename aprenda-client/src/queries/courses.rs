//! Catalog reads: course search, categories, and the course detail view

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use aprenda_core::{Course, CourseId, CourseModule, ModuleId, Query, QueryKey, UserId};

use crate::cache::FetchOptions;
use crate::error::{ClientError, Result};
use crate::queries::{decode, decode_or_default};
use crate::state::AppState;

/// Filters accepted by the catalog listing
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    pub search: Option<String>,
    /// `None` and `"all"` both mean "every category"
    pub category: Option<String>,
    pub limit: Option<usize>,
}

pub fn courses_key(filter: &CourseFilter) -> QueryKey {
    QueryKey::root("courses")
        .push(filter.search.clone())
        .push(filter.category.clone())
        .push(filter.limit)
}

/// Course catalog, title/instructor search case-insensitive, sorted by
/// title
pub async fn courses(state: &AppState, filter: &CourseFilter) -> Result<Vec<Course>> {
    let datastore = Arc::clone(&state.datastore);
    let filter_owned = filter.clone();
    let value = state
        .cache
        .fetch(courses_key(filter), FetchOptions::default(), move || async move {
            let mut query = Query::table("courses").order("title", true);
            if let Some(term) = &filter_owned.search {
                if !term.is_empty() {
                    query = query.ilike_any(&["title", "instructor"], term);
                }
            }
            if let Some(category) = &filter_owned.category {
                if category != "all" {
                    query = query.eq("category", category.clone());
                }
            }
            if let Some(limit) = filter_owned.limit {
                query = query.limit(limit);
            }
            let rows = datastore.select(&query).await?;
            Ok(Value::Array(rows))
        })
        .await?;
    decode_or_default(value)
}

pub fn course_categories_key() -> QueryKey {
    QueryKey::root("courseCategories")
}

/// Distinct non-empty course categories
pub async fn course_categories(state: &AppState) -> Result<Vec<String>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(course_categories_key(), FetchOptions::default(), move || async move {
            let query = Query::table("courses")
                .columns("category")
                .not_null("category");
            let rows = datastore.select(&query).await?;
            let mut categories: Vec<String> = Vec::new();
            for row in rows {
                if let Some(category) = row.get("category").and_then(Value::as_str) {
                    if !category.is_empty() && !categories.iter().any(|c| c == category) {
                        categories.push(category.to_string());
                    }
                }
            }
            Ok(Value::from(categories))
        })
        .await?;
    decode_or_default(value)
}

/// A module plus the viewer's completion flag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleWithProgress {
    #[serde(flatten)]
    pub module: CourseModule,
    pub is_completed: bool,
}

/// The course detail view. Enrollment state gates content visibility,
/// not data availability: a non-enrolled viewer sees the course with an
/// empty module list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseDetails {
    pub course: Option<Course>,
    pub modules: Vec<ModuleWithProgress>,
    pub is_enrolled: bool,
    pub completion_percentage: u8,
}

pub fn course_details_key(course_id: CourseId, viewer: Option<UserId>) -> QueryKey {
    QueryKey::root("courseDetails").push(course_id).push(viewer)
}

pub async fn course_details(state: &AppState, course_id: CourseId) -> Result<CourseDetails> {
    let viewer = state.auth.user_id();
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            course_details_key(course_id, viewer),
            FetchOptions::default(),
            move || async move {
                let course_row = datastore
                    .select_one(&Query::table("courses").eq("id", course_id.to_string()))
                    .await?;
                let course: Option<Course> = course_row.map(decode).transpose()?;

                let mut details = CourseDetails {
                    course,
                    ..Default::default()
                };

                if let Some(user_id) = viewer {
                    let enrollment = datastore
                        .select_one(
                            &Query::table("course_enrollments")
                                .eq("user_id", user_id.to_string())
                                .eq("course_id", course_id.to_string()),
                        )
                        .await?;

                    if enrollment.is_some() {
                        details.is_enrolled = true;

                        let module_rows = datastore
                            .select(
                                &Query::table("modules")
                                    .eq("course_id", course_id.to_string())
                                    .order("module_order", true),
                            )
                            .await?;
                        let modules: Vec<CourseModule> = decode(Value::Array(module_rows))?;

                        let progress_rows = datastore
                            .select(
                                &Query::table("course_progress")
                                    .eq("user_id", user_id.to_string()),
                            )
                            .await?;
                        let completed = completed_module_ids(&progress_rows);

                        details.modules = attach_progress(modules, &completed);
                        details.completion_percentage =
                            completion_percentage(&details.modules);
                    }
                }

                serde_json::to_value(&details).map_err(ClientError::decode)
            },
        )
        .await?;
    decode_or_default(value)
}

/// Typed projection: fold the viewer's progress rows into the module list
fn attach_progress(
    modules: Vec<CourseModule>,
    completed: &HashSet<ModuleId>,
) -> Vec<ModuleWithProgress> {
    modules
        .into_iter()
        .map(|module| ModuleWithProgress {
            is_completed: completed.contains(&module.id),
            module,
        })
        .collect()
}

fn completed_module_ids(progress_rows: &[Value]) -> HashSet<ModuleId> {
    progress_rows
        .iter()
        .filter(|row| row.get("is_completed").and_then(Value::as_bool) == Some(true))
        .filter_map(|row| {
            row.get("module_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(ModuleId)
        })
        .collect()
}

fn completion_percentage(modules: &[ModuleWithProgress]) -> u8 {
    if modules.is_empty() {
        return 0;
    }
    let completed = modules.iter().filter(|m| m.is_completed).count();
    ((completed as f64 / modules.len() as f64) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn module(order: i32) -> CourseModule {
        CourseModule {
            id: ModuleId(Uuid::new_v4()),
            course_id: CourseId(Uuid::new_v4()),
            title: format!("module {order}"),
            description: None,
            video_url: None,
            pdf_url: None,
            module_order: order,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_progress_projection_marks_completed_modules() {
        let modules = vec![module(1), module(2), module(3)];
        let completed: HashSet<ModuleId> = [modules[0].id, modules[2].id].into();

        let projected = attach_progress(modules, &completed);
        assert!(projected[0].is_completed);
        assert!(!projected[1].is_completed);
        assert!(projected[2].is_completed);
    }

    #[test]
    fn test_completion_percentage_rounds() {
        let modules = attach_progress(
            vec![module(1), module(2), module(3)],
            &HashSet::new(),
        );
        assert_eq!(completion_percentage(&modules), 0);

        let mut one_done = modules;
        one_done[0].is_completed = true;
        assert_eq!(completion_percentage(&one_done), 33);
    }

    #[test]
    fn test_empty_course_is_zero_percent() {
        assert_eq!(completion_percentage(&[]), 0);
    }
}
