//! Admin console reads: managed catalogs, users, feedback, and the
//! dashboard aggregates

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use aprenda_core::{
    Course, CourseId, CourseModule, Feedback, ModuleId, MonthlySignups, Profile, Query, QueryKey,
    Question, Role, UserId,
};

use crate::cache::FetchOptions;
use crate::error::{ClientError, Result};
use crate::queries::{decode, decode_or_default};
use crate::state::AppState;

pub fn admin_courses_key() -> QueryKey {
    QueryKey::root("adminCourses")
}

/// Every course, newest first
pub async fn admin_courses(state: &AppState) -> Result<Vec<Course>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(admin_courses_key(), FetchOptions::default(), move || async move {
            let rows = datastore
                .select(&Query::table("courses").order("created_at", false))
                .await?;
            Ok(Value::Array(rows))
        })
        .await?;
    decode_or_default(value)
}

pub fn admin_modules_key(course_id: CourseId) -> QueryKey {
    QueryKey::root("adminModules").push(course_id)
}

/// Modules of one course in display order
pub async fn admin_modules(state: &AppState, course_id: CourseId) -> Result<Vec<CourseModule>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            admin_modules_key(course_id),
            FetchOptions::default(),
            move || async move {
                let rows = datastore
                    .select(
                        &Query::table("modules")
                            .eq("course_id", course_id.to_string())
                            .order("module_order", true),
                    )
                    .await?;
                Ok(Value::Array(rows))
            },
        )
        .await?;
    decode_or_default(value)
}

pub fn admin_questions_key(module_id: ModuleId) -> QueryKey {
    QueryKey::root("adminQuestions").push(module_id)
}

/// Questions of one module in creation order
pub async fn admin_questions(state: &AppState, module_id: ModuleId) -> Result<Vec<Question>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            admin_questions_key(module_id),
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

/// One managed user: the profile merged with the account email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminUser {
    pub id: UserId,
    pub full_name: Option<String>,
    pub cpf: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub points: i64,
    pub email: Option<String>,
}

pub fn admin_users_key() -> QueryKey {
    QueryKey::root("adminUsers")
}

/// Profiles sorted by name, emails merged in from the
/// `get_users_with_email` procedure. A failing procedure degrades to
/// profiles without emails instead of failing the read.
pub async fn admin_users(state: &AppState) -> Result<Vec<AdminUser>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(admin_users_key(), FetchOptions::default(), move || async move {
            let rows = datastore
                .select(&Query::table("profiles").order("full_name", true))
                .await?;
            let profiles: Vec<Profile> = decode(Value::Array(rows))?;

            let emails: HashMap<UserId, String> =
                match datastore.rpc("get_users_with_email", json!({})).await {
                    Ok(Value::Array(rows)) => rows
                        .iter()
                        .filter_map(|row| {
                            let id = row
                                .get("id")
                                .and_then(Value::as_str)
                                .and_then(|s| Uuid::parse_str(s).ok())
                                .map(UserId)?;
                            let email = row.get("email").and_then(Value::as_str)?;
                            Some((id, email.to_string()))
                        })
                        .collect(),
                    Ok(_) => HashMap::new(),
                    Err(err) => {
                        tracing::error!(error = %err, "user email lookup failed");
                        HashMap::new()
                    }
                };

            let users: Vec<AdminUser> = profiles
                .into_iter()
                .map(|profile| AdminUser {
                    email: emails.get(&profile.id).cloned(),
                    id: profile.id,
                    full_name: profile.full_name,
                    cpf: profile.cpf,
                    role: profile.role,
                    points: profile.points,
                })
                .collect();

            serde_json::to_value(&users).map_err(ClientError::decode)
        })
        .await?;
    decode_or_default(value)
}

pub fn admin_feedbacks_key() -> QueryKey {
    QueryKey::root("adminFeedbacks")
}

/// Every feedback entry, newest first
pub async fn admin_feedbacks(state: &AppState) -> Result<Vec<Feedback>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(admin_feedbacks_key(), FetchOptions::default(), move || async move {
            let rows = datastore
                .select(&Query::table("feedbacks").order("created_at", false))
                .await?;
            Ok(Value::Array(rows))
        })
        .await?;
    decode_or_default(value)
}

/// Headline counts for the dashboard
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminStats {
    pub users: u64,
    pub courses: u64,
    pub feedbacks: u64,
}

/// Everything the admin dashboard renders
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub stats: AdminStats,
    pub recent_feedbacks: Vec<Feedback>,
    pub monthly_signups: Vec<MonthlySignups>,
}

pub fn admin_dashboard_key() -> QueryKey {
    QueryKey::root("adminDashboardData")
}

pub async fn admin_dashboard(state: &AppState) -> Result<AdminDashboard> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(admin_dashboard_key(), FetchOptions::default(), move || async move {
            let users = datastore.count(&Query::table("profiles")).await?;
            let courses = datastore.count(&Query::table("courses")).await?;
            let feedbacks = datastore.count(&Query::table("feedbacks")).await?;

            let recent_rows = datastore
                .select(
                    &Query::table("feedbacks")
                        .order("created_at", false)
                        .limit(5),
                )
                .await?;
            let recent_feedbacks: Vec<Feedback> = decode(Value::Array(recent_rows))?;

            let monthly_signups: Vec<MonthlySignups> =
                decode(datastore.rpc("get_monthly_signups", json!({})).await?)?;

            let dashboard = AdminDashboard {
                stats: AdminStats {
                    users,
                    courses,
                    feedbacks,
                },
                recent_feedbacks,
                monthly_signups,
            };
            serde_json::to_value(&dashboard).map_err(ClientError::decode)
        })
        .await?;
    decode_or_default(value)
}
