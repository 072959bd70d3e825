//! The signed-in user's enrollments, joined with course summaries

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aprenda_core::{Course, CourseId, Enrollment, EnrollmentId, Query, QueryKey, UserId};

use crate::cache::FetchOptions;
use crate::error::{ClientError, Result};
use crate::queries::{decode, decode_or_default};
use crate::state::AppState;

/// One dashboard row: the enrollment plus its course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrolledCourse {
    pub id: EnrollmentId,
    pub start_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: String,
    pub course: Course,
}

pub fn enrolled_courses_key(user_id: UserId) -> QueryKey {
    QueryKey::root("enrolledCourses").push(user_id)
}

/// Enrollments newest first; empty (not an error) when nobody is signed
/// in or nothing is enrolled
pub async fn enrolled_courses(state: &AppState) -> Result<Vec<EnrolledCourse>> {
    let Some(user_id) = state.auth.user_id() else {
        return Ok(Vec::new());
    };

    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            enrolled_courses_key(user_id),
            FetchOptions::default(),
            move || async move {
                let rows = datastore
                    .select(
                        &Query::table("course_enrollments")
                            .eq("user_id", user_id.to_string())
                            .order("start_date", false),
                    )
                    .await?;
                let enrollments: Vec<Enrollment> = decode(Value::Array(rows))?;
                if enrollments.is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }

                let course_ids: Vec<String> = enrollments
                    .iter()
                    .map(|e| e.course_id.to_string())
                    .collect();
                let course_rows = datastore
                    .select(&Query::table("courses").is_in("id", course_ids))
                    .await?;
                let courses: Vec<Course> = decode(Value::Array(course_rows))?;
                let by_id: HashMap<CourseId, Course> =
                    courses.into_iter().map(|c| (c.id, c)).collect();

                let mut joined = Vec::with_capacity(enrollments.len());
                for enrollment in enrollments {
                    match by_id.get(&enrollment.course_id) {
                        Some(course) => joined.push(EnrolledCourse {
                            id: enrollment.id,
                            start_date: enrollment.start_date,
                            completion_date: enrollment.completion_date,
                            status: enrollment.status,
                            course: course.clone(),
                        }),
                        None => {
                            tracing::warn!(
                                enrollment = %enrollment.id,
                                course = %enrollment.course_id,
                                "enrollment references a missing course"
                            );
                        }
                    }
                }

                serde_json::to_value(&joined).map_err(ClientError::decode)
            },
        )
        .await?;
    decode_or_default(value)
}
