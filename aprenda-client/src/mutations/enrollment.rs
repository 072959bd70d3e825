//! Enrolling into a course

use chrono::Utc;
use serde_json::json;

use aprenda_core::{CourseId, Enrollment};

use crate::error::Result;
use crate::queries::courses::course_details_key;
use crate::queries::enrollments::enrolled_courses_key;
use crate::queries;
use crate::state::AppState;

/// Enroll the signed-in user into a course.
///
/// Without a live session this returns `SignInRequired` before touching
/// the gateway; the caller routes to the login page. The store rejects a
/// second enrollment for the same (user, course) pair, and callers are
/// expected to disable the action once `is_enrolled` is true.
pub async fn enroll(state: &AppState, course_id: CourseId) -> Result<Enrollment> {
    let user = state.auth.require_user()?;

    let row = json!({
        "user_id": user.id.to_string(),
        "course_id": course_id.to_string(),
        "start_date": Utc::now(),
        "completion_date": null,
        "status": "active",
    });
    let stored = state.datastore.insert("course_enrollments", row).await?;

    state
        .cache
        .invalidate(&course_details_key(course_id, Some(user.id)));
    state.cache.invalidate(&enrolled_courses_key(user.id));

    queries::decode(stored)
}
