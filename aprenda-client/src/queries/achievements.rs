//! Badges and certificates earned by the signed-in user, plus the public
//! certificate verification view

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aprenda_core::{
    BadgeAward, Certificate, CertificateId, Course, CourseId, Enrollment, EnrollmentId, Profile,
    Query, QueryKey, UserId,
};

use crate::cache::FetchOptions;
use crate::error::{ClientError, Result};
use crate::queries::{decode, decode_or_default};
use crate::state::AppState;

pub fn user_badges_key(user_id: UserId) -> QueryKey {
    QueryKey::root("userBadges").push(user_id)
}

/// Badges newest first; empty when nobody is signed in
pub async fn user_badges(state: &AppState) -> Result<Vec<BadgeAward>> {
    let Some(user_id) = state.auth.user_id() else {
        return Ok(Vec::new());
    };

    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            user_badges_key(user_id),
            FetchOptions::default(),
            move || async move {
                let rows = datastore
                    .select(
                        &Query::table("user_badges")
                            .eq("user_id", user_id.to_string())
                            .order("awarded_at", false),
                    )
                    .await?;
                Ok(Value::Array(rows))
            },
        )
        .await?;
    decode_or_default(value)
}

/// One certificate of the signed-in user, labeled with its course title
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateSummary {
    pub id: CertificateId,
    pub created_at: DateTime<Utc>,
    pub course_title: Option<String>,
}

pub fn user_certificates_key(user_id: UserId) -> QueryKey {
    QueryKey::root("userCertificates").push(user_id)
}

/// Certificates issued for the signed-in user's enrollments
pub async fn user_certificates(state: &AppState) -> Result<Vec<CertificateSummary>> {
    let Some(user_id) = state.auth.user_id() else {
        return Ok(Vec::new());
    };

    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            user_certificates_key(user_id),
            FetchOptions::default(),
            move || async move {
                let enrollment_rows = datastore
                    .select(
                        &Query::table("course_enrollments")
                            .eq("user_id", user_id.to_string()),
                    )
                    .await?;
                let enrollments: Vec<Enrollment> = decode(Value::Array(enrollment_rows))?;
                if enrollments.is_empty() {
                    return Ok(Value::Array(Vec::new()));
                }

                let enrollment_ids: Vec<String> =
                    enrollments.iter().map(|e| e.id.to_string()).collect();
                let certificate_rows = datastore
                    .select(
                        &Query::table("certificates")
                            .is_in("enrollment_id", enrollment_ids),
                    )
                    .await?;
                let certificates: Vec<Certificate> = decode(Value::Array(certificate_rows))?;

                let course_ids: Vec<String> = enrollments
                    .iter()
                    .map(|e| e.course_id.to_string())
                    .collect();
                let course_rows = datastore
                    .select(&Query::table("courses").is_in("id", course_ids))
                    .await?;
                let courses: Vec<Course> = decode(Value::Array(course_rows))?;

                let course_by_id: HashMap<CourseId, &Course> =
                    courses.iter().map(|c| (c.id, c)).collect();
                let course_of_enrollment: HashMap<EnrollmentId, CourseId> = enrollments
                    .iter()
                    .map(|e| (e.id, e.course_id))
                    .collect();

                let summaries: Vec<CertificateSummary> = certificates
                    .into_iter()
                    .map(|certificate| {
                        let course_title = course_of_enrollment
                            .get(&certificate.enrollment_id)
                            .and_then(|course_id| course_by_id.get(course_id))
                            .map(|course| course.title.clone());
                        CertificateSummary {
                            id: certificate.id,
                            created_at: certificate.created_at,
                            course_title,
                        }
                    })
                    .collect();

                serde_json::to_value(&summaries).map_err(ClientError::decode)
            },
        )
        .await?;
    decode_or_default(value)
}

/// The public verification view of one certificate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateView {
    pub certificate: Certificate,
    pub course_title: Option<String>,
    pub instructor: Option<String>,
    pub recipient_name: Option<String>,
}

pub fn certificate_key(certificate_id: CertificateId) -> QueryKey {
    QueryKey::root("certificate").push(certificate_id)
}

/// Look up one certificate by id for the public viewer page
pub async fn certificate(
    state: &AppState,
    certificate_id: CertificateId,
) -> Result<Option<CertificateView>> {
    let datastore = Arc::clone(&state.datastore);
    let value = state
        .cache
        .fetch(
            certificate_key(certificate_id),
            FetchOptions::default(),
            move || async move {
                let Some(certificate_row) = datastore
                    .select_one(
                        &Query::table("certificates").eq("id", certificate_id.to_string()),
                    )
                    .await?
                else {
                    return Ok(Value::Null);
                };
                let certificate: Certificate = decode(certificate_row)?;

                let enrollment: Option<Enrollment> = datastore
                    .select_one(
                        &Query::table("course_enrollments")
                            .eq("id", certificate.enrollment_id.to_string()),
                    )
                    .await?
                    .map(decode)
                    .transpose()?;

                let mut view = CertificateView {
                    certificate,
                    course_title: None,
                    instructor: None,
                    recipient_name: None,
                };

                if let Some(enrollment) = enrollment {
                    let course: Option<Course> = datastore
                        .select_one(
                            &Query::table("courses")
                                .eq("id", enrollment.course_id.to_string()),
                        )
                        .await?
                        .map(decode)
                        .transpose()?;
                    if let Some(course) = course {
                        view.course_title = Some(course.title);
                        view.instructor = course.instructor;
                    }

                    let profile: Option<Profile> = datastore
                        .select_one(
                            &Query::table("profiles")
                                .eq("id", enrollment.user_id.to_string()),
                        )
                        .await?
                        .map(decode)
                        .transpose()?;
                    view.recipient_name = profile.and_then(|p| p.full_name);
                }

                serde_json::to_value(&view).map_err(ClientError::decode)
            },
        )
        .await?;

    match value {
        Some(Value::Null) | None => Ok(None),
        Some(value) => decode(value).map(Some),
    }
}
