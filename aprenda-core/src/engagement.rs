//! Engagement records: enrollments, per-module progress, quiz answers,
//! and the achievements issued by the backend (badges, certificates)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::UserId;
use crate::catalog::{CourseId, ModuleId, QuestionId};

/// Unique enrollment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub Uuid);

impl std::fmt::Display for EnrollmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique certificate identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateId(pub Uuid);

impl std::fmt::Display for CertificateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A user's registration into a course.
///
/// The store enforces at most one active enrollment per (user, course);
/// the client treats `is_enrolled` as a precondition and disables the
/// enroll action once it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub user_id: UserId,
    pub course_id: CourseId,
    pub start_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: String,
}

/// Per-user, per-module completion record; upserted on toggle with
/// (user_id, module_id) as the conflict key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleProgress {
    pub user_id: UserId,
    pub module_id: ModuleId,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A recorded quiz attempt, append-only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub user_id: UserId,
    pub question_id: QuestionId,
    pub selected_option_index: usize,
    pub is_correct: bool,
}

/// Issued by the backend when a course is completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub enrollment_id: EnrollmentId,
    pub verification_code: String,
    pub file_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Issued by the backend on achievement triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BadgeAward {
    pub id: Uuid,
    pub user_id: UserId,
    pub badge_name: String,
    pub awarded_at: DateTime<Utc>,
}
