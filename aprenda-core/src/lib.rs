//! Aprenda Core Library
//!
//! Domain types for the Aprenda course platform client:
//! - entity models with their typed ids and client-side validation
//! - the query descriptor language consumed by gateway implementations
//! - cache keys, auth events, and table change events
//! - the gateway error taxonomy

pub mod account;
pub mod catalog;
pub mod engagement;
pub mod error;
pub mod events;
pub mod key;
pub mod messaging;
pub mod query;

pub use account::{AuthUser, MonthlySignups, Profile, Role, Session, UserId};
pub use catalog::{Course, CourseId, CourseModule, InvalidQuestion, ModuleId, Question, QuestionId};
pub use engagement::{
    BadgeAward, Certificate, CertificateId, Enrollment, EnrollmentId, ModuleProgress, QuizAnswer,
};
pub use error::GatewayError;
pub use events::{AuthEvent, ChangeEvent, ChangeOp};
pub use key::{KeyPart, QueryKey};
pub use messaging::{Feedback, FeedbackId, Notification, NotificationId, NotificationKind};
pub use query::{Filter, OrderBy, Query};

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
