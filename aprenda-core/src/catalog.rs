//! Course catalog: courses, their ordered modules, and quiz questions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Unique course identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CourseId(pub Uuid);

impl std::fmt::Display for CourseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique module identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId(pub Uuid);

impl std::fmt::Display for ModuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique question identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub Uuid);

impl std::fmt::Display for QuestionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A published course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub instructor: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A content unit inside a course; rendered in ascending `module_order`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseModule {
    pub id: ModuleId,
    pub course_id: CourseId,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub pdf_url: Option<String>,
    pub module_order: i32,
    pub created_at: DateTime<Utc>,
}

/// A multiple-choice quiz question attached to a module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub module_id: ModuleId,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_option_index: usize,
    pub created_at: DateTime<Utc>,
}

/// Why a question draft was rejected before reaching the gateway
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidQuestion {
    #[error("question text is empty")]
    EmptyText,

    #[error("a question needs at least two options")]
    TooFewOptions,

    #[error("correct option {index} is out of bounds for {len} options")]
    CorrectOptionOutOfBounds { index: usize, len: usize },
}

impl Question {
    /// Check the question invariants: non-empty text, at least two
    /// options, and a correct index that points into them.
    pub fn validate(
        question_text: &str,
        options: &[String],
        correct_option_index: usize,
    ) -> Result<(), InvalidQuestion> {
        if question_text.trim().is_empty() {
            return Err(InvalidQuestion::EmptyText);
        }
        if options.len() < 2 {
            return Err(InvalidQuestion::TooFewOptions);
        }
        if correct_option_index >= options.len() {
            return Err(InvalidQuestion::CorrectOptionOutOfBounds {
                index: correct_option_index,
                len: options.len(),
            });
        }
        Ok(())
    }
}
