//! Cache keys
//!
//! A `QueryKey` is an ordered tuple of primitive parts identifying one
//! cached read and every parameter that affects its result. Invalidation
//! matches by prefix: `["courseDetails", course_id]` covers the same read
//! for every viewer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::account::UserId;
use crate::catalog::{CourseId, ModuleId, QuestionId};
use crate::engagement::{CertificateId, EnrollmentId};
use crate::messaging::{FeedbackId, NotificationId};

/// One primitive component of a cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyPart {
    Text(String),
    Int(i64),
    Flag(bool),
    /// An omitted optional parameter; distinct from any present value
    Absent,
}

impl From<&str> for KeyPart {
    fn from(s: &str) -> Self {
        KeyPart::Text(s.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(s: String) -> Self {
        KeyPart::Text(s)
    }
}

impl From<i64> for KeyPart {
    fn from(n: i64) -> Self {
        KeyPart::Int(n)
    }
}

impl From<usize> for KeyPart {
    fn from(n: usize) -> Self {
        KeyPart::Int(n as i64)
    }
}

impl From<bool> for KeyPart {
    fn from(b: bool) -> Self {
        KeyPart::Flag(b)
    }
}

impl From<Uuid> for KeyPart {
    fn from(id: Uuid) -> Self {
        KeyPart::Text(id.to_string())
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => KeyPart::Absent,
        }
    }
}

macro_rules! key_part_from_id {
    ($($id:ty),* $(,)?) => {
        $(impl From<$id> for KeyPart {
            fn from(id: $id) -> Self {
                KeyPart::Text(id.0.to_string())
            }
        })*
    };
}

key_part_from_id!(
    UserId,
    CourseId,
    ModuleId,
    QuestionId,
    EnrollmentId,
    CertificateId,
    NotificationId,
    FeedbackId,
);

/// Ordered tuple identifying a cached read
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    /// Start a key from its leading name, e.g. `QueryKey::root("courses")`
    pub fn root(name: &str) -> Self {
        QueryKey(vec![KeyPart::Text(name.to_string())])
    }

    /// Append one parameter part
    pub fn push(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// True when `prefix` matches the leading parts of this key
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.len() >= prefix.0.len() && self.0[..prefix.0.len()] == prefix.0[..]
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            match part {
                KeyPart::Text(s) => write!(f, "{s}")?,
                KeyPart::Int(n) => write!(f, "{n}")?,
                KeyPart::Flag(b) => write!(f, "{b}")?,
                KeyPart::Absent => write!(f, "-")?,
            }
        }
        Ok(())
    }
}
