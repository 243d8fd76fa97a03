//! Record types persisted by the storage backends.
//!
//! Records serialize with camelCase field names and RFC 3339 timestamps, which
//! is the shape the HTTP API returns and the shape the read cache stores.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::StorageError;

/// Identifier type shared by all record kinds.
pub type RecordId = i64;

// =============================================================================
// Users
// =============================================================================

/// Role of an account. Decides which assignment operations a caller may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            other => Err(StorageError::invalid_record(format!("unknown role '{other}'"))),
        }
    }
}

/// A registered account.
///
/// Not serializable on purpose: the password hash must never leave the server.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: RecordId,
    pub username: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub role: Role,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields required to create a [`User`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub email: Option<String>,
}

// =============================================================================
// Assignments
// =============================================================================

/// An assignment published by a teacher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: RecordId,
    pub title: String,
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    pub teacher_id: RecordId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Assignment {
    /// Applies a partial update. Fields left as `None` keep their current value.
    pub fn apply(&mut self, changes: AssignmentChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = due_date;
        }
    }
}

/// Fields required to create an [`Assignment`].
#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub due_date: OffsetDateTime,
    pub teacher_id: RecordId,
}

/// Partial update of an [`Assignment`].
#[derive(Debug, Clone, Default)]
pub struct AssignmentChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<OffsetDateTime>,
}

// =============================================================================
// Submissions
// =============================================================================

/// A student's submission for an assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: RecordId,
    pub student_id: RecordId,
    pub assignment_id: RecordId,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    pub grade: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fields required to create a [`Submission`].
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub student_id: RecordId,
    pub assignment_id: RecordId,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn role_round_trips_through_str() {
        assert_eq!("teacher".parse::<Role>().unwrap(), Role::Teacher);
        assert_eq!(Role::Student.to_string(), "student");
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn assignment_serializes_camel_case() {
        let assignment = Assignment {
            id: 7,
            title: "Essay".into(),
            description: "Write".into(),
            due_date: datetime!(2026-11-01 12:00 UTC),
            teacher_id: 3,
            created_at: datetime!(2026-10-01 08:00 UTC),
            updated_at: datetime!(2026-10-01 08:00 UTC),
        };

        let json = serde_json::to_value(&assignment).unwrap();
        assert_eq!(json["teacherId"], 3);
        assert_eq!(json["dueDate"], "2026-11-01T12:00:00Z");
    }

    #[test]
    fn apply_keeps_unset_fields() {
        let mut assignment = Assignment {
            id: 1,
            title: "Old".into(),
            description: "Keep me".into(),
            due_date: datetime!(2026-11-01 12:00 UTC),
            teacher_id: 1,
            created_at: datetime!(2026-10-01 08:00 UTC),
            updated_at: datetime!(2026-10-01 08:00 UTC),
        };

        assignment.apply(AssignmentChanges {
            title: Some("New".into()),
            ..Default::default()
        });

        assert_eq!(assignment.title, "New");
        assert_eq!(assignment.description, "Keep me");
    }
}
