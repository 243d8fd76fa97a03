//! Cache key construction.
//!
//! Keys are plain strings so they stay inspectable with `redis-cli`. Every key
//! belongs to a family, which labels the cache metrics.

use std::fmt;

use coursedesk_storage::{AssignmentQuery, RecordId};

pub mod family {
    pub const ASSIGNMENT: &str = "assignment";
    pub const ASSIGNMENT_LIST: &str = "assignments_all";
    pub const ASSIGNMENT_SUBMISSIONS: &str = "assignment_submissions";
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: String,
    family: &'static str,
}

impl CacheKey {
    /// `assignment:{id}`
    pub fn assignment(id: RecordId) -> Self {
        Self {
            key: format!("assignment:{id}"),
            family: family::ASSIGNMENT,
        }
    }

    /// `assignments:all:{field}:{dir}`, or `assignments:all:none` when unordered.
    ///
    /// The ordering is rendered from the parsed query, so `sortBy=title` and
    /// `sortBy=title:asc` share an entry.
    pub fn assignment_list(query: &AssignmentQuery) -> Self {
        let key = match &query.sort {
            Some(sort) => format!("assignments:all:{sort}"),
            None => "assignments:all:none".to_string(),
        };
        Self {
            key,
            family: family::ASSIGNMENT_LIST,
        }
    }

    /// `submissions:assignment:{id}`
    pub fn assignment_submissions(assignment_id: RecordId) -> Self {
        Self {
            key: format!("submissions:assignment:{assignment_id}"),
            family: family::ASSIGNMENT_SUBMISSIONS,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn family(&self) -> &'static str {
        self.family
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}
