//! Storage abstraction layer for Coursedesk.
//!
//! Defines the record types, collection query parameters and the two storage
//! seams the rest of the workspace is written against:
//!
//! - [`RecordStore`]: the authoritative relational store.
//! - [`KeyValueStore`]: the shared expiring key-value store used by the read
//!   cache and the login attempt guard.

pub mod error;
pub mod query;
pub mod traits;
pub mod types;

pub use error::{KvError, StorageError};
pub use query::{
    AssignmentQuery, AssignmentSortField, SortDirection, SortField, SortOrder,
    SubmissionQuery, SubmissionSortField,
};
pub use traits::{KeyValueStore, RecordStore};
pub use types::{
    Assignment, AssignmentChanges, NewAssignment, NewSubmission, NewUser, RecordId, Role,
    Submission, User,
};
