//! Storage traits implemented by the backends.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{KvError, StorageError};
use crate::query::{AssignmentQuery, SubmissionQuery};
use crate::types::{
    Assignment, NewAssignment, NewSubmission, NewUser, RecordId, Submission, User,
};

/// The authoritative record store for users, assignments and submissions.
///
/// Implementations must be thread-safe (`Send + Sync`); every request shares
/// one instance and no in-process locking is layered on top.
#[async_trait]
pub trait RecordStore: Send + Sync {
    // ==================== Users ====================

    /// Creates a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    /// Finds a user by ID.
    async fn find_user(&self, id: RecordId) -> Result<Option<User>, StorageError>;

    /// Finds a user by username.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    // ==================== Assignments ====================

    /// Creates an assignment and returns it with its generated ID and timestamps.
    async fn create_assignment(&self, assignment: NewAssignment)
    -> Result<Assignment, StorageError>;

    /// Finds an assignment by ID.
    async fn find_assignment(&self, id: RecordId) -> Result<Option<Assignment>, StorageError>;

    /// Lists assignments. Without an ordering the result is in ID order.
    async fn list_assignments(
        &self,
        query: &AssignmentQuery,
    ) -> Result<Vec<Assignment>, StorageError>;

    /// Persists the mutable fields of an existing assignment and bumps `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the assignment no longer exists.
    async fn save_assignment(&self, assignment: &Assignment) -> Result<Assignment, StorageError>;

    /// Deletes an assignment together with its submissions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the assignment does not exist.
    async fn delete_assignment(&self, id: RecordId) -> Result<(), StorageError>;

    // ==================== Submissions ====================

    /// Creates a submission, stamping `submitted_at` with the current time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the assignment does not exist.
    async fn create_submission(&self, submission: NewSubmission)
    -> Result<Submission, StorageError>;

    /// Finds a submission by ID.
    async fn find_submission(&self, id: RecordId) -> Result<Option<Submission>, StorageError>;

    /// Lists submissions matching the query.
    async fn list_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> Result<Vec<Submission>, StorageError>;

    /// Persists the grade of an existing submission and bumps `updated_at`.
    async fn save_submission(&self, submission: &Submission) -> Result<Submission, StorageError>;

    // ==================== Metadata ====================

    /// Cheap connectivity probe used by readiness checks.
    async fn ping(&self) -> Result<(), StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Shared key-value store holding cache entries and login throttling state.
///
/// Values are opaque bytes except for counters written by [`increment`],
/// which are integers. Expiry is enforced by the store.
///
/// [`increment`]: KeyValueStore::increment
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the value at `key`, or `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Stores `value` at `key`, replacing any previous value, expiring after `ttl`.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError>;

    /// Atomically increments the integer counter at `key` (absent counts as 0)
    /// and (re)arms its expiry to `ttl`. Returns the new value.
    async fn increment(&self, key: &str, ttl: Duration) -> Result<i64, KvError>;

    /// Returns `true` if `key` holds an unexpired value.
    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    /// Removes `key`. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), KvError>;

    /// Returns `true` if the store can currently serve commands.
    async fn is_connected(&self) -> bool;

    /// Returns the name of this backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
