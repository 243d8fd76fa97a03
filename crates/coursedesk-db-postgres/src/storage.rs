//! `RecordStore` implementation over a PostgreSQL pool.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use time::{Date, OffsetDateTime};
use tracing::{debug, info, instrument};

use coursedesk_storage::{
    Assignment, AssignmentQuery, NewAssignment, NewSubmission, NewUser, RecordId, RecordStore,
    SortField, StorageError, Submission, SubmissionQuery, User,
};

use crate::config::PostgresConfig;
use crate::error::{
    PG_FOREIGN_KEY_VIOLATION, PG_UNIQUE_VIOLATION, constraint_name, has_pg_error_code,
    query_error,
};
use crate::migrations;
use crate::pool::create_pool;

type UserRow = (
    i64,
    String,
    String,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type AssignmentRow = (
    i64,
    String,
    String,
    DateTime<Utc>,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
);

type SubmissionRow = (
    i64,
    i64,
    i64,
    String,
    DateTime<Utc>,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

const USER_COLUMNS: &str = "id, username, password_hash, role, email, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str =
    "id, title, description, due_date, teacher_id, created_at, updated_at";
const SUBMISSION_COLUMNS: &str =
    "id, student_id, assignment_id, content, submitted_at, grade, created_at, updated_at";

/// Converts chrono DateTime to time OffsetDateTime.
fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(dt.timestamp_subsec_nanos() as i64)
}

/// Converts time OffsetDateTime to chrono DateTime.
fn time_to_chrono(dt: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond()).unwrap_or_default()
}

fn date_to_chrono(date: Date) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), u8::from(date.month()).into(), date.day().into())
}

fn user_from_row(row: UserRow) -> Result<User, StorageError> {
    Ok(User {
        id: row.0,
        username: row.1,
        password_hash: row.2,
        role: row.3.parse()?,
        email: row.4,
        created_at: chrono_to_time(row.5),
        updated_at: chrono_to_time(row.6),
    })
}

fn assignment_from_row(row: AssignmentRow) -> Assignment {
    Assignment {
        id: row.0,
        title: row.1,
        description: row.2,
        due_date: chrono_to_time(row.3),
        teacher_id: row.4,
        created_at: chrono_to_time(row.5),
        updated_at: chrono_to_time(row.6),
    }
}

fn submission_from_row(row: SubmissionRow) -> Submission {
    Submission {
        id: row.0,
        student_id: row.1,
        assignment_id: row.2,
        content: row.3,
        submitted_at: chrono_to_time(row.4),
        grade: row.5,
        created_at: chrono_to_time(row.6),
        updated_at: chrono_to_time(row.7),
    }
}

/// PostgreSQL-backed record store.
///
/// Orderings are rendered into SQL only from the whitelisted column names of
/// [`SortField`], never from request input.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore {
    pool: PgPool,
}

impl PostgresRecordStore {
    /// Connects to the database and applies pending migrations if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created or a migration fails.
    #[instrument(skip(config))]
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        info!("PostgreSQL record store initialized");
        Ok(Self { pool })
    }

    /// Wraps an existing pool. Migrations are not run.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RecordStore for PostgresRecordStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let sql = format!(
            "INSERT INTO users (username, password_hash, role, email) \
             VALUES ($1, $2, $3, $4) RETURNING {USER_COLUMNS}"
        );
        let row: UserRow = query_as(&sql)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if has_pg_error_code(&e, PG_UNIQUE_VIOLATION) {
                    StorageError::already_exists("user", user.username.clone())
                } else {
                    query_error("Failed to create user", e)
                }
            })?;

        user_from_row(row)
    }

    async fn find_user(&self, id: RecordId) -> Result<Option<User>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row: Option<UserRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to read user", e))?;

        row.map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row: Option<UserRow> = query_as(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to read user", e))?;

        row.map(user_from_row).transpose()
    }

    async fn create_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<Assignment, StorageError> {
        let sql = format!(
            "INSERT INTO assignments (title, description, due_date, teacher_id) \
             VALUES ($1, $2, $3, $4) RETURNING {ASSIGNMENT_COLUMNS}"
        );
        let row: AssignmentRow = query_as(&sql)
            .bind(&assignment.title)
            .bind(&assignment.description)
            .bind(time_to_chrono(assignment.due_date))
            .bind(assignment.teacher_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if has_pg_error_code(&e, PG_FOREIGN_KEY_VIOLATION) {
                    StorageError::invalid_record(format!(
                        "teacher {} does not exist",
                        assignment.teacher_id
                    ))
                } else {
                    query_error("Failed to create assignment", e)
                }
            })?;

        debug!(id = row.0, "assignment created");
        Ok(assignment_from_row(row))
    }

    async fn find_assignment(&self, id: RecordId) -> Result<Option<Assignment>, StorageError> {
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = $1");
        let row: Option<AssignmentRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to read assignment", e))?;

        Ok(row.map(assignment_from_row))
    }

    async fn list_assignments(
        &self,
        query_params: &AssignmentQuery,
    ) -> Result<Vec<Assignment>, StorageError> {
        let order_by = match query_params.sort {
            Some(sort) => format!(
                "{} {}, id ASC",
                sort.field.column(),
                sort.direction.as_sql()
            ),
            None => "id ASC".to_string(),
        };
        let sql = format!("SELECT {ASSIGNMENT_COLUMNS} FROM assignments ORDER BY {order_by}");

        let rows: Vec<AssignmentRow> = query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("Failed to list assignments", e))?;

        Ok(rows.into_iter().map(assignment_from_row).collect())
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<Assignment, StorageError> {
        let sql = format!(
            "UPDATE assignments SET title = $2, description = $3, due_date = $4, \
             updated_at = now() WHERE id = $1 RETURNING {ASSIGNMENT_COLUMNS}"
        );
        let row: Option<AssignmentRow> = query_as(&sql)
            .bind(assignment.id)
            .bind(&assignment.title)
            .bind(&assignment.description)
            .bind(time_to_chrono(assignment.due_date))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to update assignment", e))?;

        row.map(assignment_from_row)
            .ok_or_else(|| StorageError::not_found("assignment", assignment.id))
    }

    async fn delete_assignment(&self, id: RecordId) -> Result<(), StorageError> {
        // Submissions go with it through ON DELETE CASCADE.
        let result = query("DELETE FROM assignments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_error("Failed to delete assignment", e))?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found("assignment", id));
        }
        Ok(())
    }

    async fn create_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, StorageError> {
        let sql = format!(
            "INSERT INTO submissions (student_id, assignment_id, content) \
             VALUES ($1, $2, $3) RETURNING {SUBMISSION_COLUMNS}"
        );
        let row: SubmissionRow = query_as(&sql)
            .bind(submission.student_id)
            .bind(submission.assignment_id)
            .bind(&submission.content)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if has_pg_error_code(&e, PG_FOREIGN_KEY_VIOLATION) {
                    if constraint_name(&e).is_some_and(|c| c.contains("assignment_id")) {
                        StorageError::not_found("assignment", submission.assignment_id)
                    } else {
                        StorageError::invalid_record(format!(
                            "student {} does not exist",
                            submission.student_id
                        ))
                    }
                } else {
                    query_error("Failed to create submission", e)
                }
            })?;

        Ok(submission_from_row(row))
    }

    async fn find_submission(&self, id: RecordId) -> Result<Option<Submission>, StorageError> {
        let sql = format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = $1");
        let row: Option<SubmissionRow> = query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to read submission", e))?;

        Ok(row.map(submission_from_row))
    }

    async fn list_submissions(
        &self,
        query_params: &SubmissionQuery,
    ) -> Result<Vec<Submission>, StorageError> {
        let due_on = match query_params.due_on {
            Some(date) => Some(date_to_chrono(date).ok_or_else(|| {
                StorageError::invalid_query(format!("date {date} is out of range"))
            })?),
            None => None,
        };

        let columns = SUBMISSION_COLUMNS
            .split(", ")
            .map(|c| format!("s.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sort = query_params.sort;
        let sql = format!(
            "SELECT {columns} FROM submissions s \
             JOIN assignments a ON a.id = s.assignment_id \
             WHERE ($1::bigint IS NULL OR s.assignment_id = $1) \
               AND ($2::date IS NULL OR (a.due_date AT TIME ZONE 'UTC')::date = $2) \
             ORDER BY s.{} {}, s.id ASC",
            sort.field.column(),
            sort.direction.as_sql()
        );

        let rows: Vec<SubmissionRow> = query_as(&sql)
            .bind(query_params.assignment_id)
            .bind(due_on)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| query_error("Failed to list submissions", e))?;

        Ok(rows.into_iter().map(submission_from_row).collect())
    }

    async fn save_submission(&self, submission: &Submission) -> Result<Submission, StorageError> {
        let sql = format!(
            "UPDATE submissions SET grade = $2, updated_at = now() \
             WHERE id = $1 RETURNING {SUBMISSION_COLUMNS}"
        );
        let row: Option<SubmissionRow> = query_as(&sql)
            .bind(submission.id)
            .bind(&submission.grade)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| query_error("Failed to update submission", e))?;

        row.map(submission_from_row)
            .ok_or_else(|| StorageError::not_found("submission", submission.id))
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let _: i32 = query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_error("Database ping failed", e))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn timestamps_convert_both_ways() {
        let original = datetime!(2026-10-17 09:30:15.123456 UTC);
        assert_eq!(chrono_to_time(time_to_chrono(original)), original);
    }

    #[test]
    fn dates_convert_to_chrono() {
        let converted = date_to_chrono(date!(2026 - 02 - 28)).unwrap();
        assert_eq!(converted, NaiveDate::from_ymd_opt(2026, 2, 28).unwrap());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let now = Utc::now();
        let row: UserRow = (
            1,
            "ghost".into(),
            "hash".into(),
            "admin".into(),
            None,
            now,
            now,
        );
        assert!(user_from_row(row).is_err());
    }
}
