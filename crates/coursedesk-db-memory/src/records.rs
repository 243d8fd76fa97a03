use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use coursedesk_storage::{
    Assignment, AssignmentQuery, AssignmentSortField, NewAssignment, NewSubmission, NewUser,
    RecordId, RecordStore, SortDirection, StorageError, Submission, SubmissionQuery,
    SubmissionSortField, User,
};

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<RecordId, User>,
    assignments: BTreeMap<RecordId, Assignment>,
    submissions: BTreeMap<RecordId, Submission>,
}

/// In-memory record store.
///
/// All tables sit behind one `RwLock` so that multi-table operations (unique
/// usernames, cascading assignment deletes) stay consistent. IDs come from
/// per-table atomic sequences starting at 1.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    tables: RwLock<Tables>,
    user_seq: AtomicI64,
    assignment_seq: AtomicI64,
    submission_seq: AtomicI64,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            user_seq: AtomicI64::new(1),
            assignment_seq: AtomicI64::new(1),
            submission_seq: AtomicI64::new(1),
        }
    }

    fn next(seq: &AtomicI64) -> RecordId {
        seq.fetch_add(1, AtomicOrdering::SeqCst)
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Orders `None` after every value so ascending sorts match PostgreSQL's
/// default `NULLS LAST`.
fn cmp_nulls_last<T: Ord>(a: &Option<T>, b: &Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn directed(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn compare_assignments(a: &Assignment, b: &Assignment, field: AssignmentSortField) -> Ordering {
    match field {
        AssignmentSortField::Id => a.id.cmp(&b.id),
        AssignmentSortField::Title => a.title.cmp(&b.title),
        AssignmentSortField::DueDate => a.due_date.cmp(&b.due_date),
        AssignmentSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        AssignmentSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

fn compare_submissions(a: &Submission, b: &Submission, field: SubmissionSortField) -> Ordering {
    match field {
        SubmissionSortField::Id => a.id.cmp(&b.id),
        SubmissionSortField::SubmittedAt => a.submitted_at.cmp(&b.submitted_at),
        SubmissionSortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SubmissionSortField::Grade => cmp_nulls_last(&a.grade, &b.grade),
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::already_exists("user", user.username));
        }

        let now = OffsetDateTime::now_utc();
        let created = User {
            id: Self::next(&self.user_seq),
            username: user.username,
            password_hash: user.password_hash,
            role: user.role,
            email: user.email,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: RecordId) -> Result<Option<User>, StorageError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create_assignment(
        &self,
        assignment: NewAssignment,
    ) -> Result<Assignment, StorageError> {
        let now = OffsetDateTime::now_utc();
        let created = Assignment {
            id: Self::next(&self.assignment_seq),
            title: assignment.title,
            description: assignment.description,
            due_date: assignment.due_date,
            teacher_id: assignment.teacher_id,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .assignments
            .insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_assignment(&self, id: RecordId) -> Result<Option<Assignment>, StorageError> {
        Ok(self.tables.read().await.assignments.get(&id).cloned())
    }

    async fn list_assignments(
        &self,
        query: &AssignmentQuery,
    ) -> Result<Vec<Assignment>, StorageError> {
        let mut assignments: Vec<Assignment> = self
            .tables
            .read()
            .await
            .assignments
            .values()
            .cloned()
            .collect();

        if let Some(order) = query.sort {
            assignments.sort_by(|a, b| {
                directed(compare_assignments(a, b, order.field), order.direction)
                    .then(a.id.cmp(&b.id))
            });
        }
        Ok(assignments)
    }

    async fn save_assignment(&self, assignment: &Assignment) -> Result<Assignment, StorageError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .assignments
            .get_mut(&assignment.id)
            .ok_or_else(|| StorageError::not_found("assignment", assignment.id))?;

        stored.title = assignment.title.clone();
        stored.description = assignment.description.clone();
        stored.due_date = assignment.due_date;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn delete_assignment(&self, id: RecordId) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if tables.assignments.remove(&id).is_none() {
            return Err(StorageError::not_found("assignment", id));
        }
        tables.submissions.retain(|_, s| s.assignment_id != id);
        Ok(())
    }

    async fn create_submission(
        &self,
        submission: NewSubmission,
    ) -> Result<Submission, StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.assignments.contains_key(&submission.assignment_id) {
            return Err(StorageError::not_found(
                "assignment",
                submission.assignment_id,
            ));
        }

        let now = OffsetDateTime::now_utc();
        let created = Submission {
            id: Self::next(&self.submission_seq),
            student_id: submission.student_id,
            assignment_id: submission.assignment_id,
            content: submission.content,
            submitted_at: now,
            grade: None,
            created_at: now,
            updated_at: now,
        };
        tables.submissions.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_submission(&self, id: RecordId) -> Result<Option<Submission>, StorageError> {
        Ok(self.tables.read().await.submissions.get(&id).cloned())
    }

    async fn list_submissions(
        &self,
        query: &SubmissionQuery,
    ) -> Result<Vec<Submission>, StorageError> {
        let tables = self.tables.read().await;
        let mut submissions: Vec<Submission> = tables
            .submissions
            .values()
            .filter(|s| query.assignment_id.is_none_or(|id| s.assignment_id == id))
            .filter(|s| {
                query.due_on.is_none_or(|day| {
                    tables
                        .assignments
                        .get(&s.assignment_id)
                        .is_some_and(|a| a.due_date.to_offset(time::UtcOffset::UTC).date() == day)
                })
            })
            .cloned()
            .collect();
        drop(tables);

        let order = query.sort;
        submissions.sort_by(|a, b| {
            directed(compare_submissions(a, b, order.field), order.direction)
                .then(a.id.cmp(&b.id))
        });
        Ok(submissions)
    }

    async fn save_submission(&self, submission: &Submission) -> Result<Submission, StorageError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .submissions
            .get_mut(&submission.id)
            .ok_or_else(|| StorageError::not_found("submission", submission.id))?;

        stored.grade = submission.grade.clone();
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }

    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursedesk_storage::{Role, SortOrder};
    use time::macros::{date, datetime};

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.into(),
            password_hash: "hash".into(),
            role: Role::Teacher,
            email: None,
        }
    }

    fn new_assignment(title: &str, due: OffsetDateTime) -> NewAssignment {
        NewAssignment {
            title: title.into(),
            description: format!("{title} description"),
            due_date: due,
            teacher_id: 1,
        }
    }

    #[tokio::test]
    async fn usernames_are_unique() {
        let store = InMemoryRecordStore::new();
        store.create_user(new_user("alice")).await.unwrap();

        let err = store.create_user(new_user("alice")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));

        let found = store.find_user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, 1);
    }

    #[tokio::test]
    async fn lists_assignments_in_requested_order() {
        let store = InMemoryRecordStore::new();
        store
            .create_assignment(new_assignment("b", datetime!(2026-11-02 0:00 UTC)))
            .await
            .unwrap();
        store
            .create_assignment(new_assignment("a", datetime!(2026-11-03 0:00 UTC)))
            .await
            .unwrap();
        store
            .create_assignment(new_assignment("c", datetime!(2026-11-01 0:00 UTC)))
            .await
            .unwrap();

        let unordered = store
            .list_assignments(&AssignmentQuery::default())
            .await
            .unwrap();
        let ids: Vec<_> = unordered.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let by_due_desc = store
            .list_assignments(&AssignmentQuery {
                sort: Some(SortOrder::parse("dueDate:desc").unwrap()),
            })
            .await
            .unwrap();
        let titles: Vec<_> = by_due_desc.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn save_and_delete_require_existing_assignment() {
        let store = InMemoryRecordStore::new();
        let mut created = store
            .create_assignment(new_assignment("a", datetime!(2026-11-02 0:00 UTC)))
            .await
            .unwrap();

        created.title = "renamed".into();
        let saved = store.save_assignment(&created).await.unwrap();
        assert_eq!(saved.title, "renamed");
        assert!(saved.updated_at >= created.updated_at);

        store.delete_assignment(created.id).await.unwrap();
        assert!(store.find_assignment(created.id).await.unwrap().is_none());
        assert!(
            store
                .delete_assignment(created.id)
                .await
                .unwrap_err()
                .is_not_found()
        );
        assert!(store.save_assignment(&created).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn submissions_need_an_assignment_and_cascade_on_delete() {
        let store = InMemoryRecordStore::new();
        let orphan = store
            .create_submission(NewSubmission {
                student_id: 2,
                assignment_id: 99,
                content: "x".into(),
            })
            .await;
        assert!(orphan.unwrap_err().is_not_found());

        let assignment = store
            .create_assignment(new_assignment("a", datetime!(2026-11-02 0:00 UTC)))
            .await
            .unwrap();
        store
            .create_submission(NewSubmission {
                student_id: 2,
                assignment_id: assignment.id,
                content: "answer".into(),
            })
            .await
            .unwrap();

        store.delete_assignment(assignment.id).await.unwrap();
        let remaining = store
            .list_submissions(&SubmissionQuery::default())
            .await
            .unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn filters_submissions_by_assignment_due_day() {
        let store = InMemoryRecordStore::new();
        let first = store
            .create_assignment(new_assignment("a", datetime!(2026-11-02 23:30 UTC)))
            .await
            .unwrap();
        let second = store
            .create_assignment(new_assignment("b", datetime!(2026-11-03 10:00 UTC)))
            .await
            .unwrap();
        for assignment_id in [first.id, second.id, first.id] {
            store
                .create_submission(NewSubmission {
                    student_id: 5,
                    assignment_id,
                    content: "answer".into(),
                })
                .await
                .unwrap();
        }

        let due_nov_2 = store
            .list_submissions(&SubmissionQuery {
                due_on: Some(date!(2026 - 11 - 02)),
                ..SubmissionQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(due_nov_2.len(), 2);
        assert!(due_nov_2.iter().all(|s| s.assignment_id == first.id));

        let for_second = store
            .list_submissions(&SubmissionQuery::for_assignment(second.id))
            .await
            .unwrap();
        assert_eq!(for_second.len(), 1);
    }

    #[tokio::test]
    async fn ungraded_submissions_sort_last_when_ascending() {
        let store = InMemoryRecordStore::new();
        let assignment = store
            .create_assignment(new_assignment("a", datetime!(2026-11-02 0:00 UTC)))
            .await
            .unwrap();
        let mut graded = Vec::new();
        for _ in 0..3 {
            graded.push(
                store
                    .create_submission(NewSubmission {
                        student_id: 5,
                        assignment_id: assignment.id,
                        content: "answer".into(),
                    })
                    .await
                    .unwrap(),
            );
        }
        graded[0].grade = Some("B".into());
        store.save_submission(&graded[0]).await.unwrap();
        graded[2].grade = Some("A".into());
        store.save_submission(&graded[2]).await.unwrap();

        let listed = store
            .list_submissions(&SubmissionQuery {
                sort: SortOrder::parse("grade:asc").unwrap(),
                ..SubmissionQuery::default()
            })
            .await
            .unwrap();
        let grades: Vec<_> = listed.iter().map(|s| s.grade.as_deref()).collect();
        assert_eq!(grades, vec![Some("A"), Some("B"), None]);
    }
}
