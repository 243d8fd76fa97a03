//! Assignment endpoints.
//!
//! Reads go through the cache-aside accessor. Writes hit the record store
//! first and then invalidate the per-id keys they affect. Collection keys
//! (`assignments:all:*`) are left to expire on their TTL.

use std::collections::HashMap;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use coursedesk_notifications::{ASSIGNMENT_CREATED, dispatch};
use coursedesk_storage::{
    Assignment, AssignmentChanges, AssignmentQuery, NewAssignment, NewSubmission, RecordId, Role,
    Submission, SubmissionQuery,
};

use crate::cache::CacheKey;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::server::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub sort_by: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    /// Recipient of the "new assignment" mail.
    #[serde(default)]
    pub student_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub due_date: Option<OffsetDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub content: String,
}

fn require_non_blank(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::bad_request(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

pub async fn list(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<Vec<Assignment>>, ApiError> {
    let query = AssignmentQuery::from_sort_by(params.sort_by.as_deref())?;
    let key = CacheKey::assignment_list(&query);
    let records = state.records.clone();

    let assignments = state
        .cache
        .get_or_load(&key, state.cache.list_ttl(), move || async move {
            records.list_assignments(&query).await
        })
        .await?;
    Ok(Json(assignments))
}

pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_role(Role::Teacher)?;
    require_non_blank("title", &req.title)?;

    let assignment = state
        .records
        .create_assignment(NewAssignment {
            title: req.title,
            description: req.description,
            due_date: req.due_date,
            teacher_id: user.id,
        })
        .await?;
    tracing::info!(assignment_id = assignment.id, teacher_id = user.id, "assignment created");

    if let Some(to) = req.student_email.filter(|s| !s.trim().is_empty()) {
        notify_assignment_created(&state, &assignment, &user.username, to);
    }

    Ok((StatusCode::CREATED, Json(assignment)))
}

/// Renders and dispatches the "new assignment" mail in the background.
fn notify_assignment_created(state: &AppState, assignment: &Assignment, teacher: &str, to: String) {
    let due_date = assignment
        .due_date
        .format(&Rfc3339)
        .unwrap_or_else(|_| assignment.due_date.to_string());
    let data: HashMap<String, serde_json::Value> = [
        ("title", json!(assignment.title)),
        ("teacher", json!(teacher)),
        ("description", json!(assignment.description)),
        ("due_date", json!(due_date)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    match state.templates.render(ASSIGNMENT_CREATED, &data) {
        Ok(email) => {
            dispatch(state.notifier.clone(), to, email);
        }
        Err(e) => {
            tracing::warn!(error = %e, assignment_id = assignment.id, "failed to render notification");
        }
    }
}

pub async fn get_one(
    State(state): State<AppState>,
    _user: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> Result<Json<Assignment>, ApiError> {
    let records = state.records.clone();
    state
        .cache
        .get_or_load_optional(&CacheKey::assignment(id), state.cache.ttl(), move || async move {
            records.find_assignment(id).await
        })
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Assignment not found"))
}

/// Loads an assignment from the record store, bypassing the cache.
async fn load_owned(
    state: &AppState,
    user: &AuthUser,
    id: RecordId,
) -> Result<Assignment, ApiError> {
    user.require_role(Role::Teacher)?;
    let assignment = state
        .records
        .find_assignment(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignment not found"))?;
    user.require_owner(assignment.teacher_id)?;
    Ok(assignment)
}

pub async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(req): ApiJson<UpdateAssignmentRequest>,
) -> Result<Json<Assignment>, ApiError> {
    if let Some(title) = &req.title {
        require_non_blank("title", title)?;
    }
    let mut assignment = load_owned(&state, &user, id).await?;

    assignment.apply(AssignmentChanges {
        title: req.title,
        description: req.description,
        due_date: req.due_date,
    });
    let saved = state.records.save_assignment(&assignment).await?;
    state.cache.invalidate(&CacheKey::assignment(id)).await;

    tracing::info!(assignment_id = id, "assignment updated");
    Ok(Json(saved))
}

pub async fn delete(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> Result<impl IntoResponse, ApiError> {
    load_owned(&state, &user, id).await?;

    state.records.delete_assignment(id).await?;
    state.cache.invalidate(&CacheKey::assignment(id)).await;
    state
        .cache
        .invalidate(&CacheKey::assignment_submissions(id))
        .await;

    tracing::info!(assignment_id = id, "assignment deleted");
    Ok(Json(json!({ "message": "Assignment deleted successfully" })))
}

pub async fn submit(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(req): ApiJson<SubmitRequest>,
) -> Result<impl IntoResponse, ApiError> {
    user.require_role(Role::Student)?;
    require_non_blank("content", &req.content)?;

    let submission = state
        .records
        .create_submission(NewSubmission {
            student_id: user.id,
            assignment_id: id,
            content: req.content,
        })
        .await?;
    state
        .cache
        .invalidate(&CacheKey::assignment_submissions(id))
        .await;

    tracing::info!(submission_id = submission.id, assignment_id = id, "submission received");
    Ok((StatusCode::CREATED, Json(submission)))
}

/// All submissions of one assignment. 404 when the assignment does not exist.
pub async fn report(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    user.require_role(Role::Teacher)?;
    let records = state.records.clone();

    state
        .cache
        .get_or_load_optional(
            &CacheKey::assignment_submissions(id),
            state.cache.ttl(),
            move || async move {
                match records.find_assignment(id).await {
                    Ok(Some(_)) => records
                        .list_submissions(&SubmissionQuery::for_assignment(id))
                        .await
                        .map(Some),
                    Ok(None) => Ok(None),
                    Err(e) => Err(e),
                }
            },
        )
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Assignment not found"))
}
