use axum::{Json, extract::State};
use serde::Deserialize;
use time::Date;
use time::macros::format_description;

use coursedesk_storage::{
    RecordId, Role, SortOrder, Submission, SubmissionQuery, SubmissionSortField,
};

use crate::cache::CacheKey;
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::AuthUser;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct GradeRequest {
    pub grade: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionListParams {
    pub due_date: Option<String>,
    pub sort_by: Option<String>,
}

impl SubmissionListParams {
    fn into_query(self) -> Result<SubmissionQuery, ApiError> {
        let mut query = SubmissionQuery::default();

        if let Some(raw) = self.due_date.as_deref().filter(|s| !s.trim().is_empty()) {
            let date = Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
                .map_err(|_| ApiError::bad_request("Invalid dueDate, expected YYYY-MM-DD"))?;
            query.due_on = Some(date);
        }
        if let Some(raw) = self.sort_by.as_deref().filter(|s| !s.trim().is_empty()) {
            query.sort = SortOrder::<SubmissionSortField>::parse(raw)?;
        }
        Ok(query)
    }
}

/// Grades a submission. Only the teacher owning its assignment may grade it.
pub async fn grade(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<RecordId>,
    ApiJson(req): ApiJson<GradeRequest>,
) -> Result<Json<Submission>, ApiError> {
    user.require_role(Role::Teacher)?;
    let grade = req.grade.trim();
    if grade.is_empty() {
        return Err(ApiError::bad_request("grade must not be empty"));
    }

    let mut submission = state
        .records
        .find_submission(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Submission not found"))?;
    let assignment = state
        .records
        .find_assignment(submission.assignment_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Assignment not found"))?;
    user.require_owner(assignment.teacher_id)?;

    submission.grade = Some(grade.to_string());
    let saved = state.records.save_submission(&submission).await?;
    state
        .cache
        .invalidate(&CacheKey::assignment_submissions(saved.assignment_id))
        .await;

    tracing::info!(submission_id = id, assignment_id = saved.assignment_id, "submission graded");
    Ok(Json(saved))
}

pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    ApiQuery(params): ApiQuery<SubmissionListParams>,
) -> Result<Json<Vec<Submission>>, ApiError> {
    user.require_role(Role::Teacher)?;
    let query = params.into_query()?;
    let submissions = state.records.list_submissions(&query).await?;
    Ok(Json(submissions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursedesk_storage::SortDirection;
    use time::macros::date;

    #[test]
    fn empty_params_use_default_order() {
        let query = SubmissionListParams::default().into_query().unwrap();
        assert_eq!(query, SubmissionQuery::default());
    }

    #[test]
    fn parses_due_date_and_sort() {
        let query = SubmissionListParams {
            due_date: Some("2026-11-01".into()),
            sort_by: Some("grade:desc".into()),
        }
        .into_query()
        .unwrap();
        assert_eq!(query.due_on, Some(date!(2026 - 11 - 01)));
        assert_eq!(query.sort.field, SubmissionSortField::Grade);
        assert_eq!(query.sort.direction, SortDirection::Desc);
    }

    #[test]
    fn rejects_malformed_dates() {
        let err = SubmissionListParams {
            due_date: Some("01/11/2026".into()),
            sort_by: None,
        }
        .into_query()
        .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
