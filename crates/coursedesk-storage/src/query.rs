//! Filter and ordering parameters for collection reads.
//!
//! Orderings are parsed from the `field:direction` form accepted by the HTTP
//! API (`dueDate:desc`, `title`, `submittedAt:ASC`). Parsing normalizes field
//! names and direction casing so that equivalent requests render to the same
//! canonical string, which the read cache uses as part of its keys.

use std::fmt;
use std::str::FromStr;

use time::Date;

use crate::error::StorageError;
use crate::types::RecordId;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    /// SQL keyword for this direction.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(StorageError::invalid_query(format!(
                "unknown sort direction '{other}'"
            ))),
        }
    }
}

/// A sortable column of some record kind.
pub trait SortField: Copy + Eq + fmt::Debug + FromStr<Err = StorageError> {
    /// Name used in the API and in cache keys.
    fn api_name(&self) -> &'static str;

    /// Column name in the relational schema.
    fn column(&self) -> &'static str;
}

/// A single `field:direction` ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder<F> {
    pub field: F,
    pub direction: SortDirection,
}

impl<F: SortField> SortOrder<F> {
    pub fn new(field: F, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Parses `field` or `field:direction`. Direction defaults to ascending.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        let (field, direction) = match raw.split_once(':') {
            Some((field, direction)) => (field, direction.parse()?),
            None => (raw, SortDirection::Asc),
        };
        Ok(Self {
            field: field.trim().parse()?,
            direction,
        })
    }
}

impl<F: SortField> fmt::Display for SortOrder<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field.api_name(), self.direction.as_str())
    }
}

/// Sortable assignment columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentSortField {
    Id,
    Title,
    DueDate,
    CreatedAt,
    UpdatedAt,
}

impl SortField for AssignmentSortField {
    fn api_name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::DueDate => "dueDate",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Title => "title",
            Self::DueDate => "due_date",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

impl FromStr for AssignmentSortField {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "title" => Ok(Self::Title),
            "dueDate" | "due_date" => Ok(Self::DueDate),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "updatedAt" | "updated_at" => Ok(Self::UpdatedAt),
            other => Err(StorageError::invalid_query(format!(
                "cannot sort assignments by '{other}'"
            ))),
        }
    }
}

/// Sortable submission columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionSortField {
    Id,
    SubmittedAt,
    CreatedAt,
    Grade,
}

impl SortField for SubmissionSortField {
    fn api_name(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::SubmittedAt => "submittedAt",
            Self::CreatedAt => "createdAt",
            Self::Grade => "grade",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::SubmittedAt => "submitted_at",
            Self::CreatedAt => "created_at",
            Self::Grade => "grade",
        }
    }
}

impl FromStr for SubmissionSortField {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "submittedAt" | "submitted_at" => Ok(Self::SubmittedAt),
            "createdAt" | "created_at" => Ok(Self::CreatedAt),
            "grade" => Ok(Self::Grade),
            other => Err(StorageError::invalid_query(format!(
                "cannot sort submissions by '{other}'"
            ))),
        }
    }
}

/// Parameters for listing assignments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentQuery {
    pub sort: Option<SortOrder<AssignmentSortField>>,
}

impl AssignmentQuery {
    /// Builds a query from an optional raw `sortBy` value.
    pub fn from_sort_by(sort_by: Option<&str>) -> Result<Self, StorageError> {
        let sort = sort_by
            .filter(|s| !s.trim().is_empty())
            .map(SortOrder::parse)
            .transpose()?;
        Ok(Self { sort })
    }
}

/// Parameters for listing submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionQuery {
    /// Only submissions for this assignment.
    pub assignment_id: Option<RecordId>,
    /// Only submissions whose assignment is due on this calendar day (UTC).
    pub due_on: Option<Date>,
    pub sort: SortOrder<SubmissionSortField>,
}

impl Default for SubmissionQuery {
    fn default() -> Self {
        Self {
            assignment_id: None,
            due_on: None,
            sort: SortOrder::new(SubmissionSortField::SubmittedAt, SortDirection::Asc),
        }
    }
}

impl SubmissionQuery {
    /// All submissions of one assignment in submission order.
    pub fn for_assignment(assignment_id: RecordId) -> Self {
        Self {
            assignment_id: Some(assignment_id),
            ..Self::default()
        }
    }
}
