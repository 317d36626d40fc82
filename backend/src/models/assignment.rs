// src/models/assignment.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::{
    domain::{AssignmentState, Session, grading, lifecycle},
    models::question::{PublicQuestion, Question, QuestionKind, validate_questions},
};

/// Represents the 'assignments' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AssignmentRow {
    pub id: i64,
    pub lecturer_id: i64,
    pub course_name: String,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRow {
    pub fn state(&self, now: DateTime<Utc>) -> AssignmentState {
        lifecycle::evaluate(self.start_date, self.end_date, now)
    }
}

/// Questions as seen by the caller: with answer keys for the owner only.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QuestionsView {
    Full(Vec<Question>),
    Public(Vec<PublicQuestion>),
}

/// DTO for returning an assignment with its derived lifecycle state.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub id: i64,
    pub lecturer_id: i64,
    pub course_name: String,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub status: AssignmentState,
    /// Seconds until the window closes, only while active.
    pub time_remaining_secs: Option<i64>,
    pub max_score: i64,
    pub questions: QuestionsView,
}

impl AssignmentResponse {
    pub fn build(
        row: AssignmentRow,
        questions: Vec<Question>,
        viewer: &Session,
        now: DateTime<Utc>,
    ) -> Self {
        let status = row.state(now);
        let time_remaining_secs =
            lifecycle::time_remaining(row.start_date, row.end_date, now).map(|d| d.num_seconds());
        let max_score = grading::totals(questions.iter().map(|q| (None, q.kind.max_score()))).max_score;
        let questions = if viewer.user_id == row.lecturer_id {
            QuestionsView::Full(questions)
        } else {
            QuestionsView::Public(questions.iter().map(PublicQuestion::from).collect())
        };

        Self {
            id: row.id,
            lecturer_id: row.lecturer_id,
            course_name: row.course_name,
            title: row.title,
            description: row.description,
            start_date: row.start_date,
            end_date: row.end_date,
            created_at: row.created_at,
            status,
            time_remaining_secs,
            max_score,
            questions,
        }
    }
}

/// DTO for creating an assignment.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssignmentRequest {
    #[validate(length(
        min = 2,
        max = 200,
        message = "Course name must be at least 2 characters long"
    ))]
    pub course_name: String,
    #[validate(length(min = 3, max = 200, message = "Title must be at least 3 characters long"))]
    pub title: String,
    #[validate(length(
        min = 10,
        max = 5000,
        message = "Description must be at least 10 characters long"
    ))]
    pub description: String,
    #[serde(with = "timestamp")]
    pub start_date: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub end_date: DateTime<Utc>,
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<QuestionKind>,
}

/// DTO for updating an assignment. Fields are optional.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssignmentRequest {
    #[validate(length(
        min = 2,
        max = 200,
        message = "Course name must be at least 2 characters long"
    ))]
    pub course_name: Option<String>,
    #[validate(length(min = 3, max = 200, message = "Title must be at least 3 characters long"))]
    pub title: Option<String>,
    #[validate(length(
        min = 10,
        max = 5000,
        message = "Description must be at least 10 characters long"
    ))]
    pub description: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub end_date: Option<DateTime<Utc>>,
    /// Replaces every question when present.
    #[validate(custom(function = validate_questions))]
    pub questions: Option<Vec<QuestionKind>>,
}

impl UpdateAssignmentRequest {
    pub fn is_empty(&self) -> bool {
        self.course_name.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.questions.is_none()
    }

    /// Window or question changes, which are frozen once students have submitted.
    pub fn touches_locked_fields(&self) -> bool {
        self.start_date.is_some() || self.end_date.is_some() || self.questions.is_some()
    }
}

/// Query parameters for listing assignments.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<AssignmentState>,
    pub course: Option<String>,
}

/// Accepts RFC 3339 timestamps, and offset-less `datetime-local` values
/// (`2025-03-01T09:00`, optional seconds) which are read as UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            dt: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match dt {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp '{raw}'"))
                }),
                None => Ok(None),
            }
        }
    }
}
