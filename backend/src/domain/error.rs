// src/domain/error.rs

use serde::Serialize;
use thiserror::Error;

use super::lifecycle::AssignmentState;

/// A single schema-level failure, reported against the wire name of the field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// One grade entry whose score does not fit the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreViolation {
    pub answer_id: i64,
    pub score: i64,
    pub max_score: i64,
}

/// Failures produced by the assignment kernel.
///
/// Every variant is recoverable by the caller; storage failures never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Assignment is {0}; submissions are only accepted while it is active")]
    WindowClosed(AssignmentState),

    #[error("A submission for this assignment already exists")]
    AlreadySubmitted,

    #[error("Answers are incomplete or invalid: {0}")]
    IncompleteOrInvalidAnswers(String),

    #[error("Option {index} is out of range for question {question_id}")]
    InvalidOption { question_id: i64, index: i64 },

    #[error("{} score(s) out of range", .0.len())]
    ScoreOutOfRange(Vec<ScoreViolation>),

    #[error("Assignment already has submissions; its window and questions can no longer change")]
    AssignmentLocked,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation failed")]
    Validation(Vec<FieldError>),
}

impl DomainError {
    /// Stable machine-readable code sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::WindowClosed(_) => "WINDOW_CLOSED",
            DomainError::AlreadySubmitted => "ALREADY_SUBMITTED",
            DomainError::IncompleteOrInvalidAnswers(_) => "INCOMPLETE_OR_INVALID_ANSWERS",
            DomainError::InvalidOption { .. } => "INVALID_OPTION",
            DomainError::ScoreOutOfRange(_) => "SCORE_OUT_OF_RANGE",
            DomainError::AssignmentLocked => "ASSIGNMENT_LOCKED",
            DomainError::Forbidden => "FORBIDDEN",
            DomainError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

/// Converts `validator` output into one `FieldError` per offending field.
///
/// Field names are reported in camelCase to match the JSON payloads.
impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        DomainError::Validation(field_errors(&errors))
    }
}

pub fn field_errors(errors: &validator::ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            let first = errs.first()?;
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| first.code.to_string());
            Some(FieldError::new(camel_case(&field), message))
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
