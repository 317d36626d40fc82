// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::domain::DomainError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (e.g., duplicate username)
    Conflict(String),

    // Kernel failures, status chosen per variant
    Domain(DomainError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Domain(err) => write!(f, "{}", err),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Forbidden => StatusCode::FORBIDDEN,
        DomainError::WindowClosed(_)
        | DomainError::AlreadySubmitted
        | DomainError::AssignmentLocked => StatusCode::CONFLICT,
        DomainError::IncompleteOrInvalidAnswers(_)
        | DomainError::InvalidOption { .. }
        | DomainError::ScoreOutOfRange(_)
        | DomainError::Validation(_) => StatusCode::BAD_REQUEST,
    }
}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal Server Error", "code": "INTERNAL" }),
                )
            }
            AppError::AuthError(msg) => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": msg, "code": "UNAUTHORIZED" }),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                json!({ "error": msg, "code": "NOT_FOUND" }),
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                json!({ "error": msg, "code": "CONFLICT" }),
            ),
            AppError::Domain(err) => {
                let status = domain_status(&err);
                let mut body = json!({ "error": err.to_string(), "code": err.code() });
                match &err {
                    DomainError::Validation(fields) => body["fields"] = json!(fields),
                    DomainError::ScoreOutOfRange(violations) => {
                        body["violations"] = json!(violations)
                    }
                    DomainError::WindowClosed(state) => body["state"] = json!(state),
                    _ => {}
                }
                (status, body)
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::Domain(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Domain(DomainError::from(errors))
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// True when the database rejected a write because of a UNIQUE constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AssignmentState, FieldError};

    #[test]
    fn test_domain_errors_map_to_statuses() {
        let cases = [
            (DomainError::NotFound("Assignment"), StatusCode::NOT_FOUND),
            (DomainError::Forbidden, StatusCode::FORBIDDEN),
            (
                DomainError::WindowClosed(AssignmentState::Pending),
                StatusCode::CONFLICT,
            ),
            (DomainError::AlreadySubmitted, StatusCode::CONFLICT),
            (
                DomainError::Validation(vec![FieldError::new("title", "too short")]),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[tokio::test]
    async fn test_duplicate_submission_is_a_unique_violation() {
        let pool = crate::db::connect_in_memory().await.unwrap();
        crate::db::migrate(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO users (id, username, password, role, created_at) VALUES (1, 'sam', 'x', 'STUDENT', '2030-01-01T00:00:00Z'), (2, 'prof', 'x', 'LECTURER', '2030-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO assignments (id, lecturer_id, course_name, title, description, start_date, end_date, created_at) VALUES (1, 2, 'Networks', 'Quiz', 'Routing basics', '2030-01-01T00:00:00Z', '2030-01-02T00:00:00Z', '2030-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let insert = "INSERT INTO submissions (assignment_id, student_id, created_at) VALUES (1, 1, '2030-01-01T01:00:00Z')";
        sqlx::query(insert).execute(&pool).await.unwrap();
        let err = sqlx::query(insert).execute(&pool).await.unwrap_err();

        assert!(is_unique_violation(&err));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let resp = AppError::InternalServerError("disk on fire".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
