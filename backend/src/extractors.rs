// src/extractors.rs

//! Drop-in replacements for axum's `Json`, `Path` and `Query` whose rejections
//! come back as `VALIDATION_ERROR` bodies instead of plain-text 4xx responses.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts, Path, Query, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::request::Parts,
};
use serde::de::DeserializeOwned;

use crate::{
    domain::{DomainError, FieldError},
    error::AppError,
};

const JSON_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";
const QUERY_PREFIX: &str = "Failed to deserialize query string: ";

/// Works out which field a serde error is about.
///
/// axum prefixes data errors with the JSON path (`questions[0].maxScore: ...`);
/// top-level missing fields only show up as ``missing field `title` ``.
fn field_error(fallback: &str, prefix: &str, text: &str) -> FieldError {
    let detail = text.strip_prefix(prefix).unwrap_or(text);

    let path = detail
        .split_once(": ")
        .map(|(head, _)| head)
        .filter(|head| !head.is_empty() && !head.contains(char::is_whitespace));

    let missing = detail
        .split_once("missing field `")
        .and_then(|(_, rest)| rest.split_once('`'))
        .map(|(name, _)| name);

    let field = match (path, missing) {
        (Some(path), Some(name)) => format!("{path}.{name}"),
        (Some(path), None) => path.to_string(),
        (None, Some(name)) => name.to_string(),
        (None, None) => fallback.to_string(),
    };

    FieldError::new(field, detail)
}

fn rejected(error: FieldError) -> AppError {
    DomainError::Validation(vec![error]).into()
}

/// JSON body extractor reporting malformed payloads per field.
pub struct AppJson<T>(pub T);

impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| match e {
                JsonRejection::JsonDataError(_) => {
                    rejected(field_error("body", JSON_PREFIX, &e.body_text()))
                }
                other => rejected(FieldError::new("body", other.body_text())),
            })?;
        Ok(AppJson(value))
    }
}

/// Path extractor; a non-numeric id becomes a validation error on `id`.
pub struct AppPath<T>(pub T);

impl<S, T> FromRequestParts<S> for AppPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| rejected(FieldError::new("id", e.body_text())))?;
        Ok(AppPath(value))
    }
}

/// Query string extractor.
pub struct AppQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| rejected(field_error("query", QUERY_PREFIX, &e.body_text())))?;
        Ok(AppQuery(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_top_level_field() {
        let err = field_error(
            "body",
            JSON_PREFIX,
            "Failed to deserialize the JSON body into the target type: missing field `title` at line 1 column 23",
        );
        assert_eq!(err.field, "title");
    }

    #[test]
    fn test_nested_path_is_kept() {
        let err = field_error(
            "body",
            JSON_PREFIX,
            "Failed to deserialize the JSON body into the target type: startDate: invalid timestamp 'soon' at line 1 column 40",
        );
        assert_eq!(err.field, "startDate");
        assert!(err.message.starts_with("startDate: invalid timestamp"));

        let err = field_error(
            "body",
            JSON_PREFIX,
            "Failed to deserialize the JSON body into the target type: questions[0]: missing field `maxScore` at line 1 column 90",
        );
        assert_eq!(err.field, "questions[0].maxScore");
    }

    #[test]
    fn test_unattributable_errors_fall_back() {
        let err = field_error("query", QUERY_PREFIX, "Failed to deserialize query string: expected a sequence");
        assert_eq!(err.field, "query");
    }
}
