// src/handlers/questions.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    domain::{
        DomainError, FieldError, Session,
        policy::{Action, authorize},
    },
    error::AppError,
    extractors::{AppJson, AppPath},
    models::{
        assignment::AssignmentRow,
        question::{
            CreateQuestionRequest, MAX_QUESTIONS, QuestionKind, QuestionResponse, check_question,
        },
    },
    store,
    utils::jwt::Claims,
};

fn validate(kind: &QuestionKind) -> Result<(), DomainError> {
    check_question(kind)
        .map_err(|reason| DomainError::Validation(vec![FieldError::new("question", reason)]))
}

/// Loads the assignment and checks the caller may still change its questions.
async fn editable_assignment(
    conn: &mut SqliteConnection,
    session: &Session,
    assignment_id: i64,
) -> Result<AssignmentRow, AppError> {
    let assignment = store::fetch_assignment(&mut *conn, assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        session,
        Action::ManageAssignment {
            lecturer_id: assignment.lecturer_id,
        },
    )?;

    if store::count_submissions(&mut *conn, assignment_id).await? > 0 {
        return Err(DomainError::AssignmentLocked.into());
    }
    Ok(assignment)
}

/// Appends a question to an assignment owned by the caller.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    validate(&payload.kind)?;

    let mut tx = pool.begin().await?;
    let assignment = editable_assignment(&mut tx, &session, payload.assignment_id).await?;

    let position = store::count_questions(&mut tx, assignment.id).await?;
    if position >= MAX_QUESTIONS as i64 {
        return Err(DomainError::Validation(vec![FieldError::new(
            "questions",
            format!("An assignment can hold at most {MAX_QUESTIONS} questions"),
        )])
        .into());
    }

    let id = store::insert_question(&mut tx, assignment.id, position, &payload.kind).await?;
    let (_, question) = store::fetch_question(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Question"))?;

    tx.commit().await?;

    tracing::info!(question_id = id, assignment_id = assignment.id, "question created");

    Ok((
        StatusCode::CREATED,
        Json(QuestionResponse::build(assignment.id, question, true)),
    ))
}

/// Questions of one assignment, in authoring order.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(assignment_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    authorize(&session, Action::ViewAssignment)?;

    let mut conn = pool.acquire().await?;
    let assignment = store::fetch_assignment(&mut conn, assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    let owner_view = session.user_id == assignment.lecturer_id;

    let questions: Vec<QuestionResponse> = store::fetch_questions(&mut conn, assignment_id)
        .await?
        .into_iter()
        .map(|q| QuestionResponse::build(assignment_id, q, owner_view))
        .collect();

    Ok(Json(questions))
}

pub async fn get_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    authorize(&session, Action::ViewAssignment)?;

    let mut conn = pool.acquire().await?;
    let (assignment_id, question) = store::fetch_question(&mut conn, id)
        .await?
        .ok_or(DomainError::NotFound("Question"))?;
    let assignment = store::fetch_assignment(&mut conn, assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    let owner_view = session.user_id == assignment.lecturer_id;

    Ok(Json(QuestionResponse::build(assignment_id, question, owner_view)))
}

/// Replaces a question's body. The kind may change; id and position stay.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<QuestionKind>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    validate(&payload)?;

    let mut tx = pool.begin().await?;
    let (assignment_id, _) = store::fetch_question(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Question"))?;
    editable_assignment(&mut tx, &session, assignment_id).await?;

    store::update_question(&mut tx, id, &payload).await?;
    let (_, question) = store::fetch_question(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Question"))?;

    tx.commit().await?;

    tracing::info!(question_id = id, assignment_id, "question updated");

    Ok(Json(QuestionResponse::build(assignment_id, question, true)))
}

/// Removes a question. An assignment always keeps at least one.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;

    let mut tx = pool.begin().await?;
    let (assignment_id, question) = store::fetch_question(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Question"))?;
    editable_assignment(&mut tx, &session, assignment_id).await?;

    if store::count_questions(&mut tx, assignment_id).await? <= 1 {
        return Err(DomainError::Validation(vec![FieldError::new(
            "questions",
            "An assignment needs at least one question",
        )])
        .into());
    }

    store::delete_question(&mut tx, assignment_id, &question).await?;

    tx.commit().await?;

    tracing::info!(question_id = id, assignment_id, "question deleted");

    Ok(StatusCode::NO_CONTENT)
}
