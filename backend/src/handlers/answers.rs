// src/handlers/answers.rs

use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    domain::{
        DomainError,
        policy::{Action, authorize},
    },
    error::AppError,
    extractors::{AppJson, AppPath},
    handlers::submissions::apply_grades,
    models::submission::{
        AnswerResponse, GradeAnswerRequest, GradeEntryInput, GradeEvent, GradeResponse,
    },
    store,
    utils::jwt::Claims,
};

/// One answer with its question, for the submitting student or the owning lecturer.
pub async fn get_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let mut conn = pool.acquire().await?;

    let answer = store::fetch_answer(&mut conn, id)
        .await?
        .ok_or(DomainError::NotFound("Answer"))?;
    let submission = store::fetch_submission(&mut conn, answer.submission_id)
        .await?
        .ok_or(DomainError::NotFound("Submission"))?;
    let assignment = store::fetch_assignment(&mut conn, submission.assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        &session,
        Action::ViewSubmission {
            student_id: submission.student_id,
            lecturer_id: assignment.lecturer_id,
        },
    )?;

    let questions = store::fetch_questions(&mut conn, assignment.id).await?;
    let question = questions.iter().find(|q| q.id == answer.question_id);
    let owner_view = session.user_id == assignment.lecturer_id;

    Ok(Json(AnswerResponse::build(answer, question, owner_view)))
}

/// All answers of a submission in question order.
pub async fn list_answers(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(submission_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let mut conn = pool.acquire().await?;

    let submission = store::fetch_submission(&mut conn, submission_id)
        .await?
        .ok_or(DomainError::NotFound("Submission"))?;
    let assignment = store::fetch_assignment(&mut conn, submission.assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        &session,
        Action::ViewSubmission {
            student_id: submission.student_id,
            lecturer_id: assignment.lecturer_id,
        },
    )?;

    let questions = store::fetch_questions(&mut conn, assignment.id).await?;
    let owner_view = session.user_id == assignment.lecturer_id;
    let answers: Vec<AnswerResponse> = store::fetch_answers_for(&mut conn, &[submission_id])
        .await?
        .remove(&submission_id)
        .unwrap_or_default()
        .into_iter()
        .map(|answer| {
            let question = questions.iter().find(|q| q.id == answer.question_id);
            AnswerResponse::build(answer, question, owner_view)
        })
        .collect();

    Ok(Json(answers))
}

/// Grades a single answer as a one-entry batch.
pub async fn grade_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<GradeAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let entry = GradeEntryInput {
        answer_id: id,
        score: payload.score,
        submission_id: None,
        question_id: None,
    };
    let submissions = apply_grades(&pool, &session, &[entry]).await?;

    Ok(Json(GradeResponse {
        message: "Grade saved".to_string(),
        submissions,
    }))
}

/// Grading history of an answer, newest first.
pub async fn grade_history(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let mut conn = pool.acquire().await?;

    let target = store::fetch_grade_targets(&mut conn, &[id])
        .await?
        .into_iter()
        .next()
        .ok_or(DomainError::NotFound("Answer"))?;
    authorize(
        &session,
        Action::GradeSubmission {
            lecturer_id: target.lecturer_id,
        },
    )?;

    let events = sqlx::query_as::<_, GradeEvent>(
        r#"
        SELECT id, answer_id, lecturer_id, score, graded_at
        FROM grade_events
        WHERE answer_id = ?
        ORDER BY graded_at DESC, id DESC
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Json(events))
}
