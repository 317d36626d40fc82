// src/handlers/submissions.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    domain::{
        DomainError, FieldError, Session,
        grading::{self, GradeEntry, GradeTarget},
        lifecycle,
        policy::{Action, authorize},
        submission::{self, SubmittedAnswer},
    },
    error::{AppError, is_unique_violation},
    extractors::{AppJson, AppPath},
    models::submission::{
        CreateSubmissionRequest, GradeEntryInput, GradeResponse, SubmissionResponse,
        SubmissionTotals,
    },
    store,
    utils::{html::clean_html, jwt::Claims},
};

/// Submits a student's answers for an assignment.
///
/// Runs in one write transaction: the window is checked against the server
/// clock, and the UNIQUE (student, assignment) constraint settles concurrent
/// duplicates.
pub async fn create_submission(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateSubmissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    authorize(&session, Action::CreateSubmission)?;

    let Some(assignment_id) = payload.answers.first().map(|a| a.assignment_id) else {
        return Err(DomainError::Validation(vec![FieldError::new(
            "answers",
            "At least one answer is required",
        )])
        .into());
    };

    // studentId is advisory, but a foreign one is never accepted.
    if payload
        .answers
        .iter()
        .any(|a| a.student_id.is_some_and(|id| id != session.user_id))
    {
        return Err(DomainError::Forbidden.into());
    }

    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let assignment = store::fetch_assignment(&mut tx, assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;

    let now = Utc::now();
    lifecycle::ensure_open(assignment.start_date, assignment.end_date, now)?;

    if store::find_submission_id(&mut tx, session.user_id, assignment_id)
        .await?
        .is_some()
    {
        return Err(DomainError::AlreadySubmitted.into());
    }

    if payload.answers.iter().any(|a| a.assignment_id != assignment_id) {
        return Err(DomainError::IncompleteOrInvalidAnswers(
            "answers must all reference the same assignment".to_string(),
        )
        .into());
    }

    let questions = store::fetch_questions(&mut tx, assignment_id).await?;
    let submitted: Vec<SubmittedAnswer> = payload
        .answers
        .iter()
        .map(|input| {
            let mut answer = SubmittedAnswer::from(input);
            answer.answer_text = answer.answer_text.map(|text| clean_html(&text));
            answer
        })
        .collect();
    let new_answers = submission::assemble(&questions, &submitted)?;

    let submission_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO submissions (assignment_id, student_id, created_at)
        VALUES (?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(assignment_id)
    .bind(session.user_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::from(DomainError::AlreadySubmitted)
        } else {
            tracing::error!("Failed to insert submission: {:?}", e);
            AppError::from(e)
        }
    })?;

    for answer in &new_answers {
        sqlx::query(
            r#"
            INSERT INTO answers (submission_id, question_id, selected_option, answer_text, score)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(submission_id)
        .bind(answer.question_id)
        .bind(answer.selected_option)
        .bind(&answer.answer_text)
        .bind(answer.score)
        .execute(&mut *tx)
        .await?;
    }

    let row = store::fetch_submission(&mut tx, submission_id)
        .await?
        .ok_or(DomainError::NotFound("Submission"))?;
    let answers = store::fetch_answers_for(&mut tx, &[submission_id])
        .await?
        .remove(&submission_id)
        .unwrap_or_default();
    let username = store::fetch_username(&mut tx, session.user_id).await?;

    tx.commit().await?;

    tracing::info!(
        submission_id,
        assignment_id,
        student_id = session.user_id,
        "submission created"
    );

    Ok((
        StatusCode::CREATED,
        Json(SubmissionResponse::build(
            row, username, answers, &questions, false,
        )),
    ))
}

/// Applies a grading batch atomically and returns the new totals of every
/// submission it touched.
///
/// Nothing is written unless every entry is owned by the caller and in range.
pub(crate) async fn apply_grades(
    pool: &SqlitePool,
    session: &Session,
    inputs: &[GradeEntryInput],
) -> Result<Vec<SubmissionTotals>, AppError> {
    let entries: Vec<GradeEntry> = inputs.iter().map(GradeEntry::from).collect();
    let answer_ids: Vec<i64> = entries.iter().map(|e| e.answer_id).collect();

    let mut tx = pool.begin_with("BEGIN IMMEDIATE").await?;

    let rows = store::fetch_grade_targets(&mut tx, &answer_ids).await?;
    let targets: Vec<GradeTarget> = rows
        .iter()
        .map(|row| GradeTarget {
            answer_id: row.answer_id,
            submission_id: row.submission_id,
            lecturer_id: row.lecturer_id,
            max_score: row.max_score,
        })
        .collect();

    grading::validate_batch(session, &entries, &targets)?;

    let by_answer: HashMap<i64, &store::GradeTargetRow> =
        rows.iter().map(|row| (row.answer_id, row)).collect();
    let mismatches: Vec<FieldError> = inputs
        .iter()
        .filter_map(|input| {
            let row = by_answer.get(&input.answer_id)?;
            if input.submission_id.is_some_and(|id| id != row.submission_id) {
                Some(FieldError::new(
                    "submissionId",
                    format!("Answer {} belongs to another submission", input.answer_id),
                ))
            } else if input.question_id.is_some_and(|id| id != row.question_id) {
                Some(FieldError::new(
                    "questionId",
                    format!("Answer {} belongs to another question", input.answer_id),
                ))
            } else {
                None
            }
        })
        .collect();
    if !mismatches.is_empty() {
        return Err(DomainError::Validation(mismatches).into());
    }

    let graded_at = Utc::now();
    let mut submission_ids: Vec<i64> = Vec::new();
    for entry in &entries {
        store::record_grade(&mut tx, entry.answer_id, session.user_id, entry.score, graded_at)
            .await?;
        let submission_id = by_answer[&entry.answer_id].submission_id;
        if !submission_ids.contains(&submission_id) {
            submission_ids.push(submission_id);
        }
    }

    let mut updated = Vec::with_capacity(submission_ids.len());
    for submission_id in submission_ids {
        let scores = store::submission_scores(&mut tx, submission_id).await?;
        updated.push(SubmissionTotals {
            submission_id,
            totals: grading::totals(scores),
        });
    }

    tx.commit().await?;

    tracing::info!(
        lecturer_id = session.user_id,
        entries = entries.len(),
        submissions = updated.len(),
        "grades applied"
    );

    Ok(updated)
}

/// Grades a batch of answers.
pub async fn grade_submissions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<Vec<GradeEntryInput>>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let submissions = apply_grades(&pool, &session, &payload).await?;

    Ok(Json(GradeResponse {
        message: "Grades saved".to_string(),
        submissions,
    }))
}

/// All submissions of an assignment, for its owning lecturer.
pub async fn list_submissions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(assignment_id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let mut conn = pool.acquire().await?;

    let assignment = store::fetch_assignment(&mut conn, assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        &session,
        Action::GradeSubmission {
            lecturer_id: assignment.lecturer_id,
        },
    )?;

    let questions = store::fetch_questions(&mut conn, assignment_id).await?;
    let rows = store::list_submissions(&mut conn, assignment_id).await?;
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut answers = store::fetch_answers_for(&mut conn, &ids).await?;

    let submissions: Vec<SubmissionResponse> = rows
        .into_iter()
        .map(|row| {
            let (row, username) = row.split();
            let answers = answers.remove(&row.id).unwrap_or_default();
            SubmissionResponse::build(row, Some(username), answers, &questions, true)
        })
        .collect();

    Ok(Json(submissions))
}

/// One submission, for the student who made it or the owning lecturer.
pub async fn get_submission(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let mut conn = pool.acquire().await?;

    let row = store::fetch_submission(&mut conn, id)
        .await?
        .ok_or(DomainError::NotFound("Submission"))?;
    let assignment = store::fetch_assignment(&mut conn, row.assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        &session,
        Action::ViewSubmission {
            student_id: row.student_id,
            lecturer_id: assignment.lecturer_id,
        },
    )?;

    let questions = store::fetch_questions(&mut conn, assignment.id).await?;
    let answers = store::fetch_answers_for(&mut conn, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    let username = store::fetch_username(&mut conn, row.student_id).await?;
    let owner_view = session.user_id == assignment.lecturer_id;

    Ok(Json(SubmissionResponse::build(
        row, username, answers, &questions, owner_view,
    )))
}

/// Removes a submission so the student may submit again while the window is open.
pub async fn delete_submission(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let mut tx = pool.begin().await?;

    let row = store::fetch_submission(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Submission"))?;
    let assignment = store::fetch_assignment(&mut tx, row.assignment_id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        &session,
        Action::GradeSubmission {
            lecturer_id: assignment.lecturer_id,
        },
    )?;

    sqlx::query("DELETE FROM submissions WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(submission_id = id, "submission deleted");

    Ok(StatusCode::NO_CONTENT)
}
