// src/handlers/assignments.rs

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    domain::{
        DomainError, FieldError, lifecycle,
        policy::{Action, authorize},
    },
    error::AppError,
    extractors::{AppJson, AppPath, AppQuery},
    models::assignment::{
        AssignmentResponse, CreateAssignmentRequest, ListParams, UpdateAssignmentRequest,
    },
    store,
    utils::{html::clean_html, jwt::Claims},
};

/// Creates an assignment with its questions. Lecturers only.
pub async fn create_assignment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppJson(payload): AppJson<CreateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    authorize(&session, Action::CreateAssignment)?;

    payload.validate()?;
    lifecycle::validate_window(payload.start_date, payload.end_date)?;

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO assignments
        (lecturer_id, course_name, title, description, start_date, end_date, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(session.user_id)
    .bind(payload.course_name.trim())
    .bind(payload.title.trim())
    .bind(clean_html(&payload.description))
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create assignment: {:?}", e);
        AppError::from(e)
    })?;

    store::insert_questions(&mut tx, id, &payload.questions).await?;

    let row = store::fetch_assignment(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    let questions = store::fetch_questions(&mut tx, id).await?;

    tx.commit().await?;

    tracing::info!(
        assignment_id = id,
        lecturer_id = session.user_id,
        questions = questions.len(),
        "assignment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(AssignmentResponse::build(row, questions, &session, now)),
    ))
}

/// Lists assignments, optionally filtered by course and derived status.
pub async fn list_assignments(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    authorize(&session, Action::ViewAssignment)?;

    let now = Utc::now();
    let mut conn = pool.acquire().await?;

    let rows: Vec<_> = store::list_assignments(&mut conn, params.course.as_deref())
        .await?
        .into_iter()
        .filter(|row| params.status.is_none_or(|status| row.state(now) == status))
        .collect();

    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut questions = store::fetch_questions_for(&mut conn, &ids).await?;

    let assignments: Vec<AssignmentResponse> = rows
        .into_iter()
        .map(|row| {
            let qs = questions.remove(&row.id).unwrap_or_default();
            AssignmentResponse::build(row, qs, &session, now)
        })
        .collect();

    Ok(Json(assignments))
}

/// Returns one assignment with its questions embedded.
pub async fn get_assignment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    authorize(&session, Action::ViewAssignment)?;

    let mut conn = pool.acquire().await?;
    let row = store::fetch_assignment(&mut conn, id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    let questions = store::fetch_questions(&mut conn, id).await?;

    Ok(Json(AssignmentResponse::build(
        row,
        questions,
        &session,
        Utc::now(),
    )))
}

/// Partially updates an assignment owned by the caller.
///
/// Window and questions are frozen once any submission exists.
pub async fn update_assignment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
    AppJson(payload): AppJson<UpdateAssignmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;

    if payload.is_empty() {
        return Err(DomainError::Validation(vec![FieldError::new(
            "body",
            "At least one field must be provided",
        )])
        .into());
    }
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let current = store::fetch_assignment(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        &session,
        Action::ManageAssignment {
            lecturer_id: current.lecturer_id,
        },
    )?;

    lifecycle::validate_window(
        payload.start_date.unwrap_or(current.start_date),
        payload.end_date.unwrap_or(current.end_date),
    )?;

    if payload.touches_locked_fields() && store::count_submissions(&mut tx, id).await? > 0 {
        return Err(DomainError::AssignmentLocked.into());
    }

    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE assignments SET ");
    let mut set = builder.separated(", ");
    let mut changed = false;
    if let Some(course_name) = &payload.course_name {
        set.push("course_name = ").push_bind_unseparated(course_name.trim().to_string());
        changed = true;
    }
    if let Some(title) = &payload.title {
        set.push("title = ").push_bind_unseparated(title.trim().to_string());
        changed = true;
    }
    if let Some(description) = &payload.description {
        set.push("description = ").push_bind_unseparated(clean_html(description));
        changed = true;
    }
    if let Some(start_date) = payload.start_date {
        set.push("start_date = ").push_bind_unseparated(start_date);
        changed = true;
    }
    if let Some(end_date) = payload.end_date {
        set.push("end_date = ").push_bind_unseparated(end_date);
        changed = true;
    }
    if changed {
        builder.push(" WHERE id = ").push_bind(id);
        builder.build().execute(&mut *tx).await?;
    }

    if let Some(questions) = &payload.questions {
        sqlx::query("DELETE FROM questions WHERE assignment_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        store::insert_questions(&mut tx, id, questions).await?;
    }

    let row = store::fetch_assignment(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    let questions = store::fetch_questions(&mut tx, id).await?;

    tx.commit().await?;

    tracing::info!(assignment_id = id, "assignment updated");

    Ok(Json(AssignmentResponse::build(
        row,
        questions,
        &session,
        Utc::now(),
    )))
}

/// Deletes an assignment together with its questions and submissions.
pub async fn delete_assignment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;
    let mut tx = pool.begin().await?;

    let row = store::fetch_assignment(&mut tx, id)
        .await?
        .ok_or(DomainError::NotFound("Assignment"))?;
    authorize(
        &session,
        Action::ManageAssignment {
            lecturer_id: row.lecturer_id,
        },
    )?;

    sqlx::query("DELETE FROM assignments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(assignment_id = id, "assignment deleted");

    Ok(StatusCode::NO_CONTENT)
}
