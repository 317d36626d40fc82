// src/handlers/users.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    domain::policy::{Action, authorize},
    error::{AppError, is_unique_violation},
    extractors::{AppJson, AppPath},
    models::user::{LoginRequest, ProfileResponse, RegisterRequest, SessionUser, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

/// Registers a new student or lecturer.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let hashed_password = hash_password(&payload.password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, password, role, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING id, username, password, role, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(hashed_password)
    .bind(payload.role.as_str())
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to register user: {:?}", e);
            AppError::from(e)
        }
    })?;

    tracing::info!(user_id = user.id, role = %payload.role, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful",
            "data": user
        })),
    ))
}

/// Authenticates a user and returns a bearer token.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE username = ?",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::from(e)
    })?;

    // Same message for unknown user and wrong password.
    let user = user.ok_or(AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let role = user.role().map_err(AppError::InternalServerError)?;
    let token = sign_jwt(
        user.id,
        &user.username,
        role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "message": "Login successful",
        "data": SessionUser {
            id: user.id,
            username: user.username,
            role,
            access_token: token,
        }
    })))
}

/// Current user's profile and activity counts.
pub async fn profile(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE id = ?",
    )
    .bind(session.user_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let (assignments_count, submissions_count) = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM assignments WHERE lecturer_id = ?1),
            (SELECT COUNT(*) FROM submissions WHERE student_id = ?1)
        "#,
    )
    .bind(session.user_id)
    .fetch_one(&pool)
    .await?;

    let role = user.role().map_err(AppError::InternalServerError)?;

    Ok(Json(ProfileResponse {
        id: user.id,
        username: user.username,
        role,
        created_at: user.created_at,
        assignments_count,
        submissions_count,
    }))
}

/// Lists all users. Lecturers only.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    authorize(&claims.session()?, Action::ListUsers)?;

    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::from(e)
    })?;

    Ok(Json(users))
}

/// Deletes an account with everything it owns. Lecturers may remove students
/// and their own account.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    AppPath(id): AppPath<i64>,
) -> Result<impl IntoResponse, AppError> {
    let session = claims.session()?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password, role, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("User not found".to_string()))?;

    let role = user.role().map_err(AppError::InternalServerError)?;
    authorize(&session, Action::DeleteUser { user_id: id, role })?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!(user_id = id, deleted_by = session.user_id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}
