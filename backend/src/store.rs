// src/store.rs

//! SQL shared by the handlers. Every function takes a plain connection so the
//! same code runs on a pooled connection or inside a transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, types::Json};

use crate::{
    error::AppError,
    models::{
        assignment::AssignmentRow,
        question::{Question, QuestionKind, QuestionRow},
        submission::{AnswerRow, SubmissionRow},
    },
    utils::html::clean_html,
};

const ASSIGNMENT_COLUMNS: &str =
    "id, lecturer_id, course_name, title, description, start_date, end_date, created_at";

const QUESTION_COLUMNS: &str =
    "id, assignment_id, position, kind, prompt, description, options, correct_answer, max_score";

const ANSWER_COLUMNS: &str =
    "id, submission_id, question_id, selected_option, answer_text, score";

pub async fn fetch_assignment(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<AssignmentRow>, AppError> {
    let row = sqlx::query_as::<_, AssignmentRow>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

pub async fn list_assignments(
    conn: &mut SqliteConnection,
    course: Option<&str>,
) -> Result<Vec<AssignmentRow>, AppError> {
    let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
        "SELECT {ASSIGNMENT_COLUMNS} FROM assignments
         WHERE (?1 IS NULL OR course_name = ?1)
         ORDER BY start_date DESC, id DESC"
    ))
    .bind(course)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

fn into_questions(rows: Vec<QuestionRow>) -> Result<Vec<Question>, AppError> {
    rows.into_iter()
        .map(|row| Question::try_from(row).map_err(AppError::InternalServerError))
        .collect()
}

/// Questions of one assignment, in authoring order.
pub async fn fetch_questions(
    conn: &mut SqliteConnection,
    assignment_id: i64,
) -> Result<Vec<Question>, AppError> {
    let rows = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE assignment_id = ? ORDER BY position"
    ))
    .bind(assignment_id)
    .fetch_all(&mut *conn)
    .await?;
    into_questions(rows)
}

/// Questions of several assignments, grouped by assignment id.
pub async fn fetch_questions_for(
    conn: &mut SqliteConnection,
    assignment_ids: &[i64],
) -> Result<HashMap<i64, Vec<Question>>, AppError> {
    let mut grouped: HashMap<i64, Vec<Question>> = HashMap::new();
    if assignment_ids.is_empty() {
        return Ok(grouped);
    }

    let mut builder = QueryBuilder::<Sqlite>::new(format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE assignment_id IN ("
    ));
    let mut separated = builder.separated(",");
    for id in assignment_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY assignment_id, position");

    let rows: Vec<QuestionRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    for row in rows {
        let assignment_id = row.assignment_id;
        let question = Question::try_from(row).map_err(AppError::InternalServerError)?;
        grouped.entry(assignment_id).or_default().push(question);
    }
    Ok(grouped)
}

/// Column values for a question body: prompt, description, options, correct answer.
type QuestionColumns = (String, Option<String>, Option<Json<Vec<String>>>, Option<i64>);

fn question_columns(kind: &QuestionKind) -> QuestionColumns {
    match kind {
        QuestionKind::MultipleChoice(mc) => (
            mc.question.clone(),
            None,
            Some(Json(mc.options.clone())),
            Some(mc.correct_answer),
        ),
        QuestionKind::FreeText(ft) => (
            ft.title.clone(),
            Some(clean_html(&ft.description)),
            None,
            None,
        ),
    }
}

pub async fn insert_question(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    position: i64,
    kind: &QuestionKind,
) -> Result<i64, AppError> {
    let (prompt, description, options, correct_answer) = question_columns(kind);

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions
        (assignment_id, position, kind, prompt, description, options, correct_answer, max_score)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(assignment_id)
    .bind(position)
    .bind(kind.as_str())
    .bind(prompt)
    .bind(description)
    .bind(options)
    .bind(correct_answer)
    .bind(kind.max_score())
    .fetch_one(&mut *conn)
    .await?;
    Ok(id)
}

pub async fn insert_questions(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    questions: &[QuestionKind],
) -> Result<(), AppError> {
    for (position, kind) in questions.iter().enumerate() {
        insert_question(&mut *conn, assignment_id, position as i64, kind).await?;
    }
    Ok(())
}

/// A single question together with the assignment it belongs to.
pub async fn fetch_question(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<(i64, Question)>, AppError> {
    let row = sqlx::query_as::<_, QuestionRow>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.map(|row| {
        let assignment_id = row.assignment_id;
        Question::try_from(row)
            .map(|q| (assignment_id, q))
            .map_err(AppError::InternalServerError)
    })
    .transpose()
}

/// Replaces the body of a question in place, keeping its id and position.
pub async fn update_question(
    conn: &mut SqliteConnection,
    id: i64,
    kind: &QuestionKind,
) -> Result<(), AppError> {
    let (prompt, description, options, correct_answer) = question_columns(kind);

    sqlx::query(
        r#"
        UPDATE questions
        SET kind = ?, prompt = ?, description = ?, options = ?, correct_answer = ?, max_score = ?
        WHERE id = ?
        "#,
    )
    .bind(kind.as_str())
    .bind(prompt)
    .bind(description)
    .bind(options)
    .bind(correct_answer)
    .bind(kind.max_score())
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Deletes a question and closes the gap it leaves in the ordering.
pub async fn delete_question(
    conn: &mut SqliteConnection,
    assignment_id: i64,
    question: &Question,
) -> Result<(), AppError> {
    sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(question.id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("UPDATE questions SET position = position - 1 WHERE assignment_id = ? AND position > ?")
        .bind(assignment_id)
        .bind(question.position)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn count_questions(
    conn: &mut SqliteConnection,
    assignment_id: i64,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE assignment_id = ?")
        .bind(assignment_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn count_submissions(
    conn: &mut SqliteConnection,
    assignment_id: i64,
) -> Result<i64, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE assignment_id = ?")
        .bind(assignment_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(count)
}

pub async fn fetch_submission(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<SubmissionRow>, AppError> {
    let row = sqlx::query_as::<_, SubmissionRow>(
        "SELECT id, assignment_id, student_id, created_at FROM submissions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

pub async fn find_submission_id(
    conn: &mut SqliteConnection,
    student_id: i64,
    assignment_id: i64,
) -> Result<Option<i64>, AppError> {
    let id = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM submissions WHERE student_id = ? AND assignment_id = ?",
    )
    .bind(student_id)
    .bind(assignment_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(id)
}

/// A submission of an assignment joined with the student's username.
#[derive(Debug, sqlx::FromRow)]
pub struct SubmissionWithStudent {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

impl SubmissionWithStudent {
    pub fn split(self) -> (SubmissionRow, String) {
        (
            SubmissionRow {
                id: self.id,
                assignment_id: self.assignment_id,
                student_id: self.student_id,
                created_at: self.created_at,
            },
            self.username,
        )
    }
}

pub async fn list_submissions(
    conn: &mut SqliteConnection,
    assignment_id: i64,
) -> Result<Vec<SubmissionWithStudent>, AppError> {
    let rows = sqlx::query_as::<_, SubmissionWithStudent>(
        r#"
        SELECT s.id, s.assignment_id, s.student_id, s.created_at, u.username
        FROM submissions s
        JOIN users u ON u.id = s.student_id
        WHERE s.assignment_id = ?
        ORDER BY s.created_at, s.id
        "#,
    )
    .bind(assignment_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn fetch_username(conn: &mut SqliteConnection, user_id: i64) -> Result<Option<String>, AppError> {
    let name = sqlx::query_scalar::<_, String>("SELECT username FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(name)
}

/// Answers of several submissions, grouped by submission id.
pub async fn fetch_answers_for(
    conn: &mut SqliteConnection,
    submission_ids: &[i64],
) -> Result<HashMap<i64, Vec<AnswerRow>>, AppError> {
    let mut grouped: HashMap<i64, Vec<AnswerRow>> = HashMap::new();
    if submission_ids.is_empty() {
        return Ok(grouped);
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT a.id, a.submission_id, a.question_id, a.selected_option, a.answer_text, a.score
        FROM answers a
        JOIN questions q ON q.id = a.question_id
        WHERE a.submission_id IN ("#,
    );
    let mut separated = builder.separated(",");
    for id in submission_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY a.submission_id, q.position");

    let rows: Vec<AnswerRow> = builder.build_query_as().fetch_all(&mut *conn).await?;
    for row in rows {
        grouped.entry(row.submission_id).or_default().push(row);
    }
    Ok(grouped)
}

pub async fn fetch_answer(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<AnswerRow>, AppError> {
    let row = sqlx::query_as::<_, AnswerRow>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM answers WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}

/// Everything needed to authorize and range-check the grading of an answer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GradeTargetRow {
    pub answer_id: i64,
    pub submission_id: i64,
    pub question_id: i64,
    pub lecturer_id: i64,
    pub max_score: i64,
}

pub async fn fetch_grade_targets(
    conn: &mut SqliteConnection,
    answer_ids: &[i64],
) -> Result<Vec<GradeTargetRow>, AppError> {
    if answer_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT a.id AS answer_id, a.submission_id, a.question_id,
               asg.lecturer_id, q.max_score
        FROM answers a
        JOIN submissions s ON s.id = a.submission_id
        JOIN assignments asg ON asg.id = s.assignment_id
        JOIN questions q ON q.id = a.question_id
        WHERE a.id IN ("#,
    );
    let mut separated = builder.separated(",");
    for id in answer_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let rows = builder.build_query_as().fetch_all(&mut *conn).await?;
    Ok(rows)
}

/// Overwrites the current score and appends to the grading log.
pub async fn record_grade(
    conn: &mut SqliteConnection,
    answer_id: i64,
    lecturer_id: i64,
    score: i64,
    graded_at: DateTime<Utc>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE answers SET score = ? WHERE id = ?")
        .bind(score)
        .bind(answer_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "INSERT INTO grade_events (answer_id, lecturer_id, score, graded_at) VALUES (?, ?, ?, ?)",
    )
    .bind(answer_id)
    .bind(lecturer_id)
    .bind(score)
    .bind(graded_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// `(awarded, max)` for every answer of a submission.
pub async fn submission_scores(
    conn: &mut SqliteConnection,
    submission_id: i64,
) -> Result<Vec<(Option<i64>, i64)>, AppError> {
    let rows = sqlx::query_as::<_, (Option<i64>, i64)>(
        r#"
        SELECT a.score, q.max_score
        FROM answers a
        JOIN questions q ON q.id = a.question_id
        WHERE a.submission_id = ?
        "#,
    )
    .bind(submission_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
