// src/models/submission.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    domain::{grading, submission::SubmittedAnswer},
    models::question::{Question, QuestionView},
};

/// Represents the 'submissions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct SubmissionRow {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Represents the 'answers' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerRow {
    pub id: i64,
    pub submission_id: i64,
    pub question_id: i64,
    pub selected_option: Option<i64>,
    pub answer_text: Option<String>,
    /// NULL until graded (free-text only).
    pub score: Option<i64>,
}

/// Represents the 'grade_events' table: one row per grading of an answer.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEvent {
    pub id: i64,
    pub answer_id: i64,
    pub lecturer_id: i64,
    pub score: i64,
    pub graded_at: DateTime<Utc>,
}

/// One answer in a submission payload.
///
/// `studentAnswer` carries the selected option index, `answerText` the
/// free-text body. `studentId` is advisory; the bearer token decides.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerInput {
    pub question_id: i64,
    pub assignment_id: i64,
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub answer_text: Option<String>,
    #[serde(default)]
    pub student_answer: Option<i64>,
}

impl From<&AnswerInput> for SubmittedAnswer {
    fn from(input: &AnswerInput) -> Self {
        SubmittedAnswer {
            question_id: input.question_id,
            selected_option: input.student_answer,
            answer_text: input.answer_text.clone(),
        }
    }
}

/// DTO for submitting an assignment.
#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    pub answers: Vec<AnswerInput>,
}

/// One entry of a grading batch.
///
/// `submissionId` and `questionId` are optional cross-checks against the
/// stored answer; other client fields are ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeEntryInput {
    pub answer_id: i64,
    pub score: i64,
    #[serde(default)]
    pub submission_id: Option<i64>,
    #[serde(default)]
    pub question_id: Option<i64>,
}

impl From<&GradeEntryInput> for grading::GradeEntry {
    fn from(input: &GradeEntryInput) -> Self {
        grading::GradeEntry {
            answer_id: input.answer_id,
            score: input.score,
        }
    }
}

/// DTO for grading a single answer.
#[derive(Debug, Deserialize)]
pub struct GradeAnswerRequest {
    pub score: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub id: i64,
    pub submission_id: i64,
    pub question_id: i64,
    pub selected_option: Option<i64>,
    pub answer_text: Option<String>,
    pub score: Option<i64>,
    pub max_score: i64,
    pub question: Option<QuestionView>,
}

impl AnswerResponse {
    pub fn build(row: AnswerRow, question: Option<&Question>, owner_view: bool) -> Self {
        let max_score = question.map(|q| q.kind.max_score()).unwrap_or(0);
        let question = question.map(|q| QuestionView::new(q.clone(), owner_view));
        Self {
            id: row.id,
            submission_id: row.submission_id,
            question_id: row.question_id,
            selected_option: row.selected_option,
            answer_text: row.answer_text,
            score: row.score,
            max_score,
            question,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StudentRef {
    pub id: i64,
    pub username: String,
}

/// DTO for returning a submission with nested answers and totals.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub student: Option<StudentRef>,
    pub created_at: DateTime<Utc>,
    pub answers: Vec<AnswerResponse>,
    pub total: i64,
    pub max_score: i64,
}

impl SubmissionResponse {
    /// `questions` are those of the assignment; the maximum covers all of them.
    pub fn build(
        row: SubmissionRow,
        student_username: Option<String>,
        answers: Vec<AnswerRow>,
        questions: &[Question],
        owner_view: bool,
    ) -> Self {
        let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();
        let max_score = grading::totals(questions.iter().map(|q| (None, q.kind.max_score()))).max_score;
        let total = grading::totals(answers.iter().map(|a| (a.score, 0))).total;

        let answers = answers
            .into_iter()
            .map(|a| {
                let question = by_id.get(&a.question_id).copied();
                AnswerResponse::build(a, question, owner_view)
            })
            .collect();

        Self {
            id: row.id,
            assignment_id: row.assignment_id,
            student_id: row.student_id,
            student: student_username.map(|username| StudentRef {
                id: row.student_id,
                username,
            }),
            created_at: row.created_at,
            answers,
            total,
            max_score,
        }
    }
}

/// Totals of one submission after grading.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionTotals {
    pub submission_id: i64,
    #[serde(flatten)]
    pub totals: grading::Totals,
}

#[derive(Debug, Serialize)]
pub struct GradeResponse {
    pub message: String,
    pub submissions: Vec<SubmissionTotals>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{FreeText, MultipleChoice, QuestionKind};
    use chrono::TimeZone;

    #[test]
    fn test_submission_totals_count_ungraded_as_zero() {
        let questions = vec![
            Question {
                id: 1,
                position: 0,
                kind: QuestionKind::MultipleChoice(MultipleChoice {
                    question: "Pick the transport protocol".into(),
                    options: vec!["IP".into(), "TCP".into()],
                    correct_answer: 1,
                }),
            },
            Question {
                id: 2,
                position: 1,
                kind: QuestionKind::FreeText(FreeText {
                    title: "Explain".into(),
                    description: String::new(),
                    max_score: 10,
                }),
            },
        ];
        let answers = vec![
            AnswerRow {
                id: 10,
                submission_id: 3,
                question_id: 1,
                selected_option: Some(1),
                answer_text: None,
                score: Some(1),
            },
            AnswerRow {
                id: 11,
                submission_id: 3,
                question_id: 2,
                selected_option: None,
                answer_text: Some("Windows".into()),
                score: None,
            },
        ];
        let row = SubmissionRow {
            id: 3,
            assignment_id: 1,
            student_id: 8,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        };

        let resp = SubmissionResponse::build(row, Some("sam".into()), answers, &questions, false);
        assert_eq!(resp.total, 1);
        assert_eq!(resp.max_score, 11);

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["student"]["username"], "sam");
        assert!(json["answers"][0]["question"].get("correctAnswer").is_none());
        assert_eq!(json["answers"][1]["maxScore"], 10);
    }

    #[test]
    fn test_answer_input_accepts_client_shape() {
        let input: AnswerInput = serde_json::from_value(serde_json::json!({
            "questionId": 4,
            "studentId": 2,
            "assignmentId": 1,
            "studentAnswer": 3
        }))
        .unwrap();
        let submitted = SubmittedAnswer::from(&input);
        assert_eq!(submitted.selected_option, Some(3));
        assert_eq!(submitted.answer_text, None);
    }
}
