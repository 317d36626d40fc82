// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::ValidationError;

/// Question body, discriminated by `kind` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QuestionKind {
    MultipleChoice(MultipleChoice),
    FreeText(FreeText),
}

/// Auto-graded question worth exactly one point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoice {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub correct_answer: i64,
}

/// Lecturer-graded question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreeText {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub max_score: i64,
}

impl MultipleChoice {
    pub const MAX_SCORE: i64 = 1;

    pub fn has_option(&self, index: i64) -> bool {
        index >= 0 && (index as usize) < self.options.len()
    }
}

impl FreeText {
    /// Upper bound accepted for `max_score`.
    pub const MAX_SCORE_LIMIT: i64 = 1000;
}

impl QuestionKind {
    pub fn max_score(&self) -> i64 {
        match self {
            QuestionKind::MultipleChoice(_) => MultipleChoice::MAX_SCORE,
            QuestionKind::FreeText(ft) => ft.max_score,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice(_) => "multipleChoice",
            QuestionKind::FreeText(_) => "freeText",
        }
    }

    /// Strips the answer key for callers that do not own the assignment.
    pub fn public(&self) -> PublicQuestionKind {
        match self {
            QuestionKind::MultipleChoice(mc) => PublicQuestionKind::MultipleChoice {
                question: mc.question.clone(),
                options: mc.options.clone(),
            },
            QuestionKind::FreeText(ft) => PublicQuestionKind::FreeText(ft.clone()),
        }
    }
}

/// A stored question, in authoring order within its assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: i64,
    pub position: i64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// DTO for sending a question to students (excludes the correct answer).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PublicQuestionKind {
    MultipleChoice { question: String, options: Vec<String> },
    FreeText(FreeText),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: i64,
    pub position: i64,
    #[serde(flatten)]
    pub kind: PublicQuestionKind,
}

impl From<&Question> for PublicQuestion {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id,
            position: q.position,
            kind: q.kind.public(),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: i64,
    pub assignment_id: i64,
    pub position: i64,
    pub kind: String,
    /// Multiple-choice question text or free-text title.
    pub prompt: String,
    pub description: Option<String>,
    pub options: Option<Json<Vec<String>>>,
    pub correct_answer: Option<i64>,
    pub max_score: i64,
}

impl TryFrom<QuestionRow> for Question {
    type Error = String;

    fn try_from(row: QuestionRow) -> Result<Self, Self::Error> {
        let kind = match row.kind.as_str() {
            "multipleChoice" => {
                let options = row
                    .options
                    .ok_or_else(|| format!("question {} has no options", row.id))?;
                let correct_answer = row
                    .correct_answer
                    .ok_or_else(|| format!("question {} has no correct answer", row.id))?;
                QuestionKind::MultipleChoice(MultipleChoice {
                    question: row.prompt,
                    options: options.0,
                    correct_answer,
                })
            }
            "freeText" => QuestionKind::FreeText(FreeText {
                title: row.prompt,
                description: row.description.unwrap_or_default(),
                max_score: row.max_score,
            }),
            other => return Err(format!("question {} has unknown kind '{}'", row.id, other)),
        };

        Ok(Question {
            id: row.id,
            position: row.position,
            kind,
        })
    }
}

/// Most questions a single assignment may hold.
pub const MAX_QUESTIONS: usize = 200;

/// Custom validator for the `questions` list of an assignment payload.
pub fn validate_questions(questions: &[QuestionKind]) -> Result<(), ValidationError> {
    if questions.is_empty() {
        return Err(invalid("An assignment needs at least one question".to_string()));
    }
    if questions.len() > MAX_QUESTIONS {
        return Err(invalid(format!(
            "An assignment can hold at most {MAX_QUESTIONS} questions"
        )));
    }

    for (i, q) in questions.iter().enumerate() {
        check_question(q).map_err(|reason| invalid(format!("Question {}: {reason}", i + 1)))?;
    }
    Ok(())
}

/// Checks one question body on its own, returning why it is rejected.
pub fn check_question(question: &QuestionKind) -> Result<(), String> {
    match question {
        QuestionKind::MultipleChoice(mc) => {
            if mc.question.trim().chars().count() < 5 {
                return Err("question must be at least 5 characters long".to_string());
            }
            if mc.options.len() < 2 || mc.options.len() > 10 {
                return Err("between 2 and 10 options are required".to_string());
            }
            if mc.options.iter().any(|o| o.trim().is_empty() || o.len() > 500) {
                return Err("option text is required (max 500 characters)".to_string());
            }
            if !mc.has_option(mc.correct_answer) {
                return Err("please select the correct answer".to_string());
            }
        }
        QuestionKind::FreeText(ft) => {
            if ft.title.trim().is_empty() || ft.title.len() > 1000 {
                return Err("title is required (max 1000 characters)".to_string());
            }
            if ft.description.len() > 5000 {
                return Err("description is too long".to_string());
            }
            if !(1..=FreeText::MAX_SCORE_LIMIT).contains(&ft.max_score) {
                return Err(format!(
                    "maximum score must be between 1 and {}",
                    FreeText::MAX_SCORE_LIMIT
                ));
            }
        }
    }
    Ok(())
}

fn invalid(message: String) -> ValidationError {
    let mut err = ValidationError::new("invalid_question");
    err.message = Some(message.into());
    err
}

/// Body of `POST /api/questions`: the question plus the assignment it joins.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub assignment_id: i64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// A question as seen by the caller: with its answer key for the owner only.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum QuestionView {
    Full(Question),
    Public(PublicQuestion),
}

impl QuestionView {
    pub fn new(question: Question, owner_view: bool) -> Self {
        if owner_view {
            QuestionView::Full(question)
        } else {
            QuestionView::Public(PublicQuestion::from(&question))
        }
    }
}

/// DTO for the standalone question endpoints.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub assignment_id: i64,
    #[serde(flatten)]
    pub question: QuestionView,
}

impl QuestionResponse {
    pub fn build(assignment_id: i64, question: Question, owner_view: bool) -> Self {
        Self {
            assignment_id,
            question: QuestionView::new(question, owner_view),
        }
    }
}
