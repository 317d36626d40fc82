// src/domain/submission.rs

use std::collections::{HashMap, HashSet};

use crate::models::question::{MultipleChoice, Question, QuestionKind};

use super::error::DomainError;

/// A raw answer as sent by the student.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub selected_option: Option<i64>,
    pub answer_text: Option<String>,
}

/// An answer ready to be inserted, with its initial score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAnswer {
    pub question_id: i64,
    pub selected_option: Option<i64>,
    pub answer_text: Option<String>,
    /// Multiple-choice answers are scored on the spot; free-text starts ungraded.
    pub score: Option<i64>,
}

/// 1 when the selected index is the correct one, otherwise 0.
pub fn auto_score(question: &MultipleChoice, selected: i64) -> i64 {
    if selected == question.correct_answer {
        MultipleChoice::MAX_SCORE
    } else {
        0
    }
}

/// Turns raw answers into insertable rows for the given questions.
///
/// Coverage and shape are checked across all answers before any option
/// bound, so an incomplete payload is reported ahead of a bad index.
/// The result follows question order.
pub fn assemble(
    questions: &[Question],
    answers: &[SubmittedAnswer],
) -> Result<Vec<NewAnswer>, DomainError> {
    let by_question: HashMap<i64, &SubmittedAnswer> = {
        let known: HashSet<i64> = questions.iter().map(|q| q.id).collect();
        let mut map = HashMap::with_capacity(answers.len());
        for answer in answers {
            if !known.contains(&answer.question_id) {
                return Err(DomainError::IncompleteOrInvalidAnswers(format!(
                    "question {} does not belong to this assignment",
                    answer.question_id
                )));
            }
            if map.insert(answer.question_id, answer).is_some() {
                return Err(DomainError::IncompleteOrInvalidAnswers(format!(
                    "question {} is answered more than once",
                    answer.question_id
                )));
            }
        }
        map
    };

    let missing: Vec<String> = questions
        .iter()
        .filter(|q| !by_question.contains_key(&q.id))
        .map(|q| q.id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(DomainError::IncompleteOrInvalidAnswers(format!(
            "missing answers for question(s) {}",
            missing.join(", ")
        )));
    }

    for q in questions {
        let answer = by_question[&q.id];
        match &q.kind {
            QuestionKind::MultipleChoice(_) if answer.selected_option.is_none() => {
                return Err(DomainError::IncompleteOrInvalidAnswers(format!(
                    "question {} expects a selected option",
                    q.id
                )));
            }
            QuestionKind::FreeText(_) if answer.answer_text.is_none() => {
                return Err(DomainError::IncompleteOrInvalidAnswers(format!(
                    "question {} expects a text answer",
                    q.id
                )));
            }
            _ => {}
        }
    }

    questions
        .iter()
        .map(|q| {
            let answer = by_question[&q.id];
            match &q.kind {
                QuestionKind::MultipleChoice(mc) => {
                    let index = answer.selected_option.unwrap_or(-1);
                    if !mc.has_option(index) {
                        return Err(DomainError::InvalidOption {
                            question_id: q.id,
                            index,
                        });
                    }
                    Ok(NewAnswer {
                        question_id: q.id,
                        selected_option: Some(index),
                        answer_text: None,
                        score: Some(auto_score(mc, index)),
                    })
                }
                QuestionKind::FreeText(_) => Ok(NewAnswer {
                    question_id: q.id,
                    selected_option: None,
                    answer_text: answer.answer_text.clone(),
                    score: None,
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::FreeText;

    fn mc_question(id: i64, correct: i64) -> Question {
        Question {
            id,
            position: id,
            kind: QuestionKind::MultipleChoice(MultipleChoice {
                question: format!("Question number {id}"),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_answer: correct,
            }),
        }
    }

    fn ft_question(id: i64, max: i64) -> Question {
        Question {
            id,
            position: id,
            kind: QuestionKind::FreeText(FreeText {
                title: format!("Essay {id}"),
                description: String::new(),
                max_score: max,
            }),
        }
    }

    fn pick(question_id: i64, index: i64) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id,
            selected_option: Some(index),
            answer_text: None,
        }
    }

    fn write(question_id: i64, text: &str) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id,
            selected_option: None,
            answer_text: Some(text.to_string()),
        }
    }

    #[test]
    fn test_multiple_choice_is_auto_scored() {
        let questions = vec![mc_question(1, 2), mc_question(2, 0)];
        let built = assemble(&questions, &[pick(1, 2), pick(2, 3)]).unwrap();
        assert_eq!(built[0].score, Some(1));
        assert_eq!(built[1].score, Some(0));
    }

    #[test]
    fn test_free_text_starts_ungraded() {
        let questions = vec![ft_question(7, 10)];
        let built = assemble(&questions, &[write(7, "Because of congestion control")]).unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].score, None);
        assert_eq!(
            built[0].answer_text.as_deref(),
            Some("Because of congestion control")
        );
    }

    #[test]
    fn test_output_follows_question_order() {
        let questions = vec![mc_question(1, 0), ft_question(2, 5), mc_question(3, 1)];
        let built = assemble(&questions, &[pick(3, 1), write(2, "x"), pick(1, 0)]).unwrap();
        let ids: Vec<i64> = built.iter().map(|a| a.question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_missing_answer_is_rejected() {
        let questions = vec![mc_question(1, 0), mc_question(2, 0)];
        let err = assemble(&questions, &[pick(1, 0)]).unwrap_err();
        assert!(matches!(err, DomainError::IncompleteOrInvalidAnswers(msg) if msg.contains('2')));
    }

    #[test]
    fn test_duplicate_and_foreign_answers_are_rejected() {
        let questions = vec![mc_question(1, 0)];
        assert!(matches!(
            assemble(&questions, &[pick(1, 0), pick(1, 1)]),
            Err(DomainError::IncompleteOrInvalidAnswers(_))
        ));
        assert!(matches!(
            assemble(&questions, &[pick(1, 0), pick(99, 0)]),
            Err(DomainError::IncompleteOrInvalidAnswers(_))
        ));
    }

    #[test]
    fn test_wrong_answer_shape_is_rejected() {
        let questions = vec![mc_question(1, 0), ft_question(2, 5)];
        assert!(matches!(
            assemble(&questions, &[write(1, "A"), write(2, "text")]),
            Err(DomainError::IncompleteOrInvalidAnswers(_))
        ));
        assert!(matches!(
            assemble(&questions, &[pick(1, 0), pick(2, 0)]),
            Err(DomainError::IncompleteOrInvalidAnswers(_))
        ));
    }

    #[test]
    fn test_out_of_range_option_is_rejected() {
        let questions = vec![mc_question(1, 0)];
        assert_eq!(
            assemble(&questions, &[pick(1, 4)]),
            Err(DomainError::InvalidOption {
                question_id: 1,
                index: 4
            })
        );
        assert!(matches!(
            assemble(&questions, &[pick(1, -1)]),
            Err(DomainError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_incomplete_wins_over_invalid_option() {
        let questions = vec![mc_question(1, 0), mc_question(2, 0)];
        let err = assemble(&questions, &[pick(1, 42)]).unwrap_err();
        assert!(matches!(err, DomainError::IncompleteOrInvalidAnswers(_)));
    }
}
