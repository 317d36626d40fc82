// src/domain/grading.rs

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::{
    error::{DomainError, FieldError, ScoreViolation},
    policy::{Action, Session, authorize},
};

/// A score requested for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeEntry {
    pub answer_id: i64,
    pub score: i64,
}

/// What the store knows about an answer being graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradeTarget {
    pub answer_id: i64,
    pub submission_id: i64,
    /// Owner of the assignment the answer belongs to.
    pub lecturer_id: i64,
    pub max_score: i64,
}

/// Aggregated score of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub total: i64,
    pub max_score: i64,
}

/// Validates a whole grading batch before anything is written.
///
/// The batch is all-or-nothing: ownership is checked for every entry first,
/// then every score is range-checked and all violations are reported together.
/// Entries without a matching target are treated as not owned by the caller.
pub fn validate_batch(
    session: &Session,
    entries: &[GradeEntry],
    targets: &[GradeTarget],
) -> Result<(), DomainError> {
    if entries.is_empty() {
        return Err(DomainError::Validation(vec![FieldError::new(
            "grades",
            "At least one grade entry is required",
        )]));
    }

    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.answer_id) {
            return Err(DomainError::Validation(vec![FieldError::new(
                "answerId",
                format!("Answer {} appears more than once", entry.answer_id),
            )]));
        }
    }

    let by_answer: HashMap<i64, &GradeTarget> = targets.iter().map(|t| (t.answer_id, t)).collect();

    for entry in entries {
        let target = by_answer
            .get(&entry.answer_id)
            .ok_or(DomainError::Forbidden)?;
        authorize(
            session,
            Action::GradeSubmission {
                lecturer_id: target.lecturer_id,
            },
        )?;
    }

    let violations: Vec<ScoreViolation> = entries
        .iter()
        .filter_map(|entry| {
            let max_score = by_answer[&entry.answer_id].max_score;
            (entry.score < 0 || entry.score > max_score).then_some(ScoreViolation {
                answer_id: entry.answer_id,
                score: entry.score,
                max_score,
            })
        })
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        Err(DomainError::ScoreOutOfRange(violations))
    }
}

/// Sums awarded scores against the maximum possible.
///
/// Each item is `(awarded, max)`; ungraded answers count as 0.
pub fn totals<I>(answers: I) -> Totals
where
    I: IntoIterator<Item = (Option<i64>, i64)>,
{
    answers
        .into_iter()
        .fold(Totals { total: 0, max_score: 0 }, |acc, (score, max)| Totals {
            total: acc.total.saturating_add(score.unwrap_or(0)),
            max_score: acc.max_score.saturating_add(max),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::Role;

    const OWNER: Session = Session {
        user_id: 10,
        role: Role::Lecturer,
    };

    fn target(answer_id: i64, max_score: i64) -> GradeTarget {
        GradeTarget {
            answer_id,
            submission_id: 1,
            lecturer_id: 10,
            max_score,
        }
    }

    fn entry(answer_id: i64, score: i64) -> GradeEntry {
        GradeEntry { answer_id, score }
    }

    #[test]
    fn test_valid_batch_passes() {
        let targets = [target(1, 10), target(2, 5)];
        assert!(validate_batch(&OWNER, &[entry(1, 10), entry(2, 0)], &targets).is_ok());
    }

    #[test]
    fn test_score_above_max_is_rejected() {
        let targets = [target(1, 10), target(2, 10)];
        let err = validate_batch(&OWNER, &[entry(1, 8), entry(2, 15)], &targets).unwrap_err();
        assert_eq!(
            err,
            DomainError::ScoreOutOfRange(vec![ScoreViolation {
                answer_id: 2,
                score: 15,
                max_score: 10
            }])
        );
    }

    #[test]
    fn test_all_violations_are_reported() {
        let targets = [target(1, 3), target(2, 3)];
        match validate_batch(&OWNER, &[entry(1, -1), entry(2, 4)], &targets) {
            Err(DomainError::ScoreOutOfRange(v)) => assert_eq!(v.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_foreign_lecturer_is_forbidden_before_range_check() {
        let targets = [target(1, 10)];
        let intruder = Session::new(11, Role::Lecturer);
        assert_eq!(
            validate_batch(&intruder, &[entry(1, 50)], &targets),
            Err(DomainError::Forbidden)
        );
    }

    #[test]
    fn test_unknown_answer_is_forbidden() {
        assert_eq!(
            validate_batch(&OWNER, &[entry(404, 1)], &[target(1, 10)]),
            Err(DomainError::Forbidden)
        );
    }

    #[test]
    fn test_empty_and_duplicate_batches_are_invalid() {
        assert!(matches!(
            validate_batch(&OWNER, &[], &[]),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            validate_batch(&OWNER, &[entry(1, 1), entry(1, 2)], &[target(1, 10)]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_totals_treat_ungraded_as_zero() {
        let t = totals([(Some(1), 1), (None, 10), (Some(7), 10)]);
        assert_eq!(t, Totals { total: 8, max_score: 21 });
        assert_eq!(totals(Vec::new()), Totals { total: 0, max_score: 0 });
    }

    #[test]
    fn test_totals_saturate_instead_of_overflowing() {
        let t = totals([(Some(i64::MAX), i64::MAX), (Some(1), i64::MAX)]);
        assert_eq!(t, Totals { total: i64::MAX, max_score: i64::MAX });
    }
}
