//! Quiz attempt scoring.
//!
//! `score_answers` is the pure aggregate. `recalculate_attempt_score` loads an
//! attempt's questions and answers, runs it and stores the result. Both the
//! submit path and manual grading go through the latter.

use std::collections::HashSet;

use serde::Serialize;
use sqlx::{FromRow, PgConnection};

use crate::error::AppError;

/// Point value of one quiz question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct QuestionPoints {
    pub question_id: i64,
    pub points: i32,
}

/// Correctness of one recorded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct AnswerMark {
    pub question_id: i64,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreSummary {
    /// Percentage in [0, 100].
    pub score: f64,
    pub passed: bool,
    pub earned_points: i64,
    pub total_points: i64,
}

/// Computes `100 * earned / total` over the quiz's questions.
///
/// Answers to questions outside `questions` are ignored and each question
/// counts at most once. A quiz worth zero points scores 0 and never passes.
pub fn score_answers(
    questions: &[QuestionPoints],
    answers: &[AnswerMark],
    passing_score: i32,
) -> ScoreSummary {
    let total_points: i64 = questions.iter().map(|q| i64::from(q.points.max(0))).sum();

    if total_points == 0 {
        return ScoreSummary {
            score: 0.0,
            passed: false,
            earned_points: 0,
            total_points: 0,
        };
    }

    let correct: HashSet<i64> = answers
        .iter()
        .filter(|a| a.is_correct)
        .map(|a| a.question_id)
        .collect();

    let earned_points: i64 = questions
        .iter()
        .filter(|q| correct.contains(&q.question_id))
        .map(|q| i64::from(q.points.max(0)))
        .sum();

    let score = (earned_points as f64 / total_points as f64) * 100.0;

    ScoreSummary {
        score,
        passed: score >= f64::from(passing_score),
        earned_points,
        total_points,
    }
}

/// Recomputes and stores score and pass flag of an attempt.
///
/// Idempotent: with unchanged answers the stored values do not change.
pub async fn recalculate_attempt_score(
    conn: &mut PgConnection,
    attempt_id: i64,
) -> Result<ScoreSummary, AppError> {
    let (quiz_id, passing_score): (i64, i32) = sqlx::query_as(
        r#"
        SELECT q.id, q.passing_score
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        WHERE a.id = $1
        "#,
    )
    .bind(attempt_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz attempt not found".to_string()))?;

    let questions: Vec<QuestionPoints> =
        sqlx::query_as("SELECT id AS question_id, points FROM quiz_questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_all(&mut *conn)
            .await?;

    let answers: Vec<AnswerMark> =
        sqlx::query_as("SELECT question_id, is_correct FROM quiz_answers WHERE attempt_id = $1")
            .bind(attempt_id)
            .fetch_all(&mut *conn)
            .await?;

    let summary = score_answers(&questions, &answers, passing_score);

    sqlx::query("UPDATE quiz_attempts SET score = $2, passed = $3 WHERE id = $1")
        .bind(attempt_id)
        .bind(summary.score)
        .bind(summary.passed)
        .execute(&mut *conn)
        .await?;

    tracing::debug!(
        attempt_id,
        score = summary.score,
        passed = summary.passed,
        "attempt scored"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(id: i64, points: i32) -> QuestionPoints {
        QuestionPoints {
            question_id: id,
            points,
        }
    }

    fn a(id: i64, is_correct: bool) -> AnswerMark {
        AnswerMark {
            question_id: id,
            is_correct,
        }
    }

    #[test]
    fn all_correct_passes_with_full_marks() {
        let questions = [q(1, 1), q(2, 1)];
        let summary = score_answers(&questions, &[a(1, true), a(2, true)], 70);
        assert_eq!(summary.score, 100.0);
        assert!(summary.passed);
        assert_eq!(summary.earned_points, 2);
        assert_eq!(summary.total_points, 2);
    }

    #[test]
    fn half_correct_fails_at_seventy() {
        let questions = [q(1, 1), q(2, 1)];
        let summary = score_answers(&questions, &[a(1, true), a(2, false)], 70);
        assert_eq!(summary.score, 50.0);
        assert!(!summary.passed);
    }

    #[test]
    fn zero_questions_scores_zero_and_fails() {
        let summary = score_answers(&[], &[], 0);
        assert_eq!(summary.score, 0.0);
        assert!(!summary.passed);
    }

    #[test]
    fn zero_point_quiz_never_passes() {
        let questions = [q(1, 0), q(2, 0)];
        let summary = score_answers(&questions, &[a(1, true), a(2, true)], 0);
        assert_eq!(summary.score, 0.0);
        assert!(!summary.passed);
    }

    #[test]
    fn unanswered_questions_contribute_nothing() {
        let questions = [q(1, 3), q(2, 1)];
        let summary = score_answers(&questions, &[a(2, true)], 20);
        assert_eq!(summary.score, 25.0);
        assert!(summary.passed);
    }

    #[test]
    fn points_weight_the_score() {
        let questions = [q(1, 3), q(2, 1)];
        let summary = score_answers(&questions, &[a(1, true), a(2, false)], 70);
        assert_eq!(summary.score, 75.0);
        assert!(summary.passed);
    }

    #[test]
    fn short_answer_counts_after_manual_grading() {
        let questions = [q(7, 1)];
        let before = score_answers(&questions, &[a(7, false)], 70);
        assert_eq!(before.score, 0.0);
        assert!(!before.passed);

        let after = score_answers(&questions, &[a(7, true)], 70);
        assert_eq!(after.score, 100.0);
        assert!(after.passed);
    }

    #[test]
    fn answers_outside_the_quiz_are_ignored() {
        let questions = [q(1, 1)];
        let summary = score_answers(&questions, &[a(99, true)], 50);
        assert_eq!(summary.score, 0.0);
        assert_eq!(summary.earned_points, 0);
    }

    #[test]
    fn passing_threshold_is_inclusive() {
        let questions = [q(1, 7), q(2, 3)];
        let summary = score_answers(&questions, &[a(1, true)], 70);
        assert_eq!(summary.score, 70.0);
        assert!(summary.passed);
    }

    #[test]
    fn scoring_is_idempotent() {
        let questions = [q(1, 2), q(2, 5), q(3, 1)];
        let answers = [a(1, true), a(2, false), a(3, true)];
        let first = score_answers(&questions, &answers, 40);
        let second = score_answers(&questions, &answers, 40);
        assert_eq!(first, second);
    }

    #[test]
    fn score_stays_within_bounds_for_every_answer_subset() {
        let questions = [q(1, 1), q(2, 4), q(3, 2), q(4, 9)];
        for mask in 0u32..16 {
            let answers: Vec<AnswerMark> = questions
                .iter()
                .enumerate()
                .map(|(i, question)| a(question.question_id, mask & (1 << i) != 0))
                .collect();
            let summary = score_answers(&questions, &answers, 60);
            assert!((0.0..=100.0).contains(&summary.score), "mask {mask}");
            assert_eq!(summary.passed, summary.score >= 60.0);
        }
    }
}
