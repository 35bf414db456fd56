// src/handlers/quiz.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgConnection, PgPool};
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{
        AttemptResultResponse, PublicChoice, PublicQuestion, QuestionResult,
        QuestionWithChoices, Quiz, QuizAnswer, QuizAttempt, QuizChoice, QuizQuestion,
        StartAttemptResponse, SubmitAttemptRequest, SubmittedAnswer,
    },
    services::{
        access::{course_by_slug, lesson_in_course, require_enrollment},
        scoring::recalculate_attempt_score,
    },
    utils::jwt::AuthUser,
};

/// Questions of a quiz in display order, each with its ordered choices.
pub(crate) async fn load_questions(
    conn: &mut PgConnection,
    quiz_id: i64,
) -> Result<Vec<QuestionWithChoices>, AppError> {
    let questions = sqlx::query_as::<_, QuizQuestion>(
        r#"SELECT * FROM quiz_questions WHERE quiz_id = $1 ORDER BY "order", id"#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let choices = sqlx::query_as::<_, QuizChoice>(
        r#"
        SELECT ch.*
        FROM quiz_choices ch
        JOIN quiz_questions q ON q.id = ch.question_id
        WHERE q.quiz_id = $1
        ORDER BY ch."order", ch.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut by_question: HashMap<i64, Vec<QuizChoice>> = HashMap::new();
    for choice in choices {
        by_question.entry(choice.question_id).or_default().push(choice);
    }

    Ok(questions
        .into_iter()
        .map(|question| QuestionWithChoices {
            choices: by_question.remove(&question.id).unwrap_or_default(),
            question,
        })
        .collect())
}

/// Hides correctness flags from a student-facing question.
fn public_question(entry: QuestionWithChoices) -> PublicQuestion {
    let QuestionWithChoices { question, choices } = entry;
    PublicQuestion {
        id: question.id,
        question_text: question.question_text,
        question_type: question.question_type,
        points: question.points,
        order: question.order,
        choices: choices
            .into_iter()
            .map(|c| PublicChoice {
                id: c.id,
                choice_text: c.choice_text,
                order: c.order,
            })
            .collect(),
    }
}

/// Start a new attempt at a lesson's quiz.
///
/// Every call creates a fresh attempt, retakes included.
pub async fn start_attempt(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path((slug, lesson_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = course_by_slug(&pool, &slug).await?;
    lesson_in_course(&pool, course.id, lesson_id).await?;
    require_enrollment(&pool, user.id, course.id).await?;

    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE lesson_id = $1")
        .bind(lesson_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("This lesson has no quiz".to_string()))?;

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        "INSERT INTO quiz_attempts (user_id, quiz_id) VALUES ($1, $2) RETURNING *",
    )
    .bind(user.id)
    .bind(quiz.id)
    .fetch_one(&pool)
    .await?;

    tracing::info!(user_id = user.id, quiz_id = quiz.id, attempt_id = attempt.id, "quiz attempt started");

    let mut conn = pool.acquire().await?;
    let questions = load_questions(&mut conn, quiz.id)
        .await?
        .into_iter()
        .map(public_question)
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(StartAttemptResponse {
            attempt,
            quiz,
            questions,
        }),
    ))
}

/// Past attempts of the caller at a lesson's quiz, newest first.
pub async fn my_attempts(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path((slug, lesson_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = course_by_slug(&pool, &slug).await?;
    lesson_in_course(&pool, course.id, lesson_id).await?;

    let attempts = sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT a.*
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        WHERE q.lesson_id = $1 AND a.user_id = $2
        ORDER BY a.started_at DESC, a.id DESC
        "#,
    )
    .bind(lesson_id)
    .bind(user.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}

/// Record the answers of an attempt and score it.
///
/// Runs in one transaction. Answers are upserted, so repeated submits keep a
/// single answer per question. Short answers start out incorrect until graded.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let attempt = sqlx::query_as::<_, QuizAttempt>(
        "SELECT * FROM quiz_attempts WHERE id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(attempt_id)
    .bind(user.id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz attempt not found".to_string()))?;

    let questions = load_questions(&mut *tx, attempt.quiz_id).await?;

    // Later entries for the same question win.
    let submitted: HashMap<i64, &SubmittedAnswer> = payload
        .answers
        .iter()
        .map(|answer| (answer.question_id, answer))
        .collect();

    for QuestionWithChoices { question, choices } in &questions {
        let answer = submitted.get(&question.id);

        let (selected_choice_id, answer_text, is_correct) = if question.kind().uses_choices() {
            let Some(choice_id) = answer.and_then(|a| a.choice_id) else {
                continue;
            };
            let choice = choices.iter().find(|c| c.id == choice_id).ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Choice {} does not belong to question {}",
                    choice_id, question.id
                ))
            })?;
            (Some(choice.id), String::new(), choice.is_correct)
        } else {
            let text = answer
                .and_then(|a| a.answer_text.as_deref())
                .unwrap_or_default()
                .trim()
                .to_string();
            (None, text, false)
        };

        sqlx::query(
            r#"
            INSERT INTO quiz_answers (attempt_id, question_id, selected_choice_id, answer_text, is_correct)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (attempt_id, question_id) DO UPDATE SET
                selected_choice_id = EXCLUDED.selected_choice_id,
                answer_text = EXCLUDED.answer_text,
                is_correct = EXCLUDED.is_correct
            "#,
        )
        .bind(attempt.id)
        .bind(question.id)
        .bind(selected_choice_id)
        .bind(answer_text)
        .bind(is_correct)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        "UPDATE quiz_attempts SET completed_at = NOW(), time_taken_minutes = $2 WHERE id = $1",
    )
    .bind(attempt.id)
    .bind(payload.time_taken_minutes)
    .execute(&mut *tx)
    .await?;

    let summary = recalculate_attempt_score(&mut *tx, attempt.id).await?;

    tx.commit().await?;

    tracing::info!(
        user_id = user.id,
        attempt_id = attempt.id,
        score = summary.score,
        passed = summary.passed,
        "quiz attempt submitted"
    );

    Ok(Json(attempt_results_for(&pool, user.id, attempt.id).await?))
}

/// Builds the graded view of one of `user_id`'s attempts.
async fn attempt_results_for(
    pool: &PgPool,
    user_id: i64,
    attempt_id: i64,
) -> Result<AttemptResultResponse, AppError> {
    let attempt = sqlx::query_as::<_, QuizAttempt>(
        "SELECT * FROM quiz_attempts WHERE id = $1 AND user_id = $2",
    )
    .bind(attempt_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz attempt not found".to_string()))?;

    let quiz = sqlx::query_as::<_, Quiz>("SELECT * FROM quizzes WHERE id = $1")
        .bind(attempt.quiz_id)
        .fetch_one(pool)
        .await?;

    let mut answers: HashMap<i64, QuizAnswer> =
        sqlx::query_as::<_, QuizAnswer>("SELECT * FROM quiz_answers WHERE attempt_id = $1")
            .bind(attempt.id)
            .fetch_all(pool)
            .await?
            .into_iter()
            .map(|answer| (answer.question_id, answer))
            .collect();

    let mut conn = pool.acquire().await?;
    let questions: Vec<QuestionResult> = load_questions(&mut conn, quiz.id)
        .await?
        .into_iter()
        .map(|QuestionWithChoices { question, choices }| {
            let correct_choice = if question.kind().uses_choices() {
                choices.into_iter().find(|c| c.is_correct)
            } else {
                None
            };
            QuestionResult {
                user_answer: answers.remove(&question.id),
                correct_choice,
                question,
            }
        })
        .collect();

    let correct_count = questions
        .iter()
        .filter(|q| q.user_answer.as_ref().is_some_and(|a| a.is_correct))
        .count();
    let total_questions = questions.len();

    Ok(AttemptResultResponse {
        attempt,
        quiz,
        questions,
        correct_count,
        total_questions,
    })
}

/// Graded view of one of the caller's attempts.
pub async fn attempt_results(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(attempt_results_for(&pool, user.id, attempt_id).await?))
}
