// src/handlers/quiz_authoring.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{
        ChoiceInput, CreateQuestionRequest, CreateQuizRequest, QuestionType, QuestionWithChoices,
        Quiz, QuizQuestion, UpdateQuestionRequest, UpdateQuizRequest, validate_choice_set,
    },
    services::access::{lesson_in_course, owned_course},
    utils::jwt::InstructorUser,
};

use super::quiz::load_questions;

/// Quiz `quiz_id`, if it sits on a lesson of `course_id`.
async fn quiz_in_course(pool: &PgPool, course_id: Uuid, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        r#"
        SELECT q.*
        FROM quizzes q
        JOIN lessons l ON l.id = q.lesson_id
        WHERE q.id = $1 AND l.course_id = $2
        "#,
    )
    .bind(quiz_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

async fn question_in_course(
    pool: &PgPool,
    course_id: Uuid,
    question_id: i64,
) -> Result<QuizQuestion, AppError> {
    sqlx::query_as::<_, QuizQuestion>(
        r#"
        SELECT qq.*
        FROM quiz_questions qq
        JOIN quizzes q ON q.id = qq.quiz_id
        JOIN lessons l ON l.id = q.lesson_id
        WHERE qq.id = $1 AND l.course_id = $2
        "#,
    )
    .bind(question_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))
}

async fn insert_choices(
    conn: &mut PgConnection,
    question_id: i64,
    choices: &[ChoiceInput],
) -> Result<(), AppError> {
    for (index, choice) in choices.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO quiz_choices (question_id, choice_text, is_correct, "order")
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(question_id)
        .bind(choice.choice_text.trim())
        .bind(choice.is_correct)
        .bind(choice.order.unwrap_or(index as i32))
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn quiz_view(pool: &PgPool, quiz: Quiz) -> Result<serde_json::Value, AppError> {
    let mut conn = pool.acquire().await?;
    let questions: Vec<QuestionWithChoices> = load_questions(&mut conn, quiz.id).await?;
    Ok(json!({ "quiz": quiz, "questions": questions }))
}

/// Create the quiz of a lesson. A lesson carries at most one quiz.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, lesson_id)): Path<(String, i64)>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    lesson_in_course(&pool, course.id, lesson_id).await?;

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        INSERT INTO quizzes (lesson_id, title, description, passing_score, time_limit)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(lesson_id)
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(payload.passing_score)
    .bind(payload.time_limit)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_or_internal(e, "This lesson already has a quiz"))?;

    tracing::info!(quiz_id = quiz.id, lesson_id, "quiz created");

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// A quiz with every question and choice, correctness included.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, quiz_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    let quiz = quiz_in_course(&pool, course.id, quiz_id).await?;
    Ok(Json(quiz_view(&pool, quiz).await?))
}

pub async fn update_quiz(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, quiz_id)): Path<(String, i64)>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    let quiz = quiz_in_course(&pool, course.id, quiz_id).await?;

    let time_limit = if payload.clear_time_limit {
        None
    } else {
        payload.time_limit.or(quiz.time_limit)
    };

    let quiz = sqlx::query_as::<_, Quiz>(
        r#"
        UPDATE quizzes SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            passing_score = COALESCE($4, passing_score),
            time_limit = $5
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(quiz.id)
    .bind(payload.title.as_deref().map(str::trim))
    .bind(&payload.description)
    .bind(payload.passing_score)
    .bind(time_limit)
    .fetch_one(&pool)
    .await?;

    Ok(Json(quiz))
}

pub async fn delete_quiz(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, quiz_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    let quiz = quiz_in_course(&pool, course.id, quiz_id).await?;

    sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(quiz.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Add a question (and its choices) to a quiz.
pub async fn create_question(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, quiz_id)): Path<(String, i64)>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    validate_choice_set(payload.question_type, &payload.choices).map_err(AppError::BadRequest)?;

    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    let quiz = quiz_in_course(&pool, course.id, quiz_id).await?;

    let mut tx = pool.begin().await?;

    let order: i32 = match payload.order {
        Some(order) => order,
        None => sqlx::query_scalar(
            r#"SELECT COALESCE(MAX("order") + 1, 0) FROM quiz_questions WHERE quiz_id = $1"#,
        )
        .bind(quiz.id)
        .fetch_one(&mut *tx)
        .await?,
    };

    let question = sqlx::query_as::<_, QuizQuestion>(
        r#"
        INSERT INTO quiz_questions (quiz_id, question_text, question_type, points, "order")
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(quiz.id)
    .bind(payload.question_text.trim())
    .bind(payload.question_type.as_str())
    .bind(payload.points)
    .bind(order)
    .fetch_one(&mut *tx)
    .await?;

    insert_choices(&mut tx, question.id, &payload.choices).await?;

    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(quiz_view(&pool, quiz).await?)))
}

/// Edit a question. A `choices` list replaces the existing choices.
/// Turning a question into a short answer drops its choices.
pub async fn update_question(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, question_id)): Path<(String, i64)>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    let question = question_in_course(&pool, course.id, question_id).await?;

    let kind = payload.question_type.unwrap_or_else(|| question.kind());
    if let Some(choices) = &payload.choices {
        validate_choice_set(kind, choices).map_err(AppError::BadRequest)?;
    }

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE quiz_questions SET
            question_text = COALESCE($2, question_text),
            question_type = $3,
            points = COALESCE($4, points),
            "order" = COALESCE($5, "order")
        WHERE id = $1
        "#,
    )
    .bind(question.id)
    .bind(payload.question_text.as_deref().map(str::trim))
    .bind(kind.as_str())
    .bind(payload.points)
    .bind(payload.order)
    .execute(&mut *tx)
    .await?;

    let replace_choices = payload.choices.is_some() || kind == QuestionType::ShortAnswer;
    if replace_choices {
        sqlx::query("DELETE FROM quiz_choices WHERE question_id = $1")
            .bind(question.id)
            .execute(&mut *tx)
            .await?;
        if let Some(choices) = &payload.choices {
            insert_choices(&mut tx, question.id, choices).await?;
        }
    }

    tx.commit().await?;

    let quiz = quiz_in_course(&pool, course.id, question.quiz_id).await?;
    Ok(Json(quiz_view(&pool, quiz).await?))
}

pub async fn delete_question(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, question_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    let question = question_in_course(&pool, course.id, question_id).await?;

    sqlx::query("DELETE FROM quiz_questions WHERE id = $1")
        .bind(question.id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
