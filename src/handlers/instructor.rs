// src/handlers/instructor.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        announcement::{Announcement, CreateAnnouncementRequest},
        course::{
            Course, CourseStatus, CreateCourseRequest, CreateLessonRequest, Lesson,
            UpdateCourseRequest, UpdateLessonRequest,
        },
        instructor::{Instructor, InstructorCourseStats, InstructorDashboard, revenue_estimate},
        quiz::{AttemptOverview, GradeAnswersRequest, ShortAnswerEntry},
    },
    services::{
        access::owned_course, notifications::notify_course_announcement,
        scoring::recalculate_attempt_score,
    },
    utils::{
        html::clean_user_text,
        jwt::InstructorUser,
        slug::{slug_suffix, slugify, slugify_or},
    },
};

use super::discussion::load_threads;

/// Own courses with student counts and ratings, plus totals.
pub async fn dashboard(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
) -> Result<impl IntoResponse, AppError> {
    let profile = sqlx::query_as::<_, Instructor>("SELECT * FROM instructors WHERE id = $1")
        .bind(instructor.instructor_id)
        .fetch_one(&pool)
        .await?;

    let courses = sqlx::query_as::<_, InstructorCourseStats>(
        r#"
        SELECT c.id, c.title, c.slug, c.status, c.price_cents, c.created_at,
            (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id AND e.is_active) AS student_count,
            (SELECT AVG(r.rating)::FLOAT8 FROM reviews r WHERE r.course_id = c.id) AS avg_rating
        FROM courses c
        WHERE c.instructor_id = $1
        ORDER BY c.created_at DESC
        "#,
    )
    .bind(instructor.instructor_id)
    .fetch_all(&pool)
    .await?;

    let total_students: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(DISTINCT e.user_id)
        FROM enrollments e
        JOIN courses c ON c.id = e.course_id
        WHERE c.instructor_id = $1 AND e.is_active
        "#,
    )
    .bind(instructor.instructor_id)
    .fetch_one(&pool)
    .await?;

    let published = CourseStatus::Published.as_str();
    Ok(Json(InstructorDashboard {
        instructor: profile,
        total_courses: courses.len(),
        published_courses: courses.iter().filter(|c| c.status == published).count(),
        total_students,
        total_revenue_cents: revenue_estimate(&courses),
        courses,
    }))
}

/// Slug derived from the title, suffixed when already taken.
async fn unique_course_slug(pool: &PgPool, title: &str) -> Result<String, AppError> {
    let base = slugify(title);
    if base.is_empty() {
        return Ok(slugify_or(title, "course"));
    }

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM courses WHERE slug = $1)")
        .bind(&base)
        .fetch_one(pool)
        .await?;

    if taken {
        Ok(format!("{}-{}", base, slug_suffix()))
    } else {
        Ok(base)
    }
}

async fn ensure_category(pool: &PgPool, category_id: i64) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
        .bind(category_id)
        .fetch_one(pool)
        .await?;
    if !exists {
        return Err(AppError::BadRequest("Unknown category".to_string()));
    }
    Ok(())
}

pub async fn create_course(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_category(&pool, payload.category_id).await?;

    let slug = unique_course_slug(&pool, &payload.title).await?;

    let course = sqlx::query_as::<_, Course>(
        r#"
        INSERT INTO courses (
            id, title, slug, description, short_description, category_id, instructor_id,
            thumbnail_url, preview_video, price_cents, original_price_cents, is_free,
            difficulty, duration_hours, language, status, meta_description, keywords,
            published_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18,
                CASE WHEN $16 = 'published' THEN NOW() END)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&payload.title)
    .bind(&slug)
    .bind(&payload.description)
    .bind(&payload.short_description)
    .bind(payload.category_id)
    .bind(instructor.instructor_id)
    .bind(&payload.thumbnail_url)
    .bind(&payload.preview_video)
    .bind(payload.price_cents)
    .bind(payload.original_price_cents)
    .bind(payload.is_free)
    .bind(payload.difficulty.as_str())
    .bind(payload.duration_hours)
    .bind(&payload.language)
    .bind(payload.status.as_str())
    .bind(&payload.meta_description)
    .bind(&payload.keywords)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_or_internal(e, format!("Course slug '{}' already exists", slug)))?;

    tracing::info!(instructor_id = instructor.instructor_id, slug = %course.slug, "course created");

    Ok((StatusCode::CREATED, Json(course)))
}

/// One of the caller's courses with its lessons, draft or not.
pub async fn get_course(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;

    let lessons = sqlx::query_as::<_, Lesson>(
        r#"SELECT * FROM lessons WHERE course_id = $1 ORDER BY "order""#,
    )
    .bind(course.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({ "course": course, "lessons": lessons })))
}

/// Partial course update. The slug never changes.
pub async fn update_course(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(slug): Path<String>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;

    if let Some(category_id) = payload.category_id {
        ensure_category(&pool, category_id).await?;
    }

    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE courses SET updated_at = NOW()");

    macro_rules! set_if_some {
        ($query:ident, $column:literal, $value:expr) => {
            if let Some(value) = $value {
                $query.push(concat!(", ", $column, " = ")).push_bind(value);
            }
        };
    }

    set_if_some!(query, "title", payload.title);
    set_if_some!(query, "description", payload.description);
    set_if_some!(query, "short_description", payload.short_description);
    set_if_some!(query, "category_id", payload.category_id);
    set_if_some!(query, "thumbnail_url", payload.thumbnail_url);
    set_if_some!(query, "preview_video", payload.preview_video);
    set_if_some!(query, "price_cents", payload.price_cents);
    set_if_some!(query, "original_price_cents", payload.original_price_cents);
    set_if_some!(query, "is_free", payload.is_free);
    set_if_some!(query, "difficulty", payload.difficulty.map(|d| d.as_str()));
    set_if_some!(query, "duration_hours", payload.duration_hours);
    set_if_some!(query, "language", payload.language);
    set_if_some!(query, "status", payload.status.map(|s| s.as_str()));
    set_if_some!(query, "meta_description", payload.meta_description);
    set_if_some!(query, "keywords", payload.keywords);

    if payload.status == Some(CourseStatus::Published) {
        query.push(", published_at = COALESCE(published_at, NOW())");
    }

    query
        .push(" WHERE id = ")
        .push_bind(course.id)
        .push(" RETURNING *");

    let course = query.build_query_as::<Course>().fetch_one(&pool).await?;

    Ok(Json(course))
}

pub async fn create_lesson(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;

    let order = match payload.order {
        Some(order) => order,
        None => sqlx::query_scalar(
            r#"SELECT COALESCE(MAX("order") + 1, 0) FROM lessons WHERE course_id = $1"#,
        )
        .bind(course.id)
        .fetch_one(&pool)
        .await?,
    };

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons (
            course_id, title, slug, description, lesson_type, video_url, text_content,
            duration_minutes, "order", is_preview
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(course.id)
    .bind(&payload.title)
    .bind(slugify_or(&payload.title, "lesson"))
    .bind(&payload.description)
    .bind(payload.lesson_type.as_str())
    .bind(&payload.video_url)
    .bind(&payload.text_content)
    .bind(payload.duration_minutes)
    .bind(order)
    .bind(payload.is_preview)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_or_internal(e, format!("A lesson already uses position {}", order)))?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Lesson `lesson_id` of a course the caller teaches.
async fn owned_lesson(
    pool: &PgPool,
    instructor: &InstructorUser,
    lesson_id: i64,
) -> Result<Lesson, AppError> {
    let (lesson, instructor_id) = sqlx::query_as::<_, (i64, i64)>(
        "SELECT l.id, c.instructor_id FROM lessons l JOIN courses c ON c.id = l.course_id WHERE l.id = $1",
    )
    .bind(lesson_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;

    if instructor_id != instructor.instructor_id {
        return Err(AppError::Forbidden("You do not teach this course".to_string()));
    }

    let lesson = sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = $1")
        .bind(lesson)
        .fetch_one(pool)
        .await?;
    Ok(lesson)
}

pub async fn update_lesson(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(lesson_id): Path<i64>,
    Json(payload): Json<UpdateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let lesson = owned_lesson(&pool, &instructor, lesson_id).await?;

    let title = payload.title.unwrap_or(lesson.title);
    let slug = slugify_or(&title, "lesson");

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        UPDATE lessons SET
            title = $2,
            slug = $3,
            description = COALESCE($4, description),
            lesson_type = COALESCE($5, lesson_type),
            video_url = COALESCE($6, video_url),
            text_content = COALESCE($7, text_content),
            duration_minutes = COALESCE($8, duration_minutes),
            "order" = COALESCE($9, "order"),
            is_preview = COALESCE($10, is_preview),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(lesson.id)
    .bind(&title)
    .bind(&slug)
    .bind(&payload.description)
    .bind(payload.lesson_type.map(|t| t.as_str()))
    .bind(&payload.video_url)
    .bind(&payload.text_content)
    .bind(payload.duration_minutes)
    .bind(payload.order)
    .bind(payload.is_preview)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_or_internal(e, "Another lesson already uses that position"))?;

    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(lesson_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let lesson = owned_lesson(&pool, &instructor, lesson_id).await?;

    sqlx::query("DELETE FROM lessons WHERE id = $1")
        .bind(lesson.id)
        .execute(&pool)
        .await?;

    tracing::info!(lesson_id = lesson.id, course_id = %lesson.course_id, "lesson deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Post an announcement and notify every active student.
pub async fn create_announcement(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;

    let content = clean_user_text(&payload.content)
        .ok_or_else(|| AppError::BadRequest("Content is required".to_string()))?;

    let announcement = sqlx::query_as::<_, Announcement>(
        r#"
        INSERT INTO course_announcements (course_id, instructor_id, title, content)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(course.id)
    .bind(instructor.instructor_id)
    .bind(payload.title.trim())
    .bind(content)
    .fetch_one(&pool)
    .await?;

    match notify_course_announcement(&pool, announcement.id).await {
        Ok(sent) => tracing::info!(announcement_id = announcement.id, sent, "announcement delivered"),
        Err(e) => tracing::error!("Failed to send announcement notifications: {:?}", e),
    }

    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn list_announcements(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;

    let announcements = sqlx::query_as::<_, Announcement>(
        "SELECT * FROM course_announcements WHERE course_id = $1 ORDER BY created_at DESC",
    )
    .bind(course.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(announcements))
}

/// Every discussion of the course with replies.
pub async fn course_discussions(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    Ok(Json(load_threads(&pool, course.id, None).await?))
}

/// All attempts at the course's quizzes, most recently completed first.
pub async fn quiz_results(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;

    let attempts = sqlx::query_as::<_, AttemptOverview>(
        r#"
        SELECT a.id, a.quiz_id, q.title AS quiz_title, l.title AS lesson_title,
               a.user_id, u.username, a.score, a.passed, a.started_at, a.completed_at,
               a.time_taken_minutes
        FROM quiz_attempts a
        JOIN quizzes q ON q.id = a.quiz_id
        JOIN lessons l ON l.id = q.lesson_id
        JOIN users u ON u.id = a.user_id
        WHERE l.course_id = $1
        ORDER BY a.completed_at DESC NULLS LAST, a.id DESC
        "#,
    )
    .bind(course.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(attempts))
}

/// Checks that an attempt belongs to a quiz of the given course.
async fn attempt_in_course(pool: &PgPool, course_id: Uuid, attempt_id: i64) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM quiz_attempts a
            JOIN quizzes q ON q.id = a.quiz_id
            JOIN lessons l ON l.id = q.lesson_id
            WHERE a.id = $1 AND l.course_id = $2
        )
        "#,
    )
    .bind(attempt_id)
    .bind(course_id)
    .fetch_one(pool)
    .await?;

    if !exists {
        return Err(AppError::NotFound("Quiz attempt not found".to_string()));
    }
    Ok(())
}

/// Short-answer responses of one attempt, for manual grading.
pub async fn short_answers(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, attempt_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    attempt_in_course(&pool, course.id, attempt_id).await?;

    let answers = sqlx::query_as::<_, ShortAnswerEntry>(
        r#"
        SELECT ans.id AS answer_id, q.id AS question_id, q.question_text, q.points,
               ans.answer_text, ans.is_correct
        FROM quiz_answers ans
        JOIN quiz_questions q ON q.id = ans.question_id
        WHERE ans.attempt_id = $1 AND q.question_type = 'short_answer'
        ORDER BY q."order", q.id
        "#,
    )
    .bind(attempt_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(answers))
}

/// Sets correctness of answers in one attempt, then rescores it.
/// Answer ids outside the attempt are skipped.
pub async fn grade_answers(
    State(pool): State<PgPool>,
    instructor: InstructorUser,
    Path((slug, attempt_id)): Path<(String, i64)>,
    Json(payload): Json<GradeAnswersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = owned_course(&pool, &slug, instructor.instructor_id).await?;
    attempt_in_course(&pool, course.id, attempt_id).await?;

    let mut tx = pool.begin().await?;

    let mut graded = 0u64;
    for grade in &payload.grades {
        graded += sqlx::query("UPDATE quiz_answers SET is_correct = $3 WHERE id = $1 AND attempt_id = $2")
            .bind(grade.answer_id)
            .bind(attempt_id)
            .bind(grade.is_correct)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }

    let summary = recalculate_attempt_score(&mut *tx, attempt_id).await?;

    tx.commit().await?;

    tracing::info!(attempt_id, graded, score = summary.score, "short answers graded");

    Ok(Json(json!({
        "graded": graded,
        "score": summary.score,
        "passed": summary.passed
    })))
}
