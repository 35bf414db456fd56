//! Lookups shared by handlers: courses by slug, ownership and enrollment checks.

use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        course::{COURSE_CARD_SELECT, Course, CourseCard, Lesson},
        enrollment::Enrollment,
    },
};

pub async fn course_by_slug(pool: &PgPool, slug: &str) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
}

/// Like `course_by_slug`, but drafts and archived courses are reported as missing.
pub async fn published_course(pool: &PgPool, slug: &str) -> Result<Course, AppError> {
    let course = course_by_slug(pool, slug).await?;
    if !course.is_published() {
        return Err(AppError::NotFound("Course not found".to_string()));
    }
    Ok(course)
}

/// The course, provided `instructor_id` teaches it. 404 if missing, 403 otherwise.
pub async fn owned_course(
    pool: &PgPool,
    slug: &str,
    instructor_id: i64,
) -> Result<Course, AppError> {
    let course = course_by_slug(pool, slug).await?;
    if course.instructor_id != instructor_id {
        return Err(AppError::Forbidden(
            "You do not teach this course".to_string(),
        ));
    }
    Ok(course)
}

pub async fn course_card(pool: &PgPool, course_id: Uuid) -> Result<CourseCard, AppError> {
    let sql = format!("{} WHERE c.id = $1", COURSE_CARD_SELECT);
    sqlx::query_as::<_, CourseCard>(&sql)
        .bind(course_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Course not found".to_string()))
}

/// Lesson `lesson_id`, if it belongs to `course_id`.
pub async fn lesson_in_course<'e, E>(
    executor: E,
    course_id: Uuid,
    lesson_id: i64,
) -> Result<Lesson, AppError>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, Lesson>("SELECT * FROM lessons WHERE id = $1 AND course_id = $2")
        .bind(lesson_id)
        .bind(course_id)
        .fetch_optional(executor)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))
}

pub async fn active_enrollment<'e, E>(
    executor: E,
    user_id: i64,
    course_id: Uuid,
) -> Result<Option<Enrollment>, AppError>
where
    E: PgExecutor<'e>,
{
    let enrollment = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2 AND is_active",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_optional(executor)
    .await?;

    Ok(enrollment)
}

/// The caller's active enrollment, or 403.
pub async fn require_enrollment<'e, E>(
    executor: E,
    user_id: i64,
    course_id: Uuid,
) -> Result<Enrollment, AppError>
where
    E: PgExecutor<'e>,
{
    active_enrollment(executor, user_id, course_id)
        .await?
        .ok_or_else(|| AppError::Forbidden("You must be enrolled in this course".to_string()))
}

/// Id of the course instructor's user account.
pub async fn instructor_user_id(pool: &PgPool, instructor_id: i64) -> Result<i64, AppError> {
    sqlx::query_scalar("SELECT user_id FROM instructors WHERE id = $1")
        .bind(instructor_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Instructor not found".to_string()))
}
