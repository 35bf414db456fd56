use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        course::{COURSE_CARD_SELECT, CourseCard, Lesson, LessonView},
        enrollment::{
            EnrollOutcome, EnrollResponse, EnrolledCourse, Enrollment, LearnResponse,
            ToggleLessonResponse,
        },
    },
    services::{
        access::{
            active_enrollment, course_by_slug, course_card, lesson_in_course, published_course,
            require_enrollment,
        },
        certificates::issue_certificate,
        notifications::notify_certificate_earned,
        progress::refresh_enrollment_progress,
    },
    utils::{jwt::AuthUser, video::embed_for},
};

/// Active enrollments of a user with their course cards, most recent first.
pub(crate) async fn enrolled_courses(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<EnrolledCourse>, AppError> {
    let enrollments = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = $1 AND is_active ORDER BY enrolled_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let ids: Vec<uuid::Uuid> = enrollments.iter().map(|e| e.course_id).collect();
    let sql = format!("{} WHERE c.id = ANY($1)", COURSE_CARD_SELECT);
    let mut cards: HashMap<uuid::Uuid, CourseCard> = sqlx::query_as::<_, CourseCard>(&sql)
        .bind(&ids)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|card| (card.id, card))
        .collect();

    Ok(enrollments
        .into_iter()
        .filter_map(|enrollment| {
            cards
                .remove(&enrollment.course_id)
                .map(|course| EnrolledCourse { enrollment, course })
        })
        .collect())
}

/// Enroll in a published course.
/// Re-activates an inactive enrollment; reports an existing active one.
pub async fn enroll(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = published_course(&pool, &slug).await?;

    let existing = sqlx::query_as::<_, Enrollment>(
        "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(user.id)
    .bind(course.id)
    .fetch_optional(&pool)
    .await?;

    let (enrollment, outcome, status) = match existing {
        Some(enrollment) if enrollment.is_active => {
            (enrollment, EnrollOutcome::AlreadyEnrolled, StatusCode::OK)
        }
        Some(enrollment) => {
            let enrollment = sqlx::query_as::<_, Enrollment>(
                "UPDATE enrollments SET is_active = TRUE WHERE id = $1 RETURNING *",
            )
            .bind(enrollment.id)
            .fetch_one(&pool)
            .await?;
            (enrollment, EnrollOutcome::Reactivated, StatusCode::OK)
        }
        None => {
            // A concurrent enroll may win the race; fall back to its row.
            let inserted = sqlx::query_as::<_, Enrollment>(
                r#"
                INSERT INTO enrollments (user_id, course_id)
                VALUES ($1, $2)
                ON CONFLICT (user_id, course_id) DO NOTHING
                RETURNING *
                "#,
            )
            .bind(user.id)
            .bind(course.id)
            .fetch_optional(&pool)
            .await?;

            match inserted {
                Some(enrollment) => (enrollment, EnrollOutcome::Enrolled, StatusCode::CREATED),
                None => {
                    let enrollment = require_enrollment(&pool, user.id, course.id).await?;
                    (enrollment, EnrollOutcome::AlreadyEnrolled, StatusCode::OK)
                }
            }
        }
    };

    if outcome != EnrollOutcome::AlreadyEnrolled {
        tracing::info!(user_id = user.id, course = %course.slug, ?outcome, "enrollment");
    }

    Ok((status, Json(EnrollResponse { enrollment, outcome })))
}

/// Active enrollments of the caller.
pub async fn my_courses(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(enrolled_courses(&pool, user.id).await?))
}

#[derive(sqlx::FromRow)]
struct LessonRow {
    #[sqlx(flatten)]
    lesson: Lesson,
    quiz_id: Option<i64>,
}

/// The learn page: ordered lessons, quiz ids, embeds and the caller's progress.
pub async fn learn(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = published_course(&pool, &slug).await?;
    let card = course_card(&pool, course.id).await?;
    let enrollment = active_enrollment(&pool, user.id, course.id).await?;

    let rows = sqlx::query_as::<_, LessonRow>(
        r#"
        SELECT l.*, q.id AS quiz_id
        FROM lessons l
        LEFT JOIN quizzes q ON q.lesson_id = l.id
        WHERE l.course_id = $1
        ORDER BY l."order"
        "#,
    )
    .bind(course.id)
    .fetch_all(&pool)
    .await?;

    let completed: HashMap<i64, bool> = match &enrollment {
        Some(enrollment) => sqlx::query_as::<_, (i64, bool)>(
            "SELECT lesson_id, is_completed FROM lesson_progress WHERE enrollment_id = $1",
        )
        .bind(enrollment.id)
        .fetch_all(&pool)
        .await?
        .into_iter()
        .collect(),
        None => HashMap::new(),
    };

    let lesson_progress: HashMap<i64, bool> = if enrollment.is_some() {
        rows.iter()
            .map(|row| {
                let id = row.lesson.id;
                (id, completed.get(&id).copied().unwrap_or(false))
            })
            .collect()
    } else {
        HashMap::new()
    };

    let lessons = rows
        .into_iter()
        .map(|row| LessonView {
            is_completed: lesson_progress.get(&row.lesson.id).copied().unwrap_or(false),
            embed: embed_for(&row.lesson.video_url),
            quiz_id: row.quiz_id,
            lesson: row.lesson,
        })
        .collect();

    Ok(Json(LearnResponse {
        course: card,
        enrollment,
        lessons,
        lesson_progress,
    }))
}

/// Toggles completion of a lesson. The first call marks it complete.
pub async fn toggle_lesson_complete(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path((slug, lesson_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = course_by_slug(&pool, &slug).await?;

    let mut tx = pool.begin().await?;

    lesson_in_course(&mut *tx, course.id, lesson_id).await?;
    let enrollment = require_enrollment(&mut *tx, user.id, course.id).await?;

    let completed: bool = sqlx::query_scalar(
        r#"
        INSERT INTO lesson_progress (enrollment_id, lesson_id, is_completed, completed_at)
        VALUES ($1, $2, TRUE, NOW())
        ON CONFLICT (enrollment_id, lesson_id) DO UPDATE SET
            is_completed = NOT lesson_progress.is_completed,
            completed_at = CASE WHEN lesson_progress.is_completed THEN NULL ELSE NOW() END
        RETURNING is_completed
        "#,
    )
    .bind(enrollment.id)
    .bind(lesson_id)
    .fetch_one(&mut *tx)
    .await?;

    let progress_percentage = refresh_enrollment_progress(&mut *tx, enrollment.id, course.id).await?;

    tx.commit().await?;

    Ok(Json(ToggleLessonResponse {
        completed,
        progress_percentage,
    }))
}

/// Returns the caller's certificate, issuing it on first request.
/// Only available once every lesson is complete.
pub async fn get_certificate(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = published_course(&pool, &slug).await?;
    let enrollment = require_enrollment(&pool, user.id, course.id).await?;

    if enrollment.progress_percentage < 100 {
        return Err(AppError::BadRequest(
            "You must complete the entire course to get a certificate.".to_string(),
        ));
    }

    let mut conn = pool.acquire().await?;
    let (certificate, issued) =
        issue_certificate(&mut conn, user.id, course.id, enrollment.id).await?;
    drop(conn);

    if issued {
        if let Err(e) =
            notify_certificate_earned(&pool, user.id, course.id, &certificate.certificate_id).await
        {
            tracing::error!("Failed to send certificate notification: {:?}", e);
        }
    }

    let status = if issued { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(certificate)))
}
