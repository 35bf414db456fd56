use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        course::{COURSE_CARD_SELECT, CourseCard},
        review::{CreateReviewRequest, Review, ReviewView},
    },
    services::access::{published_course, require_enrollment},
    utils::{html::clean_user_text, jwt::AuthUser},
};

/// Leave a review. Requires an active enrollment; one review per course.
pub async fn create_review(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let comment = clean_user_text(&payload.comment)
        .ok_or_else(|| AppError::BadRequest("Comment is required".to_string()))?;

    let course = published_course(&pool, &slug).await?;
    require_enrollment(&pool, user.id, course.id).await?;

    let review = sqlx::query_as::<_, Review>(
        r#"
        INSERT INTO reviews (course_id, user_id, rating, comment)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(course.id)
    .bind(user.id)
    .bind(payload.rating)
    .bind(comment)
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_or_internal(e, "You have already reviewed this course"))?;

    Ok((StatusCode::CREATED, Json(review)))
}

/// All reviews of a course, newest first.
pub async fn list_reviews(
    State(pool): State<PgPool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = published_course(&pool, &slug).await?;

    let reviews = sqlx::query_as::<_, ReviewView>(
        r#"
        SELECT r.id, r.user_id, u.username, u.first_name, u.last_name, r.rating, r.comment, r.created_at
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE r.course_id = $1
        ORDER BY r.created_at DESC
        "#,
    )
    .bind(course.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(reviews))
}

/// Adds a course to the wishlist, or removes it when already there.
pub async fn toggle_wishlist(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = published_course(&pool, &slug).await?;

    let removed = sqlx::query("DELETE FROM wishlist WHERE user_id = $1 AND course_id = $2")
        .bind(user.id)
        .bind(course.id)
        .execute(&pool)
        .await?
        .rows_affected();

    if removed > 0 {
        return Ok(Json(json!({"added": false, "message": "Removed from wishlist"})));
    }

    sqlx::query(
        "INSERT INTO wishlist (user_id, course_id) VALUES ($1, $2) ON CONFLICT (user_id, course_id) DO NOTHING",
    )
    .bind(user.id)
    .bind(course.id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({"added": true, "message": "Added to wishlist"})))
}

/// The caller's wishlist, most recently added first.
pub async fn list_wishlist(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "{} JOIN wishlist w ON w.course_id = c.id WHERE w.user_id = $1 ORDER BY w.added_at DESC",
        COURSE_CARD_SELECT
    );
    let courses = sqlx::query_as::<_, CourseCard>(&sql)
        .bind(user.id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(courses))
}
