use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::note::{
        Bookmark, BookmarkResponse, CreateBookmarkRequest, CreateNoteRequest, Note,
        NoteListParams,
    },
    services::access::{course_by_slug, lesson_in_course},
    utils::{html::clean_user_text, jwt::AuthUser},
};

const NOTE_SELECT: &str = r#"
    SELECT n.id, n.user_id, n.course_id, n.lesson_id,
           COALESCE(l.title, 'General') AS lesson_title,
           n.content, n.timestamp, n.created_at, n.updated_at
    FROM course_notes n
    LEFT JOIN lessons l ON l.id = n.lesson_id
"#;

/// The caller's notes on a course, optionally for one lesson.
pub async fn list_notes(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
    Query(params): Query<NoteListParams>,
) -> Result<impl IntoResponse, AppError> {
    let course = course_by_slug(&pool, &slug).await?;

    let sql = format!(
        "{} WHERE n.user_id = $1 AND n.course_id = $2 AND ($3::BIGINT IS NULL OR n.lesson_id = $3) ORDER BY n.created_at DESC",
        NOTE_SELECT
    );
    let notes = sqlx::query_as::<_, Note>(&sql)
        .bind(user.id)
        .bind(course.id)
        .bind(params.lesson_id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(notes))
}

pub async fn create_note(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateNoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = clean_user_text(&payload.content)
        .ok_or_else(|| AppError::BadRequest("Note content is required".to_string()))?;

    let course = course_by_slug(&pool, &slug).await?;
    if let Some(lesson_id) = payload.lesson_id {
        lesson_in_course(&pool, course.id, lesson_id).await?;
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO course_notes (user_id, course_id, lesson_id, content, timestamp)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(course.id)
    .bind(payload.lesson_id)
    .bind(content)
    .bind(payload.timestamp)
    .fetch_one(&pool)
    .await?;

    let sql = format!("{} WHERE n.id = $1", NOTE_SELECT);
    let note = sqlx::query_as::<_, Note>(&sql)
        .bind(id)
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(note)))
}

/// Delete one of the caller's notes. Other users' notes are reported as missing.
pub async fn delete_note(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path((slug, note_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = course_by_slug(&pool, &slug).await?;

    let deleted = sqlx::query("DELETE FROM course_notes WHERE id = $1 AND user_id = $2 AND course_id = $3")
        .bind(note_id)
        .bind(user.id)
        .bind(course.id)
        .execute(&pool)
        .await?
        .rows_affected();

    if deleted == 0 {
        return Err(AppError::NotFound("Note not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Saves a bookmark, or returns the existing one at the same position.
pub async fn create_bookmark(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateBookmarkRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Lesson and title are required".to_string()));
    }

    let course = course_by_slug(&pool, &slug).await?;
    lesson_in_course(&pool, course.id, payload.lesson_id).await?;

    let inserted = sqlx::query_as::<_, Bookmark>(
        r#"
        INSERT INTO course_bookmarks (user_id, lesson_id, timestamp, title)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, lesson_id, timestamp) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(user.id)
    .bind(payload.lesson_id)
    .bind(payload.timestamp)
    .bind(title)
    .fetch_optional(&pool)
    .await?;

    let response = match inserted {
        Some(bookmark) => BookmarkResponse {
            bookmark,
            created: true,
        },
        None => {
            let bookmark = sqlx::query_as::<_, Bookmark>(
                "SELECT * FROM course_bookmarks WHERE user_id = $1 AND lesson_id = $2 AND timestamp = $3",
            )
            .bind(user.id)
            .bind(payload.lesson_id)
            .bind(payload.timestamp)
            .fetch_one(&pool)
            .await?;
            BookmarkResponse {
                bookmark,
                created: false,
            }
        }
    };

    let status = if response.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(response)))
}

/// The caller's bookmarks on one lesson, in playback order.
pub async fn list_bookmarks(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path((slug, lesson_id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let course = course_by_slug(&pool, &slug).await?;
    lesson_in_course(&pool, course.id, lesson_id).await?;

    let bookmarks = sqlx::query_as::<_, Bookmark>(
        "SELECT * FROM course_bookmarks WHERE user_id = $1 AND lesson_id = $2 ORDER BY timestamp",
    )
    .bind(user.id)
    .bind(lesson_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(bookmarks))
}
