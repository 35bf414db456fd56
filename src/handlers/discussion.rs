use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::discussion::{
        CreateDiscussionRequest, CreateReplyRequest, Discussion, DiscussionListParams,
        DiscussionReply, DiscussionThread,
    },
    services::{
        access::{course_by_slug, instructor_user_id, lesson_in_course},
        notifications::{notify_discussion_reply, notify_new_discussion},
    },
    utils::{html::clean_user_text, jwt::AuthUser},
};

/// Author name: "First Last" when set, otherwise the username.
const AUTHOR_NAME: &str =
    "COALESCE(NULLIF(TRIM(u.first_name || ' ' || u.last_name), ''), u.username) AS author";

fn discussion_select() -> String {
    format!(
        r#"
        SELECT d.id, d.course_id, d.lesson_id, d.user_id, {AUTHOR_NAME},
               d.title, d.content, d.is_question, d.is_resolved, d.upvotes,
               d.created_at, d.updated_at
        FROM discussions d
        JOIN users u ON u.id = d.user_id
        "#
    )
}

fn reply_select() -> String {
    format!(
        r#"
        SELECT r.id, r.discussion_id, r.user_id, {AUTHOR_NAME},
               r.content, r.is_instructor_reply, r.upvotes, r.created_at
        FROM discussion_replies r
        JOIN users u ON u.id = r.user_id
        "#
    )
}

/// Discussions of a course (optionally one lesson) with their replies, newest first.
pub(crate) async fn load_threads(
    pool: &PgPool,
    course_id: Uuid,
    lesson_id: Option<i64>,
) -> Result<Vec<DiscussionThread>, AppError> {
    let sql = format!(
        "{} WHERE d.course_id = $1 AND ($2::BIGINT IS NULL OR d.lesson_id = $2) ORDER BY d.created_at DESC",
        discussion_select()
    );
    let discussions = sqlx::query_as::<_, Discussion>(&sql)
        .bind(course_id)
        .bind(lesson_id)
        .fetch_all(pool)
        .await?;

    let ids: Vec<i64> = discussions.iter().map(|d| d.id).collect();
    let sql = format!(
        "{} WHERE r.discussion_id = ANY($1) ORDER BY r.created_at",
        reply_select()
    );
    let mut replies: HashMap<i64, Vec<DiscussionReply>> = HashMap::new();
    for reply in sqlx::query_as::<_, DiscussionReply>(&sql)
        .bind(&ids)
        .fetch_all(pool)
        .await?
    {
        replies.entry(reply.discussion_id).or_default().push(reply);
    }

    Ok(discussions
        .into_iter()
        .map(|discussion| {
            let replies = replies.remove(&discussion.id).unwrap_or_default();
            DiscussionThread {
                reply_count: replies.len(),
                replies,
                discussion,
            }
        })
        .collect())
}

pub async fn list_discussions(
    State(pool): State<PgPool>,
    _user: AuthUser,
    Path(slug): Path<String>,
    Query(params): Query<DiscussionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let course = course_by_slug(&pool, &slug).await?;
    Ok(Json(load_threads(&pool, course.id, params.lesson_id).await?))
}

/// Start a discussion. Notifies the instructor and, for questions, classmates.
pub async fn create_discussion(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
    Json(payload): Json<CreateDiscussionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let title = clean_user_text(&payload.title);
    let content = clean_user_text(&payload.content);
    let (Some(title), Some(content)) = (title, content) else {
        return Err(AppError::BadRequest("Title and content are required".to_string()));
    };

    let course = course_by_slug(&pool, &slug).await?;
    if let Some(lesson_id) = payload.lesson_id {
        lesson_in_course(&pool, course.id, lesson_id).await?;
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO discussions (course_id, lesson_id, user_id, title, content, is_question)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(course.id)
    .bind(payload.lesson_id)
    .bind(user.id)
    .bind(title)
    .bind(content)
    .bind(payload.is_question)
    .fetch_one(&pool)
    .await?;

    if let Err(e) = notify_new_discussion(&pool, id).await {
        tracing::error!("Failed to send discussion notifications: {:?}", e);
    }

    let sql = format!("{} WHERE d.id = $1", discussion_select());
    let discussion = sqlx::query_as::<_, Discussion>(&sql)
        .bind(id)
        .fetch_one(&pool)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DiscussionThread {
            discussion,
            reply_count: 0,
            replies: Vec::new(),
        }),
    ))
}

/// Reply to a discussion of the course.
pub async fn create_reply(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path((slug, discussion_id)): Path<(String, i64)>,
    Json(payload): Json<CreateReplyRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = clean_user_text(&payload.content)
        .ok_or_else(|| AppError::BadRequest("Reply content is required".to_string()))?;

    let course = course_by_slug(&pool, &slug).await?;

    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM discussions WHERE id = $1 AND course_id = $2)",
    )
    .bind(discussion_id)
    .bind(course.id)
    .fetch_one(&pool)
    .await?;
    if !exists {
        return Err(AppError::NotFound("Discussion not found".to_string()));
    }

    let is_instructor_reply = instructor_user_id(&pool, course.instructor_id).await? == user.id;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO discussion_replies (discussion_id, user_id, content, is_instructor_reply)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(discussion_id)
    .bind(user.id)
    .bind(content)
    .bind(is_instructor_reply)
    .fetch_one(&pool)
    .await?;

    if let Err(e) = notify_discussion_reply(&pool, id).await {
        tracing::error!("Failed to send reply notifications: {:?}", e);
    }

    let sql = format!("{} WHERE r.id = $1", reply_select());
    let reply = sqlx::query_as::<_, DiscussionReply>(&sql)
        .bind(id)
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(reply)))
}
