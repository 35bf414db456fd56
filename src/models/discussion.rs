use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'discussions' table, joined with its author's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Discussion {
    pub id: i64,
    pub course_id: Uuid,
    pub lesson_id: Option<i64>,
    pub user_id: i64,
    pub author: String,
    pub title: String,
    pub content: String,
    pub is_question: bool,
    pub is_resolved: bool,
    pub upvotes: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'discussion_replies' table, joined with its author's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DiscussionReply {
    pub id: i64,
    pub discussion_id: i64,
    pub user_id: i64,
    pub author: String,
    pub content: String,
    pub is_instructor_reply: bool,
    pub upvotes: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct DiscussionThread {
    #[serde(flatten)]
    pub discussion: Discussion,
    pub reply_count: usize,
    pub replies: Vec<DiscussionReply>,
}

#[derive(Debug, Deserialize)]
pub struct DiscussionListParams {
    pub lesson_id: Option<i64>,
}

/// DTO for starting a discussion. Content is sanitized before storage.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDiscussionRequest {
    pub lesson_id: Option<i64>,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 chars"))]
    pub title: String,
    #[validate(length(min = 1, max = 10000, message = "Content must be between 1 and 10000 chars"))]
    pub content: String,
    #[serde(default = "default_is_question")]
    pub is_question: bool,
}

fn default_is_question() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReplyRequest {
    #[validate(length(min = 1, max = 10000, message = "Reply content is required"))]
    pub content: String,
}
