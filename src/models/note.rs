use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'course_notes' table. Private to its author.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub course_id: Uuid,
    pub lesson_id: Option<i64>,
    /// "General" for course-level notes.
    pub lesson_title: String,
    pub content: String,
    /// Video position in seconds.
    pub timestamp: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NoteListParams {
    pub lesson_id: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateNoteRequest {
    pub lesson_id: Option<i64>,
    #[validate(length(min = 1, max = 10000, message = "Note content is required"))]
    pub content: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub timestamp: i32,
}

/// Represents the 'course_bookmarks' table. Unique per user, lesson and timestamp.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Bookmark {
    pub id: i64,
    pub user_id: i64,
    pub lesson_id: i64,
    pub timestamp: i32,
    pub title: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBookmarkRequest {
    pub lesson_id: i64,
    #[validate(length(min = 1, max = 200, message = "Bookmark title is required"))]
    pub title: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub timestamp: i32,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub bookmark: Bookmark,
    /// False when an existing bookmark was returned.
    pub created: bool,
}
