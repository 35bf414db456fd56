use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored in `notifications.notification_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    DiscussionReply,
    DiscussionNew,
    CourseAnnouncement,
    CourseUpdate,
    AssignmentDue,
    CertificateEarned,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::DiscussionReply => "discussion_reply",
            NotificationType::DiscussionNew => "discussion_new",
            NotificationType::CourseAnnouncement => "course_announcement",
            NotificationType::CourseUpdate => "course_update",
            NotificationType::AssignmentDue => "assignment_due",
            NotificationType::CertificateEarned => "certificate_earned",
        }
    }
}

/// Represents the 'notifications' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub course_id: Option<Uuid>,
    pub discussion_id: Option<i64>,
    pub discussion_reply_id: Option<i64>,
    pub action_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    /// e.g. "3 hours ago".
    pub time_ago: String,
}

#[derive(Debug, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationView>,
    pub unread_count: i64,
}
