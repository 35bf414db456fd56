use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'certificates' table. One per enrollment.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Certificate {
    pub id: i64,
    pub user_id: i64,
    pub course_id: Uuid,
    pub enrollment_id: i64,
    /// Public identifier, e.g. `FA-1A2B3C4D`.
    pub certificate_id: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

/// Certificate joined with its course, for dashboards.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CertificateSummary {
    pub id: i64,
    pub certificate_id: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub course_slug: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}
