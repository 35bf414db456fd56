use std::collections::HashMap;

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::{
    certificate::CertificateSummary,
    course::{CourseCard, LessonView},
};

/// Represents the 'enrollments' table. Unique per user and course.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Enrollment {
    pub id: i64,
    pub user_id: i64,
    pub course_id: Uuid,
    pub enrolled_at: chrono::DateTime<chrono::Utc>,
    pub is_active: bool,
    pub progress_percentage: i32,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'lesson_progress' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LessonProgress {
    pub id: i64,
    pub enrollment_id: i64,
    pub lesson_id: i64,
    pub is_completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub time_spent_minutes: i32,
}

/// Outcome of an enroll request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollOutcome {
    Enrolled,
    Reactivated,
    AlreadyEnrolled,
}

#[derive(Debug, Serialize)]
pub struct EnrollResponse {
    pub enrollment: Enrollment,
    pub outcome: EnrollOutcome,
}

/// Enrollment joined with the course card, for "my courses" and dashboards.
#[derive(Debug, Clone, Serialize)]
pub struct EnrolledCourse {
    pub enrollment: Enrollment,
    pub course: CourseCard,
}

#[derive(Debug, Serialize)]
pub struct LearnResponse {
    pub course: CourseCard,
    pub enrollment: Option<Enrollment>,
    pub lessons: Vec<LessonView>,
    /// Lesson id to completion flag; empty when not enrolled.
    pub lesson_progress: HashMap<i64, bool>,
}

#[derive(Debug, Serialize)]
pub struct ToggleLessonResponse {
    pub completed: bool,
    pub progress_percentage: i32,
}

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub enrollments: Vec<EnrolledCourse>,
    pub continue_learning: Vec<EnrolledCourse>,
    pub certificates: Vec<CertificateSummary>,
    pub recommended_courses: Vec<CourseCard>,
    pub enrolled_courses_count: usize,
    pub completed_courses_count: usize,
    pub certificates_count: usize,
}
