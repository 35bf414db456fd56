use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::validate_optional_url;

/// Represents the 'instructors' table. A user's authoring identity.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Instructor {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
    pub profile_image_url: String,
    pub expertise: String,
    pub years_experience: i32,
    pub linkedin_url: String,
    pub twitter_url: String,
    pub website_url: String,
    pub is_verified: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for provisioning (or updating) the instructor profile of a user.
#[derive(Debug, Deserialize, Validate)]
pub struct UpsertInstructorRequest {
    pub user_id: i64,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub bio: String,
    #[serde(default)]
    #[validate(custom(function = validate_optional_url))]
    pub profile_image_url: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub expertise: String,
    #[serde(default)]
    #[validate(range(min = 0, max = 80))]
    pub years_experience: i32,
    #[serde(default)]
    #[validate(custom(function = validate_optional_url))]
    pub linkedin_url: String,
    #[serde(default)]
    #[validate(custom(function = validate_optional_url))]
    pub twitter_url: String,
    #[serde(default)]
    #[validate(custom(function = validate_optional_url))]
    pub website_url: String,
}

/// One course on the instructor dashboard.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct InstructorCourseStats {
    pub id: uuid::Uuid,
    pub title: String,
    pub slug: String,
    pub status: String,
    pub price_cents: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub student_count: i64,
    pub avg_rating: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct InstructorDashboard {
    pub instructor: Instructor,
    pub courses: Vec<InstructorCourseStats>,
    pub total_courses: usize,
    pub published_courses: usize,
    pub total_students: i64,
    /// Estimate in cents: price times active students, summed over courses.
    pub total_revenue_cents: i64,
}

/// Revenue estimate over the dashboard's courses.
pub fn revenue_estimate(courses: &[InstructorCourseStats]) -> i64 {
    courses
        .iter()
        .map(|c| c.price_cents.saturating_mul(c.student_count))
        .fold(0i64, i64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(price_cents: i64, student_count: i64) -> InstructorCourseStats {
        InstructorCourseStats {
            id: uuid::Uuid::new_v4(),
            title: "t".to_string(),
            slug: "t".to_string(),
            status: "published".to_string(),
            price_cents,
            created_at: chrono::Utc::now(),
            student_count,
            avg_rating: None,
        }
    }

    #[test]
    fn revenue_is_price_times_students() {
        let courses = [course(1999, 3), course(0, 50), course(500, 2)];
        assert_eq!(revenue_estimate(&courses), 1999 * 3 + 500 * 2);
        assert_eq!(revenue_estimate(&[]), 0);
    }
}
