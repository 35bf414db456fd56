use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Represents the 'reviews' table. One per user per course.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Review {
    pub id: i64,
    pub course_id: Uuid,
    pub user_id: i64,
    pub rating: i32,
    pub comment: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Review with its author's name, as shown on a course page.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewView {
    pub id: i64,
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub rating: i32,
    pub comment: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(min = 1, max = 5000, message = "Comment is required"))]
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_must_be_one_to_five() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let req = CreateReviewRequest {
                rating,
                comment: "Great course".to_string(),
            };
            assert_eq!(req.validate().is_ok(), ok, "rating {rating}");
        }
    }
}
