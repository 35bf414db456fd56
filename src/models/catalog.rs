use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::course::CourseCard;

/// Represents the 'categories' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub icon: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Category with the number of published courses it holds.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CategoryWithCount {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub icon: String,
    pub course_count: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(length(max = 50))]
    pub icon: Option<String>,
}

/// Landing page summary.
#[derive(Debug, Serialize)]
pub struct HomeResponse {
    pub featured_courses: Vec<CourseCard>,
    pub categories: Vec<CategoryWithCount>,
    pub total_courses: i64,
    pub total_students: i64,
    pub total_instructors: i64,
}
