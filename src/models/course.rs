// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{review::ReviewView, validate_optional_url};
use crate::utils::video::VideoEmbed;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

impl CourseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CourseStatus::Draft => "draft",
            CourseStatus::Published => "published",
            CourseStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonType {
    Video,
    Text,
    Quiz,
    Assignment,
}

impl LessonType {
    pub fn as_str(self) -> &'static str {
        match self {
            LessonType::Video => "video",
            LessonType::Text => "text",
            LessonType::Quiz => "quiz",
            LessonType::Assignment => "assignment",
        }
    }
}

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub short_description: String,
    pub category_id: i64,
    pub instructor_id: i64,
    pub thumbnail_url: String,
    pub preview_video: String,
    /// Prices are stored in cents.
    pub price_cents: i64,
    pub original_price_cents: Option<i64>,
    pub is_free: bool,
    pub difficulty: String,
    pub duration_hours: i32,
    pub language: String,
    pub status: String,
    pub is_featured: bool,
    pub is_bestseller: bool,
    pub meta_description: String,
    pub keywords: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub published_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Course {
    pub fn is_published(&self) -> bool {
        self.status == CourseStatus::Published.as_str()
    }
}

/// Percentage saved against the original price, truncated. 0 without a higher original price.
pub fn discount_percentage(price_cents: i64, original_price_cents: Option<i64>) -> i32 {
    match original_price_cents {
        Some(original) if original > price_cents && original > 0 => {
            ((original - price_cents) * 100 / original) as i32
        }
        _ => 0,
    }
}

/// Columns of `CourseCard`. Callers append `WHERE`/`ORDER BY` clauses.
/// Aliases: `c` courses, `cat` categories, `u` instructor user.
pub const COURSE_CARD_SELECT: &str = r#"
    SELECT
        c.id, c.title, c.slug, c.short_description, c.thumbnail_url,
        c.price_cents, c.original_price_cents, c.is_free, c.difficulty,
        c.duration_hours, c.language, c.status, c.is_featured, c.is_bestseller, c.created_at,
        cat.name AS category_name, cat.slug AS category_slug,
        c.instructor_id, u.username AS instructor_username,
        u.first_name AS instructor_first_name, u.last_name AS instructor_last_name,
        COALESCE((SELECT AVG(r.rating)::FLOAT8 FROM reviews r WHERE r.course_id = c.id), 0) AS avg_rating,
        (SELECT COUNT(*) FROM reviews r WHERE r.course_id = c.id) AS review_count,
        (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id AND e.is_active) AS student_count
    FROM courses c
    JOIN categories cat ON cat.id = c.category_id
    JOIN instructors i ON i.id = c.instructor_id
    JOIN users u ON u.id = i.user_id
"#;

/// Course summary with aggregates, used by listings and dashboards.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CourseCard {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub short_description: String,
    pub thumbnail_url: String,
    pub price_cents: i64,
    pub original_price_cents: Option<i64>,
    pub is_free: bool,
    pub difficulty: String,
    pub duration_hours: i32,
    pub language: String,
    pub status: String,
    pub is_featured: bool,
    pub is_bestseller: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub category_name: String,
    pub category_slug: String,
    pub instructor_id: i64,
    pub instructor_username: String,
    pub instructor_first_name: String,
    pub instructor_last_name: String,
    pub avg_rating: f64,
    pub review_count: i64,
    pub student_count: i64,
}

/// Sort orders of the public catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseSort {
    #[default]
    Newest,
    Oldest,
    PriceLow,
    PriceHigh,
    Rating,
    Popular,
}

impl CourseSort {
    pub fn order_by(self) -> &'static str {
        match self {
            CourseSort::Newest => " ORDER BY c.created_at DESC",
            CourseSort::Oldest => " ORDER BY c.created_at ASC",
            CourseSort::PriceLow => " ORDER BY c.price_cents ASC, c.created_at DESC",
            CourseSort::PriceHigh => " ORDER BY c.price_cents DESC, c.created_at DESC",
            CourseSort::Rating => " ORDER BY avg_rating DESC, c.created_at DESC",
            CourseSort::Popular => " ORDER BY student_count DESC, c.created_at DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceFilter {
    Free,
    Paid,
}

/// Query parameters for the course catalog.
#[derive(Debug, Default, Deserialize)]
pub struct CourseListParams {
    /// Matches title, description and instructor names.
    pub search: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    pub difficulty: Option<Difficulty>,
    pub price: Option<PriceFilter>,
    #[serde(default)]
    pub sort: CourseSort,
    /// 1-based page number.
    pub page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CourseListResponse {
    pub courses: Vec<CourseCard>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

/// Number of pages needed for `total` items; at least one.
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 1;
    }
    (total + page_size - 1) / page_size
}

/// Requested page clamped to `1..=total_pages`; missing means the first page.
pub fn clamp_page(requested: Option<i64>, total_pages: i64) -> i64 {
    requested.unwrap_or(1).clamp(1, total_pages.max(1))
}

/// `ILIKE` pattern matching `text` anywhere, with `\`, `%` and `_` taken literally.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

/// Represents the 'lessons' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lesson {
    pub id: i64,
    pub course_id: Uuid,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub lesson_type: String,
    pub video_url: String,
    pub text_content: String,
    pub duration_minutes: i32,
    pub order: i32,
    pub is_preview: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct CourseDetailResponse {
    pub course: CourseCard,
    pub description: String,
    pub preview_video: String,
    pub discount_percentage: i32,
    pub lessons: Vec<Lesson>,
    pub reviews: Vec<ReviewView>,
    pub related_courses: Vec<CourseCard>,
}

/// Per-user flags for a course page.
#[derive(Debug, Serialize)]
pub struct CourseStatusResponse {
    pub is_enrolled: bool,
    pub can_review: bool,
    pub in_wishlist: bool,
    pub progress_percentage: Option<i32>,
}

/// DTO for creating a course. The slug is derived from the title.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 20000))]
    pub description: String,
    #[validate(length(min = 1, max = 300))]
    pub short_description: String,
    pub category_id: i64,
    #[serde(default)]
    #[validate(custom(function = validate_optional_url))]
    pub thumbnail_url: String,
    #[serde(default)]
    #[validate(custom(function = validate_optional_url))]
    pub preview_video: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub price_cents: i64,
    #[validate(range(min = 0))]
    pub original_price_cents: Option<i64>,
    #[serde(default)]
    pub is_free: bool,
    pub difficulty: Difficulty,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration_hours: i32,
    #[serde(default = "default_language")]
    #[validate(length(min = 1, max = 50))]
    pub language: String,
    #[serde(default = "default_status")]
    pub status: CourseStatus,
    #[serde(default)]
    #[validate(length(max = 160))]
    pub meta_description: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub keywords: String,
}

fn default_language() -> String {
    "English".to_string()
}

fn default_status() -> CourseStatus {
    CourseStatus::Draft
}

/// DTO for editing a course. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 300))]
    pub short_description: Option<String>,
    pub category_id: Option<i64>,
    #[validate(custom(function = validate_optional_url))]
    pub thumbnail_url: Option<String>,
    #[validate(custom(function = validate_optional_url))]
    pub preview_video: Option<String>,
    #[validate(range(min = 0))]
    pub price_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub original_price_cents: Option<i64>,
    pub is_free: Option<bool>,
    pub difficulty: Option<Difficulty>,
    #[validate(range(min = 0))]
    pub duration_hours: Option<i32>,
    #[validate(length(min = 1, max = 50))]
    pub language: Option<String>,
    pub status: Option<CourseStatus>,
    #[validate(length(max = 160))]
    pub meta_description: Option<String>,
    #[validate(length(max = 200))]
    pub keywords: Option<String>,
}

/// DTO for creating a lesson. `order` defaults to the next free slot.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[serde(default)]
    #[validate(length(max = 20000))]
    pub description: String,
    #[serde(default = "default_lesson_type")]
    pub lesson_type: LessonType,
    #[serde(default)]
    #[validate(custom(function = validate_optional_url))]
    pub video_url: String,
    #[serde(default)]
    pub text_content: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub duration_minutes: i32,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
    #[serde(default)]
    pub is_preview: bool,
}

fn default_lesson_type() -> LessonType {
    LessonType::Video
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLessonRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 20000))]
    pub description: Option<String>,
    pub lesson_type: Option<LessonType>,
    #[validate(custom(function = validate_optional_url))]
    pub video_url: Option<String>,
    pub text_content: Option<String>,
    #[validate(range(min = 0))]
    pub duration_minutes: Option<i32>,
    #[validate(range(min = 0))]
    pub order: Option<i32>,
    pub is_preview: Option<bool>,
}

/// A lesson on the learn page.
#[derive(Debug, Serialize)]
pub struct LessonView {
    #[serde(flatten)]
    pub lesson: Lesson,
    pub quiz_id: Option<i64>,
    pub is_completed: bool,
    pub embed: Option<VideoEmbed>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discount_is_truncated_percentage() {
        assert_eq!(discount_percentage(4999, Some(9999)), 50);
        assert_eq!(discount_percentage(1000, Some(3000)), 66);
        assert_eq!(discount_percentage(1000, Some(1000)), 0);
        assert_eq!(discount_percentage(1000, None), 0);
        assert_eq!(discount_percentage(2000, Some(1000)), 0);
    }

    #[test]
    fn page_count_rounds_up() {
        assert_eq!(total_pages(0, 12), 1);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
    }

    #[test]
    fn page_is_clamped_to_existing_pages() {
        assert_eq!(clamp_page(None, 3), 1);
        assert_eq!(clamp_page(Some(0), 3), 1);
        assert_eq!(clamp_page(Some(-4), 3), 1);
        assert_eq!(clamp_page(Some(2), 3), 2);
        assert_eq!(clamp_page(Some(99), 3), 3);
        assert_eq!(clamp_page(Some(i64::MAX), 1), 1);
    }

    #[test]
    fn search_wildcards_are_escaped() {
        assert_eq!(contains_pattern("rust"), "%rust%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn list_params_parse_from_query() {
        let params: CourseListParams =
            serde_json::from_value(serde_json::json!({ "sort": "price_low", "price": "free" }))
                .unwrap();
        assert_eq!(params.sort, CourseSort::PriceLow);
        assert_eq!(params.price, Some(PriceFilter::Free));

        let params: CourseListParams = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(params.sort, CourseSort::Newest);
    }

    #[test]
    fn create_course_defaults() {
        let req: CreateCourseRequest = serde_json::from_value(serde_json::json!({
            "title": "Rust 101",
            "description": "Ownership and borrowing",
            "short_description": "Learn Rust",
            "category_id": 1,
            "difficulty": "beginner"
        }))
        .unwrap();
        assert_eq!(req.status, CourseStatus::Draft);
        assert_eq!(req.language, "English");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn negative_price_is_rejected() {
        let req: CreateCourseRequest = serde_json::from_value(serde_json::json!({
            "title": "Rust 101",
            "description": "d",
            "short_description": "s",
            "category_id": 1,
            "difficulty": "advanced",
            "price_cents": -5
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }
}
