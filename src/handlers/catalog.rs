// src/handlers/catalog.rs

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    config::{CATALOG_PAGE_SIZE, COURSE_DETAIL_REVIEWS, RELATED_COURSES_LIMIT},
    error::AppError,
    models::{
        catalog::{Category, CategoryWithCount, HomeResponse},
        course::{
            COURSE_CARD_SELECT, CourseCard, CourseDetailResponse, CourseListParams,
            CourseListResponse, CourseStatusResponse, Lesson, PriceFilter, clamp_page,
            contains_pattern, discount_percentage, total_pages,
        },
        review::ReviewView,
    },
    services::access::{active_enrollment, course_card, published_course},
    utils::jwt::AuthUser,
};

/// Appends the catalog filters to a query that already selects from `courses c`.
fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, params: &'a CourseListParams) {
    builder.push(" WHERE c.status = 'published'");

    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = contains_pattern(search);
        builder
            .push(" AND (c.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.first_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.last_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }

    if let Some(category) = params.category.as_deref().filter(|s| !s.is_empty()) {
        builder.push(" AND cat.slug = ").push_bind(category);
    }

    if let Some(difficulty) = params.difficulty {
        builder.push(" AND c.difficulty = ").push_bind(difficulty.as_str());
    }

    match params.price {
        Some(PriceFilter::Free) => {
            builder.push(" AND c.is_free");
        }
        Some(PriceFilter::Paid) => {
            builder.push(" AND NOT c.is_free");
        }
        None => {}
    }
}

/// List published courses.
/// Supports search, category/difficulty/price filters, sorting and page-based pagination.
pub async fn list_courses(
    State(pool): State<PgPool>,
    Query(params): Query<CourseListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut count_query: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT COUNT(*)
        FROM courses c
        JOIN categories cat ON cat.id = c.category_id
        JOIN instructors i ON i.id = c.instructor_id
        JOIN users u ON u.id = i.user_id
        "#,
    );
    push_filters(&mut count_query, &params);
    let total: i64 = count_query.build_query_scalar().fetch_one(&pool).await?;
    let total_pages = total_pages(total, CATALOG_PAGE_SIZE);
    let page = clamp_page(params.page, total_pages);

    let mut query: QueryBuilder<Postgres> = QueryBuilder::new(COURSE_CARD_SELECT);
    push_filters(&mut query, &params);
    query.push(params.sort.order_by());
    query
        .push(" LIMIT ")
        .push_bind(CATALOG_PAGE_SIZE)
        .push(" OFFSET ")
        .push_bind((page - 1) * CATALOG_PAGE_SIZE);

    let courses = query.build_query_as::<CourseCard>().fetch_all(&pool).await?;

    Ok(Json(CourseListResponse {
        courses,
        page,
        total_pages,
        total,
    }))
}

/// All categories, alphabetical.
pub async fn list_categories(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let categories = sqlx::query_as::<_, Category>("SELECT * FROM categories ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(categories))
}

/// Landing page: featured courses, busiest categories and platform totals.
pub async fn home(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "{} WHERE c.status = 'published' AND c.is_featured ORDER BY c.created_at DESC LIMIT 6",
        COURSE_CARD_SELECT
    );
    let featured_courses = sqlx::query_as::<_, CourseCard>(&sql).fetch_all(&pool).await?;

    let categories = sqlx::query_as::<_, CategoryWithCount>(
        r#"
        SELECT cat.id, cat.name, cat.slug, cat.icon,
               COUNT(c.id) FILTER (WHERE c.status = 'published') AS course_count
        FROM categories cat
        LEFT JOIN courses c ON c.category_id = cat.id
        GROUP BY cat.id
        ORDER BY course_count DESC, cat.name
        LIMIT 8
        "#,
    )
    .fetch_all(&pool)
    .await?;

    let (total_courses, total_students, total_instructors): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM courses WHERE status = 'published'),
            (SELECT COUNT(DISTINCT user_id) FROM enrollments WHERE is_active),
            (SELECT COUNT(DISTINCT instructor_id) FROM courses WHERE status = 'published')
        "#,
    )
    .fetch_one(&pool)
    .await?;

    Ok(Json(HomeResponse {
        featured_courses,
        categories,
        total_courses,
        total_students,
        total_instructors,
    }))
}

/// Public course page.
pub async fn course_detail(
    State(pool): State<PgPool>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = published_course(&pool, &slug).await?;
    let card = course_card(&pool, course.id).await?;

    let lessons = sqlx::query_as::<_, Lesson>(
        r#"SELECT * FROM lessons WHERE course_id = $1 ORDER BY "order""#,
    )
    .bind(course.id)
    .fetch_all(&pool)
    .await?;

    let reviews = sqlx::query_as::<_, ReviewView>(
        r#"
        SELECT r.id, r.user_id, u.username, u.first_name, u.last_name, r.rating, r.comment, r.created_at
        FROM reviews r
        JOIN users u ON u.id = r.user_id
        WHERE r.course_id = $1
        ORDER BY r.created_at DESC
        LIMIT $2
        "#,
    )
    .bind(course.id)
    .bind(COURSE_DETAIL_REVIEWS)
    .fetch_all(&pool)
    .await?;

    let sql = format!(
        "{} WHERE c.status = 'published' AND c.category_id = $1 AND c.id <> $2 ORDER BY c.created_at DESC LIMIT $3",
        COURSE_CARD_SELECT
    );
    let related_courses = sqlx::query_as::<_, CourseCard>(&sql)
        .bind(course.category_id)
        .bind(course.id)
        .bind(RELATED_COURSES_LIMIT)
        .fetch_all(&pool)
        .await?;

    Ok(Json(CourseDetailResponse {
        discount_percentage: discount_percentage(course.price_cents, course.original_price_cents),
        course: card,
        description: course.description,
        preview_video: course.preview_video,
        lessons,
        reviews,
        related_courses,
    }))
}

/// Caller-specific flags for a course page.
pub async fn course_status(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let course = published_course(&pool, &slug).await?;
    let enrollment = active_enrollment(&pool, user.id, course.id).await?;

    let (has_review, in_wishlist): (bool, bool) = sqlx::query_as(
        r#"
        SELECT
            EXISTS(SELECT 1 FROM reviews WHERE user_id = $1 AND course_id = $2),
            EXISTS(SELECT 1 FROM wishlist WHERE user_id = $1 AND course_id = $2)
        "#,
    )
    .bind(user.id)
    .bind(course.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(CourseStatusResponse {
        is_enrolled: enrollment.is_some(),
        can_review: enrollment.is_some() && !has_review,
        in_wishlist,
        progress_percentage: enrollment.map(|e| e.progress_percentage),
    }))
}
