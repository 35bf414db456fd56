use axum::{Json, extract::State, response::IntoResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        certificate::CertificateSummary,
        course::{COURSE_CARD_SELECT, CourseCard},
        enrollment::StudentDashboard,
        user::{MeResponse, UpdateProfileRequest, User, UserProfile},
    },
    services::notifications::display_name,
    utils::jwt::AuthUser,
};

use super::enrollment::enrolled_courses;

async fn load_me(pool: &PgPool, user_id: i64) -> Result<MeResponse, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, first_name, last_name, password, role, created_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    // Accounts created before profiles existed get one lazily.
    sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;

    let profile = sqlx::query_as::<_, UserProfile>("SELECT * FROM user_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let is_instructor: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM instructors WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    Ok(MeResponse {
        full_name: display_name(&user.first_name, &user.last_name, &user.username),
        user,
        profile,
        is_instructor,
    })
}

/// Get current user's account and profile.
pub async fn get_me(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(load_me(&pool, user.id).await?))
}

/// Edit the current user's name, email and profile fields.
pub async fn update_me(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE users SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            email = COALESCE($4, email)
        WHERE id = $1
        "#,
    )
    .bind(user.id)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        UPDATE user_profiles SET
            bio = COALESCE($2, bio),
            avatar_url = COALESCE($3, avatar_url),
            phone_number = COALESCE($4, phone_number),
            date_of_birth = COALESCE($5, date_of_birth),
            linkedin_url = COALESCE($6, linkedin_url),
            twitter_url = COALESCE($7, twitter_url),
            github_url = COALESCE($8, github_url),
            website_url = COALESCE($9, website_url),
            email_notifications = COALESCE($10, email_notifications),
            marketing_emails = COALESCE($11, marketing_emails),
            country = COALESCE($12, country),
            city = COALESCE($13, city),
            updated_at = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(user.id)
    .bind(&payload.bio)
    .bind(&payload.avatar_url)
    .bind(&payload.phone_number)
    .bind(payload.date_of_birth)
    .bind(&payload.linkedin_url)
    .bind(&payload.twitter_url)
    .bind(&payload.github_url)
    .bind(&payload.website_url)
    .bind(payload.email_notifications)
    .bind(payload.marketing_emails)
    .bind(&payload.country)
    .bind(&payload.city)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(Json(load_me(&pool, user.id).await?))
}

/// Student dashboard: enrollments, progress, certificates and recommendations.
pub async fn student_dashboard(
    State(pool): State<PgPool>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = enrolled_courses(&pool, user.id).await?;

    let certificates = sqlx::query_as::<_, CertificateSummary>(
        r#"
        SELECT cert.id, cert.certificate_id, c.id AS course_id, c.title AS course_title,
               c.slug AS course_slug, cert.issued_at
        FROM certificates cert
        JOIN courses c ON c.id = cert.course_id
        WHERE cert.user_id = $1
        ORDER BY cert.issued_at DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;

    let recommended_courses = if enrollments.is_empty() {
        let sql = format!(
            "{} WHERE c.status = 'published' AND c.is_featured ORDER BY c.created_at DESC LIMIT 3",
            COURSE_CARD_SELECT
        );
        sqlx::query_as::<_, CourseCard>(&sql).fetch_all(&pool).await?
    } else {
        let sql = format!(
            r#"{} WHERE c.status = 'published'
                AND c.category_id IN (
                    SELECT c2.category_id FROM enrollments e2
                    JOIN courses c2 ON c2.id = e2.course_id
                    WHERE e2.user_id = $1 AND e2.is_active)
                AND c.id NOT IN (SELECT course_id FROM enrollments WHERE user_id = $1 AND is_active)
                ORDER BY avg_rating DESC, c.created_at DESC
                LIMIT 3"#,
            COURSE_CARD_SELECT
        );
        sqlx::query_as::<_, CourseCard>(&sql)
            .bind(user.id)
            .fetch_all(&pool)
            .await?
    };

    let completed_courses_count = enrollments
        .iter()
        .filter(|e| e.enrollment.progress_percentage >= 100)
        .count();
    let enrolled_courses_count = enrollments.len();
    let certificates_count = certificates.len();

    let continue_learning = enrollments
        .iter()
        .filter(|e| e.enrollment.progress_percentage < 100)
        .take(3)
        .cloned()
        .collect();

    Ok(Json(StudentDashboard {
        enrollments,
        continue_learning,
        certificates,
        recommended_courses,
        enrolled_courses_count,
        completed_courses_count,
        certificates_count,
    }))
}
