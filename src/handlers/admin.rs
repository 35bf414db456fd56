// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        catalog::{Category, CreateCategoryRequest},
        course::Course,
        instructor::{Instructor, UpsertInstructorRequest},
        user::{CreateUserRequest, User},
    },
    utils::{
        hash::hash_password,
        jwt::{AuthUser, ROLE_ADMIN, ROLE_USER},
        slug::slugify,
    },
};

use super::auth::create_user_with_profile;

fn check_role(role: &str) -> Result<(), AppError> {
    if role == ROLE_ADMIN || role == ROLE_USER {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unknown role '{}'", role)))
    }
}

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
        .fetch_all(&pool)
        .await?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize)]
pub struct AdminCreateUserRequest {
    #[serde(flatten)]
    pub user: CreateUserRequest,
    #[serde(default = "default_role")]
    pub role: String,
}

fn default_role() -> String {
    ROLE_USER.to_string()
}

/// Creates a new user with specific role.
/// Admin only.
pub async fn create_user(
    State(pool): State<PgPool>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.user.validate()?;
    check_role(&payload.role)?;

    let user = create_user_with_profile(&pool, &payload.user, &payload.role).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// DTO for updating a user. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct AdminUpdateUserRequest {
    #[validate(length(min = 3, max = 50))]
    pub username: Option<String>,
    pub role: Option<String>,
    #[validate(length(min = 4, max = 128))]
    pub password: Option<String>,
}

/// Updates user information.
/// Admin only.
pub async fn update_user(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if let Some(role) = &payload.role {
        check_role(role)?;
    }

    if payload.username.is_none() && payload.role.is_none() && payload.password.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET ");
    let mut separated = builder.separated(", ");

    if let Some(username) = payload.username {
        separated.push("username = ");
        separated.push_bind_unseparated(username);
    }

    if let Some(role) = payload.role {
        separated.push("role = ");
        separated.push_bind_unseparated(role);
    }

    if let Some(password) = payload.password {
        separated.push("password = ");
        separated.push_bind_unseparated(hash_password(&password)?);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder
        .build()
        .execute(&pool)
        .await
        .map_err(|e| AppError::conflict_or_internal(e, "Username already exists"))?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    admin: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(user_id = id, deleted_by = admin.id, "user deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Creates a catalog category. The slug derives from the name.
/// Admin only.
pub async fn create_category(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let name = payload.name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::BadRequest(
            "Category name must contain letters or digits".to_string(),
        ));
    }

    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (name, slug, description, icon)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(name)
    .bind(&slug)
    .bind(&payload.description)
    .bind(payload.icon.as_deref().unwrap_or("fas fa-book"))
    .fetch_one(&pool)
    .await
    .map_err(|e| AppError::conflict_or_internal(e, "Category already exists"))?;

    Ok((StatusCode::CREATED, Json(category)))
}

/// Creates or updates the instructor profile of a user and marks it verified.
/// Admin only.
pub async fn upsert_instructor(
    State(pool): State<PgPool>,
    Json(payload): Json<UpsertInstructorRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
        .bind(payload.user_id)
        .fetch_one(&pool)
        .await?;
    if !user_exists {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let instructor = sqlx::query_as::<_, Instructor>(
        r#"
        INSERT INTO instructors
            (user_id, bio, profile_image_url, expertise, years_experience,
             linkedin_url, twitter_url, website_url, is_verified)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE)
        ON CONFLICT (user_id) DO UPDATE SET
            bio = EXCLUDED.bio,
            profile_image_url = EXCLUDED.profile_image_url,
            expertise = EXCLUDED.expertise,
            years_experience = EXCLUDED.years_experience,
            linkedin_url = EXCLUDED.linkedin_url,
            twitter_url = EXCLUDED.twitter_url,
            website_url = EXCLUDED.website_url,
            is_verified = TRUE
        RETURNING *
        "#,
    )
    .bind(payload.user_id)
    .bind(&payload.bio)
    .bind(&payload.profile_image_url)
    .bind(&payload.expertise)
    .bind(payload.years_experience)
    .bind(&payload.linkedin_url)
    .bind(&payload.twitter_url)
    .bind(&payload.website_url)
    .fetch_one(&pool)
    .await?;

    tracing::info!(user_id = payload.user_id, instructor_id = instructor.id, "instructor profile saved");

    Ok(Json(instructor))
}

#[derive(Debug, Deserialize)]
pub struct ReassignCourseRequest {
    pub instructor_id: i64,
}

/// Moves a course to another instructor.
/// Admin only.
pub async fn reassign_course(
    State(pool): State<PgPool>,
    Path(slug): Path<String>,
    Json(payload): Json<ReassignCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let instructor_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM instructors WHERE id = $1)")
            .bind(payload.instructor_id)
            .fetch_one(&pool)
            .await?;
    if !instructor_exists {
        return Err(AppError::BadRequest("Unknown instructor".to_string()));
    }

    let course = sqlx::query_as::<_, Course>(
        "UPDATE courses SET instructor_id = $2, updated_at = NOW() WHERE slug = $1 RETURNING *",
    )
    .bind(&slug)
    .bind(payload.instructor_id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}
