// src/handlers/auth.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{CreateUserRequest, LoginRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{ROLE_ADMIN, ROLE_USER, sign_jwt},
    },
};

/// Inserts a user and its profile row in one transaction.
pub(crate) async fn create_user_with_profile(
    pool: &PgPool,
    payload: &CreateUserRequest,
    role: &str,
) -> Result<User, AppError> {
    let hashed_password = hash_password(&payload.password)?;

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, username, email, first_name, last_name, password, role, created_at
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&hashed_password)
    .bind(role)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        AppError::conflict_or_internal(e, format!("Username '{}' already exists", payload.username))
    })?;

    sqlx::query("INSERT INTO user_profiles (user_id) VALUES ($1)")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = user.id, username = %user.username, "user registered");

    Ok(user)
}

/// Creates an admin account with an empty profile. Used to seed the first admin.
pub async fn create_admin_user(
    pool: &PgPool,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let payload = CreateUserRequest {
        username: username.to_string(),
        password: password.to_string(),
        email: String::new(),
        first_name: String::new(),
        last_name: String::new(),
    };
    create_user_with_profile(pool, &payload, ROLE_ADMIN).await
}

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = create_user_with_profile(&pool, &payload, ROLE_USER).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, email, first_name, last_name, password, role, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        tracing::warn!(username = %payload.username, "failed login");
        return Err(AppError::AuthError("Invalid username or password".to_string()));
    }

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "role": user.role
    })))
}
