// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use super::validate_optional_url;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    pub email: String,
    pub first_name: String,
    pub last_name: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'user_profiles' table. Created together with its user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub user_id: i64,
    pub bio: String,
    pub avatar_url: String,
    pub phone_number: String,
    pub date_of_birth: Option<chrono::NaiveDate>,
    pub linkedin_url: String,
    pub twitter_url: String,
    pub github_url: String,
    pub website_url: String,
    pub email_notifications: bool,
    pub marketing_emails: bool,
    pub country: String,
    pub city: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Profile data for the current user.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub full_name: String,
    pub profile: UserProfile,
    pub is_instructor: bool,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[serde(default)]
    #[validate(custom(function = validate_optional_email))]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150))]
    pub last_name: String,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// DTO for editing the caller's own profile. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(custom(function = validate_optional_email))]
    pub email: Option<String>,
    #[validate(length(max = 500))]
    pub bio: Option<String>,
    #[validate(custom(function = validate_optional_url))]
    pub avatar_url: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub date_of_birth: Option<chrono::NaiveDate>,
    #[validate(custom(function = validate_optional_url))]
    pub linkedin_url: Option<String>,
    #[validate(custom(function = validate_optional_url))]
    pub twitter_url: Option<String>,
    #[validate(custom(function = validate_optional_url))]
    pub github_url: Option<String>,
    #[validate(custom(function = validate_optional_url))]
    pub website_url: Option<String>,
    pub email_notifications: Option<bool>,
    pub marketing_emails: Option<bool>,
    #[validate(length(max = 100))]
    pub country: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
}

/// Empty is allowed (the column default); otherwise it must look like an address.
fn validate_optional_email(email: &str) -> Result<(), validator::ValidationError> {
    if email.is_empty() {
        return Ok(());
    }
    let valid = email.len() <= 254
        && email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !valid {
        return Err(validator::ValidationError::new("invalid_email"));
    }
    Ok(())
}
