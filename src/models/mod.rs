// src/models/mod.rs

pub mod announcement;
pub mod catalog;
pub mod certificate;
pub mod course;
pub mod discussion;
pub mod enrollment;
pub mod instructor;
pub mod note;
pub mod notification;
pub mod quiz;
pub mod review;
pub mod user;

/// Empty strings are allowed (the column default); anything else must be an absolute URL.
pub(crate) fn validate_optional_url(value: &str) -> Result<(), validator::ValidationError> {
    if value.is_empty() || url::Url::parse(value).is_ok() {
        Ok(())
    } else {
        Err(validator::ValidationError::new("invalid_url"))
    }
}
