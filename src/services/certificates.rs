use sqlx::PgConnection;
use uuid::Uuid;

use crate::{config::CERTIFICATE_PREFIX, error::AppError, models::certificate::Certificate};

/// Public certificate identifier, e.g. `FA-1A2B3C4D`.
pub fn certificate_code() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", CERTIFICATE_PREFIX, hex[..8].to_uppercase())
}

/// Fresh codes tried before giving up on a collision streak.
const CODE_ATTEMPTS: usize = 3;

/// Returns the enrollment's certificate, creating it on first call.
/// The boolean is true when the certificate was issued by this call.
pub async fn issue_certificate(
    conn: &mut PgConnection,
    user_id: i64,
    course_id: Uuid,
    enrollment_id: i64,
) -> Result<(Certificate, bool), AppError> {
    let mut last_err = None;
    for _ in 0..CODE_ATTEMPTS {
        let code = certificate_code();
        match issue_certificate_with_code(&mut *conn, user_id, course_id, enrollment_id, &code).await {
            Err(AppError::Conflict(msg)) => {
                tracing::warn!(%code, "certificate code collision, retrying");
                last_err = Some(AppError::Conflict(msg));
            }
            other => return other,
        }
    }

    Err(last_err.unwrap_or_else(|| AppError::InternalServerError("No certificate code available".to_string())))
}

/// Same as [`issue_certificate`] with a caller-chosen code.
/// A code already held by another certificate yields `Conflict`.
pub async fn issue_certificate_with_code(
    conn: &mut PgConnection,
    user_id: i64,
    course_id: Uuid,
    enrollment_id: i64,
    code: &str,
) -> Result<(Certificate, bool), AppError> {
    let inserted: Option<Certificate> = sqlx::query_as(
        r#"
        INSERT INTO certificates (user_id, course_id, enrollment_id, certificate_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, course_id) DO NOTHING
        RETURNING id, user_id, course_id, enrollment_id, certificate_id, issued_at
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .bind(enrollment_id)
    .bind(code)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::conflict_or_internal(e, format!("Certificate code {} is taken", code)))?;

    if let Some(certificate) = inserted {
        tracing::info!(user_id, %course_id, code = %certificate.certificate_id, "certificate issued");
        return Ok((certificate, true));
    }

    let existing: Certificate = sqlx::query_as(
        r#"
        SELECT id, user_id, course_id, enrollment_id, certificate_id, issued_at
        FROM certificates
        WHERE user_id = $1 AND course_id = $2
        "#,
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok((existing, false))
}
