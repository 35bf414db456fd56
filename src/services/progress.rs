use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppError;

/// Whole-number completion percentage, floored. A course without lessons is at 0.
pub fn progress_percentage(completed: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    let completed = completed.clamp(0, total);
    ((completed * 100) / total) as i32
}

/// Recounts completed lessons of an enrollment and stores the new percentage.
/// `completed_at` is set on reaching 100 and cleared when progress drops again.
pub async fn refresh_enrollment_progress(
    conn: &mut PgConnection,
    enrollment_id: i64,
    course_id: Uuid,
) -> Result<i32, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE course_id = $1")
        .bind(course_id)
        .fetch_one(&mut *conn)
        .await?;

    let completed: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM lesson_progress lp
        JOIN lessons l ON l.id = lp.lesson_id
        WHERE lp.enrollment_id = $1 AND lp.is_completed AND l.course_id = $2
        "#,
    )
    .bind(enrollment_id)
    .bind(course_id)
    .fetch_one(&mut *conn)
    .await?;

    let percentage = progress_percentage(completed, total);

    sqlx::query(
        r#"
        UPDATE enrollments
        SET progress_percentage = $2,
            completed_at = CASE
                WHEN $2 >= 100 THEN COALESCE(completed_at, NOW())
                ELSE NULL
            END
        WHERE id = $1
        "#,
    )
    .bind(enrollment_id)
    .bind(percentage)
    .execute(&mut *conn)
    .await?;

    Ok(percentage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_floored() {
        assert_eq!(progress_percentage(1, 3), 33);
        assert_eq!(progress_percentage(2, 3), 66);
        assert_eq!(progress_percentage(3, 3), 100);
    }

    #[test]
    fn empty_course_is_zero() {
        assert_eq!(progress_percentage(0, 0), 0);
        assert_eq!(progress_percentage(5, 0), 0);
    }

    #[test]
    fn stale_counts_never_exceed_one_hundred() {
        assert_eq!(progress_percentage(7, 5), 100);
        assert_eq!(progress_percentage(-1, 5), 0);
    }
}
