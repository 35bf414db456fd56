//! Notification fan-out.
//!
//! Recipient selection is kept in pure functions. The async `notify_*`
//! functions load the context, pick recipients and insert one row each.
//! Callers log failures and carry on; a broken fan-out never fails the
//! request that triggered it.

use std::collections::{BTreeSet, HashSet};

use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    config::NEW_QUESTION_FANOUT_LIMIT,
    error::AppError,
    models::notification::NotificationType,
};

/// Values of a notification row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub course_id: Option<Uuid>,
    pub discussion_id: Option<i64>,
    pub discussion_reply_id: Option<i64>,
    pub action_url: Option<String>,
}

/// "First Last" when either is set, otherwise the username.
pub fn display_name(first_name: &str, last_name: &str, username: &str) -> String {
    let full = format!("{} {}", first_name.trim(), last_name.trim());
    let full = full.trim();
    if full.is_empty() {
        username.to_string()
    } else {
        full.to_string()
    }
}

pub fn discussion_url(course_slug: &str, discussion_id: i64) -> String {
    format!("/courses/course/{}/learn/?discussion={}", course_slug, discussion_id)
}

pub fn course_learn_url(course_slug: &str) -> String {
    format!("/courses/course/{}/learn/", course_slug)
}

/// First `max_chars` characters of `text`, respecting char boundaries.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Users told about a reply: the discussion author, earlier repliers and the
/// course instructor, minus the reply author, restricted to active enrollees.
pub fn reply_recipients(
    discussion_author: i64,
    reply_author: i64,
    previous_repliers: &[i64],
    instructor_user: Option<i64>,
    actively_enrolled: &HashSet<i64>,
) -> Vec<i64> {
    let mut recipients = BTreeSet::new();

    if discussion_author != reply_author {
        recipients.insert(discussion_author);
    }
    recipients.extend(
        previous_repliers
            .iter()
            .copied()
            .filter(|&user| user != reply_author),
    );
    if let Some(instructor) = instructor_user.filter(|&user| user != reply_author) {
        recipients.insert(instructor);
    }

    recipients
        .into_iter()
        .filter(|user| actively_enrolled.contains(user))
        .collect()
}

/// Recipients of a new discussion: the instructor (unless they wrote it) and,
/// for questions only, up to `limit` enrolled students other than the author.
pub fn new_discussion_recipients(
    author: i64,
    instructor_user: Option<i64>,
    is_question: bool,
    enrolled_in_order: &[i64],
    limit: usize,
) -> (Option<i64>, Vec<i64>) {
    let instructor = instructor_user.filter(|&user| user != author);

    let students = if is_question {
        enrolled_in_order
            .iter()
            .copied()
            .filter(|&user| user != author)
            .take(limit)
            .collect()
    } else {
        Vec::new()
    };

    (instructor, students)
}

/// Inserts a single notification row.
pub async fn create_notification(
    conn: &mut PgConnection,
    notification: &NewNotification,
) -> Result<i64, AppError> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO notifications
            (user_id, notification_type, title, message, course_id, discussion_id, discussion_reply_id, action_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(notification.user_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(notification.course_id)
    .bind(notification.discussion_id)
    .bind(notification.discussion_reply_id)
    .bind(&notification.action_url)
    .fetch_one(&mut *conn)
    .await?;

    Ok(id)
}

/// Inserts a batch in one transaction. Returns how many rows were written.
async fn deliver(pool: &PgPool, batch: Vec<NewNotification>) -> Result<usize, AppError> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await?;
    for notification in &batch {
        create_notification(&mut *tx, notification).await?;
    }
    tx.commit().await?;

    Ok(batch.len())
}

#[derive(FromRow)]
struct DiscussionContext {
    id: i64,
    title: String,
    is_question: bool,
    author_id: i64,
    author_username: String,
    author_first_name: String,
    author_last_name: String,
    course_id: Uuid,
    course_title: String,
    course_slug: String,
    instructor_user_id: i64,
}

async fn load_discussion_context(
    pool: &PgPool,
    discussion_id: i64,
) -> Result<DiscussionContext, AppError> {
    sqlx::query_as(
        r#"
        SELECT
            d.id, d.title, d.is_question,
            u.id AS author_id, u.username AS author_username,
            u.first_name AS author_first_name, u.last_name AS author_last_name,
            c.id AS course_id, c.title AS course_title, c.slug AS course_slug,
            i.user_id AS instructor_user_id
        FROM discussions d
        JOIN users u ON u.id = d.user_id
        JOIN courses c ON c.id = d.course_id
        JOIN instructors i ON i.id = c.instructor_id
        WHERE d.id = $1
        "#,
    )
    .bind(discussion_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Discussion not found".to_string()))
}

/// Active enrollees of a course, oldest enrollment first.
async fn active_enrollees(pool: &PgPool, course_id: Uuid) -> Result<Vec<i64>, AppError> {
    let users = sqlx::query_scalar(
        r#"
        SELECT user_id
        FROM enrollments
        WHERE course_id = $1 AND is_active
        ORDER BY enrolled_at, id
        "#,
    )
    .bind(course_id)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Tells the instructor (and, for questions, some classmates) about a new discussion.
pub async fn notify_new_discussion(pool: &PgPool, discussion_id: i64) -> Result<usize, AppError> {
    let ctx = load_discussion_context(pool, discussion_id).await?;
    let enrolled = active_enrollees(pool, ctx.course_id).await?;

    let (instructor, students) = new_discussion_recipients(
        ctx.author_id,
        Some(ctx.instructor_user_id),
        ctx.is_question,
        &enrolled,
        NEW_QUESTION_FANOUT_LIMIT as usize,
    );

    let author = display_name(&ctx.author_first_name, &ctx.author_last_name, &ctx.author_username);
    let action_url = discussion_url(&ctx.course_slug, ctx.id);
    let mut batch = Vec::new();

    if let Some(user_id) = instructor {
        batch.push(NewNotification {
            user_id,
            kind: NotificationType::DiscussionNew,
            title: format!("New discussion: \"{}\"", ctx.title),
            message: format!("{} started a new discussion in {}", author, ctx.course_title),
            course_id: Some(ctx.course_id),
            discussion_id: Some(ctx.id),
            discussion_reply_id: None,
            action_url: Some(action_url.clone()),
        });
    }

    for user_id in students {
        batch.push(NewNotification {
            user_id,
            kind: NotificationType::DiscussionNew,
            title: format!("New question: \"{}\"", ctx.title),
            message: format!("{} asked a question in {}", author, ctx.course_title),
            course_id: Some(ctx.course_id),
            discussion_id: Some(ctx.id),
            discussion_reply_id: None,
            action_url: Some(action_url.clone()),
        });
    }

    deliver(pool, batch).await
}

/// Tells everyone involved in a discussion about a new reply.
pub async fn notify_discussion_reply(pool: &PgPool, reply_id: i64) -> Result<usize, AppError> {
    let (discussion_id, reply_author, username, first_name, last_name): (i64, i64, String, String, String) =
        sqlx::query_as(
            r#"
            SELECT r.discussion_id, r.user_id, u.username, u.first_name, u.last_name
            FROM discussion_replies r
            JOIN users u ON u.id = r.user_id
            WHERE r.id = $1
            "#,
        )
        .bind(reply_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Reply not found".to_string()))?;

    let ctx = load_discussion_context(pool, discussion_id).await?;

    let previous_repliers: Vec<i64> = sqlx::query_scalar(
        "SELECT DISTINCT user_id FROM discussion_replies WHERE discussion_id = $1 AND id <> $2",
    )
    .bind(discussion_id)
    .bind(reply_id)
    .fetch_all(pool)
    .await?;

    let enrolled: HashSet<i64> = active_enrollees(pool, ctx.course_id)
        .await?
        .into_iter()
        .collect();

    let recipients = reply_recipients(
        ctx.author_id,
        reply_author,
        &previous_repliers,
        Some(ctx.instructor_user_id),
        &enrolled,
    );

    let replier = display_name(&first_name, &last_name, &username);
    let action_url = discussion_url(&ctx.course_slug, ctx.id);

    let batch = recipients
        .into_iter()
        .map(|user_id| NewNotification {
            user_id,
            kind: NotificationType::DiscussionReply,
            title: format!("New reply in \"{}\"", ctx.title),
            message: format!(
                "{} replied to the discussion \"{}\" in {}",
                replier, ctx.title, ctx.course_title
            ),
            course_id: Some(ctx.course_id),
            discussion_id: Some(ctx.id),
            discussion_reply_id: Some(reply_id),
            action_url: Some(action_url.clone()),
        })
        .collect();

    deliver(pool, batch).await
}

/// Tells every active enrollee about a course announcement.
pub async fn notify_course_announcement(
    pool: &PgPool,
    announcement_id: i64,
) -> Result<usize, AppError> {
    let (title, content, course_id, course_title, course_slug): (String, String, Uuid, String, String) =
        sqlx::query_as(
            r#"
            SELECT a.title, a.content, c.id, c.title, c.slug
            FROM course_announcements a
            JOIN courses c ON c.id = a.course_id
            WHERE a.id = $1
            "#,
        )
        .bind(announcement_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Announcement not found".to_string()))?;

    let action_url = course_learn_url(&course_slug);

    let batch = active_enrollees(pool, course_id)
        .await?
        .into_iter()
        .map(|user_id| NewNotification {
            user_id,
            kind: NotificationType::CourseAnnouncement,
            title: format!("New announcement: {}", title),
            message: format!("New announcement in {}: {}...", course_title, excerpt(&content, 100)),
            course_id: Some(course_id),
            discussion_id: None,
            discussion_reply_id: None,
            action_url: Some(action_url.clone()),
        })
        .collect();

    deliver(pool, batch).await
}

/// Congratulates a student on a freshly issued certificate.
pub async fn notify_certificate_earned(
    pool: &PgPool,
    user_id: i64,
    course_id: Uuid,
    certificate_code: &str,
) -> Result<usize, AppError> {
    let (course_title, course_slug): (String, String) =
        sqlx::query_as("SELECT title, slug FROM courses WHERE id = $1")
            .bind(course_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Course not found".to_string()))?;

    let notification = NewNotification {
        user_id,
        kind: NotificationType::CertificateEarned,
        title: format!("Certificate earned: {}", course_title),
        message: format!(
            "You completed {} and earned certificate {}",
            course_title, certificate_code
        ),
        course_id: Some(course_id),
        discussion_id: None,
        discussion_reply_id: None,
        action_url: Some(course_learn_url(&course_slug)),
    };

    deliver(pool, vec![notification]).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrolled(users: &[i64]) -> HashSet<i64> {
        users.iter().copied().collect()
    }

    #[test]
    fn reply_author_is_never_notified() {
        let recipients = reply_recipients(1, 1, &[1, 2], Some(1), &enrolled(&[1, 2, 3]));
        assert_eq!(recipients, vec![2]);
    }

    #[test]
    fn reply_recipients_are_deduplicated_and_enrolled() {
        let recipients = reply_recipients(
            10,
            20,
            &[30, 30, 10, 40],
            Some(50),
            &enrolled(&[10, 30, 50]),
        );
        assert_eq!(recipients, vec![10, 30, 50]);
    }

    #[test]
    fn unenrolled_instructor_is_skipped_on_reply() {
        let recipients = reply_recipients(10, 20, &[], Some(50), &enrolled(&[10]));
        assert_eq!(recipients, vec![10]);
    }

    #[test]
    fn new_discussion_goes_to_instructor_only_when_not_a_question() {
        let (instructor, students) = new_discussion_recipients(1, Some(9), false, &[1, 2, 3], 10);
        assert_eq!(instructor, Some(9));
        assert!(students.is_empty());
    }

    #[test]
    fn instructor_starting_a_discussion_is_not_self_notified() {
        let (instructor, _) = new_discussion_recipients(9, Some(9), true, &[], 10);
        assert_eq!(instructor, None);
    }

    #[test]
    fn new_question_fanout_is_capped_and_skips_author() {
        let enrolled: Vec<i64> = (1..=15).collect();
        let (_, students) = new_discussion_recipients(3, None, true, &enrolled, 10);
        assert_eq!(students.len(), 10);
        assert!(!students.contains(&3));
        assert_eq!(students.first(), Some(&1));
        assert_eq!(students.last(), Some(&11));
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(display_name("Ada", "Lovelace", "ada"), "Ada Lovelace");
        assert_eq!(display_name("", "Lovelace", "ada"), "Lovelace");
        assert_eq!(display_name(" ", "", "ada"), "ada");
    }

    #[test]
    fn urls_point_at_the_learn_page() {
        assert_eq!(discussion_url("rust-101", 7), "/courses/course/rust-101/learn/?discussion=7");
        assert_eq!(course_learn_url("rust-101"), "/courses/course/rust-101/learn/");
    }

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo wörld", 4), "héll");
        assert_eq!(excerpt("short", 100), "short");
    }
}
