use chrono::{DateTime, Utc};

/// Human readable age of a timestamp, e.g. "3 hours ago".
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);

    let days = diff.num_days();
    if days > 0 {
        return format!("{} day{} ago", days, plural(days));
    }

    let seconds = diff.num_seconds();
    if seconds > 3600 {
        let hours = seconds / 3600;
        format!("{} hour{} ago", hours, plural(hours))
    } else if seconds > 60 {
        let minutes = seconds / 60;
        format!("{} minute{} ago", minutes, plural(minutes))
    } else {
        "Just now".to_string()
    }
}

fn plural(n: i64) -> &'static str {
    if n > 1 { "s" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn labels_by_magnitude() {
        let now = Utc::now();
        assert_eq!(time_ago(now - Duration::seconds(30), now), "Just now");
        assert_eq!(time_ago(now - Duration::minutes(1) - Duration::seconds(5), now), "1 minute ago");
        assert_eq!(time_ago(now - Duration::minutes(42), now), "42 minutes ago");
        assert_eq!(time_ago(now - Duration::hours(5), now), "5 hours ago");
        assert_eq!(time_ago(now - Duration::days(1), now), "1 day ago");
        assert_eq!(time_ago(now - Duration::days(9), now), "9 days ago");
    }

    #[test]
    fn future_timestamps_read_as_just_now() {
        let now = Utc::now();
        assert_eq!(time_ago(now + Duration::hours(2), now), "Just now");
    }
}
