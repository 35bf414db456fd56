/// Clean HTML content using the ammonia library.
///
/// Whitelist-based: safe tags such as <b> and <p> survive, while <script>,
/// <iframe> and event-handler attributes are stripped.
pub fn clean_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Trims user input and sanitizes it. Returns `None` when nothing is left.
pub fn clean_user_text(input: &str) -> Option<String> {
    let cleaned = clean_html(input.trim());
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_tags_are_removed() {
        let out = clean_html("<p>hi</p><script>alert(1)</script>");
        assert_eq!(out, "<p>hi</p>");
    }

    #[test]
    fn blank_or_script_only_input_is_rejected() {
        assert_eq!(clean_user_text("   "), None);
        assert_eq!(clean_user_text("<script>x</script>"), None);
        assert_eq!(clean_user_text("  ok  ").as_deref(), Some("ok"));
    }
}
