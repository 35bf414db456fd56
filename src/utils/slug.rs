/// Builds a URL slug: lowercase ASCII alphanumerics joined by single hyphens.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else if ch.is_whitespace() || ch == '-' || ch == '_' {
            pending_dash = true;
        }
    }

    slug
}

/// Short random hex, used to disambiguate slugs.
pub fn slug_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// `slugify(title)`, or `{fallback}-xxxxxx` when the title has no ASCII
/// alphanumerics to build from.
pub fn slugify_or(title: &str, fallback: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", fallback, slug_suffix())
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_is_dropped_and_spaces_collapse() {
        assert_eq!(slugify("Intro to Rust: Part 1!"), "intro-to-rust-part-1");
        assert_eq!(slugify("  many   spaces  "), "many-spaces");
        assert_eq!(slugify("snake_case-and-dash"), "snake-case-and-dash");
    }

    #[test]
    fn non_ascii_only_title_yields_empty_slug() {
        assert_eq!(slugify("日本語"), "");
    }

    #[test]
    fn empty_slug_falls_back_to_prefixed_suffix() {
        let slug = slugify_or("日本語", "lesson");
        let (prefix, suffix) = slug.split_once('-').unwrap();
        assert_eq!(prefix, "lesson");
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));

        assert_eq!(slugify_or("Kerning pairs", "lesson"), "kerning-pairs");
    }
}
