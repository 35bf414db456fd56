use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

static YOUTUBE_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([a-zA-Z0-9_-]{11})")
            .expect("valid youtube regex"),
        Regex::new(r"youtube\.com/watch\?.*v=([a-zA-Z0-9_-]{11})").expect("valid youtube regex"),
    ]
});

static VIMEO_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"vimeo\.com/(?:video/)?(\d+)").expect("valid vimeo regex"));

/// Embeddable reference to a hosted lesson video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "provider", content = "id", rename_all = "lowercase")]
pub enum VideoEmbed {
    Youtube(String),
    Vimeo(String),
    /// Any other absolute URL, played directly.
    Direct(String),
}

pub fn youtube_id(url: &str) -> Option<String> {
    YOUTUBE_PATTERNS
        .iter()
        .find_map(|re| re.captures(url))
        .map(|caps| caps[1].to_string())
}

pub fn vimeo_id(url: &str) -> Option<String> {
    VIMEO_PATTERN.captures(url).map(|caps| caps[1].to_string())
}

/// Resolves a lesson video URL into something a player can embed.
pub fn embed_for(url: &str) -> Option<VideoEmbed> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if let Some(id) = youtube_id(url) {
        return Some(VideoEmbed::Youtube(id));
    }
    if let Some(id) = vimeo_id(url) {
        return Some(VideoEmbed::Vimeo(id));
    }
    Url::parse(url).ok().map(|u| VideoEmbed::Direct(u.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn youtube_formats() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(youtube_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"), id);
        assert_eq!(youtube_id("https://youtu.be/dQw4w9WgXcQ"), id);
        assert_eq!(youtube_id("https://www.youtube.com/embed/dQw4w9WgXcQ"), id);
        assert_eq!(youtube_id("https://www.youtube.com/watch?list=x&v=dQw4w9WgXcQ"), id);
        assert_eq!(youtube_id("https://example.com/video.mp4"), None);
    }

    #[test]
    fn vimeo_formats() {
        assert_eq!(vimeo_id("https://vimeo.com/76979871").as_deref(), Some("76979871"));
        assert_eq!(vimeo_id("https://vimeo.com/video/76979871").as_deref(), Some("76979871"));
        assert_eq!(vimeo_id("https://vimeo.com/channels/x"), None);
    }

    #[test]
    fn embed_falls_back_to_direct_urls() {
        assert_eq!(
            embed_for("https://cdn.example.com/a.mp4"),
            Some(VideoEmbed::Direct("https://cdn.example.com/a.mp4".to_string()))
        );
        assert_eq!(embed_for("not a url"), None);
        assert_eq!(embed_for(""), None);
    }
}
