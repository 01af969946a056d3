//! YouTube URL helpers.

use regex::Regex;
use std::sync::LazyLock;

/// Id used when a URL carries no recognizable video id.
pub const UNKNOWN_VIDEO_ID: &str = "unknown";

// Matches the common YouTube URL shapes and bare 11-character video ids.
static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        (?:
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/|youtube\.com/shorts/)
            ([a-zA-Z0-9_-]{11})
        )
        |
        ^([a-zA-Z0-9_-]{11})$
    ",
    )
    .expect("Invalid regex")
});

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:(?:www\.|m\.)?youtube\.com/(?:watch\?(?:.*&)?v=|embed/|v/|shorts/)|youtu\.be/)[\w-]+",
    )
    .expect("Invalid regex")
});

/// Extract the video id from a YouTube URL or bare id.
///
/// Returns [`UNKNOWN_VIDEO_ID`] when none is found.
pub fn extract_video_id(input: &str) -> String {
    VIDEO_ID
        .captures(input.trim())
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_VIDEO_ID.to_string())
}

/// Whether `url` looks like a YouTube video URL.
pub fn is_youtube_url(url: &str) -> bool {
    YOUTUBE_URL.is_match(url.trim())
}

/// Turn a bare video id into a watch URL; other input is returned trimmed.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if !is_youtube_url(trimmed) && extract_video_id(trimmed) == trimmed {
        format!("https://www.youtube.com/watch?v={}", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), "dQw4w9WgXcQ");
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://youtube.com/watch?feature=share&v=dQw4w9WgXcQ"),
            "dQw4w9WgXcQ"
        );
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
    }

    #[test]
    fn test_extract_video_id_unknown() {
        assert_eq!(extract_video_id("https://example.com/video"), UNKNOWN_VIDEO_ID);
        assert_eq!(extract_video_id(""), UNKNOWN_VIDEO_ID);
    }

    #[test]
    fn test_is_youtube_url() {
        assert!(is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(is_youtube_url("http://youtu.be/dQw4w9WgXcQ"));
        assert!(is_youtube_url("https://youtube.com/shorts/dQw4w9WgXcQ"));
        assert!(!is_youtube_url("dQw4w9WgXcQ"));
        assert!(!is_youtube_url("https://vimeo.com/12345"));
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url(" dQw4w9WgXcQ "),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
        assert_eq!(
            normalize_url("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(normalize_url("/tmp/file"), "/tmp/file");
    }
}
