//! Video identifier normalization.
//!
//! Derives the platform video id from a user-supplied reference so that
//! different spellings of the same video (short link, watch page, shorts,
//! embed) map to one cache key. Stored records were keyed with these exact
//! rules, so any change here orphans existing cache entries.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::types::VideoId;

const SHORT_LINK_HOST: &str = "youtu.be";
const MAIN_DOMAIN: &str = "youtube.com";

static PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(shorts|embed|v)/([^/?#]+)").expect("Invalid video path regex")
});

static TOKEN_SCAN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:v=|/)([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)")
        .expect("Invalid video token regex")
});

/// Extract the normalized video id from a raw reference.
///
/// Returns `None` when no identifier can be derived.
pub fn extract_video_id(reference: &str) -> Option<VideoId> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    from_url(reference)
        .or_else(|| scan_for_token(reference))
        .map(VideoId)
}

fn from_url(reference: &str) -> Option<String> {
    let candidate: Cow<'_, str> = if reference.contains("://") {
        Cow::Borrowed(reference)
    } else {
        Cow::Owned(format!("https://{}", reference))
    };
    let parsed = Url::parse(&candidate).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    if host == SHORT_LINK_HOST {
        return parsed
            .path_segments()?
            .find(|segment| !segment.is_empty())
            .map(str::to_string);
    }

    if host.ends_with(MAIN_DOMAIN) {
        if parsed.path() == "/watch" {
            return parsed
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned())
                .filter(|value| !value.is_empty());
        }
        return PATH_PATTERN
            .captures(parsed.path())
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().to_string());
    }

    None
}

fn scan_for_token(reference: &str) -> Option<String> {
    TOKEN_SCAN
        .captures(reference)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(reference: &str) -> Option<String> {
        extract_video_id(reference).map(|v| v.0)
    }

    #[test]
    fn test_short_link() {
        assert_eq!(id("https://youtu.be/abc12345678").as_deref(), Some("abc12345678"));
        assert_eq!(
            id("https://youtu.be/abc12345678?si=tracking").as_deref(),
            Some("abc12345678")
        );
        assert_eq!(id("https://www.youtu.be//abc12345678").as_deref(), Some("abc12345678"));
    }

    #[test]
    fn test_watch_page() {
        assert_eq!(
            id("https://youtube.com/watch?v=abc12345678").as_deref(),
            Some("abc12345678")
        );
        assert_eq!(
            id("https://www.youtube.com/watch?feature=share&v=abc12345678&t=42").as_deref(),
            Some("abc12345678")
        );
        assert_eq!(
            id("https://m.youtube.com/watch?v=abc12345678").as_deref(),
            Some("abc12345678")
        );
    }

    #[test]
    fn test_host_is_case_insensitive() {
        assert_eq!(
            id("https://WWW.YouTube.COM/watch?v=abc12345678").as_deref(),
            Some("abc12345678")
        );
        assert_eq!(id("HTTPS://YOUTU.BE/abc12345678").as_deref(), Some("abc12345678"));
    }

    #[test]
    fn test_shorts_embed_and_v_paths() {
        assert_eq!(
            id("https://www.youtube.com/shorts/abc12345678").as_deref(),
            Some("abc12345678")
        );
        assert_eq!(
            id("https://www.youtube.com/embed/abc12345678?autoplay=1").as_deref(),
            Some("abc12345678")
        );
        assert_eq!(id("https://youtube.com/v/abc12345678").as_deref(), Some("abc12345678"));
    }

    #[test]
    fn test_reference_without_scheme() {
        assert_eq!(id("youtu.be/abc12345678").as_deref(), Some("abc12345678"));
        assert_eq!(
            id("www.youtube.com/watch?v=abc12345678").as_deref(),
            Some("abc12345678")
        );
    }

    #[test]
    fn test_path_ids_are_not_length_checked() {
        assert_eq!(id("https://youtu.be/short").as_deref(), Some("short"));
    }

    #[test]
    fn test_regex_fallback() {
        // Unknown host: no URL rule applies, the scan finds the token.
        assert_eq!(
            id("https://mirror.example.org/watch?v=abc12345678").as_deref(),
            Some("abc12345678")
        );
        // Watch page without a v parameter falls through to the scan.
        assert_eq!(
            id("https://youtube.com/watch?list=PL1&x=/abc12345678").as_deref(),
            Some("abc12345678")
        );
        // Unparseable input.
        assert_eq!(id("see v=abc12345678 please").as_deref(), Some("abc12345678"));
    }

    #[test]
    fn test_fallback_rejects_longer_tokens() {
        assert_eq!(id("https://example.org/abc123456789xyz"), None);
    }

    #[test]
    fn test_normalization_failure() {
        assert_eq!(id(""), None);
        assert_eq!(id("   "), None);
        assert_eq!(id("not a video reference"), None);
        assert_eq!(id("https://youtube.com/channel/"), None);
        assert_eq!(id("https://youtu.be/"), None);
    }
}
