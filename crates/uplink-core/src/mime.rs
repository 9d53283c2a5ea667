//! MIME type matching
//!
//! The upload allow-list supports exact types (`video/mp4`) and family
//! wildcards (`video/*`). Wildcards are parsed once into an explicit variant
//! instead of being re-interpreted per comparison.

/// One entry of a content-type allow-list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MimePattern {
    /// Matches the full type exactly (case-insensitive)
    Exact(String),
    /// Matches any type starting with the stored prefix, e.g. `video/`
    Prefix(String),
}

impl MimePattern {
    /// Parse a single allow-list entry. `video/*` becomes a prefix match on
    /// `video/`; anything else is an exact match.
    pub fn parse(pattern: &str) -> Self {
        let pattern = pattern.trim().to_lowercase();
        match pattern.strip_suffix("/*") {
            Some(family) => MimePattern::Prefix(format!("{}/", family)),
            None => MimePattern::Exact(pattern),
        }
    }

    pub fn matches(&self, content_type: &str) -> bool {
        let content_type = content_type.trim().to_lowercase();
        match self {
            MimePattern::Exact(ty) => content_type == *ty,
            MimePattern::Prefix(prefix) => content_type.starts_with(prefix.as_str()),
        }
    }
}

/// Check a content type against an allow-list. An empty list allows everything.
pub fn mime_allowed(content_type: &str, patterns: &[MimePattern]) -> bool {
    if patterns.is_empty() {
        return true;
    }
    patterns.iter().any(|p| p.matches(content_type))
}

/// Whether a detected type goes through the media pipeline (faststart + probe).
pub fn is_multimedia(content_type: &str) -> bool {
    let content_type = content_type.to_lowercase();
    content_type.starts_with("video/") || content_type.starts_with("audio/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wildcard_becomes_prefix() {
        assert_eq!(
            MimePattern::parse("video/*"),
            MimePattern::Prefix("video/".to_string())
        );
        assert_eq!(
            MimePattern::parse("VIDEO/MP4"),
            MimePattern::Exact("video/mp4".to_string())
        );
    }

    #[test]
    fn test_exact_match() {
        let p = MimePattern::parse("video/mp4");
        assert!(p.matches("video/mp4"));
        assert!(p.matches("Video/MP4"));
        assert!(!p.matches("video/mp4v-es"));
        assert!(!p.matches("audio/mp4"));
    }

    #[test]
    fn test_prefix_match() {
        let p = MimePattern::parse("video/*");
        assert!(p.matches("video/mp4"));
        assert!(p.matches("video/quicktime"));
        assert!(!p.matches("audio/mpeg"));
        // A bare "video" without the slash is not part of the family
        assert!(!p.matches("video"));
    }

    #[test]
    fn test_empty_allow_list_allows_everything() {
        assert!(mime_allowed("application/x-whatever", &[]));
    }

    #[test]
    fn test_allow_list_any_pattern_suffices() {
        let patterns = vec![MimePattern::parse("image/png"), MimePattern::parse("video/*")];
        assert!(mime_allowed("video/webm", &patterns));
        assert!(mime_allowed("image/png", &patterns));
        assert!(!mime_allowed("image/jpeg", &patterns));
    }

    #[test]
    fn test_is_multimedia() {
        assert!(is_multimedia("video/mp4"));
        assert!(is_multimedia("audio/x-m4a"));
        assert!(!is_multimedia("image/png"));
        assert!(!is_multimedia("application/octet-stream"));
    }
}
