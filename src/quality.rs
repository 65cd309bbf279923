//! Quality label parsing and ordering for resolved links.
//!
//! Providers and extractors surface free-form labels ("1080p", "4K", "HD",
//! "Auto"). Ranking maps them onto vertical resolution so link lists can be
//! sorted best-first; labels that carry no recognizable resolution rank below
//! everything else.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::ExtractedLink;

fn resolution_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d{3,4})\s*[pP]").expect("Invalid regex"))
}

/// Maps a quality label onto a comparable rank (vertical resolution).
#[must_use]
pub fn label_rank(label: &str) -> Option<u16> {
    let lower = label.to_lowercase();

    if lower.contains("2160") || lower.contains("4k") || lower.contains("uhd") {
        return Some(2160);
    }
    if lower.contains("1440") || lower.contains("2k") {
        return Some(1440);
    }
    if lower.contains("1080") || lower.contains("fhd") {
        return Some(1080);
    }
    if lower.contains("720") {
        return Some(720);
    }
    if lower.contains("480") {
        return Some(480);
    }
    if lower.contains("360") {
        return Some(360);
    }

    if let Some(caps) = resolution_regex().captures(&lower)
        && let Ok(height) = caps[1].parse::<u16>()
    {
        return Some(height);
    }

    // Bare "hd" only after the explicit resolutions above failed, so
    // "fhd"/"uhd" never land here.
    if lower.contains("hd") {
        return Some(720);
    }
    if lower.contains("sd") {
        return Some(480);
    }

    None
}

#[must_use]
pub fn link_rank(link: &ExtractedLink) -> Option<u16> {
    link.quality.as_deref().and_then(label_rank)
}

/// Sorts links best quality first. Unknown labels sink to the end; ties keep
/// their existing relative order.
pub fn sort_links_by_quality(links: &mut [ExtractedLink]) {
    links.sort_by(|a, b| match (link_rank(a), link_rank(b)) {
        (Some(ra), Some(rb)) => rb.cmp(&ra),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_common_labels() {
        assert_eq!(label_rank("1080p"), Some(1080));
        assert_eq!(label_rank("4K"), Some(2160));
        assert_eq!(label_rank("UHD 2160p"), Some(2160));
        assert_eq!(label_rank("720P"), Some(720));
        assert_eq!(label_rank("HD"), Some(720));
        assert_eq!(label_rank("FHD"), Some(1080));
        assert_eq!(label_rank("540p"), Some(540));
    }

    #[test]
    fn test_rank_unknown_labels() {
        assert_eq!(label_rank("Auto"), None);
        assert_eq!(label_rank("Server 2"), None);
        assert_eq!(label_rank(""), None);
    }

    #[test]
    fn test_sort_best_first_unknown_last() {
        let mut links = vec![
            ExtractedLink::direct("a").with_quality("720p"),
            ExtractedLink::direct("b").with_quality("Auto"),
            ExtractedLink::direct("c").with_quality("1080p"),
            ExtractedLink::direct("d"),
            ExtractedLink::direct("e").with_quality("4K"),
        ];

        sort_links_by_quality(&mut links);

        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["e", "c", "a", "b", "d"]);
    }

    #[test]
    fn test_sort_is_stable_within_ties() {
        let mut links = vec![
            ExtractedLink::direct("first").with_quality("1080p"),
            ExtractedLink::direct("second").with_quality("1080p"),
            ExtractedLink::direct("third").with_quality("1080"),
        ];

        sort_links_by_quality(&mut links);

        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(urls, vec!["first", "second", "third"]);
    }
}
