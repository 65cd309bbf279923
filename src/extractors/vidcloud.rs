//! Extractor for VidCloud-family player pages.
//!
//! The player config sits inline in the page as a `sources: [...]` array with
//! an optional `tracks: [...]` array for subtitles. Both parse as plain JSON
//! once cut out of the surrounding script.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use crate::errors::ScraperError;
use crate::models::{ExtractedLink, LinkKind, Subtitle};
use crate::net::{Endpoint, RequestEngine};

use super::Extractor;

const DOMAINS: [&str; 3] = ["vidcloud", "rabbitstream", "megacloud"];

fn sources_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"sources\s*[:=]\s*(\[[^\]]*\])").expect("Invalid regex"))
}

fn tracks_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"tracks\s*[:=]\s*(\[[^\]]*\])").expect("Invalid regex"))
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    file: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    file: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

fn kind_of(entry: &SourceEntry) -> LinkKind {
    match entry.kind.as_deref() {
        Some("hls") => LinkKind::Hls,
        Some("dash") => LinkKind::Dash,
        Some(_) => LinkKind::Direct,
        None if entry.file.contains(".m3u8") => LinkKind::Hls,
        None if entry.file.contains(".mpd") => LinkKind::Dash,
        None => LinkKind::Direct,
    }
}

fn parse_subtitles(page: &str) -> Vec<Subtitle> {
    let Some(caps) = tracks_regex().captures(page) else {
        return Vec::new();
    };
    let Ok(tracks) = serde_json::from_str::<Vec<TrackEntry>>(&caps[1]) else {
        return Vec::new();
    };

    tracks
        .into_iter()
        .filter(|t| t.kind.as_deref().is_none_or(|k| k == "captions"))
        .map(|t| Subtitle {
            url: t.file,
            language: t.label.clone().unwrap_or_else(|| "Unknown".to_string()),
            label: t.label,
        })
        .collect()
}

fn parse_player_page(page: &str, embed_url: &str) -> Result<Vec<ExtractedLink>, ScraperError> {
    let caps = sources_regex().captures(page).ok_or_else(|| {
        ScraperError::ExtractionFailed("no sources found in player page".to_string())
    })?;

    let sources: Vec<SourceEntry> = serde_json::from_str(&caps[1])
        .map_err(|e| ScraperError::ExtractionFailed(format!("sources blob is not JSON: {e}")))?;

    let subtitles = parse_subtitles(page);

    Ok(sources
        .into_iter()
        .map(|entry| {
            let kind = kind_of(&entry);
            let mut link = ExtractedLink::new(entry.file, kind)
                .with_server("VidCloud")
                .with_referer(embed_url)
                .with_subtitles(subtitles.clone());
            if let Some(label) = entry.label {
                link = link.with_quality(label);
            }
            link
        })
        .collect())
}

pub struct VidCloudExtractor {
    engine: RequestEngine,
}

impl VidCloudExtractor {
    #[must_use]
    pub const fn new(engine: RequestEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Extractor for VidCloudExtractor {
    fn name(&self) -> &'static str {
        "vidcloud"
    }

    fn supported_domains(&self) -> &[&'static str] {
        &DOMAINS
    }

    async fn extract(&self, embed_url: &str) -> Result<Vec<ExtractedLink>, ScraperError> {
        let page = self
            .engine
            .execute(&Endpoint::get(embed_url, "").with_header("Referer", embed_url))
            .await?;

        parse_player_page(&page, embed_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYER_PAGE: &str = r#"
        <script>
        var player = new Playerjs({
            sources: [
                {"file": "https://cdn.vc.example/hls/1080/master.m3u8", "label": "1080p", "type": "hls"},
                {"file": "https://cdn.vc.example/hls/720/master.m3u8", "label": "720p", "type": "hls"},
                {"file": "https://cdn.vc.example/dl/movie.mp4", "label": "480p"}
            ],
            tracks: [
                {"file": "https://cdn.vc.example/subs/en.vtt", "label": "English", "kind": "captions"},
                {"file": "https://cdn.vc.example/thumbs.vtt", "kind": "thumbnails"}
            ]
        });
        </script>
    "#;

    #[test]
    fn parses_sources_with_labels_and_kinds() {
        let links =
            parse_player_page(PLAYER_PAGE, "https://vidcloud.example/e/abc").unwrap();
        assert_eq!(links.len(), 3);

        assert_eq!(links[0].kind, LinkKind::Hls);
        assert_eq!(links[0].quality.as_deref(), Some("1080p"));
        assert_eq!(links[0].server.as_deref(), Some("VidCloud"));
        assert!(links[0].requires_referer);

        assert_eq!(links[2].kind, LinkKind::Direct);
        assert_eq!(links[2].url, "https://cdn.vc.example/dl/movie.mp4");
    }

    #[test]
    fn keeps_caption_tracks_only() {
        let links =
            parse_player_page(PLAYER_PAGE, "https://vidcloud.example/e/abc").unwrap();
        assert_eq!(links[0].subtitles.len(), 1);
        assert_eq!(links[0].subtitles[0].language, "English");
    }

    #[test]
    fn page_without_sources_fails_extraction() {
        let err = parse_player_page("<html>nothing here</html>", "https://x.example")
            .unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
    }

    #[test]
    fn malformed_sources_blob_fails_extraction() {
        let err = parse_player_page(r"sources: [{broken}]", "https://x.example").unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
    }

    #[test]
    fn m3u8_extension_implies_hls_without_type() {
        let page = r#"sources: [{"file": "https://cdn.example/a.m3u8"}]"#;
        let links = parse_player_page(page, "https://vidcloud.example/e/a").unwrap();
        assert_eq!(links[0].kind, LinkKind::Hls);
    }
}
