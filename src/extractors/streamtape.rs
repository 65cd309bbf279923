//! Extractor for StreamTape-family pages.
//!
//! The page assembles the real download URL in JavaScript by concatenating a
//! visible half with a second token trimmed via `.substring(n)`. Both halves
//! sit in the page source, so the same concatenation works offline.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::errors::ScraperError;
use crate::models::ExtractedLink;
use crate::net::{Endpoint, RequestEngine};

use super::Extractor;

const DOMAINS: [&str; 3] = ["streamtape", "strtape", "tapecontent"];

fn robotlink_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"document\.getElementById\('robotlink'\)\.innerHTML = '([^']*)' \+ \('([^']*)'\)\.substring\((\d+)\)",
        )
        .expect("Invalid regex")
    })
}

fn parse_video_url(page: &str) -> Result<String, ScraperError> {
    let caps = robotlink_regex().captures(page).ok_or_else(|| {
        ScraperError::ExtractionFailed("robotlink assembly not found".to_string())
    })?;

    let first = &caps[1];
    let second = &caps[2];
    let offset: usize = caps[3]
        .parse()
        .map_err(|_| ScraperError::ExtractionFailed("bad substring offset".to_string()))?;

    let tail = second.get(offset..).ok_or_else(|| {
        ScraperError::ExtractionFailed("substring offset past token end".to_string())
    })?;

    Ok(format!("https:{first}{tail}"))
}

pub struct StreamTapeExtractor {
    engine: RequestEngine,
}

impl StreamTapeExtractor {
    #[must_use]
    pub const fn new(engine: RequestEngine) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Extractor for StreamTapeExtractor {
    fn name(&self) -> &'static str {
        "streamtape"
    }

    fn supported_domains(&self) -> &[&'static str] {
        &DOMAINS
    }

    async fn extract(&self, embed_url: &str) -> Result<Vec<ExtractedLink>, ScraperError> {
        let page = self
            .engine
            .execute(&Endpoint::get(embed_url, "").with_header("Referer", embed_url))
            .await?;

        let url = parse_video_url(&page)?;

        Ok(vec![
            ExtractedLink::direct(url)
                .with_server("StreamTape")
                .with_referer(embed_url),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = concat!(
        "<script>",
        "document.getElementById('robotlink').innerHTML = ",
        "'//streamtape.example/get_video?id=abc&expires=173' + ",
        "('xcd4&token=secret').substring(4)",
        "</script>",
    );

    #[test]
    fn assembles_url_from_both_halves() {
        let url = parse_video_url(PAGE).unwrap();
        assert_eq!(
            url,
            "https://streamtape.example/get_video?id=abc&expires=173&token=secret"
        );
    }

    #[test]
    fn missing_robotlink_fails() {
        let err = parse_video_url("<html>nope</html>").unwrap_err();
        assert!(matches!(err, ScraperError::ExtractionFailed(_)));
    }

    #[test]
    fn offset_past_end_fails() {
        let page = concat!(
            "document.getElementById('robotlink').innerHTML = ",
            "'//x.example/v' + ('ab').substring(99)",
        );
        assert!(parse_video_url(page).is_err());
    }
}
