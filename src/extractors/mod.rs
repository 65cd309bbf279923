//! Embed-page extractors and their registry.
//!
//! An extractor understands one hosting family's player page and digs the
//! actual media URLs out of it. The registry picks an extractor by substring
//! match between the embed URL's host and each extractor's domain list, first
//! registered wins, so registration order doubles as priority.

pub mod filemoon;
pub mod streamtape;
pub mod vidcloud;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::errors::ScraperError;
use crate::models::ExtractedLink;

pub use filemoon::FileMoonExtractor;
pub use streamtape::StreamTapeExtractor;
pub use vidcloud::VidCloudExtractor;

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Host fragments this extractor claims ("vidcloud" matches
    /// `vidcloud.example` as well as `www.vidcloud9.example`).
    fn supported_domains(&self) -> &[&'static str];

    /// Unpacks the embed page into playable links. An empty result means the
    /// page was understood but offered nothing; the caller decides whether
    /// that is fatal.
    async fn extract(&self, embed_url: &str) -> Result<Vec<ExtractedLink>, ScraperError>;
}

#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an extractor. Earlier registrations win when domain lists
    /// overlap, so register the more specific extractor first.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// First registered extractor whose domain list matches the URL host.
    #[must_use]
    pub fn find(&self, embed_url: &str) -> Option<Arc<dyn Extractor>> {
        let host = Url::parse(embed_url).ok()?.host_str()?.to_lowercase();

        self.extractors
            .iter()
            .find(|e| e.supported_domains().iter().any(|d| host.contains(d)))
            .cloned()
    }

    /// Resolves and runs the matching extractor.
    pub async fn extract(&self, embed_url: &str) -> Result<Vec<ExtractedLink>, ScraperError> {
        let extractor = self.find(embed_url).ok_or_else(|| {
            ScraperError::ExtractionFailed(format!("no extractor for URL: {embed_url}"))
        })?;

        tracing::debug!(extractor = extractor.name(), url = embed_url, "extracting embed");
        extractor.extract(embed_url).await
    }
}
