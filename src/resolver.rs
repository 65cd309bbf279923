//! Streaming link resolution: content reference in, sorted playable links out.
//!
//! The resolver stitches the active provider and the extractor registry
//! together. Provider failures propagate untouched; individual embed
//! extraction failures are dropped so one dead host cannot sink an otherwise
//! healthy result, but an entirely empty outcome is an error.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::errors::ScraperError;
use crate::extractors::ExtractorRegistry;
use crate::models::{ExtractedLink, LinkKind, MediaType};
use crate::providers::ProviderRegistry;
use crate::quality;

pub struct LinkResolver {
    providers: Arc<ProviderRegistry>,
    extractors: Arc<ExtractorRegistry>,
}

impl LinkResolver {
    #[must_use]
    pub fn new(providers: Arc<ProviderRegistry>, extractors: Arc<ExtractorRegistry>) -> Self {
        Self {
            providers,
            extractors,
        }
    }

    /// Resolves a content reference to playable links, best quality first.
    pub async fn resolve(
        &self,
        content_id: &str,
        media_type: MediaType,
        season: Option<&str>,
        episode: Option<&str>,
    ) -> Result<Vec<ExtractedLink>, ScraperError> {
        if media_type.is_episodic() && (season.is_none() || episode.is_none()) {
            return Err(ScraperError::MissingEpisodeInfo);
        }

        let provider = self.providers.active().await;
        let links = provider
            .streaming_links(content_id, media_type, season, episode)
            .await?;

        if links.is_empty() {
            return Err(ScraperError::ContentNotFound(
                "no streaming links found".to_string(),
            ));
        }

        debug!(
            provider = provider.name(),
            content_id,
            candidates = links.len(),
            "expanding candidate links"
        );

        let mut resolved = Vec::new();
        for expansion in join_all(links.into_iter().map(|link| self.expand(link))).await {
            resolved.extend(expansion);
        }

        if resolved.is_empty() {
            return Err(ScraperError::ExtractionFailed(
                "all candidate links failed extraction".to_string(),
            ));
        }

        quality::sort_links_by_quality(&mut resolved);
        Ok(resolved)
    }

    /// Embeds are swapped for whatever their extractor finds. Failures reduce
    /// to an empty expansion; the caller judges the aggregate.
    async fn expand(&self, link: ExtractedLink) -> Vec<ExtractedLink> {
        if link.kind != LinkKind::Embed {
            return vec![link];
        }

        match self.extractors.extract(&link.url).await {
            Ok(links) => links,
            Err(err) => {
                warn!(url = %link.url, error = %err, "dropping embed after failed extraction");
                Vec::new()
            }
        }
    }
}
