//! Metadata-backed provider over a TMDB-style JSON API.
//!
//! Browsing and detail data come from the typed API; playback goes through
//! configured embed hosts whose pages the extractor registry can unpack.

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::TmdbConfig;
use crate::errors::{NetworkError, ScraperError};
use crate::models::{Carousel, Content, ExtractedLink, MediaType, SearchPage};
use crate::net::{Endpoint, RequestEngine};

use super::Provider;
use super::normalize::{
    self, TmdbDetails, TmdbItem, TmdbPage, TmdbSeasonDetails, is_released, summarize,
};

const SUPPORTED: [MediaType; 2] = [MediaType::Movie, MediaType::Show];

pub struct TmdbProvider {
    engine: RequestEngine,
    base_url: String,
    image_base_url: String,
    api_key: String,
    embed_hosts: Vec<String>,
}

impl TmdbProvider {
    #[must_use]
    pub fn new(engine: RequestEngine, config: &TmdbConfig) -> Self {
        Self {
            engine,
            base_url: config.base_url.clone(),
            image_base_url: config.image_base_url.clone(),
            api_key: config.api_key.clone(),
            embed_hosts: config.embed_hosts.clone(),
        }
    }

    fn endpoint(&self, path: impl Into<String>) -> Endpoint {
        Endpoint::get(&self.base_url, path).with_query("api_key", &self.api_key)
    }

    fn ensure_configured(&self) -> Result<(), ScraperError> {
        if self.api_key.is_empty() {
            return Err(ScraperError::InvalidConfiguration(
                "tmdb api_key is not set".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_id(id: &str) -> Result<(), ScraperError> {
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ScraperError::InvalidContentId(id.to_string()));
        }
        Ok(())
    }

    const fn path_for(media_type: MediaType) -> &'static str {
        match media_type {
            MediaType::Movie => "movie",
            MediaType::Show | MediaType::Anime => "tv",
        }
    }

    fn scrape_error(err: NetworkError, subject: &str) -> ScraperError {
        match err {
            NetworkError::HttpStatus(404) => ScraperError::ContentNotFound(subject.to_string()),
            NetworkError::HttpStatus(429) => ScraperError::RateLimitExceeded,
            other => ScraperError::Network(other),
        }
    }

    async fn fetch_page(
        &self,
        path: &str,
        fallback: MediaType,
        title: &str,
    ) -> Result<Carousel, ScraperError> {
        let page: TmdbPage<TmdbItem> = self
            .engine
            .execute_json(&self.endpoint(path))
            .await
            .map_err(|e| Self::scrape_error(e, path))?;

        let items = page
            .results
            .iter()
            .filter(|item| {
                is_released(
                    item.release_date
                        .as_deref()
                        .or(item.first_air_date.as_deref()),
                )
            })
            .filter_map(|item| summarize(item, Some(fallback), &self.image_base_url))
            .collect();

        Ok(Carousel {
            title: title.to_string(),
            items,
        })
    }

    async fn fetch_season(&self, id: &str, number: u32) -> Option<TmdbSeasonDetails> {
        let endpoint = self.endpoint(format!("tv/{id}/season/{number}"));
        match self.engine.execute_json(&endpoint).await {
            Ok(season) => Some(season),
            Err(err) => {
                warn!(content_id = id, season = number, error = %err, "season fetch failed");
                None
            }
        }
    }

    fn host_label(host: &str) -> String {
        url::Url::parse(host)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
            .unwrap_or_else(|| host.to_string())
    }
}

#[async_trait]
impl Provider for TmdbProvider {
    fn name(&self) -> &'static str {
        "tmdb"
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn supported_types(&self) -> &[MediaType] {
        &SUPPORTED
    }

    async fn fetch_home(&self) -> Result<Vec<Carousel>, ScraperError> {
        self.ensure_configured()?;

        let (trending_movies, trending_shows, popular_movies) = futures::try_join!(
            self.fetch_page("trending/movie/week", MediaType::Movie, "Trending Movies"),
            self.fetch_page("trending/tv/week", MediaType::Show, "Trending Shows"),
            self.fetch_page("movie/popular", MediaType::Movie, "Popular Movies"),
        )?;

        Ok(vec![trending_movies, trending_shows, popular_movies])
    }

    async fn search(&self, query: &str, page: u32) -> Result<SearchPage, ScraperError> {
        self.ensure_configured()?;

        let endpoint = self
            .endpoint("search/multi")
            .with_query("query", query)
            .with_query("page", page.max(1).to_string())
            .with_query("include_adult", "false");

        let raw: TmdbPage<TmdbItem> = self
            .engine
            .execute_json(&endpoint)
            .await
            .map_err(|e| Self::scrape_error(e, query))?;

        let items = raw
            .results
            .iter()
            .filter(|item| {
                is_released(
                    item.release_date
                        .as_deref()
                        .or(item.first_air_date.as_deref()),
                )
            })
            .filter_map(|item| summarize(item, None, &self.image_base_url))
            .collect();

        Ok(SearchPage {
            items,
            page: raw.page,
            total_pages: raw.total_pages,
            total_results: raw.total_results,
        })
    }

    async fn fetch_details(
        &self,
        id: &str,
        media_type: MediaType,
    ) -> Result<Content, ScraperError> {
        self.ensure_configured()?;
        Self::validate_id(id)?;

        let kind = Self::path_for(media_type);
        let endpoint = self
            .endpoint(format!("{kind}/{id}"))
            .with_query("append_to_response", "credits,recommendations,videos");

        let raw: TmdbDetails = self
            .engine
            .execute_json(&endpoint)
            .await
            .map_err(|e| Self::scrape_error(e, id))?;

        let season_details = if media_type.is_episodic() {
            let numbers: Vec<u32> = raw
                .seasons
                .iter()
                .map(|s| s.season_number)
                .filter(|n| *n >= 1)
                .collect();
            debug!(content_id = id, seasons = numbers.len(), "fetching season details");

            join_all(numbers.into_iter().map(|n| self.fetch_season(id, n)))
                .await
                .into_iter()
                .flatten()
                .collect()
        } else {
            Vec::new()
        };

        Ok(normalize::normalize_details(
            raw,
            media_type,
            season_details,
            &self.image_base_url,
        ))
    }

    async fn streaming_links(
        &self,
        content_id: &str,
        media_type: MediaType,
        season: Option<&str>,
        episode: Option<&str>,
    ) -> Result<Vec<ExtractedLink>, ScraperError> {
        Self::validate_id(content_id)?;

        if self.embed_hosts.is_empty() {
            return Err(ScraperError::InvalidConfiguration(
                "no embed hosts configured".to_string(),
            ));
        }

        let path = if media_type.is_episodic() {
            let (Some(season), Some(episode)) = (season, episode) else {
                return Err(ScraperError::MissingEpisodeInfo);
            };
            if season.parse::<u32>().is_err() || episode.parse::<u32>().is_err() {
                return Err(ScraperError::InvalidContentId(format!(
                    "non-numeric episode reference: S{season}E{episode}"
                )));
            }
            format!("embed/tv/{content_id}/{season}/{episode}")
        } else {
            format!("embed/movie/{content_id}")
        };

        Ok(self
            .embed_hosts
            .iter()
            .map(|host| {
                ExtractedLink::embed(format!("{}/{path}", host.trim_end_matches('/')))
                    .with_server(Self::host_label(host))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;

    fn provider() -> TmdbProvider {
        let network = NetworkConfig::default();
        let client = reqwest::Client::new();
        TmdbProvider::new(
            RequestEngine::new(client, &network),
            &TmdbConfig {
                base_url: "https://api.example/3".to_string(),
                image_base_url: "https://img.example/w500".to_string(),
                api_key: "k".to_string(),
                embed_hosts: vec![
                    "https://vidsrc.example/".to_string(),
                    "https://embed.example".to_string(),
                ],
            },
        )
    }

    #[tokio::test]
    async fn movie_links_cover_every_embed_host() {
        let links = provider()
            .streaming_links("603", MediaType::Movie, None, None)
            .await
            .unwrap();

        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://vidsrc.example/embed/movie/603");
        assert_eq!(links[0].server.as_deref(), Some("vidsrc.example"));
        assert_eq!(links[1].url, "https://embed.example/embed/movie/603");
    }

    #[tokio::test]
    async fn episode_links_need_season_and_episode() {
        let err = provider()
            .streaming_links("1399", MediaType::Show, Some("1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::MissingEpisodeInfo));

        let links = provider()
            .streaming_links("1399", MediaType::Show, Some("1"), Some("5"))
            .await
            .unwrap();
        assert_eq!(links[0].url, "https://vidsrc.example/embed/tv/1399/1/5");
    }

    #[tokio::test]
    async fn rejects_non_numeric_ids() {
        let err = provider()
            .streaming_links("abc", MediaType::Movie, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ScraperError::InvalidContentId(_)));
    }

    #[test]
    fn host_label_strips_scheme_and_www() {
        assert_eq!(
            TmdbProvider::host_label("https://www.vidsrc.example/"),
            "vidsrc.example"
        );
    }
}
