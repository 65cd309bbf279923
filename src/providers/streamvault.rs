//! Scrape-based provider for the StreamVault site.
//!
//! Pages are treated as opaque text and parsed with anchored regexes; if the
//! anchors disappear wholesale the site layout changed and callers get
//! [`ScraperError::SourceChanged`] rather than silently empty data.
//!
//! StreamVault has no browsable front page worth surfacing, so it keeps the
//! default empty `fetch_home`.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::config::StreamVaultConfig;
use crate::errors::{NetworkError, ScraperError};
use crate::models::{
    Content, ContentSummary, Episode, ExtractedLink, MediaType, SearchPage, Season,
};
use crate::net::{Endpoint, RequestEngine};

use super::Provider;

const SUPPORTED: [MediaType; 2] = [MediaType::Movie, MediaType::Show];

/// Consolidates regexes for page parsing to avoid per-call overhead.
struct SvRegex {
    search_item: Regex,
    total_pages: Regex,
    title: Regex,
    overview: Regex,
    poster: Regex,
    kind: Regex,
    released: Regex,
    rating: Regex,
    genre: Regex,
    episode: Regex,
    server: Regex,
}

impl SvRegex {
    fn get() -> Option<&'static Self> {
        static INSTANCE: OnceLock<Option<SvRegex>> = OnceLock::new();
        INSTANCE
            .get_or_init(|| {
                Some(Self {
                    search_item: Regex::new(
                        r#"(?s)<div class="flw-item">.*?<img[^>]*data-src="([^"]*)".*?<a href="/watch/([^"]+)"[^>]*title="([^"]+)".*?<span class="fdi-type">([^<]+)</span>"#,
                    )
                    .ok()?,
                    total_pages: Regex::new(r#"data-total-pages="(\d+)""#).ok()?,
                    title: Regex::new(r#"<h2 class="heading-name">([^<]+)</h2>"#).ok()?,
                    overview: Regex::new(r#"(?s)<div class="description">(.*?)</div>"#).ok()?,
                    poster: Regex::new(r#"<img class="film-poster-img"[^>]*src="([^"]+)""#)
                        .ok()?,
                    kind: Regex::new(r#"<span class="item-type">([^<]+)</span>"#).ok()?,
                    released: Regex::new(r#"<span class="item-released">Released: ([^<]+)</span>"#)
                        .ok()?,
                    rating: Regex::new(r#"<span class="item-rating">([\d.]+)</span>"#).ok()?,
                    genre: Regex::new(r#"<a class="genre-link"[^>]*>([^<]+)</a>"#).ok()?,
                    episode: Regex::new(
                        r#"<a class="ep-item" data-season="(\d+)" data-episode="(\d+)" data-id="([^"]+)" title="([^"]*)""#,
                    )
                    .ok()?,
                    server: Regex::new(
                        r#"<div class="server-item" data-server="([^"]+)" data-embed="([^"]+)""#,
                    )
                    .ok()?,
                })
            })
            .as_ref()
    }
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text.trim()).to_string()
}

fn parse_media_kind(label: &str) -> MediaType {
    if label.trim().eq_ignore_ascii_case("movie") {
        MediaType::Movie
    } else {
        MediaType::Show
    }
}

fn parse_search_page(html: &str, page: u32) -> Result<SearchPage, ScraperError> {
    let re = SvRegex::get().ok_or(ScraperError::SourceChanged)?;

    let items: Vec<ContentSummary> = re
        .search_item
        .captures_iter(html)
        .map(|c| ContentSummary {
            id: c[2].to_string(),
            media_type: parse_media_kind(&c[4]),
            title: decode(&c[3]),
            poster: (!c[1].is_empty()).then(|| c[1].to_string()),
            release_date: None,
            rating: None,
        })
        .collect();

    if items.is_empty() && !html.contains("film_list") {
        // Not even the empty results container is present.
        return Err(ScraperError::SourceChanged);
    }

    let total_pages = re
        .total_pages
        .captures(html)
        .and_then(|c| c[1].parse().ok())
        .unwrap_or(1);

    let total_results = u32::try_from(items.len()).unwrap_or(u32::MAX);
    Ok(SearchPage {
        items,
        page,
        total_pages,
        total_results,
    })
}

struct EpisodeRef {
    season: u32,
    episode: u32,
    target_id: String,
    title: String,
}

fn parse_episode_refs(html: &str) -> Vec<EpisodeRef> {
    let Some(re) = SvRegex::get() else {
        return Vec::new();
    };
    re.episode
        .captures_iter(html)
        .filter_map(|c| {
            Some(EpisodeRef {
                season: c[1].parse().ok()?,
                episode: c[2].parse().ok()?,
                target_id: c[3].to_string(),
                title: decode(&c[4]),
            })
        })
        .collect()
}

fn parse_details(html: &str, id: &str) -> Result<Content, ScraperError> {
    let re = SvRegex::get().ok_or(ScraperError::SourceChanged)?;

    let title = re
        .title
        .captures(html)
        .map(|c| decode(&c[1]))
        .ok_or(ScraperError::SourceChanged)?;

    let media_type = re
        .kind
        .captures(html)
        .map_or(MediaType::Movie, |c| parse_media_kind(&c[1]));

    let mut seasons: Vec<Season> = Vec::new();
    for ep in parse_episode_refs(html) {
        if !seasons.iter().any(|s| s.number == ep.season) {
            seasons.push(Season {
                number: ep.season,
                name: None,
                episode_count: 0,
                episodes: Vec::new(),
            });
        }
        if let Some(season) = seasons.iter_mut().find(|s| s.number == ep.season) {
            season.episodes.push(Episode {
                number: ep.episode,
                title: (!ep.title.is_empty()).then_some(ep.title),
                overview: None,
                air_date: None,
                still: None,
                runtime_minutes: None,
            });
            season.episode_count = u32::try_from(season.episodes.len()).unwrap_or(0);
        }
    }

    Ok(Content {
        id: id.to_string(),
        media_type,
        title,
        overview: re.overview.captures(html).map(|c| decode(&c[1])),
        poster: re.poster.captures(html).map(|c| c[1].to_string()),
        backdrop: None,
        release_date: re.released.captures(html).map(|c| c[1].trim().to_string()),
        rating: re.rating.captures(html).and_then(|c| c[1].parse().ok()),
        genres: re.genre.captures_iter(html).map(|c| decode(&c[1])).collect(),
        cast: Vec::new(),
        recommendations: Vec::new(),
        trailer: None,
        seasons,
    })
}

fn parse_servers(html: &str, referer: &str) -> Vec<ExtractedLink> {
    let Some(re) = SvRegex::get() else {
        return Vec::new();
    };
    re.server
        .captures_iter(html)
        .map(|c| {
            ExtractedLink::embed(c[2].to_string())
                .with_server(decode(&c[1]))
                .with_referer(referer)
        })
        .collect()
}

pub struct StreamVaultProvider {
    engine: RequestEngine,
    base_url: String,
}

impl StreamVaultProvider {
    #[must_use]
    pub fn new(engine: RequestEngine, config: &StreamVaultConfig) -> Self {
        Self {
            engine,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn validate_id(id: &str) -> Result<(), ScraperError> {
        let ok = !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.');
        if ok {
            Ok(())
        } else {
            Err(ScraperError::InvalidContentId(id.to_string()))
        }
    }

    fn scrape_error(err: NetworkError, subject: &str) -> ScraperError {
        match err {
            NetworkError::HttpStatus(404) => ScraperError::ContentNotFound(subject.to_string()),
            NetworkError::HttpStatus(429) => ScraperError::RateLimitExceeded,
            other => ScraperError::Network(other),
        }
    }

    async fn fetch_watch_page(&self, id: &str) -> Result<String, ScraperError> {
        self.engine
            .execute(&Endpoint::get(&self.base_url, format!("watch/{id}")))
            .await
            .map_err(|e| Self::scrape_error(e, id))
    }

    async fn fetch_servers(&self, target_id: &str, referer: &str) -> Result<Vec<ExtractedLink>, ScraperError> {
        let html = self
            .engine
            .execute(&Endpoint::get(
                &self.base_url,
                format!("ajax/servers/{target_id}"),
            ))
            .await
            .map_err(|e| Self::scrape_error(e, target_id))?;

        Ok(parse_servers(&html, referer))
    }
}

#[async_trait]
impl Provider for StreamVaultProvider {
    fn name(&self) -> &'static str {
        "streamvault"
    }

    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn supported_types(&self) -> &[MediaType] {
        &SUPPORTED
    }

    async fn search(&self, query: &str, page: u32) -> Result<SearchPage, ScraperError> {
        let page = page.max(1);
        let endpoint = Endpoint::get(&self.base_url, "search")
            .with_query("keyword", query)
            .with_query("page", page.to_string());

        let html = self
            .engine
            .execute(&endpoint)
            .await
            .map_err(|e| Self::scrape_error(e, query))?;

        parse_search_page(&html, page)
    }

    async fn fetch_details(
        &self,
        id: &str,
        _media_type: MediaType,
    ) -> Result<Content, ScraperError> {
        Self::validate_id(id)?;
        let html = self.fetch_watch_page(id).await?;
        parse_details(&html, id)
    }

    async fn streaming_links(
        &self,
        content_id: &str,
        media_type: MediaType,
        season: Option<&str>,
        episode: Option<&str>,
    ) -> Result<Vec<ExtractedLink>, ScraperError> {
        Self::validate_id(content_id)?;
        let referer = format!("{}/watch/{content_id}", self.base_url);

        if !media_type.is_episodic() {
            return self.fetch_servers(content_id, &referer).await;
        }

        let (Some(season), Some(episode)) = (season, episode) else {
            return Err(ScraperError::MissingEpisodeInfo);
        };

        let html = self.fetch_watch_page(content_id).await?;
        let target = parse_episode_refs(&html)
            .into_iter()
            .find(|ep| ep.season.to_string() == season && ep.episode.to_string() == episode)
            .ok_or_else(|| {
                ScraperError::ContentNotFound(format!("{content_id} S{season}E{episode}"))
            })?;

        self.fetch_servers(&target.target_id, &referer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_HTML: &str = r#"
        <div class="film_list" data-total-pages="3">
          <div class="flw-item">
            <div class="film-poster">
              <img data-src="https://img.sv.example/matrix.jpg" class="film-poster-img">
            </div>
            <a href="/watch/movie-the-matrix-603" class="film-poster-ahref" title="The Matrix"></a>
            <span class="fdi-type">Movie</span>
          </div>
          <div class="flw-item">
            <div class="film-poster">
              <img data-src="" class="film-poster-img">
            </div>
            <a href="/watch/tv-breaking-point-1399" class="film-poster-ahref" title="Breaking &amp; Entering"></a>
            <span class="fdi-type">TV</span>
          </div>
        </div>
    "#;

    const DETAIL_HTML: &str = r#"
        <h2 class="heading-name">The Long Voyage</h2>
        <span class="item-type">TV</span>
        <span class="item-released">Released: 2019-06-14</span>
        <span class="item-rating">7.9</span>
        <a class="genre-link" href="/genre/drama">Drama</a>
        <a class="genre-link" href="/genre/scifi">Sci-Fi</a>
        <div class="description">A crew drifts between stars.</div>
        <img class="film-poster-img" src="https://img.sv.example/voyage.jpg">
        <a class="ep-item" data-season="1" data-episode="1" data-id="ep-9001" title="Departure"></a>
        <a class="ep-item" data-season="1" data-episode="2" data-id="ep-9002" title="Adrift"></a>
        <a class="ep-item" data-season="2" data-episode="1" data-id="ep-9101" title=""></a>
    "#;

    const SERVERS_HTML: &str = r#"
        <div class="server-item" data-server="VidCloud" data-embed="https://vidcloud.example/e/abc123"></div>
        <div class="server-item" data-server="StreamTape" data-embed="https://streamtape.example/e/xyz789"></div>
    "#;

    #[test]
    fn parses_search_items_and_paging() {
        let page = parse_search_page(SEARCH_HTML, 1).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.total_pages, 3);

        assert_eq!(page.items[0].id, "movie-the-matrix-603");
        assert_eq!(page.items[0].media_type, MediaType::Movie);
        assert_eq!(page.items[0].title, "The Matrix");

        assert_eq!(page.items[1].media_type, MediaType::Show);
        assert_eq!(page.items[1].title, "Breaking & Entering");
        assert!(page.items[1].poster.is_none());
    }

    #[test]
    fn empty_results_with_container_is_not_an_error() {
        let page = parse_search_page(r#"<div class="film_list"></div>"#, 1).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn missing_container_means_layout_changed() {
        let err = parse_search_page("<html><body>maintenance</body></html>", 1).unwrap_err();
        assert!(matches!(err, ScraperError::SourceChanged));
    }

    #[test]
    fn parses_detail_page_with_seasons() {
        let content = parse_details(DETAIL_HTML, "tv-the-long-voyage-77").unwrap();
        assert_eq!(content.title, "The Long Voyage");
        assert_eq!(content.media_type, MediaType::Show);
        assert_eq!(content.release_date.as_deref(), Some("2019-06-14"));
        assert_eq!(content.genres, vec!["Drama", "Sci-Fi"]);

        assert_eq!(content.seasons.len(), 2);
        assert_eq!(content.seasons[0].episodes.len(), 2);
        assert_eq!(content.seasons[0].episodes[1].title.as_deref(), Some("Adrift"));
        assert_eq!(content.seasons[1].episodes.len(), 1);
        assert!(content.seasons[1].episodes[0].title.is_none());
    }

    #[test]
    fn detail_without_heading_is_source_change() {
        let err = parse_details("<html></html>", "x").unwrap_err();
        assert!(matches!(err, ScraperError::SourceChanged));
    }

    #[test]
    fn parses_server_list_into_embeds() {
        let links = parse_servers(SERVERS_HTML, "https://streamvault.app/watch/x");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].server.as_deref(), Some("VidCloud"));
        assert_eq!(links[0].url, "https://vidcloud.example/e/abc123");
        assert!(links[0].requires_referer);
        assert_eq!(links[1].server.as_deref(), Some("StreamTape"));
    }

    #[test]
    fn id_validation_blocks_path_injection() {
        assert!(StreamVaultProvider::validate_id("movie-the-matrix-603").is_ok());
        assert!(StreamVaultProvider::validate_id("../../etc/passwd").is_err());
        assert!(StreamVaultProvider::validate_id("").is_err());
    }
}
