//! Normalization from the metadata API's wire shapes into canonical models.
//!
//! The wire DTOs accept both snake_case and camelCase spellings via serde
//! aliases, so upstream field-style drift does not break decoding.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::models::{
    CastMember, Content, ContentSummary, Episode, MediaType, Season, Trailer,
};

/// Cast list is capped to the top-billed entries.
pub const MAX_CAST: usize = 10;
/// Recommendations stay shallow; callers fetch details on demand.
pub const MAX_RECOMMENDATIONS: usize = 12;

#[derive(Debug, Deserialize)]
pub struct TmdbPage<T> {
    #[serde(default)]
    pub page: u32,
    pub results: Vec<T>,
    #[serde(default, alias = "totalPages")]
    pub total_pages: u32,
    #[serde(default, alias = "totalResults")]
    pub total_results: u32,
}

#[derive(Debug, Deserialize)]
pub struct TmdbItem {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "mediaType")]
    pub media_type: Option<String>,
    #[serde(default, alias = "posterPath")]
    pub poster_path: Option<String>,
    #[serde(default, alias = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(default, alias = "firstAirDate")]
    pub first_air_date: Option<String>,
    #[serde(default, alias = "voteAverage")]
    pub vote_average: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbDetails {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default, alias = "posterPath")]
    pub poster_path: Option<String>,
    #[serde(default, alias = "backdropPath")]
    pub backdrop_path: Option<String>,
    #[serde(default, alias = "releaseDate")]
    pub release_date: Option<String>,
    #[serde(default, alias = "firstAirDate")]
    pub first_air_date: Option<String>,
    #[serde(default, alias = "voteAverage")]
    pub vote_average: Option<f32>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    #[serde(default)]
    pub seasons: Vec<TmdbSeasonStub>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
    #[serde(default)]
    pub recommendations: Option<TmdbPage<TmdbItem>>,
    #[serde(default)]
    pub videos: Option<TmdbVideos>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbGenre {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TmdbSeasonStub {
    #[serde(alias = "seasonNumber")]
    pub season_number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "episodeCount")]
    pub episode_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct TmdbSeasonDetails {
    #[serde(alias = "seasonNumber")]
    pub season_number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub episodes: Vec<TmdbEpisode>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbEpisode {
    #[serde(alias = "episodeNumber")]
    pub episode_number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default, alias = "airDate")]
    pub air_date: Option<String>,
    #[serde(default, alias = "stillPath")]
    pub still_path: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbCastMember {
    pub name: String,
    #[serde(default)]
    pub character: Option<String>,
    #[serde(default, alias = "profilePath")]
    pub profile_path: Option<String>,
    #[serde(default)]
    pub order: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbVideos {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Deserialize)]
pub struct TmdbVideo {
    #[serde(default)]
    pub name: Option<String>,
    pub key: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

/// Whether a dated item is already out.
///
/// Fails closed: a missing or unparsable date counts as unreleased, so
/// placeholder entries never surface in trending or search.
#[must_use]
pub fn is_released(date: Option<&str>) -> bool {
    let Some(date) = date else {
        return false;
    };
    let Ok(parsed) = NaiveDate::parse_from_str(date, "%Y-%m-%d") else {
        return false;
    };
    parsed <= Utc::now().date_naive()
}

#[must_use]
pub fn image_url(base: &str, path: Option<&str>) -> Option<String> {
    path.map(|p| format!("{}{p}", base.trim_end_matches('/')))
}

fn media_type_of(item: &TmdbItem, fallback: Option<MediaType>) -> Option<MediaType> {
    match item.media_type.as_deref() {
        Some("movie") => Some(MediaType::Movie),
        Some("tv") => Some(MediaType::Show),
        // "person" and anything else unknown is skipped, not guessed.
        Some(_) => None,
        None => fallback,
    }
}

/// Maps a list item into a summary, or None when the entry is not a
/// supported media type.
#[must_use]
pub fn summarize(
    item: &TmdbItem,
    fallback: Option<MediaType>,
    image_base: &str,
) -> Option<ContentSummary> {
    let media_type = media_type_of(item, fallback)?;
    let title = item.title.clone().or_else(|| item.name.clone())?;

    Some(ContentSummary {
        id: item.id.to_string(),
        media_type,
        title,
        poster: image_url(image_base, item.poster_path.as_deref()),
        release_date: item
            .release_date
            .clone()
            .or_else(|| item.first_air_date.clone()),
        rating: item.vote_average,
    })
}

fn first_trailer(videos: Option<&TmdbVideos>) -> Option<Trailer> {
    videos?
        .results
        .iter()
        .find(|v| {
            v.kind.as_deref() == Some("Trailer") && v.site.as_deref() == Some("YouTube")
        })
        .map(|v| Trailer {
            name: v.name.clone(),
            url: format!("https://www.youtube.com/watch?v={}", v.key),
        })
}

/// Maps a full detail payload (plus separately fetched season details) into
/// the canonical [`Content`].
#[must_use]
pub fn normalize_details(
    raw: TmdbDetails,
    media_type: MediaType,
    season_details: Vec<TmdbSeasonDetails>,
    image_base: &str,
) -> Content {
    let mut cast: Vec<&TmdbCastMember> = raw
        .credits
        .as_ref()
        .map(|c| c.cast.iter().collect())
        .unwrap_or_default();
    cast.sort_by_key(|m| m.order.unwrap_or(u32::MAX));

    let cast: Vec<CastMember> = cast
        .into_iter()
        .take(MAX_CAST)
        .map(|m| CastMember {
            name: m.name.clone(),
            character: m.character.clone(),
            profile: image_url(image_base, m.profile_path.as_deref()),
        })
        .collect();

    let recommendations: Vec<ContentSummary> = raw
        .recommendations
        .as_ref()
        .map(|page| {
            page.results
                .iter()
                .filter_map(|item| summarize(item, Some(media_type), image_base))
                .take(MAX_RECOMMENDATIONS)
                .collect()
        })
        .unwrap_or_default();

    let trailer = first_trailer(raw.videos.as_ref());

    let seasons: Vec<Season> = if season_details.is_empty() {
        raw.seasons
            .iter()
            .map(|s| Season {
                number: s.season_number,
                name: s.name.clone(),
                episode_count: s.episode_count,
                episodes: Vec::new(),
            })
            .collect()
    } else {
        season_details
            .into_iter()
            .map(|s| Season {
                number: s.season_number,
                name: s.name.clone(),
                episode_count: u32::try_from(s.episodes.len()).unwrap_or(0),
                episodes: s
                    .episodes
                    .into_iter()
                    .map(|e| Episode {
                        number: e.episode_number,
                        title: e.name,
                        overview: e.overview,
                        air_date: e.air_date,
                        still: image_url(image_base, e.still_path.as_deref()),
                        runtime_minutes: e.runtime,
                    })
                    .collect(),
            })
            .collect()
    };

    Content {
        id: raw.id.to_string(),
        media_type,
        title: raw.title.or(raw.name).unwrap_or_else(|| "Untitled".to_string()),
        overview: raw.overview,
        poster: image_url(image_base, raw.poster_path.as_deref()),
        backdrop: image_url(image_base, raw.backdrop_path.as_deref()),
        release_date: raw.release_date.or(raw.first_air_date),
        rating: raw.vote_average,
        genres: raw.genres.into_iter().map(|g| g.name).collect(),
        cast,
        recommendations,
        trailer,
        seasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn date_offset(days: i64) -> String {
        (Utc::now().date_naive() + Duration::days(days))
            .format("%Y-%m-%d")
            .to_string()
    }

    #[test]
    fn release_gate_is_fail_closed() {
        assert!(!is_released(None));
        assert!(!is_released(Some("")));
        assert!(!is_released(Some("soon")));
        assert!(!is_released(Some("2026-13-40")));
    }

    #[test]
    fn release_gate_boundaries() {
        assert!(is_released(Some(&date_offset(-1))));
        assert!(is_released(Some(&date_offset(0))));
        assert!(!is_released(Some(&date_offset(1))));
    }

    #[test]
    fn summarize_skips_unsupported_entries() {
        let person = TmdbItem {
            id: 1,
            title: None,
            name: Some("Some Actor".to_string()),
            media_type: Some("person".to_string()),
            poster_path: None,
            release_date: None,
            first_air_date: None,
            vote_average: None,
        };
        assert!(summarize(&person, None, "https://img.example").is_none());
    }

    #[test]
    fn summarize_maps_show_fields() {
        let item = TmdbItem {
            id: 1399,
            title: None,
            name: Some("Some Show".to_string()),
            media_type: Some("tv".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
            release_date: None,
            first_air_date: Some("2011-04-17".to_string()),
            vote_average: Some(8.4),
        };

        let summary = summarize(&item, None, "https://img.example/w500").unwrap();
        assert_eq!(summary.media_type, MediaType::Show);
        assert_eq!(summary.title, "Some Show");
        assert_eq!(
            summary.poster.as_deref(),
            Some("https://img.example/w500/poster.jpg")
        );
        assert_eq!(summary.release_date.as_deref(), Some("2011-04-17"));
    }

    #[test]
    fn normalize_caps_cast_and_picks_trailer() {
        let raw: TmdbDetails = serde_json::from_value(serde_json::json!({
            "id": 603,
            "title": "The Matrix",
            "overview": "A hacker learns the truth.",
            "poster_path": "/matrix.jpg",
            "release_date": "1999-03-31",
            "vote_average": 8.2,
            "genres": [{"id": 28, "name": "Action"}, {"id": 878, "name": "Science Fiction"}],
            "credits": {
                "cast": (0..20).map(|i| serde_json::json!({
                    "name": format!("Actor {i}"),
                    "character": format!("Role {i}"),
                    "order": i
                })).collect::<Vec<_>>()
            },
            "videos": {
                "results": [
                    {"name": "Behind the scenes", "key": "bts1", "site": "YouTube", "type": "Featurette"},
                    {"name": "Official Trailer", "key": "vKQi3bBA1y8", "site": "YouTube", "type": "Trailer"}
                ]
            }
        }))
        .unwrap();

        let content = normalize_details(raw, MediaType::Movie, Vec::new(), "https://img.example");
        assert_eq!(content.id, "603");
        assert_eq!(content.cast.len(), MAX_CAST);
        assert_eq!(content.cast[0].name, "Actor 0");
        assert_eq!(content.genres, vec!["Action", "Science Fiction"]);
        assert_eq!(
            content.trailer.unwrap().url,
            "https://www.youtube.com/watch?v=vKQi3bBA1y8"
        );
    }

    #[test]
    fn normalize_accepts_camel_case_fields() {
        let raw: TmdbDetails = serde_json::from_value(serde_json::json!({
            "id": 1399,
            "name": "Some Show",
            "posterPath": "/p.jpg",
            "firstAirDate": "2011-04-17",
            "voteAverage": 8.4,
            "seasons": [{"seasonNumber": 1, "episodeCount": 10}]
        }))
        .unwrap();

        let content = normalize_details(raw, MediaType::Show, Vec::new(), "https://img.example");
        assert_eq!(content.release_date.as_deref(), Some("2011-04-17"));
        assert_eq!(content.seasons.len(), 1);
        assert_eq!(content.seasons[0].episode_count, 10);
    }
}
