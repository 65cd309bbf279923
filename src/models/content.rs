use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
    Anime,
}

impl MediaType {
    /// Episodic types need season/episode identifiers to resolve playback.
    #[must_use]
    pub const fn is_episodic(self) -> bool {
        matches!(self, Self::Show | Self::Anime)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Movie => write!(f, "movie"),
            Self::Show => write!(f, "show"),
            Self::Anime => write!(f, "anime"),
        }
    }
}

impl std::str::FromStr for MediaType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" | "movies" => Ok(Self::Movie),
            "show" | "tv" | "series" => Ok(Self::Show),
            "anime" => Ok(Self::Anime),
            other => Err(format!("unknown media type: {other}")),
        }
    }
}

/// Fully normalized title as surfaced by `fetch_details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    pub id: String,
    pub media_type: MediaType,
    pub title: String,
    pub overview: Option<String>,
    pub poster: Option<String>,
    pub backdrop: Option<String>,
    /// ISO `YYYY-MM-DD` when the provider supplies one.
    pub release_date: Option<String>,
    pub rating: Option<f32>,
    pub genres: Vec<String>,
    pub cast: Vec<CastMember>,
    /// Shallow references only; callers fetch details on demand.
    pub recommendations: Vec<ContentSummary>,
    pub trailer: Option<Trailer>,
    #[serde(default)]
    pub seasons: Vec<Season>,
}

/// Lightweight reference used in carousels, search pages and recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentSummary {
    pub id: String,
    pub media_type: MediaType,
    pub title: String,
    pub poster: Option<String>,
    pub release_date: Option<String>,
    pub rating: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastMember {
    pub name: String,
    pub character: Option<String>,
    pub profile: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trailer {
    pub name: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Season {
    pub number: u32,
    pub name: Option<String>,
    pub episode_count: u32,
    #[serde(default)]
    pub episodes: Vec<Episode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub number: u32,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub air_date: Option<String>,
    pub still: Option<String>,
    pub runtime_minutes: Option<u32>,
}

/// One home-screen row (e.g. "Trending Movies").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Carousel {
    pub title: String,
    pub items: Vec<ContentSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<ContentSummary>,
    pub page: u32,
    pub total_pages: u32,
    pub total_results: u32,
}
