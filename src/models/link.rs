use serde::{Deserialize, Serialize};

/// How a resolved URL is meant to be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Plain progressive file (mp4 etc.), supports ranged resume.
    Direct,
    /// HLS media playlist; fetched segment by segment.
    Hls,
    Dash,
    /// Intermediate player page; must pass through an extractor before it is
    /// playable.
    Embed,
}

impl LinkKind {
    #[must_use]
    pub const fn is_playable(self) -> bool {
        !matches!(self, Self::Embed)
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Direct => "direct",
            Self::Hls => "hls",
            Self::Dash => "dash",
            Self::Embed => "embed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtitle {
    pub url: String,
    pub language: String,
    pub label: Option<String>,
}

/// A single candidate stream produced by a provider or extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedLink {
    pub url: String,
    pub kind: LinkKind,
    /// Raw quality label as found on the page ("1080p", "4K", "HD"...).
    pub quality: Option<String>,
    /// Hosting server name for display ("VidCloud", "StreamTape"...).
    pub server: Option<String>,
    /// Extra request headers playback/download must send.
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    /// Whether the host rejects requests without a Referer header.
    #[serde(default)]
    pub requires_referer: bool,
    #[serde(default)]
    pub subtitles: Vec<Subtitle>,
}

impl ExtractedLink {
    #[must_use]
    pub fn new(url: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            url: url.into(),
            kind,
            quality: None,
            server: None,
            headers: Vec::new(),
            requires_referer: false,
            subtitles: Vec::new(),
        }
    }

    #[must_use]
    pub fn direct(url: impl Into<String>) -> Self {
        Self::new(url, LinkKind::Direct)
    }

    #[must_use]
    pub fn hls(url: impl Into<String>) -> Self {
        Self::new(url, LinkKind::Hls)
    }

    #[must_use]
    pub fn embed(url: impl Into<String>) -> Self {
        Self::new(url, LinkKind::Embed)
    }

    #[must_use]
    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.requires_referer = true;
        self.with_header("Referer", referer)
    }

    #[must_use]
    pub fn with_subtitles(mut self, subtitles: Vec<Subtitle>) -> Self {
        self.subtitles = subtitles;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates_headers() {
        let link = ExtractedLink::hls("https://cdn.example/master.m3u8")
            .with_quality("1080p")
            .with_referer("https://player.example/");

        assert_eq!(link.kind, LinkKind::Hls);
        assert!(link.requires_referer);
        assert_eq!(
            link.headers,
            vec![("Referer".to_string(), "https://player.example/".to_string())]
        );
    }

    #[test]
    fn embeds_are_not_playable() {
        assert!(!LinkKind::Embed.is_playable());
        assert!(LinkKind::Direct.is_playable());
    }
}
