//! Domain error taxonomy shared across the crate.
//!
//! Each subsystem has its own enum so callers can match on failure classes:
//! [`NetworkError`] for the request engine, [`ScraperError`] for providers and
//! extractors, [`DownloadError`] for transfers, [`ConversionError`] for the
//! post-download pipeline.

use thiserror::Error;

/// Failures produced by the request engine.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The response could not be read as a body.
    #[error("invalid response")]
    InvalidResponse,

    #[error("HTTP error: status {0}")]
    HttpStatus(u16),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no connection")]
    NoConnection,

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Unknown(String),
}

impl NetworkError {
    /// Whether the request engine may retry after this failure.
    ///
    /// Client errors (4xx) and decode failures are final; server errors and
    /// transport-level failures are worth another attempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::HttpStatus(status) => *status >= 500,
            Self::NoConnection | Self::Timeout | Self::InvalidResponse | Self::Unknown(_) => true,
            Self::InvalidUrl(_) | Self::Decode(_) => false,
        }
    }
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::NoConnection
        } else if err.is_decode() || err.is_body() {
            Self::InvalidResponse
        } else {
            Self::Unknown(err.to_string())
        }
    }
}

/// Failures produced by providers and extractors.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The page was fetched but its structure did not match what the parser
    /// expects.
    #[error("parsing failed: {0}")]
    ParsingFailed(String),

    #[error("content not found: {0}")]
    ContentNotFound(String),

    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// The source site changed its markup in a way the parser recognizes as
    /// structural (expected anchors missing entirely).
    #[error("source structure changed")]
    SourceChanged,

    #[error("rate limit exceeded")]
    RateLimitExceeded,

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid content id: {0}")]
    InvalidContentId(String),

    /// An episodic title was requested without season/episode identifiers.
    #[error("missing episode info")]
    MissingEpisodeInfo,
}

/// Failures produced by download transfer tasks.
///
/// Transient variants feed the engine's bounded auto-retry; terminal variants
/// move the download to the failed state immediately.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// No bytes arrived for the configured stall window.
    #[error("transfer stalled after {0}s without progress")]
    Stalled(u64),

    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("unsupported link format: {0}")]
    UnsupportedFormat(String),
}

impl DownloadError {
    /// Whether the engine should retry this transfer automatically.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Stalled(_) => true,
            Self::Io(_) | Self::InvalidLink(_) | Self::UnsupportedFormat(_) => false,
        }
    }
}

/// Failures produced by the conversion pipeline.
///
/// Conversion never destroys its input: any of these leaves the original
/// package on disk untouched.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The stored path is not a segmented package.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("package is missing segment: {0}")]
    MissingSegment(String),

    #[error("conversion I/O error: {0}")]
    Io(#[from] std::io::Error),
}
