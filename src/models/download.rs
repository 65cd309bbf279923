use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::MediaType;
use super::link::ExtractedLink;

/// Lifecycle of a download record.
///
/// `pending → downloading → {paused, completed, failed}`; paused and failed
/// records re-enter via resume. Cancelled records are removed outright, so
/// there is no stored cancelled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
}

impl DownloadState {
    /// Counts against the concurrency cap.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Downloading)
    }

    /// Waiting for admission.
    #[must_use]
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Resume is the only way out of these states.
    #[must_use]
    pub const fn can_resume(self) -> bool {
        matches!(self, Self::Paused | Self::Failed)
    }
}

impl std::fmt::Display for DownloadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Downloading => "downloading",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Queue precedence. Ord follows declaration order, so `Urgent` compares
/// greatest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DownloadPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl std::fmt::Display for DownloadPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DownloadPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// Everything needed to create a download record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub content_id: String,
    pub title: String,
    pub media_type: MediaType,
    pub season: Option<String>,
    pub episode: Option<String>,
    pub link: ExtractedLink,
    #[serde(default)]
    pub priority: DownloadPriority,
}

/// A download record. Only the queue engine mutates these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Download {
    pub id: String,
    pub content_id: String,
    pub title: String,
    pub media_type: MediaType,
    pub season: Option<String>,
    pub episode: Option<String>,
    pub link: ExtractedLink,
    pub state: DownloadState,
    pub priority: DownloadPriority,
    pub added_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub downloaded_bytes: u64,
    pub file_size: Option<u64>,
    /// Completion fraction in `0.0..=1.0`.
    pub progress: f32,
    /// Current transfer rate in bytes per second.
    pub speed: u64,
    pub peak_speed: u64,
    pub eta_seconds: Option<u64>,
    /// Transient transfer failures survived so far.
    pub retry_count: u32,
    pub local_path: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl Download {
    #[must_use]
    pub fn from_request(request: DownloadRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content_id: request.content_id,
            title: request.title,
            media_type: request.media_type,
            season: request.season,
            episode: request.episode,
            link: request.link,
            state: DownloadState::Pending,
            priority: request.priority,
            added_at: Utc::now(),
            started_at: None,
            completed_at: None,
            downloaded_bytes: 0,
            file_size: None,
            progress: 0.0,
            speed: 0,
            peak_speed: 0,
            eta_seconds: None,
            retry_count: 0,
            local_path: None,
            error: None,
        }
    }

    /// Display name including the episode reference when present.
    #[must_use]
    pub fn display_title(&self) -> String {
        match (&self.season, &self.episode) {
            (Some(season), Some(episode)) => {
                format!("{} S{season}E{episode}", self.title)
            }
            _ => self.title.clone(),
        }
    }
}

/// Queued-set view of a download, as published in snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub download_id: String,
    pub title: String,
    pub priority: DownloadPriority,
    pub added_at: DateTime<Utc>,
    pub estimated_size: Option<u64>,
    pub quality: Option<String>,
}

impl From<&Download> for QueueEntry {
    fn from(download: &Download) -> Self {
        Self {
            download_id: download.id.clone(),
            title: download.display_title(),
            priority: download.priority,
            added_at: download.added_at,
            estimated_size: download.file_size,
            quality: download.link.quality.clone(),
        }
    }
}

/// Total order over queued downloads: priority descending, then FIFO by
/// `added_at`, then id so equal pairs still order deterministically.
#[must_use]
pub fn queue_order(a: &Download, b: &Download) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| a.added_at.cmp(&b.added_at))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::link::ExtractedLink;
    use chrono::Duration;

    fn download_with(priority: DownloadPriority, added_offset_secs: i64) -> Download {
        let mut d = Download::from_request(DownloadRequest {
            content_id: "42".to_string(),
            title: "Sample".to_string(),
            media_type: MediaType::Movie,
            season: None,
            episode: None,
            link: ExtractedLink::direct("https://cdn.example/file.mp4"),
            priority,
        });
        d.added_at += Duration::seconds(added_offset_secs);
        d
    }

    #[test]
    fn priority_ordering() {
        assert!(DownloadPriority::Urgent > DownloadPriority::High);
        assert!(DownloadPriority::High > DownloadPriority::Normal);
        assert!(DownloadPriority::Normal > DownloadPriority::Low);
    }

    #[test]
    fn queue_order_is_priority_desc_then_fifo() {
        let urgent_late = download_with(DownloadPriority::Urgent, 100);
        let normal_early = download_with(DownloadPriority::Normal, 0);
        let normal_late = download_with(DownloadPriority::Normal, 50);

        let mut queue = vec![&normal_late, &urgent_late, &normal_early];
        queue.sort_by(|a, b| queue_order(a, b));

        assert_eq!(queue[0].id, urgent_late.id);
        assert_eq!(queue[1].id, normal_early.id);
        assert_eq!(queue[2].id, normal_late.id);
    }

    #[test]
    fn state_helpers() {
        assert!(DownloadState::Downloading.is_active());
        assert!(!DownloadState::Paused.is_active());
        assert!(DownloadState::Pending.is_queued());
        assert!(DownloadState::Paused.can_resume());
        assert!(DownloadState::Failed.can_resume());
        assert!(!DownloadState::Completed.can_resume());
    }

    #[test]
    fn display_title_includes_episode_reference() {
        let mut d = download_with(DownloadPriority::Normal, 0);
        assert_eq!(d.display_title(), "Sample");
        d.season = Some("1".to_string());
        d.episode = Some("5".to_string());
        assert_eq!(d.display_title(), "Sample S1E5");
    }
}
