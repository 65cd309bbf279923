//! Domain events for the application.
//!
//! Everything the system wants connected clients to know travels as a
//! [`NotificationEvent`] over the broadcast bus: download lifecycle changes,
//! per-tick queue snapshots and conversion progress. The SSE endpoint and the
//! CLI `queue` command are the consumers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::{Download, DownloadState, QueueEntry};

/// Sender half of the application event bus.
pub type EventBus = broadcast::Sender<NotificationEvent>;

/// Events sent to connected clients via SSE (Server-Sent Events).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum NotificationEvent {
    DownloadQueued {
        id: String,
        title: String,
    },
    DownloadStarted {
        id: String,
        title: String,
    },
    DownloadPaused {
        id: String,
        title: String,
    },
    DownloadResumed {
        id: String,
        title: String,
    },
    DownloadCompleted {
        id: String,
        title: String,
        path: String,
    },
    DownloadFailed {
        id: String,
        title: String,
        error: String,
    },
    DownloadRetrying {
        id: String,
        title: String,
        attempt: u32,
    },
    DownloadRemoved {
        id: String,
    },

    ConversionStarted {
        id: String,
        title: String,
    },
    ConversionProgress {
        id: String,
        progress: f32,
    },
    ConversionCompleted {
        id: String,
        path: String,
    },
    ConversionFailed {
        id: String,
        error: String,
    },

    ProviderChanged {
        name: String,
    },

    Error {
        message: String,
    },
    Info {
        message: String,
    },

    QueueUpdated(QueueSnapshot),
}

/// Point-in-time view of the whole queue, published once per engine tick.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Currently transferring, ordered by start time.
    pub active: Vec<DownloadStatus>,
    /// Waiting for admission, in promotion order.
    pub queued: Vec<QueueEntry>,
    pub paused: Vec<DownloadStatus>,
    pub completed: Vec<DownloadStatus>,
    pub failed: Vec<DownloadStatus>,
}

impl QueueSnapshot {
    #[must_use]
    pub fn total(&self) -> usize {
        self.active.len()
            + self.queued.len()
            + self.paused.len()
            + self.completed.len()
            + self.failed.len()
    }
}

/// Status of a single download as shown in snapshots.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadStatus {
    pub id: String,
    pub title: String,
    pub state: DownloadState,
    pub progress: f32,
    pub speed: u64,
    pub eta_seconds: Option<u64>,
    pub downloaded_bytes: u64,
    pub file_size: Option<u64>,
    pub local_path: Option<String>,
    pub error: Option<String>,
}

impl From<&Download> for DownloadStatus {
    fn from(download: &Download) -> Self {
        Self {
            id: download.id.clone(),
            title: download.display_title(),
            state: download.state,
            progress: download.progress,
            speed: download.speed,
            eta_seconds: download.eta_seconds,
            downloaded_bytes: download.downloaded_bytes,
            file_size: download.file_size,
            local_path: download.local_path.clone(),
            error: download.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = NotificationEvent::DownloadStarted {
            id: "abc".to_string(),
            title: "Example".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "DownloadStarted");
        assert_eq!(json["payload"]["title"], "Example");
    }

    #[test]
    fn snapshot_round_trips() {
        let snapshot = QueueSnapshot::default();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: QueueSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total(), 0);
    }
}
