//! Download queue engine.
//!
//! One task owns every download record. Intents from the API and CLI arrive
//! as [`Command`] messages over a channel, transfer and conversion tasks
//! report back over a second channel, and a fixed-interval tick recomputes
//! admission, per-transfer statistics and the published [`QueueSnapshot`].
//! Nothing outside the engine task mutates queue state.
//!
//! State machine per download: `pending → downloading → {paused, completed,
//! failed}`. Paused and failed records re-enter as pending through resume;
//! cancel and delete remove the record outright. The active set is bounded by
//! `downloads.max_concurrent`, admission order is (priority desc, added_at
//! asc), recomputed from scratch every tick.

pub mod store;
mod transfer;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, ConversionConfig, DownloadsConfig};
use crate::convert;
use crate::errors::{ConversionError, DownloadError};
use crate::events::{DownloadStatus, EventBus, NotificationEvent, QueueSnapshot};
use crate::models::download::DownloadRequest;
use crate::models::{Download, DownloadState, QueueEntry, queue_order};

pub use store::{DownloadStore, JsonFileStore};

const COMMAND_BUFFER: usize = 64;
const REPORT_BUFFER: usize = 256;

/// External intents, applied by the engine task in arrival order.
enum Command {
    Enqueue {
        request: DownloadRequest,
        reply: oneshot::Sender<Download>,
    },
    Pause {
        id: String,
    },
    Resume {
        id: String,
    },
    Cancel {
        id: String,
    },
    Delete {
        id: String,
    },
    Convert {
        id: String,
        reply: oneshot::Sender<Result<(), ConversionError>>,
    },
    UpdateFilePath {
        id: String,
        path: String,
    },
    Snapshot {
        reply: oneshot::Sender<QueueSnapshot>,
    },
    List {
        reply: oneshot::Sender<Vec<Download>>,
    },
    Get {
        id: String,
        reply: oneshot::Sender<Option<Download>>,
    },
}

/// Progress and terminal results reported by transfer and conversion tasks.
pub(crate) enum Report {
    Bytes {
        id: String,
        downloaded: u64,
        total: Option<u64>,
        /// Completion fraction when byte totals are unknown (segment counts).
        fraction: Option<f32>,
    },
    TransferCompleted {
        id: String,
        path: String,
        bytes: u64,
    },
    TransferFailed {
        id: String,
        error: DownloadError,
    },
    ConversionProgress {
        id: String,
        progress: f32,
    },
    ConversionFinished {
        id: String,
        path: String,
        bytes: u64,
    },
    ConversionFailed {
        id: String,
        error: ConversionError,
    },
}

/// Cheap cloneable façade over the engine's command channel.
///
/// Commands are applied in send order, so a read issued after an intent on
/// the same handle observes that intent's effect.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
}

impl EngineHandle {
    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("download engine is not running"))
    }

    /// Creates a download record in the pending state and returns it. The
    /// transfer itself starts at the next admission tick.
    pub async fn enqueue(&self, request: DownloadRequest) -> Result<Download> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Enqueue { request, reply }).await?;
        rx.await.context("download engine dropped the request")
    }

    pub async fn pause(&self, id: &str) -> Result<()> {
        self.send(Command::Pause { id: id.to_string() }).await
    }

    pub async fn resume(&self, id: &str) -> Result<()> {
        self.send(Command::Resume { id: id.to_string() }).await
    }

    pub async fn cancel(&self, id: &str) -> Result<()> {
        self.send(Command::Cancel { id: id.to_string() }).await
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.send(Command::Delete { id: id.to_string() }).await
    }

    /// Starts converting a completed segmented-package download. The reply
    /// confirms the conversion began; progress and the result arrive as
    /// events.
    pub async fn convert(&self, id: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Convert {
            id: id.to_string(),
            reply,
        })
        .await?;
        rx.await
            .context("download engine dropped the request")?
            .map_err(anyhow::Error::new)
    }

    pub async fn update_file_path(&self, id: &str, path: &str) -> Result<()> {
        self.send(Command::UpdateFilePath {
            id: id.to_string(),
            path: path.to_string(),
        })
        .await
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.context("download engine dropped the request")
    }

    pub async fn list(&self) -> Result<Vec<Download>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::List { reply }).await?;
        rx.await.context("download engine dropped the request")
    }

    pub async fn get(&self, id: &str) -> Result<Option<Download>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Get {
            id: id.to_string(),
            reply,
        })
        .await?;
        rx.await.context("download engine dropped the request")
    }
}

struct ActiveTransfer {
    token: CancellationToken,
    handle: JoinHandle<()>,
    last_bytes: u64,
    last_progress: Instant,
}

pub struct DownloadEngine {
    downloads: HashMap<String, Download>,
    transfers: HashMap<String, ActiveTransfer>,
    converting: HashSet<String>,
    store: std::sync::Arc<dyn DownloadStore>,
    client: reqwest::Client,
    config: DownloadsConfig,
    conversion: ConversionConfig,
    directory: PathBuf,
    events: EventBus,
    commands: mpsc::Receiver<Command>,
    reports: mpsc::Receiver<Report>,
    reports_tx: mpsc::Sender<Report>,
}

impl DownloadEngine {
    #[must_use]
    pub fn new(
        store: std::sync::Arc<dyn DownloadStore>,
        client: reqwest::Client,
        config: &Config,
        events: EventBus,
    ) -> (Self, EngineHandle) {
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let (reports_tx, reports) = mpsc::channel(REPORT_BUFFER);

        let engine = Self {
            downloads: HashMap::new(),
            transfers: HashMap::new(),
            converting: HashSet::new(),
            store,
            client,
            config: config.downloads.clone(),
            conversion: config.conversion.clone(),
            directory: PathBuf::from(&config.downloads.directory),
            events,
            commands,
            reports,
            reports_tx,
        };

        (
            engine,
            EngineHandle {
                commands: commands_tx,
            },
        )
    }

    /// Runs the engine until the surrounding task is aborted.
    pub async fn run(mut self) {
        if let Err(err) = self.initialize().await {
            error!(error = %err, "failed to hydrate download records");
        }

        let mut tick =
            tokio::time::interval(Duration::from_secs(self.config.tick_seconds.max(1)));
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = tick.tick() => self.on_tick().await,
                Some(command) = self.commands.recv() => self.on_command(command).await,
                Some(report) = self.reports.recv() => self.on_report(report).await,
            }
        }
    }

    /// Loads persisted records. Records caught mid-transfer by a previous
    /// shutdown re-enter as pending; their staged bytes on disk are picked up
    /// by the next transfer attempt.
    async fn initialize(&mut self) -> std::io::Result<()> {
        let records = self.store.load_all().await?;
        let count = records.len();

        for mut download in records {
            if download.state.is_active() {
                download.state = DownloadState::Pending;
                download.speed = 0;
                download.eta_seconds = None;
                if let Err(err) = self.store.save(&download).await {
                    warn!(download_id = %download.id, error = %err, "failed to persist rehydrated record");
                }
            }
            self.downloads.insert(download.id.clone(), download);
        }

        if count > 0 {
            info!(count, "download records hydrated");
        }
        Ok(())
    }

    async fn on_tick(&mut self) {
        let stalled = self.update_transfer_stats();
        for id in stalled {
            warn!(download_id = %id, timeout = self.config.stall_timeout_seconds, "transfer made no progress within the stall window");
            self.handle_transfer_failure(
                &id,
                DownloadError::Stalled(self.config.stall_timeout_seconds),
            )
            .await;
        }

        self.admit_pending().await;
        let _ = self
            .events
            .send(NotificationEvent::QueueUpdated(self.snapshot()));
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Enqueue { request, reply } => {
                let download = Download::from_request(request);
                let id = download.id.clone();
                let title = download.display_title();

                self.downloads.insert(id.clone(), download.clone());
                self.persist(&id).await;
                info!(download_id = %id, title = %title, priority = %download.priority, "download queued");
                let _ = self
                    .events
                    .send(NotificationEvent::DownloadQueued { id, title });
                let _ = reply.send(download);
            }
            Command::Pause { id } => self.pause(&id).await,
            Command::Resume { id } => self.resume(&id).await,
            Command::Cancel { id } => self.cancel(&id).await,
            Command::Delete { id } => self.delete(&id).await,
            Command::Convert { id, reply } => {
                let _ = reply.send(self.start_conversion(&id).await);
            }
            Command::UpdateFilePath { id, path } => self.update_file_path(&id, path).await,
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::List { reply } => {
                let _ = reply.send(self.list());
            }
            Command::Get { id, reply } => {
                let _ = reply.send(self.downloads.get(&id).cloned());
            }
        }
    }

    async fn on_report(&mut self, report: Report) {
        match report {
            Report::Bytes {
                id,
                downloaded,
                total,
                fraction,
            } => {
                let Some(download) = self.downloads.get_mut(&id) else {
                    return;
                };
                if download.state != DownloadState::Downloading {
                    return;
                }

                download.downloaded_bytes = downloaded;
                if let Some(total) = total {
                    download.file_size = Some(total);
                }
                let computed = fraction.or_else(|| {
                    download
                        .file_size
                        .filter(|t| *t > 0)
                        .map(|t| downloaded as f32 / t as f32)
                });
                if let Some(progress) = computed {
                    download.progress = progress.clamp(0.0, 1.0);
                }
            }
            Report::TransferCompleted { id, path, bytes } => {
                self.stop_transfer(&id);
                let Some(download) = self.downloads.get_mut(&id) else {
                    return;
                };
                if download.state.is_finished() {
                    return;
                }

                download.state = DownloadState::Completed;
                download.completed_at = Some(Utc::now());
                download.progress = 1.0;
                download.downloaded_bytes = bytes;
                download.file_size = Some(bytes);
                download.local_path = Some(path.clone());
                download.speed = 0;
                download.eta_seconds = None;
                download.error = None;
                let title = download.display_title();

                self.persist(&id).await;
                info!(download_id = %id, title = %title, bytes, "download completed");
                let _ = self
                    .events
                    .send(NotificationEvent::DownloadCompleted { id, title, path });
            }
            Report::TransferFailed { id, error } => {
                self.handle_transfer_failure(&id, error).await;
            }
            Report::ConversionProgress { id, progress } => {
                let _ = self
                    .events
                    .send(NotificationEvent::ConversionProgress { id, progress });
            }
            Report::ConversionFinished { id, path, bytes } => {
                self.converting.remove(&id);
                let Some(download) = self.downloads.get_mut(&id) else {
                    return;
                };

                download.local_path = Some(path.clone());
                download.file_size = Some(bytes);
                download.downloaded_bytes = bytes;

                self.persist(&id).await;
                info!(download_id = %id, path = %path, "conversion completed");
                let _ = self
                    .events
                    .send(NotificationEvent::ConversionCompleted { id, path });
            }
            Report::ConversionFailed { id, error } => {
                self.converting.remove(&id);
                warn!(download_id = %id, error = %error, "conversion failed");
                let _ = self.events.send(NotificationEvent::ConversionFailed {
                    id,
                    error: error.to_string(),
                });
            }
        }
    }

    /// Per-tick transfer bookkeeping. Returns the ids whose transfers made no
    /// progress for the whole stall window.
    fn update_transfer_stats(&mut self) -> Vec<String> {
        let tick_seconds = self.config.tick_seconds.max(1);
        let stall_window = Duration::from_secs(self.config.stall_timeout_seconds);
        let mut stalled = Vec::new();

        for (id, transfer) in &mut self.transfers {
            let Some(download) = self.downloads.get_mut(id) else {
                continue;
            };
            if download.state != DownloadState::Downloading {
                continue;
            }

            let delta = download.downloaded_bytes.saturating_sub(transfer.last_bytes);
            download.speed = delta / tick_seconds;
            download.peak_speed = download.peak_speed.max(download.speed);
            download.eta_seconds = match (download.file_size, download.speed) {
                (Some(total), speed) if speed > 0 && total > download.downloaded_bytes => {
                    Some((total - download.downloaded_bytes) / speed)
                }
                _ => None,
            };

            if delta > 0 {
                transfer.last_bytes = download.downloaded_bytes;
                transfer.last_progress = Instant::now();
            } else if transfer.last_progress.elapsed() >= stall_window {
                stalled.push(id.clone());
            }
        }

        stalled
    }

    /// Promotes queued heads while the active set is under the cap. The
    /// ordering is recomputed here every time, never cached.
    async fn admit_pending(&mut self) {
        let cap = self.config.max_concurrent;
        let active = self
            .downloads
            .values()
            .filter(|d| d.state.is_active())
            .count();
        if active >= cap {
            return;
        }

        let promote: Vec<String> = {
            let mut queued: Vec<&Download> = self
                .downloads
                .values()
                .filter(|d| d.state.is_queued())
                .collect();
            queued.sort_by(|a, b| queue_order(a, b));
            queued
                .into_iter()
                .take(cap - active)
                .map(|d| d.id.clone())
                .collect()
        };

        for id in promote {
            self.start_transfer(&id).await;
        }
    }

    async fn start_transfer(&mut self, id: &str) {
        let Some(download) = self.downloads.get_mut(id) else {
            return;
        };

        download.state = DownloadState::Downloading;
        if download.started_at.is_none() {
            download.started_at = Some(Utc::now());
        }
        download.speed = 0;
        download.eta_seconds = None;
        download.error = None;

        let snapshot = download.clone();
        let token = CancellationToken::new();
        let handle = tokio::spawn(transfer::run(
            self.client.clone(),
            snapshot.clone(),
            self.directory.clone(),
            self.reports_tx.clone(),
            token.clone(),
        ));

        self.transfers.insert(
            id.to_string(),
            ActiveTransfer {
                token,
                handle,
                last_bytes: snapshot.downloaded_bytes,
                last_progress: Instant::now(),
            },
        );

        self.persist(id).await;
        info!(download_id = %id, title = %snapshot.display_title(), "download started");
        let _ = self.events.send(NotificationEvent::DownloadStarted {
            id: id.to_string(),
            title: snapshot.display_title(),
        });
    }

    async fn pause(&mut self, id: &str) {
        let Some(state) = self.downloads.get(id).map(|d| d.state) else {
            return;
        };
        if state != DownloadState::Downloading {
            return;
        }

        self.stop_transfer(id);
        let Some(download) = self.downloads.get_mut(id) else {
            return;
        };
        download.state = DownloadState::Paused;
        download.speed = 0;
        download.eta_seconds = None;
        let title = download.display_title();
        let bytes = download.downloaded_bytes;

        self.persist(id).await;
        info!(download_id = %id, bytes, "download paused");
        let _ = self.events.send(NotificationEvent::DownloadPaused {
            id: id.to_string(),
            title,
        });
    }

    /// Re-queues a paused or failed download with its original priority and
    /// added_at, so it slots back into the same position. Manual resume
    /// grants a fresh transient-retry budget.
    async fn resume(&mut self, id: &str) {
        let Some(download) = self.downloads.get_mut(id) else {
            return;
        };
        if !download.state.can_resume() {
            return;
        }

        download.state = DownloadState::Pending;
        download.error = None;
        download.retry_count = 0;
        download.speed = 0;
        download.eta_seconds = None;
        let title = download.display_title();

        self.persist(id).await;
        info!(download_id = %id, "download resumed");
        let _ = self.events.send(NotificationEvent::DownloadResumed {
            id: id.to_string(),
            title,
        });
    }

    /// Removes a non-terminal download and its partial data. Completed
    /// records are left to `delete`.
    async fn cancel(&mut self, id: &str) {
        let Some(download) = self.downloads.get(id) else {
            return;
        };
        if download.state.is_finished() {
            return;
        }

        self.stop_transfer(id);
        let Some(download) = self.downloads.remove(id) else {
            return;
        };
        self.remove_download_files(&download).await;
        if let Err(err) = self.store.remove(id).await {
            warn!(download_id = %id, error = %err, "failed to remove download record");
        }

        info!(download_id = %id, "download cancelled");
        let _ = self
            .events
            .send(NotificationEvent::DownloadRemoved { id: id.to_string() });
    }

    /// Removes a download in any state, freeing the stored file.
    async fn delete(&mut self, id: &str) {
        self.stop_transfer(id);
        let Some(download) = self.downloads.remove(id) else {
            return;
        };
        self.remove_download_files(&download).await;
        if let Err(err) = self.store.remove(id).await {
            warn!(download_id = %id, error = %err, "failed to remove download record");
        }

        info!(download_id = %id, "download deleted");
        let _ = self
            .events
            .send(NotificationEvent::DownloadRemoved { id: id.to_string() });
    }

    async fn update_file_path(&mut self, id: &str, path: String) {
        let Some(download) = self.downloads.get_mut(id) else {
            return;
        };
        download.local_path = Some(path);
        self.persist(id).await;
        debug!(download_id = %id, "download file path updated");
    }

    /// Validates and launches a conversion for a completed package download.
    async fn start_conversion(&mut self, id: &str) -> Result<(), ConversionError> {
        let Some(download) = self.downloads.get(id) else {
            return Err(ConversionError::UnsupportedFormat(format!(
                "unknown download: {id}"
            )));
        };
        if download.state != DownloadState::Completed {
            return Err(ConversionError::UnsupportedFormat(format!(
                "download is {}, only completed downloads convert",
                download.state
            )));
        }
        let Some(path) = download.local_path.clone() else {
            return Err(ConversionError::UnsupportedFormat(
                "download has no stored file".to_string(),
            ));
        };
        if self.converting.contains(id) {
            return Ok(());
        }

        let package = PathBuf::from(&path);
        convert::verify_package(&package).await?;

        let title = download.display_title();
        let output = package.with_extension(&self.conversion.output_extension);
        let delete_original = self.conversion.delete_original;
        let reports = self.reports_tx.clone();
        let task_id = id.to_string();

        self.converting.insert(id.to_string());
        info!(download_id = %id, package = %package.display(), "conversion started");
        let _ = self.events.send(NotificationEvent::ConversionStarted {
            id: id.to_string(),
            title,
        });

        tokio::spawn(async move {
            let progress_reports = reports.clone();
            let progress_id = task_id.clone();
            let result = convert::convert_package(&package, &output, move |progress| {
                let _ = progress_reports.try_send(Report::ConversionProgress {
                    id: progress_id.clone(),
                    progress,
                });
            })
            .await;

            let report = match result {
                Ok(bytes) => {
                    if delete_original {
                        if let Err(err) = tokio::fs::remove_dir_all(&package).await {
                            warn!(package = %package.display(), error = %err, "failed to remove converted package");
                        }
                    }
                    Report::ConversionFinished {
                        id: task_id,
                        path: output.display().to_string(),
                        bytes,
                    }
                }
                Err(error) => Report::ConversionFailed { id: task_id, error },
            };
            let _ = reports.send(report).await;
        });

        Ok(())
    }

    /// Applies the retry policy to a transfer failure: transient errors
    /// re-queue with preserved bytes until the retry budget runs out, then
    /// the download parks as failed until a manual resume.
    async fn handle_transfer_failure(&mut self, id: &str, error: DownloadError) {
        self.stop_transfer(id);
        let Some(download) = self.downloads.get_mut(id) else {
            return;
        };
        if download.state != DownloadState::Downloading {
            return;
        }

        download.speed = 0;
        download.eta_seconds = None;
        download.error = Some(error.to_string());
        let title = download.display_title();

        if error.is_transient() && download.retry_count < self.config.max_transfer_retries {
            download.retry_count += 1;
            download.state = DownloadState::Pending;
            let attempt = download.retry_count;
            warn!(download_id = %id, attempt, error = %error, "transfer failed, re-queued");
            let _ = self.events.send(NotificationEvent::DownloadRetrying {
                id: id.to_string(),
                title,
                attempt,
            });
        } else {
            download.state = DownloadState::Failed;
            warn!(download_id = %id, error = %error, "download failed");
            let _ = self.events.send(NotificationEvent::DownloadFailed {
                id: id.to_string(),
                title,
                error: error.to_string(),
            });
        }

        self.persist(id).await;
    }

    fn stop_transfer(&mut self, id: &str) {
        if let Some(transfer) = self.transfers.remove(id) {
            transfer.token.cancel();
            transfer.handle.abort();
        }
    }

    async fn remove_download_files(&self, download: &Download) {
        let paths = transfer::paths_for(download, &self.directory);
        let mut targets = vec![paths.staging, paths.final_path];
        if let Some(local) = &download.local_path {
            let local = PathBuf::from(local);
            if !targets.contains(&local) {
                targets.push(local);
            }
        }

        for path in targets {
            let removed = match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(&path).await,
                Ok(_) => tokio::fs::remove_file(&path).await,
                Err(_) => continue,
            };
            if let Err(err) = removed {
                debug!(path = %path.display(), error = %err, "could not remove download data");
            }
        }
    }

    async fn persist(&self, id: &str) {
        if let Some(download) = self.downloads.get(id) {
            if let Err(err) = self.store.save(download).await {
                warn!(download_id = %id, error = %err, "failed to persist download record");
            }
        }
    }

    fn snapshot(&self) -> QueueSnapshot {
        let mut all: Vec<&Download> = self.downloads.values().collect();
        all.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.id.cmp(&b.id)));

        let mut snapshot = QueueSnapshot::default();
        let mut queued: Vec<&Download> = Vec::new();
        for download in all {
            match download.state {
                DownloadState::Downloading => snapshot.active.push(DownloadStatus::from(download)),
                DownloadState::Pending => queued.push(download),
                DownloadState::Paused => snapshot.paused.push(DownloadStatus::from(download)),
                DownloadState::Completed => {
                    snapshot.completed.push(DownloadStatus::from(download));
                }
                DownloadState::Failed => snapshot.failed.push(DownloadStatus::from(download)),
            }
        }

        queued.sort_by(|a, b| queue_order(a, b));
        snapshot.queued = queued.into_iter().map(QueueEntry::from).collect();
        snapshot
    }

    fn list(&self) -> Vec<Download> {
        let mut all: Vec<Download> = self.downloads.values().cloned().collect();
        all.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.id.cmp(&b.id)));
        all
    }
}
