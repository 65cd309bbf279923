//! Transfer tasks: one per admitted download.
//!
//! A transfer streams its link into the downloads directory and reports both
//! progress and the terminal outcome back to the engine over the report
//! channel. Cancellation is cooperative: the token is checked between chunks
//! and segments, and a cancelled transfer sends no terminal report since the
//! engine has already recorded its decision.
//!
//! Direct links write to a `.part` staging file resumed with an HTTP `Range`
//! header; hls links fetch the media playlist and then segments one by one
//! into a package directory (segments already on disk are skipped), writing
//! the local manifest the conversion pipeline consumes.

use std::path::{Path, PathBuf};

use reqwest::header;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::convert::PACKAGE_MANIFEST;
use crate::errors::{DownloadError, NetworkError};
use crate::models::{Download, ExtractedLink, LinkKind};

use super::Report;

/// Bytes between progress reports for direct streams.
const REPORT_EVERY_BYTES: u64 = 256 * 1024;

/// Destination layout for one download inside the downloads directory.
#[derive(Debug, Clone)]
pub(crate) struct TransferPaths {
    /// Where the finished download lives: a file, or a package directory for
    /// segment-based links.
    pub final_path: PathBuf,
    /// Where bytes land while the transfer runs. Identical to `final_path`
    /// for package directories.
    pub staging: PathBuf,
}

pub(crate) fn paths_for(download: &Download, dir: &Path) -> TransferPaths {
    let stem = file_stem(download);
    if download.link.kind == LinkKind::Hls {
        let package = dir.join(stem);
        return TransferPaths {
            final_path: package.clone(),
            staging: package,
        };
    }

    let final_path = dir.join(format!("{stem}.{}", extension_for(&download.link.url)));
    let staging = PathBuf::from(format!("{}.part", final_path.display()));
    TransferPaths {
        final_path,
        staging,
    }
}

/// Runs one transfer to completion and reports the outcome.
pub(crate) async fn run(
    client: reqwest::Client,
    download: Download,
    dir: PathBuf,
    reports: mpsc::Sender<Report>,
    token: CancellationToken,
) {
    let id = download.id.clone();

    match fetch(&client, &download, &dir, &reports, &token).await {
        Ok(Some((path, bytes))) => {
            let _ = reports
                .send(Report::TransferCompleted { id, path, bytes })
                .await;
        }
        Ok(None) => debug!(download_id = %id, "transfer cancelled"),
        Err(error) => {
            let _ = reports.send(Report::TransferFailed { id, error }).await;
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    download: &Download,
    dir: &Path,
    reports: &mpsc::Sender<Report>,
    token: &CancellationToken,
) -> Result<Option<(String, u64)>, DownloadError> {
    fs::create_dir_all(dir).await?;
    let paths = paths_for(download, dir);

    match download.link.kind {
        LinkKind::Direct => fetch_direct(client, download, &paths, reports, token).await,
        LinkKind::Hls => fetch_hls(client, download, &paths.final_path, reports, token).await,
        LinkKind::Dash => Err(DownloadError::UnsupportedFormat(
            "dash manifests".to_string(),
        )),
        LinkKind::Embed => Err(DownloadError::InvalidLink(
            "embed page links must be resolved to a playable stream".to_string(),
        )),
    }
}

async fn fetch_direct(
    client: &reqwest::Client,
    download: &Download,
    paths: &TransferPaths,
    reports: &mpsc::Sender<Report>,
    token: &CancellationToken,
) -> Result<Option<(String, u64)>, DownloadError> {
    let url = parse_link_url(&download.link)?;
    let offset = match fs::metadata(&paths.staging).await {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };

    let mut request = request_with_headers(client, &download.link, url);
    if offset > 0 {
        request = request.header(header::RANGE, format!("bytes={offset}-"));
    }

    let mut response = request.send().await.map_err(NetworkError::from)?;
    let status = response.status();

    // A range starting at the end of the resource means the staging file
    // already holds everything.
    if status == reqwest::StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
        fs::rename(&paths.staging, &paths.final_path).await?;
        return Ok(Some((paths.final_path.display().to_string(), offset)));
    }
    if !status.is_success() {
        return Err(NetworkError::HttpStatus(status.as_u16()).into());
    }

    let resuming = status == reqwest::StatusCode::PARTIAL_CONTENT && offset > 0;
    let mut downloaded = if resuming { offset } else { 0 };
    let total = response.content_length().map(|len| downloaded + len);

    let mut file = if resuming {
        fs::OpenOptions::new().append(true).open(&paths.staging).await?
    } else {
        fs::File::create(&paths.staging).await?
    };

    send_bytes(reports, &download.id, downloaded, total, None).await;

    let mut last_reported = downloaded;
    loop {
        let chunk = tokio::select! {
            () = token.cancelled() => {
                file.flush().await?;
                return Ok(None);
            }
            chunk = response.chunk() => chunk.map_err(NetworkError::from)?,
        };

        let Some(bytes) = chunk else { break };
        file.write_all(&bytes).await?;
        downloaded += bytes.len() as u64;

        if downloaded - last_reported >= REPORT_EVERY_BYTES {
            last_reported = downloaded;
            send_bytes(reports, &download.id, downloaded, total, None).await;
        }
    }

    file.flush().await?;
    drop(file);
    send_bytes(reports, &download.id, downloaded, total, None).await;

    fs::rename(&paths.staging, &paths.final_path).await?;
    Ok(Some((paths.final_path.display().to_string(), downloaded)))
}

async fn fetch_hls(
    client: &reqwest::Client,
    download: &Download,
    package: &Path,
    reports: &mpsc::Sender<Report>,
    token: &CancellationToken,
) -> Result<Option<(String, u64)>, DownloadError> {
    fs::create_dir_all(package).await?;

    let playlist_url = parse_link_url(&download.link)?;
    let (media_url, playlist) = fetch_playlist(client, &download.link, playlist_url).await?;

    let segments = segment_urls(&playlist, &media_url)?;
    if segments.is_empty() {
        return Err(DownloadError::InvalidLink(
            "playlist has no segments".to_string(),
        ));
    }

    // The manifest goes down first so even a partial package knows its
    // ordering.
    let mut manifest = String::new();
    for index in 0..segments.len() {
        manifest.push_str(&segment_name(index));
        manifest.push('\n');
    }
    fs::write(package.join(PACKAGE_MANIFEST), manifest).await?;

    let total_segments = segments.len();
    let mut downloaded: u64 = 0;

    for (index, segment_url) in segments.iter().enumerate() {
        let path = package.join(segment_name(index));
        let fraction = (index + 1) as f32 / total_segments as f32;

        // Segments already on disk are work a previous attempt finished.
        if let Ok(meta) = fs::metadata(&path).await {
            if meta.len() > 0 {
                downloaded += meta.len();
                send_bytes(reports, &download.id, downloaded, None, Some(fraction)).await;
                continue;
            }
        }

        let bytes = tokio::select! {
            () = token.cancelled() => return Ok(None),
            result = fetch_segment(client, &download.link, segment_url.clone()) => result?,
        };

        let staged = package.join(format!("{}.part", segment_name(index)));
        fs::write(&staged, &bytes).await?;
        fs::rename(&staged, &path).await?;

        downloaded += bytes.len() as u64;
        send_bytes(reports, &download.id, downloaded, None, Some(fraction)).await;
    }

    Ok(Some((package.display().to_string(), downloaded)))
}

/// Fetches the playlist, following a master playlist to its first variant.
async fn fetch_playlist(
    client: &reqwest::Client,
    link: &ExtractedLink,
    url: Url,
) -> Result<(Url, String), DownloadError> {
    let text = fetch_text(client, link, url.clone()).await?;

    if text.lines().any(|l| l.starts_with("#EXT-X-STREAM-INF")) {
        let variant = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('#'))
            .ok_or_else(|| {
                DownloadError::InvalidLink("master playlist has no variants".to_string())
            })?;
        let variant_url = url
            .join(variant)
            .map_err(|e| DownloadError::InvalidLink(format!("{variant}: {e}")))?;
        let media = fetch_text(client, link, variant_url.clone()).await?;
        return Ok((variant_url, media));
    }

    Ok((url, text))
}

fn segment_urls(playlist: &str, base: &Url) -> Result<Vec<Url>, DownloadError> {
    let mut urls = Vec::new();
    for line in playlist.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let url = base
            .join(line)
            .map_err(|e| DownloadError::InvalidLink(format!("{line}: {e}")))?;
        urls.push(url);
    }
    Ok(urls)
}

async fn fetch_text(
    client: &reqwest::Client,
    link: &ExtractedLink,
    url: Url,
) -> Result<String, DownloadError> {
    let response = request_with_headers(client, link, url)
        .send()
        .await
        .map_err(NetworkError::from)?;
    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::HttpStatus(status.as_u16()).into());
    }
    response
        .text()
        .await
        .map_err(|_| NetworkError::InvalidResponse.into())
}

async fn fetch_segment(
    client: &reqwest::Client,
    link: &ExtractedLink,
    url: Url,
) -> Result<Vec<u8>, DownloadError> {
    let response = request_with_headers(client, link, url)
        .send()
        .await
        .map_err(NetworkError::from)?;
    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::HttpStatus(status.as_u16()).into());
    }
    let bytes = response.bytes().await.map_err(NetworkError::from)?;
    Ok(bytes.to_vec())
}

fn request_with_headers(
    client: &reqwest::Client,
    link: &ExtractedLink,
    url: Url,
) -> reqwest::RequestBuilder {
    let mut request = client.get(url);
    for (name, value) in &link.headers {
        request = request.header(name, value);
    }
    request
}

fn parse_link_url(link: &ExtractedLink) -> Result<Url, DownloadError> {
    Url::parse(&link.url).map_err(|e| DownloadError::InvalidLink(format!("{}: {e}", link.url)))
}

async fn send_bytes(
    reports: &mpsc::Sender<Report>,
    id: &str,
    downloaded: u64,
    total: Option<u64>,
    fraction: Option<f32>,
) {
    let _ = reports
        .send(Report::Bytes {
            id: id.to_string(),
            downloaded,
            total,
            fraction,
        })
        .await;
}

fn segment_name(index: usize) -> String {
    format!("seg-{:05}.ts", index + 1)
}

fn file_stem(download: &Download) -> String {
    let slug = slugify(&download.display_title());
    let short_id = download.id.get(..8).unwrap_or(&download.id);
    format!("{slug}-{short_id}")
}

fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut last_dash = true;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "download".to_string()
    } else {
        slug.to_string()
    }
}

fn extension_for(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
        })
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| "mp4".to_string())
}
