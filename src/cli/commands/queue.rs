//! Queue inspection command handlers

use crate::cli::DaemonClient;
use crate::config::Config;
use crate::models::DownloadState;

pub async fn cmd_queue(config: &Config) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let snapshot = client.queue().await?;

    if snapshot.total() == 0 {
        println!("Queue is empty.");
        println!();
        println!("Queue a title with: vidarr download <type> <id>");
        return Ok(());
    }

    println!("Download Queue ({} total)", snapshot.total());
    println!("{:-<70}", "");

    if !snapshot.active.is_empty() {
        println!("Active ({}):", snapshot.active.len());
        for status in &snapshot.active {
            let eta = status
                .eta_seconds
                .map_or_else(|| "-".to_string(), format_eta);
            println!(
                "  ▶ {} — {:.1}% | {}/s | ETA {}",
                status.title,
                f64::from(status.progress) * 100.0,
                format_bytes(status.speed),
                eta
            );
            let size = status
                .file_size
                .map_or_else(|| "?".to_string(), format_bytes);
            println!(
                "    ID: {} | {} / {}",
                status.id,
                format_bytes(status.downloaded_bytes),
                size
            );
        }
    }

    if !snapshot.queued.is_empty() {
        println!("Queued ({}):", snapshot.queued.len());
        for (i, entry) in snapshot.queued.iter().enumerate() {
            let quality = entry.quality.as_deref().unwrap_or("?");
            println!(
                "  {}. {} [{}] {}",
                i + 1,
                entry.title,
                entry.priority,
                quality
            );
            println!("     ID: {}", entry.download_id);
        }
    }

    if !snapshot.paused.is_empty() {
        println!("Paused ({}):", snapshot.paused.len());
        for status in &snapshot.paused {
            println!(
                "  ⏸ {} — {:.1}% ({})",
                status.title,
                f64::from(status.progress) * 100.0,
                format_bytes(status.downloaded_bytes)
            );
            println!("    ID: {}", status.id);
        }
    }

    if !snapshot.completed.is_empty() {
        println!("Completed ({}):", snapshot.completed.len());
        for status in &snapshot.completed {
            println!("  ✓ {}", status.title);
            if let Some(path) = &status.local_path {
                println!("    {path}");
            }
        }
    }

    if !snapshot.failed.is_empty() {
        println!("Failed ({}):", snapshot.failed.len());
        for status in &snapshot.failed {
            let error = status.error.as_deref().unwrap_or("unknown error");
            println!("  ✗ {} — {error}", status.title);
            println!("    ID: {} (resume with: vidarr resume {})", status.id, status.id);
        }
    }

    Ok(())
}

pub async fn cmd_list(config: &Config) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let mut downloads = client.list().await?;

    if downloads.is_empty() {
        println!("No download records.");
        return Ok(());
    }

    downloads.sort_by(|a, b| a.added_at.cmp(&b.added_at));

    println!("All Downloads ({} total)", downloads.len());
    println!("{:-<70}", "");

    for download in &downloads {
        let marker = state_marker(download.state);
        println!("{} {} [{}]", marker, download.display_title(), download.state);
        println!(
            "  ID: {} | {:.1}% | {} | priority: {}",
            download.id,
            f64::from(download.progress) * 100.0,
            format_bytes(download.downloaded_bytes),
            download.priority
        );
    }

    Ok(())
}

const fn state_marker(state: DownloadState) -> &'static str {
    match state {
        DownloadState::Pending => "○",
        DownloadState::Downloading => "▶",
        DownloadState::Paused => "⏸",
        DownloadState::Completed => "✓",
        DownloadState::Failed => "✗",
    }
}

pub(super) fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_eta(seconds: u64) -> String {
    if seconds >= 3600 {
        format!("{}h{:02}m", seconds / 3600, (seconds % 3600) / 60)
    } else if seconds >= 60 {
        format!("{}m{:02}s", seconds / 60, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_format_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    }

    #[test]
    fn eta_format_picks_granularity() {
        assert_eq!(format_eta(42), "42s");
        assert_eq!(format_eta(95), "1m35s");
        assert_eq!(format_eta(3725), "1h02m");
    }
}
