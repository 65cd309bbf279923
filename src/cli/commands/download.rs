//! Download command handler

use crate::cli::DaemonClient;
use crate::config::Config;
use crate::errors::ScraperError;
use crate::models::{DownloadPriority, DownloadRequest, MediaType};
use crate::state::AppState;

pub async fn cmd_download(
    config: &Config,
    media_type: &str,
    id: &str,
    season: Option<&str>,
    episode: Option<&str>,
    priority: &str,
) -> anyhow::Result<()> {
    let media_type: MediaType = match media_type.parse() {
        Ok(mt) => mt,
        Err(e) => {
            println!("Invalid media type: {e}");
            return Ok(());
        }
    };
    let priority: DownloadPriority = match priority.parse() {
        Ok(p) => p,
        Err(e) => {
            println!("Invalid priority: {e}");
            return Ok(());
        }
    };

    let (state, _engine) = AppState::build(config.clone())?;
    let provider = state.providers.active().await;

    println!("Resolving {media_type} {id}...");
    let content = provider.fetch_details(id, media_type).await?;

    let links = match state.resolver.resolve(id, media_type, season, episode).await {
        Ok(links) => links,
        Err(ScraperError::MissingEpisodeInfo) => {
            println!("This title is episodic: pass --season and --episode.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    let Some(link) = links.into_iter().next() else {
        println!("No playable links found for '{}'.", content.title);
        return Ok(());
    };

    let title = match (season, episode) {
        (Some(s), Some(e)) => format!("{} S{s}E{e}", content.title),
        _ => content.title.clone(),
    };

    let quality = link.quality.clone().unwrap_or_else(|| "unknown".to_string());
    let server = link.server.clone().unwrap_or_else(|| "unknown".to_string());

    let request = DownloadRequest {
        content_id: id.to_string(),
        title,
        media_type,
        season: season.map(str::to_string),
        episode: episode.map(str::to_string),
        link,
        priority,
    };

    let client = DaemonClient::new(config)?;
    let download = client.enqueue(&request).await?;

    println!("✓ Queued: {}", download.title);
    println!("  ID:       {}", download.id);
    println!("  Source:   {quality} via {server}");
    println!("  Priority: {}", download.priority);
    println!();
    println!("Watch progress with: vidarr queue");

    Ok(())
}
