//! Streaming link resolution command handler

use crate::config::Config;
use crate::errors::ScraperError;
use crate::models::MediaType;
use crate::state::AppState;

pub async fn cmd_links(
    config: &Config,
    media_type: &str,
    id: &str,
    season: Option<&str>,
    episode: Option<&str>,
) -> anyhow::Result<()> {
    let media_type: MediaType = match media_type.parse() {
        Ok(mt) => mt,
        Err(e) => {
            println!("Invalid media type: {e}");
            return Ok(());
        }
    };

    let (state, _engine) = AppState::build(config.clone())?;

    println!("Resolving links for {media_type} {id}...");
    println!("{:-<60}", "");

    let links = match state.resolver.resolve(id, media_type, season, episode).await {
        Ok(links) => links,
        Err(ScraperError::MissingEpisodeInfo) => {
            println!("This title is episodic: pass --season and --episode.");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if links.is_empty() {
        println!("No playable links found.");
        return Ok(());
    }

    for (i, link) in links.iter().enumerate() {
        let quality = link.quality.as_deref().unwrap_or("unknown quality");
        let server = link.server.as_deref().unwrap_or("unknown server");

        println!("{}. {} | {} | {}", i + 1, quality, server, link.kind);
        println!("   {}", link.url);
        if link.requires_referer {
            println!("   Requires Referer header");
        }
        if !link.subtitles.is_empty() {
            let languages: Vec<&str> = link
                .subtitles
                .iter()
                .map(|s| s.language.as_str())
                .collect();
            println!("   Subtitles: {}", languages.join(", "));
        }
    }

    println!();
    println!("{} links found (best first)", links.len());

    Ok(())
}
