//! Title details command handler

use crate::config::Config;
use crate::models::{Content, MediaType};
use crate::state::AppState;

pub async fn cmd_info(config: &Config, media_type: &str, id: &str) -> anyhow::Result<()> {
    let media_type: MediaType = match media_type.parse() {
        Ok(mt) => mt,
        Err(e) => {
            println!("Invalid media type: {e}");
            return Ok(());
        }
    };

    let (state, _engine) = AppState::build(config.clone())?;
    let provider = state.providers.active().await;
    let content = provider.fetch_details(id, media_type).await?;

    println!("Title Info");
    println!("{:-<60}", "");
    println!("Title:    {}", content.title);
    println!("Type:     {}", content.media_type);
    println!("ID:       {}", content.id);
    if let Some(date) = &content.release_date {
        println!("Released: {date}");
    }
    if let Some(rating) = content.rating {
        println!("Rating:   {rating:.1}/10");
    }
    if !content.genres.is_empty() {
        println!("Genres:   {}", content.genres.join(", "));
    }
    if let Some(overview) = &content.overview {
        let display_overview = if overview.len() > 300 {
            let cut: String = overview.chars().take(300).collect();
            format!("{cut}...")
        } else {
            overview.clone()
        };
        println!("Overview: {display_overview}");
    }
    if let Some(trailer) = &content.trailer {
        println!("Trailer:  {}", trailer.url);
    }

    display_seasons(&content);
    display_cast(&content);
    display_recommendations(&content);

    println!();
    if content.media_type.is_episodic() {
        println!(
            "Resolve links with: vidarr links {} {} --season <n> --episode <n>",
            content.media_type, content.id
        );
    } else {
        println!(
            "Resolve links with: vidarr links {} {}",
            content.media_type, content.id
        );
    }

    Ok(())
}

fn display_seasons(content: &Content) {
    if content.seasons.is_empty() {
        return;
    }

    println!();
    println!("Seasons ({}):", content.seasons.len());
    for season in &content.seasons {
        let name = season
            .name
            .clone()
            .unwrap_or_else(|| format!("Season {}", season.number));
        println!("  {} | {} episodes", name, season.episode_count);
    }
}

fn display_cast(content: &Content) {
    if content.cast.is_empty() {
        return;
    }

    println!();
    println!("Cast:");
    for member in content.cast.iter().take(6) {
        match &member.character {
            Some(character) => println!("  {} as {}", member.name, character),
            None => println!("  {}", member.name),
        }
    }
    if content.cast.len() > 6 {
        println!("  ... and {} more", content.cast.len() - 6);
    }
}

fn display_recommendations(content: &Content) {
    if content.recommendations.is_empty() {
        return;
    }

    println!();
    println!("You may also like:");
    for rec in content.recommendations.iter().take(5) {
        println!("  • {} [{} {}]", rec.title, rec.media_type, rec.id);
    }
}
