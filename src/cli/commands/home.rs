//! Home page command handler

use crate::config::Config;
use crate::state::AppState;

pub async fn cmd_home(config: &Config) -> anyhow::Result<()> {
    let (state, _engine) = AppState::build(config.clone())?;
    let provider = state.providers.active().await;

    println!("Home - {}", provider.name());
    println!("{:-<60}", "");

    let carousels = provider.fetch_home().await?;
    if carousels.is_empty() {
        println!("The provider returned no home content.");
        return Ok(());
    }

    for carousel in carousels {
        println!();
        println!("{} ({} titles)", carousel.title, carousel.items.len());
        for item in carousel.items.iter().take(8) {
            let year = item
                .release_date
                .as_deref()
                .and_then(|d| d.get(..4))
                .unwrap_or("????");
            println!(
                "  • {} ({}) [{}] id: {}",
                item.title, year, item.media_type, item.id
            );
        }
        if carousel.items.len() > 8 {
            println!("  ... and {} more", carousel.items.len() - 8);
        }
    }

    println!();
    Ok(())
}
