//! Search command handler

use crate::config::Config;
use crate::state::AppState;

pub async fn cmd_search(config: &Config, query: &str, page: u32) -> anyhow::Result<()> {
    let query = query.trim();
    if query.is_empty() {
        println!("Search query must not be empty.");
        return Ok(());
    }

    let (state, _engine) = AppState::build(config.clone())?;
    let provider = state.providers.active().await;

    println!("Searching {} for: {query}", provider.name());
    println!("{:-<60}", "");

    let results = provider.search(query, page).await?;
    if results.items.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, item) in results.items.iter().enumerate() {
        let year = item
            .release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .unwrap_or("????");
        let rating = item
            .rating
            .map_or_else(|| "-".to_string(), |r| format!("{r:.1}"));

        println!("{}. {} ({})", i + 1, item.title, year);
        println!(
            "   Type: {} | Rating: {} | ID: {}",
            item.media_type, rating, item.id
        );
    }

    println!();
    println!(
        "Page {} of {} ({} results total)",
        results.page, results.total_pages, results.total_results
    );
    println!("Show details with: vidarr info <type> <id>");

    Ok(())
}
