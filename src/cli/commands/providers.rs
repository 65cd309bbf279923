//! Provider management command handlers

use crate::cli::DaemonClient;
use crate::config::Config;
use crate::state::AppState;

pub async fn cmd_providers_list(config: &Config) -> anyhow::Result<()> {
    let (state, _engine) = AppState::build(config.clone())?;
    let active = state.providers.active_name().await;

    println!("Registered Providers");
    println!("{:-<60}", "");

    for name in state.providers.names() {
        let marker = if name == active { "●" } else { "○" };
        let Some(provider) = state.providers.get(name) else {
            continue;
        };
        let types: Vec<String> = provider
            .supported_types()
            .iter()
            .map(ToString::to_string)
            .collect();

        println!("{marker} {name}");
        println!("  URL:   {}", provider.base_url());
        println!("  Types: {}", types.join(", "));
    }

    println!();
    println!("● active | switch with: vidarr providers use <name>");

    Ok(())
}

pub async fn cmd_providers_use(config: &Config, name: &str) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let message = client.set_provider(name).await?;
    println!("✓ {message}");
    Ok(())
}
