pub mod api;
pub mod cli;
pub mod config;
pub mod convert;
pub mod downloads;
pub mod errors;
pub mod events;
pub mod extractors;
pub mod models;
pub mod net;
pub mod providers;
pub mod quality;
pub mod resolver;
pub mod state;

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, ProviderCommands};
pub use config::Config;
use state::AppState;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Daemon) => run_daemon(config).await,

        Some(Commands::Home) => cli::cmd_home(&config).await,

        Some(Commands::Search { query, page }) => {
            let query = query.join(" ");
            cli::cmd_search(&config, &query, page).await
        }

        Some(Commands::Info { media_type, id }) => cli::cmd_info(&config, &media_type, &id).await,

        Some(Commands::Links {
            media_type,
            id,
            season,
            episode,
        }) => {
            cli::cmd_links(
                &config,
                &media_type,
                &id,
                season.as_deref(),
                episode.as_deref(),
            )
            .await
        }

        Some(Commands::Download {
            media_type,
            id,
            season,
            episode,
            priority,
        }) => {
            cli::cmd_download(
                &config,
                &media_type,
                &id,
                season.as_deref(),
                episode.as_deref(),
                &priority,
            )
            .await
        }

        Some(Commands::Queue) => cli::cmd_queue(&config).await,

        Some(Commands::List) => cli::cmd_list(&config).await,

        Some(Commands::Pause { id }) => cli::cmd_pause(&config, &id).await,

        Some(Commands::Resume { id }) => cli::cmd_resume(&config, &id).await,

        Some(Commands::Cancel { id }) => cli::cmd_cancel(&config, &id).await,

        Some(Commands::Delete { id }) => cli::cmd_delete(&config, &id).await,

        Some(Commands::Convert { id }) => cli::cmd_convert(&config, &id).await,

        Some(Commands::Providers { command }) => match command {
            None | Some(ProviderCommands::List) => cli::cmd_providers_list(&config).await,
            Some(ProviderCommands::Use { name }) => cli::cmd_providers_use(&config, &name).await,
        },

        Some(Commands::Init) => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("Config file already exists, leaving it untouched.");
            }
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("Vidarr - Streaming content resolver and download manager");
    println!();
    println!("USAGE:");
    println!("  vidarr <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  home                       Show the active provider's home carousels");
    println!("  search <query> [--page n]  Search the active provider");
    println!("  info <type> <id>           Show details for a single title");
    println!("  links <type> <id>          Resolve playable streaming links");
    println!("  download <type> <id>       Resolve links and queue the best one");
    println!("  queue, q                   Show the daemon's queue grouped by state");
    println!("  list, ls                   List all download records");
    println!("  pause <id>                 Pause an active download");
    println!("  resume <id>                Requeue a paused or failed download");
    println!("  cancel <id>                Cancel a download and remove partial data");
    println!("  delete, rm <id>            Delete a download record and its files");
    println!("  convert <id>               Convert a segmented download into one file");
    println!("  providers [use <name>]     List providers or switch the active one");
    println!("  daemon                     Run the download engine and HTTP API");
    println!("  init                       Create default config file");
    println!("  help                       Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  vidarr search \"dune\"                            # Search the active provider");
    println!("  vidarr info movie 603                             # Show movie details");
    println!("  vidarr links show 1396 --season 1 --episode 1     # Resolve episode links");
    println!("  vidarr download movie 603 --priority high         # Queue a download");
    println!("  vidarr daemon                                     # Start the daemon");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure providers, downloads and the server.");
}

async fn run_daemon(config: Config) -> anyhow::Result<()> {
    info!(
        "Vidarr v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let (state, engine) = AppState::build(config.clone())?;

    let engine_handle = tokio::spawn(engine.run());

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting HTTP API on port {}", port);

        let app = api::router(Arc::clone(&state));
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("API server running at http://{addr}");
            if let Err(e) = axum::serve(listener, app).await {
                error!("API server error: {e}");
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {e}");
        }
    }

    engine_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("Daemon stopped");

    Ok(())
}
