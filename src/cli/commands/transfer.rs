//! Transfer control command handlers
//!
//! Each of these forwards an intent to the running daemon; the engine applies
//! it on its next pass and the reply confirms the request was accepted.

use crate::cli::DaemonClient;
use crate::config::Config;

pub async fn cmd_pause(config: &Config, id: &str) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let message = client.pause(id).await?;
    println!("✓ {message}");
    Ok(())
}

pub async fn cmd_resume(config: &Config, id: &str) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let message = client.resume(id).await?;
    println!("✓ {message}");
    Ok(())
}

pub async fn cmd_cancel(config: &Config, id: &str) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let message = client.cancel(id).await?;
    println!("✓ {message}");
    Ok(())
}

pub async fn cmd_delete(config: &Config, id: &str) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let message = client.delete(id).await?;
    println!("✓ {message}");
    Ok(())
}

pub async fn cmd_convert(config: &Config, id: &str) -> anyhow::Result<()> {
    let client = DaemonClient::new(config)?;
    let message = client.convert(id).await?;
    println!("✓ {message}");
    println!("Watch progress with: vidarr queue");
    Ok(())
}
