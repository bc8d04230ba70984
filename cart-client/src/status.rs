use anyhow::{Context, Result, bail};
use cart_shared::heartbeat::HeartbeatResponse;

use crate::config::Config;

/// `cart status`: prints the server heartbeat. The endpoint needs no
/// authentication, only a configured server.
pub async fn status() -> Result<()> {
    let config = Config::load()?;
    let heartbeat = fetch_heartbeat(config.server_url()?).await?;

    println!("Server version: {}", heartbeat.version);
    if heartbeat.update_available() {
        println!("Update available: {}", heartbeat.new_version);
    }
    println!(
        "Metadata sources enabled: {}",
        if heartbeat.any_source_enabled { "yes" } else { "no" }
    );

    // The subsystem reports are server-defined JSON; print them as-is
    // rather than guessing at their shape.
    println!("Sources: {}", serde_json::to_string_pretty(&heartbeat.metadata_sources)?);
    println!("Watcher: {}", serde_json::to_string_pretty(&heartbeat.watcher)?);
    println!("Scheduler: {}", serde_json::to_string_pretty(&heartbeat.scheduler)?);
    Ok(())
}

pub async fn fetch_heartbeat(server: &str) -> Result<HeartbeatResponse> {
    let response = reqwest::get(format!(
        "{}/api/heartbeat",
        server.trim_end_matches('/')
    ))
    .await
    .context("Could not reach the server")?;
    if !response.status().is_success() {
        bail!("Heartbeat failed ({})", response.status().as_u16());
    }
    response.json().await.context("Failed to parse heartbeat")
}
