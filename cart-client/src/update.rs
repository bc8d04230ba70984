use anyhow::Result;
use self_update::cargo_crate_version;
use tracing::{info, warn};

/// Check for a newer release on GitHub and apply it in place.
pub async fn update(interactive: bool) -> Result<bool> {
    info!("Checking for updates...");
    let current_version = cargo_crate_version!();

    // self_update does blocking IO; keep it off the async runtime.
    let maybe_status = tokio::task::spawn_blocking(move || {
        self_update::backends::github::Update::configure()
            .repo_owner("cartridge-app")
            .repo_name("cartridge")
            .bin_name("cart")
            .current_version(current_version)
            .no_confirm(!interactive)
            .build()
            .and_then(|u| u.update())
    })
    .await?;

    match maybe_status {
        Ok(status) => {
            let new_version = status.version().to_string();
            if new_version != current_version {
                println!("Updated from {} to {}", current_version, new_version);
                return Ok(true);
            }
            println!("You are running the latest version ({})", current_version);
        }
        Err(e) => {
            warn!("Self-update failed: {}", e);
            println!("Failed to check for updates: {}", e);
        }
    }

    Ok(false)
}
